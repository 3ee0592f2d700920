use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;

use multigate_provider_core::{AdapterError, ByteStream, Credential, ModelInfo, Outcome, Provider};

use crate::http::shared_client;

/// Header-injection strategy a static-key vendor requires (§4.D).
pub(crate) enum AuthStyle {
    BearerAuthorization,
    XApiKey { anthropic_version: &'static str },
}

/// Data describing one static-API-key provider kind. All three of
/// `openai-custom`, `openaiResponses-custom`, and `claude-custom` differ
/// only in these fields, so one adapter body serves all of them.
pub(crate) struct ApiKeyAdapter {
    kind: &'static str,
    default_base_url: &'static str,
    generate_path: &'static str,
    models_path: &'static str,
    auth: AuthStyle,
}

impl ApiKeyAdapter {
    pub(crate) const fn new(
        kind: &'static str,
        default_base_url: &'static str,
        generate_path: &'static str,
        models_path: &'static str,
        auth: AuthStyle,
    ) -> Self {
        Self {
            kind,
            default_base_url,
            generate_path,
            models_path,
            auth,
        }
    }

    fn base_url(&self, credential: &Credential) -> String {
        match credential {
            Credential::ApiKey { base_url: Some(url), .. } if !url.is_empty() => {
                url.trim_end_matches('/').to_string()
            }
            _ => self.default_base_url.to_string(),
        }
    }

    fn api_key<'a>(&self, credential: &'a Credential) -> Result<&'a str, AdapterError> {
        match credential {
            Credential::ApiKey { api_key, .. } => Ok(api_key.as_str()),
            _ => Err(AdapterError::transport(format!(
                "{} requires an ApiKey credential",
                self.kind
            ))),
        }
    }

    fn apply_auth(&self, builder: wreq::RequestBuilder, api_key: &str) -> wreq::RequestBuilder {
        match &self.auth {
            AuthStyle::BearerAuthorization => {
                builder.header("Authorization", format!("Bearer {api_key}"))
            }
            AuthStyle::XApiKey { anthropic_version } => builder
                .header("x-api-key", api_key)
                .header("anthropic-version", *anthropic_version),
        }
    }
}

#[async_trait]
impl Provider for ApiKeyAdapter {
    fn kind(&self) -> &str {
        self.kind
    }

    async fn list_models(
        &self,
        credential: &Credential,
    ) -> Result<Outcome<Vec<ModelInfo>>, AdapterError> {
        let api_key = self.api_key(credential)?;
        let url = format!("{}{}", self.base_url(credential), self.models_path);
        let request = self.apply_auth(shared_client().get(&url), api_key);
        let response = request
            .send()
            .await
            .map_err(|err| AdapterError::transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| AdapterError::transport(err.to_string()))?;
        if !status.is_success() {
            return Err(AdapterError::from_upstream(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }
        Ok(Outcome::new(parse_model_list(&body)))
    }

    async fn generate_content(
        &self,
        credential: &Credential,
        _model: &str,
        body: Bytes,
    ) -> Result<Outcome<Bytes>, AdapterError> {
        let api_key = self.api_key(credential)?;
        let url = format!("{}{}", self.base_url(credential), self.generate_path);
        let request = self
            .apply_auth(shared_client().post(&url), api_key)
            .header("content-type", "application/json")
            .body(body);
        let response = request
            .send()
            .await
            .map_err(|err| AdapterError::transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| AdapterError::transport(err.to_string()))?;
        if !status.is_success() {
            return Err(AdapterError::from_upstream(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }
        Ok(Outcome::new(body))
    }

    async fn generate_content_stream(
        &self,
        credential: &Credential,
        _model: &str,
        body: Bytes,
    ) -> Result<Outcome<ByteStream>, AdapterError> {
        let api_key = self.api_key(credential)?;
        let url = format!("{}{}", self.base_url(credential), self.generate_path);
        let request = self
            .apply_auth(shared_client().post(&url), api_key)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .body(body);
        let response = request
            .send()
            .await
            .map_err(|err| AdapterError::transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|err| AdapterError::transport(err.to_string()))?;
            return Err(AdapterError::from_upstream(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }
        let stream = response
            .bytes_stream()
            .map_err(|err| AdapterError::transport(err.to_string()));
        Ok(Outcome::new(Box::pin(stream)))
    }
}

fn parse_model_list(body: &[u8]) -> Vec<ModelInfo> {
    #[derive(serde::Deserialize)]
    struct Entry {
        id: String,
        #[serde(default)]
        display_name: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct Envelope {
        #[serde(default)]
        data: Vec<Entry>,
    }

    serde_json::from_slice::<Envelope>(body)
        .map(|envelope| {
            envelope
                .data
                .into_iter()
                .map(|entry| ModelInfo {
                    id: entry.id,
                    display_name: entry.display_name,
                    description: None,
                    version: None,
                    input_token_limit: None,
                    output_token_limit: None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_style_envelope() {
        let body = br#"{"data":[{"id":"gpt-4o"},{"id":"gpt-4o-mini","display_name":"GPT-4o mini"}]}"#;
        let models = parse_model_list(body);
        assert_eq!(models.len(), 2);
        assert_eq!(models[1].display_name.as_deref(), Some("GPT-4o mini"));
    }

    #[test]
    fn malformed_body_yields_empty_list_rather_than_panicking() {
        assert!(parse_model_list(b"not json").is_empty());
    }
}
