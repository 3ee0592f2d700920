use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};

use multigate_common::now_rfc3339;
use multigate_provider_core::{AdapterError, ByteStream, Credential, ModelInfo, Outcome, Provider};

use crate::http::shared_client;
use crate::refresh::{coalesced_refresh, needs_refresh};

/// How a vendor's token endpoint wants the refresh POST shaped. Grounded on
/// Google's form-encoded `oauth2.googleapis.com/token` and Anthropic's
/// JSON-bodied `/v1/oauth/token`.
pub(crate) enum RefreshStyle {
    Form { client_id: &'static str, client_secret: &'static str },
    Json { client_id: &'static str },
}

/// Data describing one OAuth provider kind. All four vendors carry the
/// model name in the request body rather than the URL, so `generate_path`/
/// `stream_path` are fixed strings.
pub(crate) struct OAuthAdapter {
    kind: &'static str,
    default_base_url: &'static str,
    token_url: &'static str,
    refresh_style: RefreshStyle,
    generate_path: &'static str,
    stream_path: &'static str,
    models_path: &'static str,
}

#[derive(Serialize)]
struct FormRefreshRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl OAuthAdapter {
    pub(crate) const fn new(
        kind: &'static str,
        default_base_url: &'static str,
        token_url: &'static str,
        refresh_style: RefreshStyle,
        generate_path: &'static str,
        stream_path: &'static str,
        models_path: &'static str,
    ) -> Self {
        Self {
            kind,
            default_base_url,
            token_url,
            refresh_style,
            generate_path,
            stream_path,
            models_path,
        }
    }

    fn base_url(&self) -> &str {
        self.default_base_url
    }

    async fn fresh_access_token(
        &self,
        credential: &Credential,
    ) -> Result<(String, Option<Credential>), AdapterError> {
        let Credential::OAuth { access_token, refresh_token, expires_at, project_id } = credential
        else {
            return Err(AdapterError::transport(format!(
                "{} requires an OAuth credential",
                self.kind
            )));
        };

        if !needs_refresh(expires_at) {
            return Ok((access_token.clone(), None));
        }

        let kind = self.kind;
        let token_url = self.token_url;
        let refresh_token = refresh_token.clone();
        let project_id = project_id.clone();
        let style = &self.refresh_style;
        let refreshed = coalesced_refresh(&refresh_token, || async move {
            refresh_once(kind, token_url, style, &refresh_token, project_id).await
        })
        .await?;

        let Credential::OAuth { access_token, .. } = &refreshed else {
            unreachable!("refresh_once always returns an OAuth credential");
        };
        Ok((access_token.clone(), Some(refreshed.clone())))
    }
}

async fn refresh_once(
    kind: &str,
    token_url: &str,
    style: &RefreshStyle,
    refresh_token: &str,
    project_id: Option<String>,
) -> Result<Credential, AdapterError> {
    let request = match style {
        RefreshStyle::Form { client_id, client_secret } => shared_client()
            .post(token_url)
            .header("content-type", "application/x-www-form-urlencoded")
            .form(&FormRefreshRequest {
                client_id,
                client_secret,
                grant_type: "refresh_token",
                refresh_token,
            }),
        RefreshStyle::Json { client_id } => shared_client().post(token_url).json(&serde_json::json!({
            "grant_type": "refresh_token",
            "client_id": client_id,
            "refresh_token": refresh_token,
        })),
    };

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
    let payload: RefreshResponse = serde_json::from_slice(&body)
        .map_err(|err| AdapterError::transport(format!("{kind} refresh response: {err}")))?;

    let expires_at = {
        let ttl = payload.expires_in.unwrap_or(3600).max(0);
        let at = time::OffsetDateTime::now_utc() + time::Duration::seconds(ttl);
        at.format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| now_rfc3339())
    };

    Ok(Credential::OAuth {
        access_token: payload.access_token,
        refresh_token: payload.refresh_token.unwrap_or_else(|| refresh_token.to_string()),
        expires_at,
        project_id,
    })
}

#[async_trait]
impl Provider for OAuthAdapter {
    fn kind(&self) -> &str {
        self.kind
    }

    async fn list_models(
        &self,
        credential: &Credential,
    ) -> Result<Outcome<Vec<ModelInfo>>, AdapterError> {
        let (access_token, refreshed) = self.fresh_access_token(credential).await?;
        let url = format!("{}{}", self.base_url(), self.models_path);
        let response = shared_client()
            .get(&url)
            .header("Authorization", format!("Bearer {access_token}"))
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
        Ok(Outcome { value: parse_model_list(&body), refreshed })
    }

    async fn generate_content(
        &self,
        credential: &Credential,
        _model: &str,
        body: Bytes,
    ) -> Result<Outcome<Bytes>, AdapterError> {
        let (access_token, refreshed) = self.fresh_access_token(credential).await?;
        let url = format!("{}{}", self.base_url(), self.generate_path);
        let response = shared_client()
            .post(&url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("content-type", "application/json")
            .body(body)
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
        Ok(Outcome { value: body, refreshed })
    }

    async fn generate_content_stream(
        &self,
        credential: &Credential,
        _model: &str,
        body: Bytes,
    ) -> Result<Outcome<ByteStream>, AdapterError> {
        let (access_token, refreshed) = self.fresh_access_token(credential).await?;
        let url = format!("{}{}", self.base_url(), self.stream_path);
        let response = shared_client()
            .post(&url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .body(body)
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
        Ok(Outcome { value: Box::pin(stream), refreshed })
    }
}

fn parse_model_list(body: &[u8]) -> Vec<ModelInfo> {
    #[derive(serde::Deserialize)]
    struct Entry {
        #[serde(alias = "id")]
        name: String,
        #[serde(default, alias = "displayName")]
        display_name: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct Envelope {
        #[serde(default)]
        models: Vec<Entry>,
        #[serde(default)]
        data: Vec<Entry>,
    }

    serde_json::from_slice::<Envelope>(body)
        .map(|envelope| {
            envelope
                .models
                .into_iter()
                .chain(envelope.data)
                .map(|entry| ModelInfo {
                    id: entry.name,
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
    fn parses_gemini_style_model_envelope() {
        let body = br#"{"models":[{"name":"gemini-2.5-pro","displayName":"Gemini 2.5 Pro"}]}"#;
        let models = parse_model_list(body);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "gemini-2.5-pro");
    }
}
