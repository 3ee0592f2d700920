use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use std::pin::Pin;

use crate::credential::Credential;
use crate::errors::AdapterError;

/// One entry of `listModels()`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_token_limit: Option<u32>,
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, AdapterError>> + Send>>;

/// An adapter call's result, paired with a refreshed credential when the
/// call rotated an OAuth access token. The pool persists `refreshed` onto
/// the originating entry so the next `select` sees the new token.
pub struct Outcome<T> {
    pub value: T,
    pub refreshed: Option<Credential>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self { value, refreshed: None }
    }

    pub fn refreshed(value: T, credential: Credential) -> Self {
        Self { value, refreshed: Some(credential) }
    }
}

/// Uniform interface over one upstream account, per §4.D. A request body
/// arrives already shaped in the adapter's own upstream protocol (the
/// orchestrator runs the protocol converter before dispatch); the
/// adapter's only job is transport, auth, and OAuth refresh. Credentials
/// are supplied per call rather than held by the adapter, since one
/// `Provider` instance is shared by every pool entry of its kind.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider-kind string, e.g. `"claude-kiro-oauth"`.
    fn kind(&self) -> &str;

    async fn list_models(
        &self,
        credential: &Credential,
    ) -> Result<Outcome<Vec<ModelInfo>>, AdapterError>;

    async fn generate_content(
        &self,
        credential: &Credential,
        model: &str,
        body: Bytes,
    ) -> Result<Outcome<Bytes>, AdapterError>;

    async fn generate_content_stream(
        &self,
        credential: &Credential,
        model: &str,
        body: Bytes,
    ) -> Result<Outcome<ByteStream>, AdapterError>;
}
