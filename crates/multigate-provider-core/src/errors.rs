use std::error::Error;
use std::fmt;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Local adapter-construction errors (bad config, missing credential
/// field). Distinct from `multigate_common::GatewayError`, which is the
/// wire-facing error the orchestrator renders to the client.
#[derive(Debug, Clone)]
pub enum ProviderError {
    Unsupported(&'static str),
    InvalidConfig(String),
    MissingCredentialField(&'static str),
    Other(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Unsupported(what) => write!(f, "unsupported: {what}"),
            ProviderError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            ProviderError::MissingCredentialField(field) => {
                write!(f, "missing credential field: {field}")
            }
            ProviderError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for ProviderError {}

/// Failure contract from §4.D: any non-2xx upstream response becomes a
/// structured error thrown from the adapter call. The adapter never
/// retries.
#[derive(Debug, Clone)]
pub struct AdapterError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
    pub upstream_body: Option<String>,
}

impl AdapterError {
    pub fn from_upstream(status: u16, upstream_body: impl Into<String>) -> Self {
        let upstream_body = upstream_body.into();
        Self {
            status,
            code: None,
            message: format!("upstream returned status {status}"),
            upstream_body: Some(upstream_body),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            code: None,
            message: message.into(),
            upstream_body: None,
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.message, self.status)
    }
}

impl Error for AdapterError {}
