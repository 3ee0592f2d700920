use serde::Serialize;

/// Error kinds named in the error handling design, independent of any
/// client dialect. The orchestrator maps an `ErrorKind` into the
/// caller's wire envelope at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    UpstreamTimeout,
    UpstreamServerError,
    ProtocolMismatch,
    NoHealthyProvider,
    Internal,
}

impl ErrorKind {
    /// HTTP status code conventionally associated with this kind.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::UpstreamTimeout => 504,
            ErrorKind::UpstreamServerError => 502,
            ErrorKind::ProtocolMismatch => 400,
            ErrorKind::NoHealthyProvider => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether the orchestrator should retry by re-selecting a new
    /// provider entry (only timeouts and 5xx are retried locally).
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::UpstreamTimeout | ErrorKind::UpstreamServerError
        )
    }
}

/// Wire-facing gateway error. Carries enough context to render every
/// per-dialect envelope in the error handling design without re-deriving
/// it from the upstream response.
#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    /// Verbatim upstream body, when the error originated from an
    /// adapter's non-2xx response. Never set for locally-raised errors.
    pub upstream_body: Option<String>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            upstream_body: None,
        }
    }

    pub fn with_upstream_body(mut self, body: impl Into<String>) -> Self {
        self.upstream_body = Some(body.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn protocol_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolMismatch, message)
    }

    pub fn no_healthy_provider(kind: &str) -> Self {
        Self::new(
            ErrorKind::NoHealthyProvider,
            format!("no healthy provider entry for kind {kind}"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Classify a raw upstream HTTP status into an `ErrorKind`, per the
    /// error handling design's propagation rule ("adapters surface
    /// upstream HTTP status verbatim; the orchestrator translates to a
    /// kind").
    pub fn from_upstream_status(status: u16, body: impl Into<String>) -> Self {
        let kind = match status {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::UpstreamServerError,
            _ => ErrorKind::Internal,
        };
        Self::new(kind, format!("upstream returned status {status}")).with_upstream_body(body)
    }
}
