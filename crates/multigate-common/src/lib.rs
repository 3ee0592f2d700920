pub mod config;
pub mod error;
pub mod ids;

pub use config::{GlobalConfig, PromptLogMode, SystemPromptMode, retry_backoff};
pub use error::{ErrorKind, GatewayError};
pub use ids::{new_trace_id, now_rfc3339};
