//! Provider abstractions for multigate: a uniform adapter interface
//! (§4.D), the credentialed provider pool (§4.E), and model-name
//! prefix handling (§4.H).
//!
//! This crate intentionally does not depend on axum or any concrete
//! HTTP client — provider implementations live in
//! `multigate-provider-impl` and perform their own transport.

pub mod credential;
pub mod errors;
pub mod headers;
pub mod pool;
pub mod prefix;
pub mod provider;
pub mod registry;

pub use credential::Credential;
pub use errors::{AdapterError, ProviderError, ProviderResult};
pub use headers::{Headers, header_get, header_remove, header_set};
pub use pool::{LastError, PoolDocument, ProviderEntry, ProviderPool, DEFAULT_MAX_ERROR_COUNT};
pub use prefix::protocol_of;
pub use provider::{ByteStream, ModelInfo, Outcome, Provider};
pub use registry::ProviderRegistry;
