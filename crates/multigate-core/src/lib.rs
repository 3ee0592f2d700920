//! Request orchestration: endpoint classification, API-key auth, the
//! metrics core, and the proxy engine itself (§4.F, §4.G).

pub mod auth;
pub mod bootstrap;
pub mod classify;
pub mod metrics;
pub mod proxy_engine;

pub use auth::check_api_key;
pub use bootstrap::{Bootstrap, CliArgs, bootstrap, bootstrap_from_env};
pub use classify::{ProxyRoute, classify_request};
pub use metrics::MetricsCore;
pub use proxy_engine::{EngineResponse, ProxyEngine, ProxyRequest};
