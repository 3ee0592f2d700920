//! §6 external interfaces: the axum routers that adapt HTTP into
//! `multigate_core::ProxyEngine` calls, plus a JSON-only admin surface
//! over the provider pool.

pub mod admin;
pub mod proxy;

pub use admin::admin_router;
pub use proxy::proxy_router;
