use std::sync::Arc;

use anyhow::Context;
use axum::Router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let boot = multigate_core::bootstrap_from_env().await.context("bootstrap")?;
    let config = boot.config.clone();

    let engine = Arc::new(multigate_core::ProxyEngine::from_bootstrap(&boot));

    let app = Router::new()
        .merge(multigate_router::proxy_router(engine))
        .nest(
            "/admin",
            multigate_router::admin_router(
                boot.pool.clone(),
                boot.store.clone(),
                boot.metrics.clone(),
                config.required_api_key.clone(),
            ),
        );

    let bind = format!("{}:{}", config.host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind).await.context("bind listener")?;
    tracing::info!(event = "listening", addr = %bind);
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
