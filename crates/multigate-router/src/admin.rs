//! §4.E/§6 admin surface: JSON-only CRUD over the provider pool, plus
//! health and reset-health endpoints. No HTML, no per-user accounts —
//! there is exactly one operator, gated by the same `REQUIRED_API_KEY`
//! as client traffic.

use std::collections::HashSet;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde::Deserialize;
use uuid::Uuid;

use multigate_core::{MetricsCore, check_api_key};
use multigate_provider_core::{Credential, Headers, PoolDocument, ProviderEntry, ProviderPool};
use multigate_storage::PoolFileStore;

#[derive(Clone)]
pub struct AdminState {
    pub pool: Arc<ProviderPool>,
    pub store: Arc<PoolFileStore>,
    pub metrics: Arc<MetricsCore>,
    pub required_api_key: String,
}

pub fn admin_router(
    pool: Arc<ProviderPool>,
    store: Arc<PoolFileStore>,
    metrics: Arc<MetricsCore>,
    required_api_key: String,
) -> Router {
    let state = AdminState {
        pool,
        store,
        metrics,
        required_api_key,
    };
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_json))
        .route("/metrics/prometheus", get(metrics_prometheus))
        .route("/providers", get(list_providers))
        .route("/providers/{kind}", post(add_provider))
        .route("/providers/{kind}/{uuid}", put(update_provider).delete(delete_provider))
        .route("/providers/{kind}/{uuid}/enabled", put(set_enabled))
        .route("/providers/{kind}/reset_health", post(reset_health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn metrics_json(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let snapshot = state.metrics.current();
    Json(serde_json::json!({
        "rpm": snapshot.rpm,
        "tpm": snapshot.tpm,
        "tpsLastSecond": snapshot.tps_last_second,
        "ttpsInstant": snapshot.ttps_instant,
        "ttpsAvg60s": snapshot.ttps_avg_60s,
        "cumulativeRequests": snapshot.cumulative_requests,
        "cumulativeInputTokens": snapshot.cumulative_input_tokens,
        "cumulativeOutputTokens": snapshot.cumulative_output_tokens,
        "activeRequests": snapshot.active_requests,
        "errorCount": snapshot.error_count,
    }))
    .into_response()
}

async fn metrics_prometheus(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    state.metrics.scrape_prometheus().await.into_response()
}

fn authorize(state: &AdminState, headers: &HeaderMap) -> Result<(), Response> {
    let converted: Headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();
    check_api_key(&state.required_api_key, &converted, None).map_err(|err| {
        let status = StatusCode::from_u16(err.kind.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
        (status, err.message).into_response()
    })
}

async fn list_providers(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    Json(state.pool.document()).into_response()
}

#[derive(Deserialize)]
struct NewProviderInput {
    credentials: Credential,
    #[serde(default)]
    check_health_enabled: bool,
    #[serde(default)]
    check_model_name: Option<String>,
    #[serde(default)]
    not_supported_models: HashSet<String>,
}

async fn add_provider(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Json(input): Json<NewProviderInput>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let mut entry = ProviderEntry::new(&kind, input.credentials);
    entry.check_health_enabled = input.check_health_enabled;
    entry.check_model_name = input.check_model_name;
    entry.not_supported_models = input.not_supported_models;
    state.pool.add(entry.clone());
    persist(&state).await;
    (StatusCode::CREATED, Json(entry)).into_response()
}

async fn update_provider(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path((kind, uuid)): Path<(String, Uuid)>,
    Json(mut entry): Json<ProviderEntry>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    entry.uuid = uuid;
    entry.kind = kind.clone();
    if !state.pool.update(&kind, entry) {
        return StatusCode::NOT_FOUND.into_response();
    }
    persist(&state).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_provider(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path((kind, uuid)): Path<(String, Uuid)>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if !state.pool.delete(&kind, uuid) {
        return StatusCode::NOT_FOUND.into_response();
    }
    persist(&state).await;
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct SetEnabledInput {
    disabled: bool,
}

async fn set_enabled(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path((kind, uuid)): Path<(String, Uuid)>,
    Json(input): Json<SetEnabledInput>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    state.pool.set_disabled(&kind, uuid, input.disabled);
    persist(&state).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn reset_health(State(state): State<AdminState>, headers: HeaderMap, Path(kind): Path<String>) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    state.pool.reset_health(&kind);
    persist(&state).await;
    StatusCode::NO_CONTENT.into_response()
}

/// Admin writes are rare and interactive, so unlike the engine's
/// fire-and-forget refresh persistence, these await the write so a
/// `204` means the change actually made it to disk.
async fn persist(state: &AdminState) {
    let document: PoolDocument = state.pool.document();
    if let Err(err) = state.store.store(&document).await {
        tracing::warn!(event = "admin_persist_failed", error = %err);
    }
}
