//! `GET /healthz`, `GET /readyz`, `GET /cache` (spec §6.1; `/cache`
//! introspection is a supplemented addition, see SPEC_FULL §1).

use std::sync::Arc;

use chrono::Utc;
use hyper::{Body, Response, StatusCode};
use serde::Serialize;

use crate::http::response::json_response;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    checked_at: chrono::DateTime<Utc>,
}

/// Liveness: the process can answer HTTP at all.
pub async fn healthz() -> Response<Body> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "ok",
            checked_at: Utc::now(),
        },
    )
}

/// Readiness: the Device Resolver and the first Model Discovery refresh
/// have completed, and the cache isn't reporting a degraded state. Nothing
/// here blocks on model loading — that happens lazily per request (spec
/// §4.3; SPEC_FULL §1, "`/readyz` ... returns 503 until ready").
pub async fn readyz(state: &Arc<AppState>) -> Response<Body> {
    let ready = state.is_ready() && state.cache.len() <= state.cfg.max_cached_models;
    let status = if ready { "ready" } else { "degraded" };
    let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    json_response(
        code,
        &HealthResponse {
            status,
            checked_at: Utc::now(),
        },
    )
}

#[derive(Debug, Serialize)]
struct CacheEntryDto {
    key: String,
    idle_seconds: f64,
}

#[derive(Debug, Serialize)]
struct CacheResponse {
    capacity: usize,
    entries: Vec<CacheEntryDto>,
}

pub async fn cache(state: &Arc<AppState>) -> Response<Body> {
    let entries = state
        .cache
        .keys()
        .into_iter()
        .map(|(key, idle)| CacheEntryDto {
            key: key.to_string(),
            idle_seconds: idle.as_secs_f64(),
        })
        .collect();
    json_response(
        StatusCode::OK,
        &CacheResponse {
            capacity: state.cfg.max_cached_models,
            entries,
        },
    )
}
