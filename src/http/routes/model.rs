//! `GET /model_name` — a runtime/config snapshot (spec §6.1).

use std::sync::Arc;

use hyper::{Body, Response, StatusCode};
use serde::Serialize;

use crate::http::response::json_response;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ModelNameResponse {
    device: String,
    device_index: i32,
    model_fallback_order: Vec<String>,
    max_cached_models: usize,
    cached_models: usize,
    pivot_lang: String,
}

pub async fn get(state: &Arc<AppState>) -> Response<Body> {
    let body = ModelNameResponse {
        device: match state.device.kind {
            crate::config::DeviceKind::Cpu => "cpu".to_string(),
            crate::config::DeviceKind::Gpu => "gpu".to_string(),
        },
        device_index: state.device.index,
        model_fallback_order: state
            .cfg
            .model_fallback_order
            .iter()
            .map(|f| f.as_str().to_string())
            .collect(),
        max_cached_models: state.cfg.max_cached_models,
        cached_models: state.cache.len(),
        pivot_lang: state.cfg.pivot_lang.clone(),
    };
    json_response(StatusCode::OK, &body)
}
