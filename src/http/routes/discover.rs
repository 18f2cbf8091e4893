//! `GET /discover/{family}`, `GET /discover/all`, `POST /discover/clear-cache`
//! (spec §6.1, §4.8).

use std::sync::Arc;

use hyper::{Body, Response, StatusCode};
use serde::Serialize;

use crate::error::ServeError;
use crate::http::response::{error_response, json_response};
use crate::lang::Family;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct PairsResponse {
    family: String,
    pairs: Vec<(String, String)>,
}

pub async fn one(state: &Arc<AppState>, family: &str) -> Response<Body> {
    let Some(family) = Family::parse(family) else {
        return error_response(&ServeError::BadRequest(format!("unknown family {family:?}")));
    };
    let pairs = state.discovery.discover(family).await;
    let mut pairs: Vec<(String, String)> =
        pairs.iter().map(|p| (p.src.to_string(), p.tgt.to_string())).collect();
    pairs.sort();
    json_response(
        StatusCode::OK,
        &PairsResponse {
            family: family.as_str().to_string(),
            pairs,
        },
    )
}

pub async fn all(state: &Arc<AppState>) -> Response<Body> {
    let mut out = Vec::new();
    for (family, pairs) in state.discovery.discover_all().await {
        let mut pairs: Vec<(String, String)> =
            pairs.iter().map(|p| (p.src.to_string(), p.tgt.to_string())).collect();
        pairs.sort();
        out.push(PairsResponse {
            family: family.as_str().to_string(),
            pairs,
        });
    }
    json_response(StatusCode::OK, &out)
}

#[derive(Debug, Serialize)]
struct ClearCacheResponse {
    cleared: bool,
}

pub async fn clear_cache(state: &Arc<AppState>) -> Response<Body> {
    state.discovery.clear_cache().await;
    json_response(StatusCode::OK, &ClearCacheResponse { cleared: true })
}
