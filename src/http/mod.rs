//! Top-level HTTP dispatch (spec §6.1). A flat `match (&method, path)`
//! over the known routes, the same shape the rest of this codebase's
//! request handling has always used.

pub mod request;
pub mod response;
pub mod routes;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use hyper::{Body, Method, Request, Response, StatusCode};
use tracing::Instrument;
use uuid::Uuid;

use crate::state::AppState;
use response::json_error;

pub async fn handle_request(
    state: Arc<AppState>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!("request", request_id = %request_id, method = %req.method(), path = %req.uri().path());
    let start = Instant::now();

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = response::with_request_id(
        request_id,
        async {
            if method == Method::OPTIONS {
                response::cors_preflight()
            } else {
                dispatch(&state, method.clone(), &path, req).await
            }
        }
        .instrument(span),
    )
    .await;

    tracing::info!(
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "handled request"
    );

    Ok(response)
}

async fn dispatch(
    state: &Arc<AppState>,
    method: Method,
    path: &str,
    req: Request<Body>,
) -> Response<Body> {
    match (&method, path) {
        (&Method::POST, "/translate") => routes::translate::post(state, req, false).await,
        (&Method::GET, "/translate") => routes::translate::get(state, req, false).await,
        (&Method::POST, "/compat/translate") => routes::translate::post(state, req, true).await,
        (&Method::GET, "/compat/translate") => routes::translate::get(state, req, true).await,
        (&Method::GET, "/lang_pairs") => routes::languages::lang_pairs(state).await,
        (&Method::GET, "/get_languages") => routes::languages::get_languages(state, req).await,
        (&Method::POST, "/language_detection") => routes::detection::post(state, req).await,
        (&Method::GET, "/language_detection") => routes::detection::get(state, req).await,
        (&Method::GET, "/model_name") => routes::model::get(state).await,
        (&Method::GET, "/discover/all") => routes::discover::all(state).await,
        (&Method::GET, p) if p.starts_with("/discover/") => {
            routes::discover::one(state, &p["/discover/".len()..]).await
        }
        (&Method::POST, "/discover/clear-cache") => routes::discover::clear_cache(state).await,
        (&Method::GET, "/healthz") => routes::health::healthz().await,
        (&Method::GET, "/readyz") => routes::health::readyz(state).await,
        (&Method::GET, "/cache") => routes::health::cache(state).await,
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    }
}
