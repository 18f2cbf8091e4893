//! `GET|POST /language_detection` (spec §6.1).

use std::sync::Arc;

use hyper::{Body, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::http::request::{get_query_param, get_query_params, parse_json_body};
use crate::http::response::json_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct DetectBody {
    #[serde(default)]
    text: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DetectResponse {
    detected_langs: Vec<String>,
}

fn detect_all(state: &Arc<AppState>, texts: &[String]) -> Response<Body> {
    let detected = texts
        .iter()
        .map(|t| state.detect(t).to_string())
        .collect();
    json_response(StatusCode::OK, &DetectResponse { detected_langs: detected })
}

pub async fn post(state: &Arc<AppState>, req: Request<Body>) -> Response<Body> {
    let body: DetectBody = match parse_json_body(req.into_body()).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    detect_all(state, &body.text)
}

pub async fn get(state: &Arc<AppState>, req: Request<Body>) -> Response<Body> {
    let uri = req.uri().clone();
    let texts = get_query_params(&uri, "text");
    let texts = if texts.is_empty() {
        get_query_param(&uri, "text").into_iter().collect()
    } else {
        texts
    };
    detect_all(state, &texts)
}
