//! `GET /lang_pairs` and `GET /get_languages` (spec §6.1, §4.8).

use std::sync::Arc;

use hyper::{Body, Request, Response, StatusCode};
use serde::Serialize;

use crate::http::request::get_query_param;
use crate::http::response::json_response;
use crate::lang::Lang;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct LangPairsResponse {
    language_pairs: Vec<(String, String)>,
}

pub async fn lang_pairs(state: &Arc<AppState>) -> Response<Body> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (_, set) in state.discovery.discover_all().await {
        pairs.extend(set.iter().map(|p| (p.src.to_string(), p.tgt.to_string())));
    }
    pairs.sort();
    pairs.dedup();
    json_response(StatusCode::OK, &LangPairsResponse { language_pairs: pairs })
}

#[derive(Debug, Serialize)]
struct LanguagesResponse {
    languages: Vec<String>,
}

pub async fn get_languages(state: &Arc<AppState>, req: Request<Body>) -> Response<Body> {
    let uri = req.uri().clone();
    let source_filter = get_query_param(&uri, "source_lang").map(Lang::new);
    let target_filter = get_query_param(&uri, "target_lang").map(Lang::new);
    let langs = state
        .discovery
        .get_languages(source_filter.as_ref(), target_filter.as_ref())
        .await;
    json_response(
        StatusCode::OK,
        &LanguagesResponse {
            languages: langs.iter().map(|l| l.to_string()).collect(),
        },
    )
}
