//! `POST|GET /translate` and the strict-EasyNMT-compat mirror at
//! `/compat/translate` (spec §6.1).

use hyper::{Body, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServeError;
use crate::http::request::{get_query_param, get_query_params, parse_json_body};
use crate::http::response::{error_response, json_response};
use crate::lang::{Family, Lang};
use crate::orchestrator::{Metadata, TranslationJob, TranslationResult};
use crate::state::AppState;

/// Accepts either a single string or a list (spec §9, "Dynamic-typed
/// request body"); normalized to a list before building the job.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextField {
    Single(String),
    Many(Vec<String>),
}

impl TextField {
    fn into_vec(self) -> Vec<String> {
        match self {
            TextField::Single(s) => vec![s],
            TextField::Many(v) => v,
        }
    }
}

fn default_beam_size() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TranslateBody {
    text: TextField,
    target_lang: String,
    source_lang: Option<String>,
    #[serde(default = "default_beam_size")]
    beam_size: u32,
    #[serde(default = "default_true")]
    perform_sentence_splitting: bool,
    model_family: Option<String>,
}

#[derive(Debug, Serialize)]
struct MetadataDto {
    model_name: String,
    family: String,
    languages_used: Vec<String>,
    chunks_processed: usize,
    chunk_size: usize,
    auto_chunked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pivot_path: Option<String>,
}

impl From<Metadata> for MetadataDto {
    fn from(m: Metadata) -> Self {
        MetadataDto {
            model_name: m.model_name,
            family: m.family,
            languages_used: m.languages_used,
            chunks_processed: m.chunks_processed,
            chunk_size: m.chunk_size,
            auto_chunked: m.auto_chunked,
            pivot_path: m.pivot_path,
        }
    }
}

#[derive(Debug, Serialize)]
struct FullResponse {
    target_lang: String,
    source_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detected_langs: Option<Vec<String>>,
    translated: Vec<String>,
    translation_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pivot_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<MetadataDto>,
}

/// Strict-EasyNMT-compat shape: no `metadata`, no top-level `pivot_path`
/// (spec §6.1).
#[derive(Debug, Serialize)]
struct CompatResponse {
    target_lang: String,
    source_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detected_langs: Option<Vec<String>>,
    translated: Vec<String>,
    translation_time: f64,
}

fn parse_family(raw: &Option<String>) -> Result<Option<Family>, Response<Body>> {
    match raw {
        None => Ok(None),
        Some(s) => Family::parse(s)
            .map(Some)
            .ok_or_else(|| error_response(&ServeError::BadRequest(format!("unknown model_family {s:?}")))),
    }
}

fn build_job(
    texts: Vec<String>,
    target_lang: String,
    source_lang: Option<String>,
    beam_size: u32,
    perform_sentence_splitting: bool,
    preferred_family: Option<Family>,
    include_metadata: bool,
) -> TranslationJob {
    TranslationJob {
        texts,
        src: source_lang.map(Lang::new),
        tgt: Lang::new(target_lang),
        beam_size,
        perform_sentence_splitting,
        preferred_family,
        include_metadata,
    }
}

fn render_full(job: &TranslationJob, result: TranslationResult) -> Response<Body> {
    let body = FullResponse {
        target_lang: job.tgt.to_string(),
        source_lang: job.src.as_ref().map(|l| l.to_string()),
        detected_langs: result
            .detected_langs
            .map(|langs| langs.iter().map(|l| l.to_string()).collect()),
        translated: result.translated,
        translation_time: result.translation_time,
        pivot_path: result.pivot_path,
        metadata: result.metadata.map(MetadataDto::from),
    };
    json_response(StatusCode::OK, &body)
}

fn render_compat(job: &TranslationJob, result: TranslationResult) -> Response<Body> {
    let body = CompatResponse {
        target_lang: job.tgt.to_string(),
        source_lang: job.src.as_ref().map(|l| l.to_string()),
        detected_langs: result
            .detected_langs
            .map(|langs| langs.iter().map(|l| l.to_string()).collect()),
        translated: result.translated,
        translation_time: result.translation_time,
    };
    json_response(StatusCode::OK, &body)
}

pub async fn post(state: &Arc<AppState>, req: Request<Body>, compat: bool) -> Response<Body> {
    let body: TranslateBody = match parse_json_body(req.into_body()).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let preferred_family = match parse_family(&body.model_family) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let job = build_job(
        body.text.into_vec(),
        body.target_lang,
        body.source_lang,
        body.beam_size,
        body.perform_sentence_splitting,
        preferred_family,
        !compat,
    );
    match state.orchestrator.translate(job.clone()).await {
        Ok(result) if compat => render_compat(&job, result),
        Ok(result) => render_full(&job, result),
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Serialize)]
struct GetTranslationsResponse {
    translations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pivot_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompatGetResponse {
    translations: Vec<String>,
}

pub async fn get(state: &Arc<AppState>, req: Request<Body>, compat: bool) -> Response<Body> {
    let uri = req.uri().clone();
    let texts = get_query_params(&uri, "text");
    let Some(target_lang) = get_query_param(&uri, "target_lang") else {
        return error_response(&ServeError::BadRequest("target_lang is required".to_string()));
    };
    let source_lang = get_query_param(&uri, "source_lang");
    let beam_size = get_query_param(&uri, "beam_size")
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(default_beam_size);
    let perform_sentence_splitting = get_query_param(&uri, "perform_sentence_splitting")
        .and_then(|v| v.parse().ok())
        .unwrap_or(true);

    let job = build_job(
        texts,
        target_lang,
        source_lang,
        beam_size,
        perform_sentence_splitting,
        None,
        false,
    );
    match state.orchestrator.translate(job).await {
        Ok(result) if compat => json_response(
            StatusCode::OK,
            &CompatGetResponse {
                translations: result.translated,
            },
        ),
        Ok(result) => json_response(
            StatusCode::OK,
            &GetTranslationsResponse {
                translations: result.translated,
                pivot_path: result.pivot_path,
            },
        ),
        Err(err) => error_response(&err),
    }
}
