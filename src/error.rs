//! Error kinds for the translation service (spec §7).
//!
//! `NoiseInput` from the spec's error table is deliberately absent here —
//! it is resolved to a placeholder by the preprocessor and never surfaces
//! as an `Err` anywhere in the request lifecycle.

use thiserror::Error;

/// Errors that can terminate a translation request before a response is
/// assembled. Each variant maps to exactly one HTTP status at the edge
/// (see `http::response::status_for`).
#[derive(Debug, Error, Clone)]
pub enum ServeError {
    #[error("no candidate model family could serve {src}->{tgt}")]
    ModelLoadFailed { src: String, tgt: String },

    #[error("no model family supports {src}->{tgt}, directly or via pivot")]
    UnsupportedLanguagePair { src: String, tgt: String },

    #[error("queue is full, retry after {retry_after_sec}s")]
    QueueOverflow { retry_after_sec: u64 },

    #[error("service is busy and not accepting queued work")]
    ServiceBusy { retry_after_sec: u64 },

    #[error("translation timed out waiting for a slot or an inflight batch")]
    TranslationTimeout,

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ServeError {
    /// HTTP status code for this error, per spec §4.10 / §7.
    pub fn status(&self) -> hyper::StatusCode {
        use hyper::StatusCode;
        match self {
            ServeError::QueueOverflow { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServeError::ServiceBusy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ServeError::UnsupportedLanguagePair { .. } => StatusCode::BAD_REQUEST,
            ServeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServeError::TranslationTimeout => StatusCode::GATEWAY_TIMEOUT,
            ServeError::ModelLoadFailed { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// `Retry-After` seconds, when the error kind carries one.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ServeError::QueueOverflow { retry_after_sec } => Some(*retry_after_sec),
            ServeError::ServiceBusy { retry_after_sec } => Some(*retry_after_sec),
            _ => None,
        }
    }
}

/// Error raised by the inference runtime collaborator (spec §6.2) or the
/// pipeline cache while loading a model. Kept separate from `ServeError`
/// since callers (the orchestrator's candidate loop) need to distinguish
/// "this candidate failed, try the next" from a terminal request error.
#[derive(Debug, Error, Clone)]
pub enum ModelLoadError {
    #[error("model {model_id} is not available for this pair")]
    NotAvailable { model_id: String },

    #[error("failed to load {model_id}: {reason}")]
    LoadFailed { model_id: String, reason: String },

    #[error("inference failed for {model_id}: {reason}")]
    InferenceFailed { model_id: String, reason: String },
}
