//! HTTP response helpers shared by the route handlers (spec §4.10, §6.1).
//!
//! Every handler builds its response through these functions rather than
//! `hyper::Response` directly, so the request-id carried by the enclosing
//! `with_request_id` scope (set once in `http::handle_request`, spec
//! SPEC_FULL §1 "Request id propagation") lands on every response without
//! each route handler having to thread it through its signature.

use std::future::Future;

use hyper::{Body, Response, StatusCode};
use serde::Serialize;

use crate::error::ServeError;

const CORS_ORIGIN: &str = "*";
const CORS_METHODS: &str = "GET, POST, OPTIONS";
const CORS_HEADERS: &str = "content-type";

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Runs `fut` with `request_id` visible to every response built inside it.
pub async fn with_request_id<F: Future>(request_id: String, fut: F) -> F::Output {
    REQUEST_ID.scope(request_id, fut).await
}

fn with_cors(builder: hyper::http::response::Builder) -> hyper::http::response::Builder {
    let builder = builder
        .header("access-control-allow-origin", CORS_ORIGIN)
        .header("access-control-allow-methods", CORS_METHODS)
        .header("access-control-allow-headers", CORS_HEADERS);
    match REQUEST_ID.try_with(String::clone) {
        Ok(request_id) => builder.header("x-request-id", request_id),
        Err(_) => builder,
    }
}

pub fn serialize_with_fallback<T: Serialize>(value: &T, fallback: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| fallback.to_string())
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let json = serialize_with_fallback(body, r#"{"error":"serialization failed"}"#);
    with_cors(Response::builder().status(status))
        .header("content-type", "application/json")
        .body(Body::from(json))
        .unwrap()
}

pub fn json_error(status: StatusCode, message: &str) -> Response<Body> {
    let json = format!(r#"{{"error":"{}"}}"#, message.replace('"', "\\\""));
    with_cors(Response::builder().status(status))
        .header("content-type", "application/json")
        .body(Body::from(json))
        .unwrap()
}

pub fn empty_response(status: StatusCode) -> Response<Body> {
    with_cors(Response::builder().status(status))
        .body(Body::empty())
        .unwrap()
}

pub fn cors_preflight() -> Response<Body> {
    empty_response(StatusCode::OK)
}

/// Maps a `ServeError` to its HTTP response, attaching `Retry-After` and
/// `{retry_after_sec}` for the two overload kinds (spec §4.10, §6.1
/// "Overload signalling").
pub fn error_response(err: &ServeError) -> Response<Body> {
    let status = err.status();
    match err.retry_after() {
        Some(retry_after_sec) => {
            #[derive(Serialize)]
            struct RetryBody {
                retry_after_sec: u64,
                error: String,
            }
            let json = serialize_with_fallback(
                &RetryBody {
                    retry_after_sec,
                    error: err.to_string(),
                },
                r#"{"error":"overloaded"}"#,
            );
            with_cors(Response::builder().status(status))
                .header("content-type", "application/json")
                .header("retry-after", retry_after_sec.to_string())
                .body(Body::from(json))
                .unwrap()
        }
        None => json_error(status, &err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_error_escapes_quotes_in_the_body() {
        let response = json_error(StatusCode::BAD_REQUEST, r#"Error "quoted""#);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(bytes.as_ref(), br#"{"error":"Error \"quoted\""}"#);
    }

    #[tokio::test]
    async fn responses_built_inside_with_request_id_carry_the_header() {
        let response = with_request_id("abc-123".to_string(), async {
            json_response(StatusCode::OK, &serde_json::json!({"ok": true}))
        })
        .await;
        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
    }

    #[test]
    fn responses_built_outside_any_request_scope_omit_the_header() {
        let response = json_response(StatusCode::OK, &serde_json::json!({"ok": true}));
        assert!(response.headers().get("x-request-id").is_none());
    }

    #[test]
    fn error_response_sets_retry_after_header_for_queue_overflow() {
        let response = error_response(&ServeError::QueueOverflow { retry_after_sec: 5 });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "5");
    }

    #[test]
    fn error_response_has_no_retry_after_for_bad_request() {
        let response = error_response(&ServeError::BadRequest("nope".to_string()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("retry-after").is_none());
    }
}
