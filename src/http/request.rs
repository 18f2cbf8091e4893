//! Request parsing utilities shared by the route handlers (spec §6.1).

use hyper::{Body, Response, StatusCode, Uri};
use serde::de::DeserializeOwned;

use super::response::json_error;

/// Parses a JSON request body into `T`, returning a ready-to-send 400
/// response on malformed bodies so handlers don't each re-derive one.
pub async fn parse_json_body<T: DeserializeOwned>(body: Body) -> Result<T, Response<Body>> {
    let body_bytes = match hyper::body::to_bytes(body).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read request body");
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "failed to read request body",
            ));
        }
    };

    serde_json::from_slice::<T>(&body_bytes).map_err(|err| {
        tracing::warn!(error = %err, "invalid JSON request body");
        json_error(StatusCode::BAD_REQUEST, "invalid JSON format")
    })
}

/// Yields every `key=value` pair in the query string with `key` URL-decoded
/// and matching `want`, in order. The single shared scan both
/// `get_query_param` and `get_query_params` build on.
fn query_values<'a>(uri: &'a Uri, want: &'a str) -> impl Iterator<Item = String> + 'a {
    uri.query()
        .into_iter()
        .flat_map(|query| query.split('&'))
        .filter_map(|param| param.split_once('='))
        .filter(move |(key, _)| *key == want)
        .filter_map(|(_, value)| urlencoding::decode(value).ok().map(|s| s.into_owned()))
}

/// Extracts a single URL-decoded query parameter's value.
pub fn get_query_param(uri: &Uri, key: &str) -> Option<String> {
    query_values(uri, key).next()
}

/// Extracts every occurrence of a repeated query parameter, in order
/// (spec §6.1, `GET /translate` — repeated `text=…`).
pub fn get_query_params(uri: &Uri, key: &str) -> Vec<String> {
    query_values(uri, key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Uri;

    #[test]
    fn get_query_param_basic() {
        let uri: Uri = "/api/test?foo=bar".parse().unwrap();
        assert_eq!(get_query_param(&uri, "foo"), Some("bar".to_string()));
    }

    #[test]
    fn get_query_param_url_encoded() {
        let uri: Uri = "/api/test?path=%2Fhome%2Fuser".parse().unwrap();
        assert_eq!(get_query_param(&uri, "path"), Some("/home/user".to_string()));
    }

    #[test]
    fn get_query_param_not_found() {
        let uri: Uri = "/api/test?foo=bar".parse().unwrap();
        assert_eq!(get_query_param(&uri, "missing"), None);
    }

    #[test]
    fn get_query_params_collects_repeated_keys_in_order() {
        let uri: Uri = "/translate?text=Hello&target_lang=de&text=World".parse().unwrap();
        assert_eq!(
            get_query_params(&uri, "text"),
            vec!["Hello".to_string(), "World".to_string()]
        );
    }

    #[test]
    fn get_query_params_empty_when_absent() {
        let uri: Uri = "/translate?target_lang=de".parse().unwrap();
        assert!(get_query_params(&uri, "text").is_empty());
    }
}
