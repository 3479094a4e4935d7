//! Single-line request logging middleware
//!
//! Each request produces one `info` event:
//! `POST /api/fields/ 201 [12 ms] plant_specie="Maize", measure="2.5"`.
//! JSON bodies are summarised with truncated values and redacted secrets.
//! Only bodies with a declared length of at most 64 KiB are buffered;
//! chunked or larger uploads pass through unsummarised.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header::CONTENT_TYPE, Method},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::time::Instant;

/// Maximum length for parameter values before truncation
const MAX_PARAM_LENGTH: usize = 30;

const TRUNCATION_SUFFIX: &str = "...";

/// Bodies above this size are not buffered for the summary
const MAX_LOGGED_BODY: usize = 64 * 1024;

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let (request, params_summary) = if has_json_body(&request) {
        summarise_body(request).await
    } else {
        (request, String::new())
    };

    let response = next.run(request).await;
    let elapsed_ms = start_time.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if params_summary.is_empty() {
        tracing::info!(%method, %path, status, elapsed_ms, "{} {} {} [{} ms]", method, path, status, elapsed_ms);
    } else {
        tracing::info!(
            %method, %path, status, elapsed_ms,
            "{} {} {} [{} ms] {}", method, path, status, elapsed_ms, params_summary
        );
    }

    response
}

/// JSON body with a declared length small enough to buffer
fn has_json_body(request: &Request) -> bool {
    matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH)
        && request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"))
        && request
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .is_some_and(|len| len <= MAX_LOGGED_BODY)
}

/// Buffer the body, summarise it, and rebuild the request
async fn summarise_body(request: Request) -> (Request, String) {
    let (parts, body) = request.into_parts();
    let bytes: Bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::debug!("Request body could not be read for logging: {}", e);
            return (Request::from_parts(parts, Body::empty()), String::new());
        }
    };

    let summary = serde_json::from_slice::<Value>(&bytes)
        .map(|json| format_params_summary(&json))
        .unwrap_or_default();

    (Request::from_parts(parts, Body::from(bytes)), summary)
}

/// Format parameters into a summary string with truncation
fn format_params_summary(params: &Value) -> String {
    match params {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                if is_sensitive_parameter(key) {
                    format!("{key}=\"[REDACTED]\"")
                } else {
                    format!("{key}=\"{}\"", format_parameter_value(value))
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        _ => format_parameter_value(params),
    }
}

fn format_parameter_value(value: &Value) -> String {
    let value_str = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{...{} fields}}", obj.len()),
        Value::Null => "null".to_string(),
    };

    truncate_string(&value_str, MAX_PARAM_LENGTH)
}

/// Truncate on a character boundary
fn truncate_string(input: &str, max_length: usize) -> String {
    if input.chars().count() <= max_length {
        return input.to_string();
    }
    let keep = max_length.saturating_sub(TRUNCATION_SUFFIX.len());
    let truncated: String = input.chars().take(keep).collect();
    format!("{truncated}{TRUNCATION_SUFFIX}")
}

fn is_sensitive_parameter(key: &str) -> bool {
    const SENSITIVE_KEYS: [&str; 6] = ["password", "token", "secret", "key", "auth", "credential"];
    let key_lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|sensitive| key_lower.contains(sensitive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{self, header::CONTENT_LENGTH};
    use serde_json::json;

    fn json_post(content_length: Option<usize>) -> Request {
        let mut builder = http::Request::post("/api/login/").header(CONTENT_TYPE, "application/json");
        if let Some(len) = content_length {
            builder = builder.header(CONTENT_LENGTH, len);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_only_small_declared_bodies_are_buffered() {
        assert!(has_json_body(&json_post(Some(120))));
        assert!(has_json_body(&json_post(Some(MAX_LOGGED_BODY))));
        assert!(!has_json_body(&json_post(Some(MAX_LOGGED_BODY + 1))));
        // Chunked uploads carry no length
        assert!(!has_json_body(&json_post(None)));

        let get = http::Request::get("/api/fields/")
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, 2)
            .body(Body::empty())
            .unwrap();
        assert!(!has_json_body(&get));
    }

    #[tokio::test]
    async fn test_summarise_body_keeps_the_body() {
        let payload = r#"{"email":"amina@example.com","password":"pass#12"}"#;
        let request = http::Request::post("/api/login/")
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, payload.len())
            .body(Body::from(payload))
            .unwrap();

        let (request, summary) = summarise_body(request).await;
        assert!(summary.contains("password=\"[REDACTED]\""));

        let bytes = request.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], payload.as_bytes());
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("this is a very long string", 10), "this is...");
        assert_eq!(truncate_string("exactly10c", 10), "exactly10c");
        assert_eq!(truncate_string("Récolte précoce du maïs", 10), "Récolte...");
    }

    #[test]
    fn test_format_params_summary() {
        let params = json!({
            "plant_specie": "Maize",
            "project_description": "Rotation with cowpea on the northern parcel",
            "measure": 2.5,
            "on_sale": true
        });

        let summary = format_params_summary(&params);
        assert!(summary.contains("plant_specie=\"Maize\""));
        assert!(summary.contains("project_description=\"Rotation with cowpea on the...\""));
        assert!(summary.contains("measure=\"2.5\""));
        assert!(summary.contains("on_sale=\"true\""));
    }

    #[test]
    fn test_sensitive_parameter_redaction() {
        let params = json!({
            "email": "amina@example.com",
            "password": "pass#12",
            "api_key": "sensitive_key"
        });

        let summary = format_params_summary(&params);
        assert!(summary.contains("email=\"amina@example.com\""));
        assert!(summary.contains("password=\"[REDACTED]\""));
        assert!(summary.contains("api_key=\"[REDACTED]\""));
    }

    #[test]
    fn test_is_sensitive_parameter() {
        assert!(is_sensitive_parameter("password"));
        assert!(is_sensitive_parameter("AUTH_TOKEN"));
        assert!(!is_sensitive_parameter("username"));
        assert!(!is_sensitive_parameter("region"));
    }
}
