use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::mock_service::MockService;
use crate::domain::{HttpMethod, MockError, MockRequest, MockResponse};

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = match self.body {
            Some(body) if status != StatusCode::NO_CONTENT => (status, Json(body)).into_response(),
            _ => (status, Body::empty()).into_response(),
        };

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid response header"),
            }
        }
        response
    }
}

/// Catch-all handler: every request outside the built-in endpoints goes
/// through the mock route table.
pub async fn dispatch(
    State(service): State<Arc<MockService>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let Some(method) = HttpMethod::parse(method.as_str()) else {
        let error = MockError::RouteNotFound {
            method: method.to_string(),
            path: uri.path().to_string(),
        };
        return MockResponse::from_error(&error).into_response();
    };

    let body = match parse_body(&headers, &body) {
        Ok(body) => body,
        Err(error) => return MockResponse::from_error(&error).into_response(),
    };

    let request = MockRequest {
        method,
        path: uri.path().to_string(),
        params: HashMap::new(),
        query,
        body,
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
    };

    service.handle(request).await.into_response()
}

/// Empty bodies are absent; anything else must be JSON regardless of the
/// declared content type.
fn parse_body(headers: &HeaderMap, body: &Bytes) -> Result<Option<Value>, MockError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body).map(Some).map_err(|e| {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unspecified");
        MockError::Validation(format!(
            "request body is not valid JSON (content-type {}): {}",
            content_type, e
        ))
    })
}

/// GET /_mock/state - Stored records per resource and cache statistics
pub async fn get_state(State(service): State<Arc<MockService>>) -> impl IntoResponse {
    let resources = service.store().snapshot().await;
    let cache = service.generator().cache().map(|cache| cache.stats());
    (
        StatusCode::OK,
        Json(json!({
            "resources": resources,
            "cache": cache,
            "scenario": service.scenario().scenario.as_str(),
        })),
    )
}

/// DELETE /_mock/state - Reset all stored records
pub async fn reset_state(State(service): State<Arc<MockService>>) -> impl IntoResponse {
    service.reset().await;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(parse_body(&headers, &Bytes::from_static(b"")).unwrap(), None);
        assert_eq!(parse_body(&headers, &Bytes::from_static(b" \n")).unwrap(), None);
    }

    #[test]
    fn test_invalid_body_is_validation_error() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let err = parse_body(&headers, &Bytes::from_static(b"{oops")).unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("application/json"));
    }

    #[test]
    fn test_no_content_drops_body() {
        let response = MockResponse::new(204, Some(json!({"ignored": true})))
            .with_header("X-Deleted", "1")
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["x-deleted"], "1");
    }
}
