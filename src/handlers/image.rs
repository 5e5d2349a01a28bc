use axum::body::Bytes;
use axum::extract::{Query, State, rejection::QueryRejection};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::error::Category;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::models::{ImageQuery, ImageRequest};
use crate::state::AppState;

// Both entry styles normalize to `ImageRequest` and share `Gateway::handle`

pub async fn image_post_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.gateway.handle(&headers, decode_body(&body)).await
}

pub async fn image_get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<ImageQuery>, QueryRejection>,
) -> Response {
    let request = query
        .map(|Query(query)| ImageRequest::from(query))
        .map_err(|e| GatewayError::Validation(format!("invalid query parameter: {}", e.body_text())));

    state.gateway.handle(&headers, request).await
}

// Preflight stub
pub async fn image_options_handler() -> StatusCode {
    StatusCode::OK
}

// Well-formed JSON with a bad field is the caller's mistake; anything that
// is not JSON at all is an internal failure
fn decode_body(body: &[u8]) -> Result<ImageRequest, GatewayError> {
    serde_json::from_slice(body).map_err(|e| match e.classify() {
        Category::Data => GatewayError::Validation(format!("invalid request field: {}", e)),
        Category::Syntax | Category::Eof | Category::Io => {
            GatewayError::Internal(format!("malformed request body: {}", e))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_field_type_is_a_validation_error() {
        let err = decode_body(br#"{"prompt":"a cat","width":"512"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));

        let err = decode_body(br#"{"prompt":"a cat","width":-1}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn broken_json_is_internal() {
        assert!(matches!(decode_body(b"{not json"), Err(GatewayError::Internal(_))));
        assert!(matches!(decode_body(br#"{"prompt":"a"#), Err(GatewayError::Internal(_))));
        assert!(matches!(decode_body(b""), Err(GatewayError::Internal(_))));
    }
}
