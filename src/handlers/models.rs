use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use std::sync::Arc;

use crate::state::AppState;

pub async fn models_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    state.gateway.list_models(&headers)
}
