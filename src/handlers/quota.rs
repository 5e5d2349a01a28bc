use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use std::sync::Arc;

use crate::rate_limit::QuotaStatus;
use crate::state::AppState;

// Remaining quota for the caller, without spending any
pub async fn quota_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<QuotaStatus> {
    Json(state.gateway.quota_status(&headers))
}
