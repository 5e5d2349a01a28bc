use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod tier;
pub mod upstream;

use crate::error::GatewayError;
use crate::handlers::{
    health_handler, image_get_handler, image_options_handler, image_post_handler, metrics_handler,
    models_handler, quota_handler,
};
use crate::state::AppState;

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/image",
            get(image_get_handler)
                .post(image_post_handler)
                .options(image_options_handler),
        )
        .route("/api/models", get(models_handler))
        .route("/api/rate-limit", get(quota_handler))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// A panicking handler still answers with the generic error body
fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    GatewayError::Internal("request handler panicked".to_string()).into_response()
}
