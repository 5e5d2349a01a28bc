mod health;
mod image;
mod metrics;
mod models;
mod quota;

pub use health::health_handler;
pub use image::{image_get_handler, image_options_handler, image_post_handler};
pub use metrics::metrics_handler;
pub use models::models_handler;
pub use quota::quota_handler;
