//! Request admission and forwarding.
//!
//! Every gated endpoint goes through [`Gateway::admit`], which resolves the
//! caller, picks the tier limit for the endpoint class and counts the request
//! in the [`QuotaStore`]. Rejections are decided here, before any upstream
//! call is made.

use axum::Json;
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET};
use crate::identity::{CallerIdentity, CredentialExtractor};
use crate::metrics::{ADMITTED, RATE_LIMITED, REQUEST_TOTAL, UPSTREAM_ERRORS, UPSTREAM_LATENCY};
use crate::models::{DEFAULT_MODEL, ImageRequest, ModelList, ModelRegistry};
use crate::rate_limit::{QuotaStatus, QuotaStore};
use crate::tier::{EndpointClass, TierTable};
use crate::upstream::{Forwarder, image_url};

const DEFAULT_IMAGE_TYPE: &str = "image/png";

// Where admitted image requests are sent
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    pub base_url: Url,
    pub api_key: Option<String>,
}

pub struct Gateway {
    store: Arc<QuotaStore>,
    tiers: TierTable,
    registry: ModelRegistry,
    credentials: Arc<dyn CredentialExtractor>,
    forwarder: Arc<dyn Forwarder>,
    upstream: UpstreamTarget,
}

impl Gateway {
    pub fn new(
        store: Arc<QuotaStore>,
        tiers: TierTable,
        registry: ModelRegistry,
        credentials: Arc<dyn CredentialExtractor>,
        forwarder: Arc<dyn Forwarder>,
        upstream: UpstreamTarget,
    ) -> Self {
        Self {
            store,
            tiers,
            registry,
            credentials,
            forwarder,
            upstream,
        }
    }

    pub fn store(&self) -> &Arc<QuotaStore> {
        &self.store
    }

    /// Counts the request against the caller's quota for `class`.
    pub fn admit(&self, headers: &HeaderMap, class: EndpointClass) -> Result<CallerIdentity, GatewayError> {
        REQUEST_TOTAL.inc();

        let caller = CallerIdentity::resolve(headers, self.credentials.as_ref());
        let limit = self.tiers.limit_for(class, caller.authenticated);

        if self.store.admit(&caller.key, limit) {
            ADMITTED.inc();
            debug!(caller = %caller.key, ?class, limit, "Request admitted");
            return Ok(caller);
        }

        RATE_LIMITED.inc();
        let status = self.store.status_of(&caller.key);
        let wait_ms = (status.reset_at - self.store.now_millis()).max(0);
        warn!(
            caller = %caller.key,
            ?class,
            limit,
            reset_at = status.reset_at,
            "Rate limit exceeded"
        );

        Err(GatewayError::RateLimitExceeded {
            reset_at: status.reset_at,
            retry_after_secs: ((wait_ms + 999) / 1000).max(1),
        })
    }

    /// Single entry point for image generation, whichever way the request
    /// arrived. `request` is what the entry point decoded; a decode failure
    /// is reported only once the request has been admitted. Never fails:
    /// errors come back as responses.
    pub async fn handle(
        &self,
        headers: &HeaderMap,
        request: Result<ImageRequest, GatewayError>,
    ) -> Response {
        match self.generate(headers, request).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }

    async fn generate(
        &self,
        headers: &HeaderMap,
        request: Result<ImageRequest, GatewayError>,
    ) -> Result<Response, GatewayError> {
        let caller = self.admit(headers, EndpointClass::Image)?;
        let request = request?;

        let prompt = request
            .prompt
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GatewayError::Validation("prompt is required".to_string()))?;

        let model = request
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL);

        if !self.registry.contains(model) {
            return Err(GatewayError::Validation(format!(
                "Unknown model: {}. Available models: {}",
                model,
                self.registry.ids().join(", ")
            )));
        }

        let url = image_url(&self.upstream.base_url, prompt, model, &request)?;

        let start_time = Instant::now();
        let reply = self
            .forwarder
            .forward(url, self.upstream.api_key.as_deref())
            .await?;
        UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

        if !reply.is_success() {
            UPSTREAM_ERRORS.inc();
            warn!(status = reply.status, model, "Upstream rejected image request");
            return Err(GatewayError::Upstream {
                status: reply.status,
                body: String::from_utf8_lossy(&reply.body).into_owned(),
            });
        }

        if reply.is_json() {
            let data: serde_json::Value = serde_json::from_slice(&reply.body)
                .map_err(|e| GatewayError::Internal(format!("unreadable upstream json: {}", e)))?;
            return Ok(Json(data).into_response());
        }

        let status = self.store.status_of(&caller.key);
        let content_type = reply
            .content_type
            .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());

        info!(
            model,
            bytes = reply.body.len(),
            remaining = status.remaining,
            "Image forwarded"
        );

        Ok(([(CONTENT_TYPE, content_type)], status_headers(&status), reply.body).into_response())
    }

    // Registry listing - a generic-class endpoint
    pub fn list_models(&self, headers: &HeaderMap) -> Response {
        let caller = match self.admit(headers, EndpointClass::Generic) {
            Ok(caller) => caller,
            Err(err) => return err.into_response(),
        };

        let status = self.store.status_of(&caller.key);
        (
            status_headers(&status),
            Json(ModelList {
                models: self.registry.ids(),
                default: DEFAULT_MODEL,
            }),
        )
            .into_response()
    }

    // Read-only: does not count against the quota
    pub fn quota_status(&self, headers: &HeaderMap) -> QuotaStatus {
        let caller = CallerIdentity::resolve(headers, self.credentials.as_ref());
        self.store.status_of(&caller.key)
    }
}

fn status_headers(status: &QuotaStatus) -> [(&'static str, String); 2] {
    [
        (RATE_LIMIT_REMAINING, status.remaining.to_string()),
        (RATE_LIMIT_RESET, status.reset_at.to_string()),
    ]
}
