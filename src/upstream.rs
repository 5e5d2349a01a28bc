use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;

use crate::models::ImageRequest;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream base url cannot carry a path: {0}")]
    InvalidBase(Url),
}

// What came back from the provider, success or not
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    // Provider signals structured results (usually errors) as JSON
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"))
    }
}

/// The outbound call to the image provider.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, url: Url, bearer: Option<&str>) -> Result<UpstreamReply, ForwardError>;
}

pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("image-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, url: Url, bearer: Option<&str>) -> Result<UpstreamReply, ForwardError> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }
}

/// Builds `{base}/image/{prompt}?…`, translating the optional request
/// fields into the provider's query vocabulary. Absent fields, zero
/// dimensions and a zero seed are left out.
pub fn image_url(
    base: &Url,
    prompt: &str,
    model: &str,
    request: &ImageRequest,
) -> Result<Url, ForwardError> {
    let mut url = base.clone();

    url.path_segments_mut()
        .map_err(|_| ForwardError::InvalidBase(base.clone()))?
        .pop_if_empty()
        .push("image")
        .push(prompt);

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("model", model);
        if let Some(width) = request.width.filter(|v| *v != 0) {
            params.append_pair("width", &width.to_string());
        }
        if let Some(height) = request.height.filter(|v| *v != 0) {
            params.append_pair("height", &height.to_string());
        }
        if let Some(seed) = request.seed.filter(|v| *v != 0) {
            params.append_pair("seed", &seed.to_string());
        }
        if request.enhance == Some(true) {
            params.append_pair("enhance", "true");
        }
        if let Some(negative) = request.negative_prompt.as_deref().filter(|v| !v.is_empty()) {
            params.append_pair("negative_prompt", negative);
        }
        if let Some(quality) = request.quality.as_deref().filter(|v| !v.is_empty()) {
            params.append_pair("quality", quality);
        }
        if request.nologo == Some(true) {
            params.append_pair("nologo", "true");
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://gen.example.test").unwrap()
    }

    #[test]
    fn prompt_is_a_single_encoded_segment() {
        let url = image_url(&base(), "a cat/dog?", "flux", &ImageRequest::default()).unwrap();
        assert_eq!(url.path(), "/image/a%20cat%2Fdog%3F");
        assert_eq!(url.query(), Some("model=flux"));
    }

    #[test]
    fn optional_fields_become_query_parameters() {
        let request = ImageRequest {
            width: Some(1024),
            height: Some(768),
            seed: Some(42),
            enhance: Some(true),
            nologo: Some(true),
            negative_prompt: Some("blurry text".into()),
            quality: Some("high".into()),
            ..Default::default()
        };

        let url = image_url(&base(), "a cat", "turbo", &request).unwrap();
        assert_eq!(
            url.query(),
            Some(
                "model=turbo&width=1024&height=768&seed=42&enhance=true\
                 &negative_prompt=blurry+text&quality=high&nologo=true"
            )
        );
    }

    #[test]
    fn false_flags_are_left_out() {
        let request = ImageRequest {
            enhance: Some(false),
            nologo: Some(false),
            ..Default::default()
        };

        let url = image_url(&base(), "x", "flux", &request).unwrap();
        assert_eq!(url.query(), Some("model=flux"));
    }

    #[test]
    fn zero_dimensions_and_seed_are_left_out() {
        let request = ImageRequest {
            width: Some(0),
            height: Some(0),
            seed: Some(0),
            ..Default::default()
        };

        let url = image_url(&base(), "x", "flux", &request).unwrap();
        assert_eq!(url.query(), Some("model=flux"));
    }

    #[test]
    fn base_path_is_kept() {
        let base = Url::parse("https://proxy.example.test/pollinations/").unwrap();
        let url = image_url(&base, "x", "flux", &ImageRequest::default()).unwrap();
        assert_eq!(url.path(), "/pollinations/image/x");
    }

    #[test]
    fn json_detection_uses_content_type() {
        let reply = UpstreamReply {
            status: 200,
            content_type: Some("application/json; charset=utf-8".into()),
            body: Bytes::new(),
        };
        assert!(reply.is_json());
        assert!(reply.is_success());

        let image = UpstreamReply {
            content_type: None,
            ..reply
        };
        assert!(!image.is_json());
    }
}
