use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "flux";

/// Image generation request, as accepted in a JSON body.
///
/// Query-string submissions are converted into this same shape (see
/// [`ImageQuery`]) so both entry styles share one admission path.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ImageRequest {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seed: Option<i64>,
    pub enhance: Option<bool>,
    pub nologo: Option<bool>,
    pub negative_prompt: Option<String>,
    pub quality: Option<String>,
}

// Raw query parameters - everything arrives as text
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageQuery {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub seed: Option<String>,
    pub enhance: Option<String>,
    pub nologo: Option<String>,
    pub negative_prompt: Option<String>,
    pub quality: Option<String>,
}

impl From<ImageQuery> for ImageRequest {
    // Unparsable numbers are dropped; flags are on only for "true"
    fn from(query: ImageQuery) -> Self {
        Self {
            prompt: query.prompt,
            model: query.model,
            width: query.width.and_then(|v| v.trim().parse().ok()),
            height: query.height.and_then(|v| v.trim().parse().ok()),
            seed: query.seed.and_then(|v| v.trim().parse().ok()),
            enhance: query.enhance.map(|v| v == "true"),
            nologo: query.nologo.map(|v| v == "true"),
            negative_prompt: query.negative_prompt,
            quality: query.quality,
        }
    }
}

// Known upstream models, in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    ids: Vec<String>,
}

impl ModelRegistry {
    // Parse "flux,turbo" - empty entries are skipped, duplicates kept once
    pub fn from_csv(models: &str) -> Self {
        let mut ids: Vec<String> = Vec::new();
        for id in models.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !ids.iter().any(|known| known == id) {
                ids.push(id.to_string());
            }
        }
        Self { ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_csv("flux,turbo,gptimage,kontext,seedream")
    }
}

#[derive(Debug, Serialize)]
pub struct ModelList<'a> {
    pub models: &'a [String],
    pub default: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_normalized() {
        let query = ImageQuery {
            prompt: Some("a cat".into()),
            width: Some("512".into()),
            height: Some("tall".into()),
            seed: Some("-3".into()),
            enhance: Some("true".into()),
            nologo: Some("yes".into()),
            ..Default::default()
        };

        let request = ImageRequest::from(query);
        assert_eq!(request.prompt.as_deref(), Some("a cat"));
        assert_eq!(request.width, Some(512));
        assert_eq!(request.height, None);
        assert_eq!(request.seed, Some(-3));
        assert_eq!(request.enhance, Some(true));
        assert_eq!(request.nologo, Some(false));
        assert_eq!(request.model, None);
    }

    #[test]
    fn json_body_with_only_a_prompt() {
        let request: ImageRequest = serde_json::from_str(r#"{"prompt":"a cat"}"#).unwrap();
        assert_eq!(request.prompt.as_deref(), Some("a cat"));
        assert_eq!(request.enhance, None);
    }

    #[test]
    fn registry_keeps_order_and_drops_duplicates() {
        let registry = ModelRegistry::from_csv(" flux, turbo,,flux ");
        assert_eq!(registry.ids(), &["flux".to_string(), "turbo".to_string()]);
        assert!(registry.contains("turbo"));
        assert!(!registry.contains("nonexistent-model"));
        assert!(ModelRegistry::default().contains(DEFAULT_MODEL));
    }
}
