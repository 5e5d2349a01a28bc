use reqwest::Url;
use std::sync::Arc;

use crate::config::Args;
use crate::error::ConfigError;
use crate::gateway::{Gateway, UpstreamTarget};
use crate::identity::BearerExtractor;
use crate::models::ModelRegistry;
use crate::rate_limit::QuotaStore;
use crate::upstream::HttpForwarder;

// app's shared state
pub struct AppState {
    pub gateway: Gateway,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&args.upstream_url).map_err(|e| ConfigError::UpstreamUrl {
            url: args.upstream_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::UpstreamUrl {
                url: args.upstream_url.clone(),
                reason: "not a base url".to_string(),
            });
        }

        let registry = ModelRegistry::from_csv(&args.models);
        if registry.is_empty() {
            return Err(ConfigError::NoModels);
        }

        let tiers = args.tiers();
        let store = Arc::new(QuotaStore::new(args.rate_window(), tiers.default_limit()));
        let forwarder = Arc::new(HttpForwarder::new(
            args.upstream_timeout(),
            args.upstream_connect_timeout(),
        )?);

        let gateway = Gateway::new(
            store,
            tiers,
            registry,
            Arc::new(BearerExtractor),
            forwarder,
            UpstreamTarget {
                base_url,
                api_key: args.upstream_api_key.clone().filter(|k| !k.is_empty()),
            },
        );

        Ok(Self::new(gateway))
    }
}
