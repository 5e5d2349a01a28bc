use clap::Parser;
use std::time::Duration;

use crate::tier::{TierLimits, TierTable};

// CLI argument structure - every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "image-gateway")]
#[command(about = "Quota-gated proxy for an image generation provider")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "IMAGE_GATEWAY_PORT", default_value_t = 8080)]
    pub port: u16,

    // Image provider base url; requests go to {url}/image/{prompt}
    #[arg(long, env = "IMAGE_GATEWAY_UPSTREAM_URL", default_value = "https://gen.pollinations.ai")]
    pub upstream_url: String,

    // Sent upstream as a bearer token when set
    #[arg(long, env = "POLLINATIONS_API_KEY", hide_env_values = true)]
    pub upstream_api_key: Option<String>,

    // Upstream request timeout in seconds
    #[arg(long, env = "IMAGE_GATEWAY_UPSTREAM_TIMEOUT", default_value_t = 120)]
    pub upstream_timeout: u64,

    // Upstream connect timeout in seconds
    #[arg(long, env = "IMAGE_GATEWAY_UPSTREAM_CONNECT_TIMEOUT", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub upstream_connect_timeout: u64,

    // Known models (comma-separated), first is listed first
    #[arg(long, env = "IMAGE_GATEWAY_MODELS", default_value = "flux,turbo,gptimage,kontext,seedream")]
    pub models: String,

    // Quota window in seconds
    #[arg(long, env = "IMAGE_GATEWAY_RATE_WINDOW", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub rate_window: u64,

    // Image requests per window with / without an API key
    #[arg(long, env = "IMAGE_GATEWAY_IMAGE_LIMIT_AUTH", default_value_t = 30,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub image_limit_auth: u32,

    #[arg(long, env = "IMAGE_GATEWAY_IMAGE_LIMIT_ANON", default_value_t = 5,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub image_limit_anon: u32,

    // Other gated requests per window with / without an API key
    #[arg(long, env = "IMAGE_GATEWAY_GENERIC_LIMIT_AUTH", default_value_t = 60,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub generic_limit_auth: u32,

    #[arg(long, env = "IMAGE_GATEWAY_GENERIC_LIMIT_ANON", default_value_t = 20,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub generic_limit_anon: u32,

    // How often expired quota records are swept, in seconds
    #[arg(long, env = "IMAGE_GATEWAY_SWEEP_INTERVAL", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_interval: u64,

    // Windows a record may stay expired before the sweep drops it
    #[arg(long, env = "IMAGE_GATEWAY_SWEEP_GRACE", default_value_t = 1)]
    pub sweep_grace: u32,
}

impl Args {
    pub fn tiers(&self) -> TierTable {
        TierTable {
            image: TierLimits {
                authenticated: self.image_limit_auth,
                anonymous: self.image_limit_anon,
            },
            generic: TierLimits {
                authenticated: self.generic_limit_auth,
                anonymous: self.generic_limit_anon,
            },
        }
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}
