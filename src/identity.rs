use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use sha2::{Digest, Sha256};

// Quota bucket for callers with neither a key nor an address hint
pub const ANONYMOUS: &str = "anonymous";

const API_KEY_PREFIX: &str = "cgpt_";

/// Pulls a verified credential out of request headers.
pub trait CredentialExtractor: Send + Sync {
    fn extract(&self, headers: &HeaderMap) -> Option<String>;
}

// `Authorization: Bearer cgpt_<32 hex>`; anything else counts as no credential
pub struct BearerExtractor;

impl CredentialExtractor for BearerExtractor {
    fn extract(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .trim();

        if is_valid_api_key_format(token) {
            Some(token.to_string())
        } else {
            tracing::debug!("Ignoring bearer token with unknown format");
            None
        }
    }
}

pub fn is_valid_api_key_format(key: &str) -> bool {
    key.strip_prefix(API_KEY_PREFIX).is_some_and(|rest| {
        rest.len() == 32 && rest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub key: String,
    pub authenticated: bool,
}

impl CallerIdentity {
    pub fn resolve(headers: &HeaderMap, credentials: &dyn CredentialExtractor) -> Self {
        if let Some(api_key) = credentials.extract(headers) {
            return Self {
                key: credential_key(&api_key),
                authenticated: true,
            };
        }

        let key = match address_hint(headers) {
            Some(addr) => format!("ip:{}", addr),
            None => ANONYMOUS.to_string(),
        };

        Self {
            key,
            authenticated: false,
        }
    }
}

// Keys are stored hashed so raw credentials never sit in the quota map
fn credential_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key);
    format!("key:{:x}", hasher.finalize())
}

// First X-Forwarded-For hop, then X-Real-IP
fn address_hint(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded.or_else(real_ip).map(str::to_string)
}
