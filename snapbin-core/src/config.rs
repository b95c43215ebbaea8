//! # Gateway configuration
//!
//! A small typed configuration built either programmatically (tests, embedding)
//! or from environment variables at process start:
//!
//! ```rust
//! use snapbin_core::SnapConfig;
//!
//! let config = SnapConfig::new("secret")
//!     .with_custom_public_bucket_domain("cdn.example.com")
//!     .with_list_limit(50);
//!
//! assert_eq!(config.list_limit, 50);
//! assert!(!config.only_allow_public_bucket);
//! ```
//!
//! Environment keys:
//! - `AUTH_KEY` (required)
//! - `CACHE_CONTROL`
//! - `CUSTOM_PUBLIC_BUCKET_DOMAIN`
//! - `ONLY_ALLOW_ACCESS_TO_PUBLIC_BUCKET`
//! - `LIST_LIMIT`
//! - `HTTP_HOST` / `HTTP_PORT`
//! - `PUBLIC_SCHEME`
//! - `CACHE_ORIGIN`

use std::env;

use anyhow::{anyhow, Result};

/// Cache-control applied to uploads and to responses whose blob has none.
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=604800";

/// Page size of the listing passthrough.
pub const DEFAULT_LIST_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct SnapConfig {
    /// Shared secret compared against `x-auth-key` / `authkey`.
    pub auth_key: String,

    /// Cache-control stored on upload and used as the response default.
    pub cache_control: String,

    /// When set, upload responses point at `https://{domain}/{key}`.
    pub custom_public_bucket_domain: Option<String>,

    /// Forces every direct file retrieval to 404.
    pub only_allow_public_bucket: bool,

    pub list_limit: usize,

    pub http_host: String,
    pub http_port: u16,

    /// Scheme assumed when the request URI carries no authority.
    pub public_scheme: String,

    /// Origin used to build canonical response-cache identities.
    pub cache_origin: String,
}

impl SnapConfig {
    pub fn new(auth_key: impl Into<String>) -> Self {
        Self {
            auth_key: auth_key.into(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            custom_public_bucket_domain: None,
            only_allow_public_bucket: false,
            list_limit: DEFAULT_LIST_LIMIT,
            http_host: "127.0.0.1".to_string(),
            http_port: 3030,
            public_scheme: "https".to_string(),
            cache_origin: "https://r2host".to_string(),
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let auth_key = env::var("AUTH_KEY")
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        if auth_key.is_empty() {
            return Err(anyhow!("Missing AUTH_KEY"));
        }

        let mut config = Self::new(auth_key);

        if let Some(cache_control) = non_empty_var("CACHE_CONTROL") {
            config.cache_control = cache_control;
        }
        config.custom_public_bucket_domain = non_empty_var("CUSTOM_PUBLIC_BUCKET_DOMAIN");
        config.only_allow_public_bucket = non_empty_var("ONLY_ALLOW_ACCESS_TO_PUBLIC_BUCKET")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        config.list_limit = env_var_or("LIST_LIMIT", DEFAULT_LIST_LIMIT);
        config.http_host = env_var_or("HTTP_HOST", config.http_host);
        config.http_port = env_var_or("HTTP_PORT", config.http_port);
        config.public_scheme = env_var_or("PUBLIC_SCHEME", config.public_scheme);
        config.cache_origin = env_var_or("CACHE_ORIGIN", config.cache_origin);

        Ok(config)
    }

    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = cache_control.into();
        self
    }

    pub fn with_custom_public_bucket_domain(mut self, domain: impl Into<String>) -> Self {
        self.custom_public_bucket_domain = Some(domain.into());
        self
    }

    pub fn only_allow_public_bucket(mut self, enabled: bool) -> Self {
        self.only_allow_public_bucket = enabled;
        self
    }

    pub fn with_list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit;
        self
    }

    pub fn with_http_addr(mut self, host: impl Into<String>, port: u16) -> Self {
        self.http_host = host.into();
        self.http_port = port;
        self
    }

    pub fn with_public_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.public_scheme = scheme.into();
        self
    }

    pub fn with_cache_origin(mut self, origin: impl Into<String>) -> Self {
        self.cache_origin = origin.into().trim_end_matches('/').to_string();
        self
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    non_empty_var(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
