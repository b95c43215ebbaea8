use std::time::Duration;

/// Default `cache-control` for responses whose blob carries none
pub const DEFAULT_RESPONSE_CACHE_CONTROL: &str = "public, max-age=604800";

/// Default origin for canonical response-cache identities
pub const DEFAULT_CACHE_ORIGIN: &str = "https://r2host";

/// How long a cache fill waits for the client to finish reading the body.
pub const DEFAULT_CACHE_FILL_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the fetch engine
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Used when the blob has no stored `cache-control`
    pub default_cache_control: String,

    /// Cache identities are `{cache_origin}/{key}`
    pub cache_origin: String,

    /// When false the engine neither consults nor populates the cache
    pub cache_enabled: bool,

    /// A fill still waiting on its body after this long is dropped
    pub cache_fill_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_cache_control: DEFAULT_RESPONSE_CACHE_CONTROL.to_string(),
            cache_origin: DEFAULT_CACHE_ORIGIN.to_string(),
            cache_enabled: true,
            cache_fill_timeout: DEFAULT_CACHE_FILL_TIMEOUT,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_cache_control<S: Into<String>>(mut self, value: S) -> Self {
        self.default_cache_control = value.into();
        self
    }

    pub fn with_cache_origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.cache_origin = origin.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_cache_fill_timeout(mut self, timeout: Duration) -> Self {
        self.cache_fill_timeout = timeout;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }
}
