//! Client configuration.
//!
//! A `ClientConfig` is fixed once a `PackClient` is built. Several clients
//! with different keys can live in the same process.

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.atlauncher.com";
pub const DEFAULT_API_VERSION: &str = "v1";

pub const ENV_API_KEY: &str = "PACK_API_KEY";
pub const ENV_FORCE_RUN: &str = "PACK_API_FORCE_RUN";
pub const ENV_BASE_URL: &str = "PACK_API_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent as the `API-KEY` header on every request when present.
    pub api_key: Option<String>,
    /// Keep going after the service reports 429 instead of failing fatally.
    pub force_run: bool,
    pub base_url: String,
    pub api_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            force_run: false,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `PACK_API_KEY`, `PACK_API_FORCE_RUN` and `PACK_API_BASE_URL`,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config.api_key = lookup(ENV_API_KEY).filter(|key| !key.is_empty());
        config.force_run = lookup(ENV_FORCE_RUN)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if let Some(url) = lookup(ENV_BASE_URL).filter(|url| !url.is_empty()) {
            config.base_url = url;
        }
        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_force_run(mut self, force_run: bool) -> Self {
        self.force_run = force_run;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}
