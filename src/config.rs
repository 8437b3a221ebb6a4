use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::state::DEFAULT_LOCALE;
use crate::ClientError;

pub const ENV_BASE_URL: &str = "RESEARCH_API_BASE_URL";
pub const ENV_LOCALE: &str = "RESEARCH_LOCALE";
pub const ENV_POLL_INTERVAL_MS: &str = "RESEARCH_POLL_INTERVAL_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "RESEARCH_REQUEST_TIMEOUT_MS";
pub const ENV_STREAM_MODE: &str = "RESEARCH_STREAM_MODE";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_STREAM_MODE: &str = "messages";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub locale: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub stream_mode: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            stream_mode: DEFAULT_STREAM_MODE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Process environment, after loading a `.env` file if one is found.
    pub fn from_env() -> Result<Self, ClientError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings from a dotenv-style file without touching the process
    /// environment.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| ClientError::Config(format!("failed to read {}: {e}", path.display())))?;

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item
                .map_err(|e| ClientError::Config(format!("invalid line in {}: {e}", path.display())))?;
            values.insert(key, value);
        }
        Self::from_lookup(|key| values.get(key).cloned())
    }

    /// Build from any key lookup. Blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(base_url) = get(ENV_BASE_URL) {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(locale) = get(ENV_LOCALE) {
            config.locale = locale;
        }
        if let Some(raw) = get(ENV_POLL_INTERVAL_MS) {
            config.poll_interval = parse_millis(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = get(ENV_REQUEST_TIMEOUT_MS) {
            config.request_timeout = parse_millis(ENV_REQUEST_TIMEOUT_MS, &raw)?;
        }
        if let Some(mode) = get(ENV_STREAM_MODE) {
            config.stream_mode = mode;
        }

        Ok(config)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, ClientError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ClientError::Config(format!("{key} must be greater than 0"))),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(e) => Err(ClientError::Config(format!("{key} is not a number ({raw}): {e}"))),
    }
}
