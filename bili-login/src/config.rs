//! Service configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use bilibili_api::ClientConfig;

pub use crate::credentials::DEFAULT_COOKIE_FILE;

/// Login service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Where the credential set is written after a successful login
    pub cookie_file: PathBuf,
    /// How often expired login sessions are purged
    pub sweep_interval: Duration,
    /// Outbound client settings
    pub client: ClientConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: false,
            cookie_file: PathBuf::from(DEFAULT_COOKIE_FILE),
            sweep_interval: Duration::from_secs(30),
            client: ClientConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `BILI_BIND_ADDRESS` (e.g. "0.0.0.0")
    /// - `BILI_PORT` (e.g. "8080")
    /// - `BILI_ENABLE_CORS` ("true"/"false")
    /// - `BILI_COOKIE_FILE` (path of the credential JSON file)
    /// - `BILI_SWEEP_INTERVAL_SECS`
    /// - `BILI_HTTP_TIMEOUT_SECS`
    /// - `BILI_PASSPORT_BASE` / `BILI_API_BASE` (point at a stub server)
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bind_address) = get("BILI_BIND_ADDRESS") {
            config.bind_address = bind_address;
        }

        if let Some(port) = get("BILI_PORT")
            && let Ok(parsed) = port.parse::<u16>()
        {
            config.port = parsed;
        }

        if let Some(cors) = get("BILI_ENABLE_CORS")
            && let Ok(parsed) = cors.parse::<bool>()
        {
            config.enable_cors = parsed;
        }

        if let Some(path) = get("BILI_COOKIE_FILE") {
            config.cookie_file = PathBuf::from(path);
        }

        if let Some(secs) = get("BILI_SWEEP_INTERVAL_SECS")
            && let Ok(parsed) = secs.parse::<u64>()
            && parsed > 0
        {
            config.sweep_interval = Duration::from_secs(parsed);
        }

        if let Some(secs) = get("BILI_HTTP_TIMEOUT_SECS")
            && let Ok(parsed) = secs.parse::<u64>()
            && parsed > 0
        {
            config.client.timeout = Duration::from_secs(parsed);
        }

        if let Some(base) = get("BILI_PASSPORT_BASE") {
            config.client.passport_base = base;
        }

        if let Some(base) = get("BILI_API_BASE") {
            config.client.api_base = base;
        }

        config
    }

    pub fn listen_url(&self) -> String {
        format!("http://{}:{}", self.bind_address, self.port)
    }
}
