//! Client configuration, loaded from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `USERDESK_API_URL` | `http://localhost:8080` |
//! | `USERDESK_CREDENTIALS` | `{app_data_dir}/userdesk/credentials.json` |
//! | `USERDESK_PAGE_SIZE` | `10` (one of 10, 25, 50) |
//! | `USERDESK_TIMEOUT_SECS` | unset (transport default) |
//! | `USERDESK_LOG_FORMAT` | `pretty` |

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use userdesk_auth::{FileCredentialStore, StoreError};
use userdesk_core::Pagination;
use userdesk_observability::LogFormat;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid API URL '{value}': {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("invalid page size '{0}' (expected one of 10, 25, 50)")]
    InvalidPageSize(String),

    #[error("invalid timeout '{0}' (expected whole seconds > 0)")]
    InvalidTimeout(String),

    #[error("{0}")]
    InvalidLogFormat(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    /// `None` means the platform default location.
    pub credentials_path: Option<PathBuf>,
    pub page_size: u32,
    pub timeout: Option<Duration>,
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            credentials_path: None,
            page_size: Pagination::DEFAULT_LIMIT,
            timeout: None,
            log_format: LogFormat::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = var("USERDESK_API_URL") {
            config = config.with_api_url(&url)?;
        }
        if let Some(path) = var("USERDESK_CREDENTIALS") {
            config.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(size) = var("USERDESK_PAGE_SIZE") {
            config.page_size = parse_page_size(&size)?;
        }
        if let Some(secs) = var("USERDESK_TIMEOUT_SECS") {
            let parsed = secs
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout(secs.clone()))?;
            config.timeout = Some(Duration::from_secs(parsed));
        }
        if let Some(format) = var("USERDESK_LOG_FORMAT") {
            config.log_format = format.parse().map_err(ConfigError::InvalidLogFormat)?;
        }

        Ok(config)
    }

    /// Set the API base. A path prefix always ends in `/` so request paths
    /// join beneath it.
    pub fn with_api_url(mut self, url: &str) -> Result<Self, ConfigError> {
        let mut parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            value: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                value: url.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        self.api_url = parsed;
        Ok(self)
    }

    pub fn credential_store(&self) -> Result<FileCredentialStore, StoreError> {
        match &self.credentials_path {
            Some(path) => Ok(FileCredentialStore::new(path)),
            None => FileCredentialStore::open_default(),
        }
    }

    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if self.is_loopback() {
            builder = builder.no_proxy();
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    /// Local API hosts bypass any system proxy.
    fn is_loopback(&self) -> bool {
        let Some(host) = self.api_url.host_str() else {
            return false;
        };
        host.eq_ignore_ascii_case("localhost")
            || host
                .trim_matches(['[', ']'])
                .parse::<std::net::IpAddr>()
                .is_ok_and(|ip| ip.is_loopback())
    }
}

fn parse_page_size(raw: &str) -> Result<u32, ConfigError> {
    raw.parse::<u32>()
        .ok()
        .filter(|size| Pagination::PAGE_SIZE_OPTIONS.contains(size))
        .ok_or_else(|| ConfigError::InvalidPageSize(raw.to_string()))
}
