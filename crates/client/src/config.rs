//! Client configuration, read from the environment.

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use assursuite_auth::LOGIN_PATH;

pub const API_URL_ENV: &str = "ASSURSUITE_API_URL";
pub const LOGIN_PATH_ENV: &str = "ASSURSUITE_LOGIN_PATH";
pub const DATA_DIR_ENV: &str = "ASSURSUITE_DATA_DIR";

pub const DEFAULT_API_URL: &str = "https://expat.api.assursuite.com/api";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API base URL '{value}': {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("API base URL '{0}' must use http or https")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: Url,
    pub login_path: String,
    pub data_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            login_path: LOGIN_PATH.to_string(),
            data_dir: None,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; unset or blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(&get(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string()))?;
        if let Some(path) = get(LOGIN_PATH_ENV) {
            config.login_path = path;
        }
        config.data_dir = get(DATA_DIR_ENV).map(PathBuf::from);
        Ok(config)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an API path. Absolute URLs pass through untouched.
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Where the durable credential tier lives.
    pub fn credentials_path(&self) -> anyhow::Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.join("credentials.json")),
            None => crate::storage::default_credentials_path(),
        }
    }
}

fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidBaseUrl {
        value: value.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::UnsupportedScheme(value.to_string())),
    }
}
