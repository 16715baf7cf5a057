// src/config/content.rs
//! Content store connection settings.
//!
//! Resolution order: environment variables, then the optional TOML file
//! (`$CONTENT_CONFIG_PATH`, else `config/content.toml`), then defaults.
//! A missing endpoint or token is a startup error.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::content::Collection;

pub const ENV_API_URL: &str = "CONTENT_API_URL";
pub const ENV_API_TOKEN: &str = "CONTENT_API_TOKEN";
pub const ENV_CACHE_TTL_SECS: &str = "CONTENT_CACHE_TTL_SECS";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "CONTENT_FETCH_TIMEOUT_SECS";
pub const ENV_RETRY_BACKOFF_SECS: &str = "CONTENT_RETRY_BACKOFF_SECS";
pub const ENV_CONFIG_PATH: &str = "CONTENT_CONFIG_PATH";
pub const ENV_FIXTURES_DIR: &str = "CONTENT_FIXTURES_DIR";

pub const DEFAULT_CONFIG_PATH: &str = "config/content.toml";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid content api url '{value}': {message}")]
    InvalidUrl { value: String, message: String },

    #[error("{var} must be a whole number of seconds, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("unknown collection '{0}' in [paths]")]
    UnknownCollection(String),

    #[error("reading {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub api_url: Url,
    pub api_token: String,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    /// Quiet period after a failed refresh before the store is tried again.
    pub retry_backoff: Duration,
    /// Per-collection path overrides, relative to `api_url`.
    pub paths: HashMap<Collection, String>,
    /// Serve `<dir>/<collection>.json` instead of calling the content store.
    pub fixtures_dir: Option<PathBuf>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse("http://localhost/").expect("static url"),
            api_token: String::new(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            retry_backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
            paths: HashMap::new(),
            fixtures_dir: None,
        }
    }
}

/// Optional on-disk settings. The token is deliberately env-only.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub cache_ttl_secs: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
    pub retry_backoff_secs: Option<u64>,
    pub fixtures_dir: Option<PathBuf>,
    #[serde(default)]
    pub paths: HashMap<String, String>,
}

impl FileConfig {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::File {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `$CONTENT_CONFIG_PATH` must exist when set; the default path is optional.
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(Path::new(&p));
        }
        let default = Path::new(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(default);
        }
        Ok(Self::default())
    }
}

impl ContentConfig {
    /// Load from the process environment (plus optional file).
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = FileConfig::load_default()?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge file settings with an env lookup. Env wins; blank values count
    /// as unset.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let fixtures_dir = lookup(ENV_FIXTURES_DIR).map(PathBuf::from).or(file.fixtures_dir);
        let fixtures_mode = fixtures_dir.is_some();

        let api_url = match lookup(ENV_API_URL).or(file.api_url) {
            Some(raw) => parse_url(&raw)?,
            None if fixtures_mode => ContentConfig::default().api_url,
            None => return Err(ConfigError::Missing(ENV_API_URL)),
        };
        let api_token = match lookup(ENV_API_TOKEN) {
            Some(t) => t,
            None if fixtures_mode => String::new(),
            None => return Err(ConfigError::Missing(ENV_API_TOKEN)),
        };

        let cache_ttl_secs = match lookup(ENV_CACHE_TTL_SECS) {
            Some(v) => parse_secs(ENV_CACHE_TTL_SECS, &v)?,
            None => file.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        };
        let fetch_timeout_secs = match lookup(ENV_FETCH_TIMEOUT_SECS) {
            Some(v) => parse_secs(ENV_FETCH_TIMEOUT_SECS, &v)?,
            None => file.fetch_timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        };
        let retry_backoff_secs = match lookup(ENV_RETRY_BACKOFF_SECS) {
            Some(v) => parse_secs(ENV_RETRY_BACKOFF_SECS, &v)?,
            None => file.retry_backoff_secs.unwrap_or(DEFAULT_RETRY_BACKOFF_SECS),
        };

        let mut paths = HashMap::with_capacity(file.paths.len());
        for (name, path) in file.paths {
            let collection = name
                .parse::<Collection>()
                .map_err(|_| ConfigError::UnknownCollection(name.clone()))?;
            let path = path.trim().to_string();
            if !path.is_empty() {
                paths.insert(collection, path);
            }
        }

        Ok(Self {
            api_url,
            api_token,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            // A zero timeout would fail every fetch.
            fetch_timeout: Duration::from_secs(fetch_timeout_secs.max(1)),
            retry_backoff: Duration::from_secs(retry_backoff_secs),
            paths,
            fixtures_dir,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        value: raw.to_string(),
        message: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            value: raw.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn parse_secs(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}
