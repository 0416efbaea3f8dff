//! Client settings.
//!
//! Loaded from an optional file (TOML, JSON or YAML, by extension) and then
//! from `TESSERA_*` environment variables, which take precedence:
//!
//! | Key                  | Variable                     | Default            |
//! |----------------------|------------------------------|--------------------|
//! | `base_url`           | `TESSERA_BASE_URL`           | required           |
//! | `refresh_path`       | `TESSERA_REFRESH_PATH`       | `/refresh`         |
//! | `refresh_timeout_ms` | `TESSERA_REFRESH_TIMEOUT_MS` | `10000`, 0 = none  |
//! | `request_timeout_ms` | `TESSERA_REQUEST_TIMEOUT_MS` | `30000`            |
//! | `session_file`       | `TESSERA_SESSION_FILE`       | config dir         |
//! | `entry_route`        | `TESSERA_ENTRY_ROUTE`        | `/`                |

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::persistence::FileTokenStore;
use crate::session::DEFAULT_ENTRY_ROUTE;

/// Prefix of the environment variables read by [`ClientSettings::load`].
pub const ENV_PREFIX: &str = "TESSERA";

/// Error type for settings operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A source could not be read or a value has the wrong type.
    #[error("could not load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// `base_url` is not an http(s) URL.
    #[error("base_url must be an http(s) URL, got {0}")]
    InvalidBaseUrl(String),

    /// A request target could not be turned into a URL.
    #[error("invalid request target {0}")]
    InvalidTarget(String),
}

/// Where the backend lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSettings {
    /// Base URL of the API; relative targets and the refresh path hang off it.
    pub base_url: Url,
    /// Path of the refresh endpoint.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Upper bound for one refresh call; 0 disables it.
    #[serde(default = "default_refresh_timeout_ms")]
    pub refresh_timeout_ms: u64,
    /// Timeout of ordinary requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Session file override.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    /// Route published when the session ends.
    #[serde(default = "default_entry_route")]
    pub entry_route: String,
}

fn default_refresh_path() -> String {
    "/refresh".to_string()
}

const fn default_refresh_timeout_ms() -> u64 {
    10_000
}

const fn default_request_timeout_ms() -> u64 {
    tessera_domain::request::DEFAULT_TIMEOUT_MS
}

fn default_entry_route() -> String {
    DEFAULT_ENTRY_ROUTE.to_string()
}

impl ClientSettings {
    /// Loads settings from `file`, if given, overlaid with the environment.
    ///
    /// # Errors
    /// Returns an error if the file is missing or malformed, a value has the
    /// wrong type, or `base_url` is absent or not http(s).
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()
    }

    /// Settings for `base_url` with every other value at its default.
    ///
    /// # Errors
    /// Returns an error if `base_url` is not http(s).
    pub fn for_base_url(base_url: Url) -> Result<Self, SettingsError> {
        Self {
            base_url,
            refresh_path: default_refresh_path(),
            refresh_timeout_ms: default_refresh_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            session_file: None,
            entry_route: default_entry_route(),
        }
        .validate()
    }

    fn validate(self) -> Result<Self, SettingsError> {
        match self.base_url.scheme() {
            "http" | "https" => Ok(self),
            _ => Err(SettingsError::InvalidBaseUrl(self.base_url.to_string())),
        }
    }

    /// Full URL of the refresh endpoint.
    #[must_use]
    pub fn refresh_url(&self) -> String {
        self.join(&self.refresh_path)
    }

    /// Turns a command-line target into a request URL.
    ///
    /// Absolute http(s) URLs are used as given; anything else is a path under
    /// `base_url`.
    ///
    /// # Errors
    /// Returns an error for an empty target or an absolute URL with another
    /// scheme.
    pub fn resolve(&self, target: &str) -> Result<String, SettingsError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(SettingsError::InvalidTarget("(empty)".to_string()));
        }
        match Url::parse(target) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url.to_string()),
            Ok(_) => Err(SettingsError::InvalidTarget(target.to_string())),
            Err(_) => Ok(self.join(target)),
        }
    }

    /// Refresh call limit, `None` when disabled.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Option<Duration> {
        match self.refresh_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Session file to use: the override, else the platform default.
    #[must_use]
    pub fn session_file(&self) -> Option<PathBuf> {
        self.session_file.clone().or_else(FileTokenStore::default_path)
    }

    fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
