//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. Only the API base
//! URL has an env override (`API_BASE_URL`); credentials never live here.

use api_client::ApiClientOptions;
use serde::Deserialize;
use session_auth::{DEFAULT_ENTRY_POINT, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH};
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Dashboard API location
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Fixed end-to-end timeout for every request
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Endpoints the pipeline treats specially
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            entry_point: default_entry_point(),
        }
    }
}

/// Where the session (tokens) is persisted between runs
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

fn default_session_file() -> PathBuf {
    PathBuf::from("session.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("API_BASE_URL") {
            config.api.base_url = url;
        }

        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        for (name, path) in [
            ("login_path", &config.auth.login_path),
            ("refresh_path", &config.auth.refresh_path),
            ("entry_point", &config.auth.entry_point),
        ] {
            if !path.starts_with('/') {
                return Err(common::Error::Config(format!(
                    "{name} must start with '/', got: {path}"
                )));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("dashboard-api.toml")
    }

    /// Pipeline options for this deployment. Default headers stay JSON.
    pub fn client_options(&self) -> ApiClientOptions {
        ApiClientOptions {
            login_path: self.auth.login_path.clone(),
            refresh_path: self.auth.refresh_path.clone(),
            entry_point: self.auth.entry_point.clone(),
            ..ApiClientOptions::default()
        }
    }
}
