//! Settings file for the tracker binary, written in RON.
//!
//! Every field is optional; missing fields fall back to the defaults below.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracker_core::Timing;
use tracker_engine::{ClientSettings, Url};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "tracker.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid base url {url:?}: {message}")]
    BaseUrl { url: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub csrf_token: Option<String>,
    pub session_cookie: Option<String>,
    pub state_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub list_sync_interval_ms: u64,
    pub reload_grace_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub log_to_file: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/".to_string(),
            csrf_token: None,
            session_cookie: None,
            state_dir: PathBuf::from(".tracker"),
            poll_interval_ms: 2_000,
            list_sync_interval_ms: 10_000,
            reload_grace_ms: 1_000,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            log_to_file: false,
        }
    }
}

impl AppConfig {
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::parse(&content).map_err(|message| ConfigError::Parse { path, message })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        ron::from_str(content).map_err(|err| err.to_string())
    }

    pub fn timing(&self) -> Timing {
        Timing {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            list_sync_interval: Duration::from_millis(self.list_sync_interval_ms.max(1)),
            reload_grace: Duration::from_millis(self.reload_grace_ms),
            ..Timing::default()
        }
    }

    pub fn client_settings(&self) -> Result<ClientSettings, ConfigError> {
        let base_url = Url::parse(&self.base_url).map_err(|err| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            message: err.to_string(),
        })?;
        let mut settings = ClientSettings::new(base_url);
        settings.csrf_token = self.csrf_token.clone();
        settings.session_cookie = self.session_cookie.clone();
        settings.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        settings.request_timeout = Duration::from_millis(self.request_timeout_ms);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::parse(
            r#"(base_url: "https://heritage.example/", csrf_token: Some("tok"), poll_interval_ms: 500)"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://heritage.example/");
        assert_eq!(config.csrf_token.as_deref(), Some("tok"));
        assert_eq!(config.timing().poll_interval, Duration::from_millis(500));
        assert_eq!(config.list_sync_interval_ms, 10_000);
        assert_eq!(config.state_dir, PathBuf::from(".tracker"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(AppConfig::parse("(base_url: 12").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("nope.ron");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("tracker.ron");
        fs::write(&path, r#"(state_dir: "/var/lib/tracker", log_to_file: true)"#).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/tracker"));
        assert!(config.log_to_file);
    }

    #[test]
    fn client_settings_follow_the_config() {
        let config = AppConfig {
            base_url: "http://host:9000/app".to_string(),
            session_cookie: Some("sessionid=x".to_string()),
            request_timeout_ms: 1_500,
            ..AppConfig::default()
        };
        let settings = config.client_settings().unwrap();
        assert_eq!(settings.base_url.as_str(), "http://host:9000/app/");
        assert_eq!(settings.session_cookie.as_deref(), Some("sessionid=x"));
        assert_eq!(settings.request_timeout, Duration::from_millis(1_500));

        let broken = AppConfig {
            base_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            broken.client_settings(),
            Err(ConfigError::BaseUrl { .. })
        ));
    }
}
