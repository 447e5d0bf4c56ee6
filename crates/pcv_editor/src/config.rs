//! Configuration management for the headless editor.
//!
//! This module handles loading and validation of the editor configuration
//! from TOML files.

use pcv_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Endpoints and sync tuning
    #[serde(default)]
    pub editor: SyncConfig,
    /// Which session to open and what to do once it is open
    #[serde(default)]
    pub session: SessionSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Session settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Session identifier; `--uid` takes precedence
    #[serde(default)]
    pub uid: Option<String>,
    /// Request the codes collection right after the editor opens
    #[serde(default)]
    pub load_codes_on_start: bool,
    /// Seconds to wait before reconnecting a dropped channel (0 disables)
    #[serde(default)]
    pub reconnect_delay_secs: u64,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    ///
    /// The loaded configuration, or an error if reading or parsing failed.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration settings.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error message describing
    /// the first validation failure.
    pub fn validate(&self) -> Result<(), String> {
        self.editor.validate()?;

        if let Some(uid) = &self.session.uid {
            if uid.trim().is_empty() {
                return Err("Session uid cannot be empty".to_string());
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.editor.request_timeout_secs, 15);
        assert_eq!(config.session.reconnect_delay_secs, 0);
    }

    #[test]
    fn validation_failures() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));

        let mut config = AppConfig::default();
        config.session.uid = Some("  ".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.editor.websocket_url = "ws://localhost/ws".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn load_from_nonexistent_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pcv-editor.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn load_partial_file() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(
            file.path(),
            r#"
[editor]
api_base_url = "https://portal.example.com/api"
websocket_url = "wss://portal.example.com/ws/{uid}"
auth_token = "secret"

[session]
uid = "3f2a"
load_codes_on_start = true

[logging]
level = "debug"
"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load_from_file(&file.path().to_path_buf()).await.unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.editor.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.editor.codes_page_size, 50);
        assert_eq!(config.session.uid.as_deref(), Some("3f2a"));
        assert!(config.session.load_codes_on_start);
        assert!(!config.logging.json_format);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), "[editor\n").await.unwrap();
        assert!(AppConfig::load_from_file(&file.path().to_path_buf()).await.is_err());
    }
}
