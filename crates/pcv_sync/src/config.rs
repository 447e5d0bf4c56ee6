//! Sync client configuration.
//!
//! Holds the collaborator-owned endpoints (REST base and WebSocket URL
//! template) plus the client-side tuning knobs.

use crate::types::Uid;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder substituted with the session uid in [`SyncConfig::websocket_url`].
pub const UID_PLACEHOLDER: &str = "{uid}";

fn default_api_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_websocket_url() -> String {
    "ws://127.0.0.1:8080/v1/pcv/ws/{uid}".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_notice_dismiss_ms() -> u64 {
    3000
}

fn default_codes_page_size() -> usize {
    50
}

/// Configuration for one editor session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the REST API (e.g., "https://portal.example.com/api")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// WebSocket URL template containing `{uid}`
    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,
    /// Bearer token for REST calls, also passed as `token` on the socket URL
    #[serde(default)]
    pub auth_token: Option<String>,
    /// REST request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long a terminal success/error indicator stays visible
    #[serde(default = "default_notice_dismiss_ms")]
    pub notice_dismiss_ms: u64,
    /// Codes revealed per "load more"
    #[serde(default = "default_codes_page_size")]
    pub codes_page_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            websocket_url: default_websocket_url(),
            auth_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            notice_dismiss_ms: default_notice_dismiss_ms(),
            codes_page_size: default_codes_page_size(),
        }
    }
}

impl SyncConfig {
    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is usable, or an error message describing
    /// the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(format!("Invalid API base URL: {}", self.api_base_url));
        }
        if !(self.websocket_url.starts_with("ws://") || self.websocket_url.starts_with("wss://")) {
            return Err(format!("Invalid WebSocket URL: {}", self.websocket_url));
        }
        if !self.websocket_url.contains(UID_PLACEHOLDER) {
            return Err(format!("WebSocket URL must contain {UID_PLACEHOLDER}"));
        }
        self.websocket_url_for(&Uid::new("validate"))?;
        if self.request_timeout_secs == 0 {
            return Err("Request timeout must be greater than zero".to_string());
        }
        if self.codes_page_size == 0 {
            return Err("Codes page size must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Socket URL for `uid`, with the auth token appended when configured.
    pub fn websocket_url_for(&self, uid: &Uid) -> Result<String, String> {
        let templated = self
            .websocket_url
            .replace(UID_PLACEHOLDER, &urlencoding::encode(uid.as_str()));
        let mut url = Url::parse(&templated).map_err(|e| format!("Invalid WebSocket URL {templated}: {e}"))?;
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url.into())
    }

    pub fn notice_dismiss(&self) -> Duration {
        Duration::from_millis(self.notice_dismiss_ms)
    }
}
