//! Server configuration.

use serde::{Deserialize, Serialize};
use vox_settings::VoxSettings;

/// Configuration for the vox HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `80`, `0` for auto-assign).
    pub port: u16,
    /// Request body cap in bytes. `None` leaves bodies unbounded.
    pub max_body_bytes: Option<usize>,
    /// Language used when a request has no usable `lang` parameter.
    pub default_language: String,
}

impl ServerConfig {
    /// Server section of the loaded settings.
    pub fn from_settings(settings: &VoxSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_body_bytes: settings.server.max_body_bytes,
            default_language: settings.speech.default_language.clone(),
        }
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 80,
            max_body_bytes: None,
            default_language: "ru-RU".into(),
        }
    }
}
