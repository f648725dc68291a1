//! Settings types for the HTTP server, the speech engine, and logging.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoxSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Speech engine and recognition settings.
    pub speech: SpeechSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl VoxSettings {
    /// Check the values the service cannot start without.
    ///
    /// An explicit `speech.endpoint` lifts the region requirement, since the
    /// region is only used to build the default endpoint URL.
    pub fn validate(&self) -> Result<()> {
        let speech = &self.speech;
        if speech.subscription_key.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "speech.subscriptionKey",
                problem: "is required",
            });
        }
        if speech.region.trim().is_empty() && speech.endpoint.is_none() {
            return Err(SettingsError::Invalid {
                key: "speech.region",
                problem: "is required when speech.endpoint is not set",
            });
        }
        if speech.max_concurrency == 0 {
            return Err(SettingsError::Invalid {
                key: "speech.maxConcurrency",
                problem: "must be at least 1",
            });
        }
        if speech.timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                key: "speech.timeoutSecs",
                problem: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Request body cap in bytes. `None` means unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_body_bytes: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
            max_body_bytes: None,
        }
    }
}

/// Speech engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechSettings {
    /// Speech service subscription key.
    pub subscription_key: String,
    /// Speech service region (e.g. `westeurope`).
    pub region: String,
    /// Maximum number of recognition sessions running at once.
    pub max_concurrency: usize,
    /// Per-request recognition timeout in seconds.
    pub timeout_secs: u64,
    /// Language used when a request does not name one.
    pub default_language: String,
    /// Override for the recognition endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            subscription_key: String::new(),
            region: String::new(),
            max_concurrency: 1,
            timeout_secs: 120,
            default_language: "ru-RU".to_string(),
            endpoint: None,
        }
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
