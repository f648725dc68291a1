//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`VoxSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{LogFormat, VoxSettings};

/// Env var naming an explicit settings file.
pub const SETTINGS_PATH_ENV: &str = "VOX_SETTINGS";

/// Resolve the settings file path.
///
/// `VOX_SETTINGS` wins; otherwise `~/.vox/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(explicit) = read_env_string(SETTINGS_PATH_ENV) {
        return PathBuf::from(explicit);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".vox").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<VoxSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<VoxSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<VoxSettings> {
    let malformed = |source| SettingsError::malformed(path, source);
    let defaults = serde_json::to_value(VoxSettings::default()).map_err(malformed)?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::read(path, e))?;
        let user: Value = serde_json::from_str(&content).map_err(malformed)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    serde_json::from_value(merged).map_err(malformed)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut VoxSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Each key has strict parsing rules; invalid values are logged and ignored
/// (falling back to the file/default value). Empty strings count as unset.
pub fn apply_overrides(settings: &mut VoxSettings, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Speech engine ───────────────────────────────────────────────
    if let Some(v) = get("AZURE_SPEECH_KEY") {
        settings.speech.subscription_key = v;
    }
    if let Some(v) = get("AZURE_SPEECH_REGION") {
        settings.speech.region = v;
    }
    if let Some(v) = get("AZURE_SPEECH_ENDPOINT") {
        settings.speech.endpoint = Some(v);
    }
    if let Some(v) = get("AZURE_SPEECH_MAX_CONCURRENCY")
        .and_then(|v| checked("AZURE_SPEECH_MAX_CONCURRENCY", &v, |s| parse_usize_range(s, 1, 1024)))
    {
        settings.speech.max_concurrency = v;
    }
    if let Some(v) = get("VOX_RECOGNITION_TIMEOUT_SECS").and_then(|v| {
        checked("VOX_RECOGNITION_TIMEOUT_SECS", &v, |s| parse_u64_range(s, 1, 3600))
    }) {
        settings.speech.timeout_secs = v;
    }
    if let Some(v) = get("VOX_DEFAULT_LANGUAGE") {
        settings.speech.default_language = v;
    }

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = get("VOX_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = get("VOX_PORT").and_then(|v| checked("VOX_PORT", &v, |s| parse_u16_range(s, 1, 65535)))
    {
        settings.server.port = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = get("VOX_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = get("VOX_LOG_FORMAT").and_then(|v| checked("VOX_LOG_FORMAT", &v, parse_log_format)) {
        settings.logging.format = v;
    }
}

fn checked<T>(key: &str, raw: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let result = parse(raw);
    if result.is_none() {
        warn!(key, value = %raw, "invalid env var value, ignoring");
    }
    result
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "compact" | "text" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"speech": {"region": "westeurope", "maxConcurrency": 1}});
        let source = serde_json::json!({"speech": {"maxConcurrency": 4}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["speech"]["maxConcurrency"], 4);
        assert_eq!(merged["speech"]["region"], "westeurope");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/vox/settings.json")).unwrap();
        assert_eq!(settings.server.port, 80);
        assert_eq!(settings.speech.max_concurrency, 1);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server":{"port":8080},"speech":{"subscriptionKey":"k","region":"eastus","maxConcurrency":3}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.speech.subscription_key, "k");
        assert_eq!(settings.speech.max_concurrency, 3);
        assert_eq!(settings.speech.timeout_secs, 120);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_file_layer(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Malformed { path: p, .. } if p == path));
    }

    #[test]
    fn wrong_value_type_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":"eighty"}}"#).unwrap();
        let err = load_file_layer(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Malformed { .. }));
    }

    #[test]
    fn unreadable_path_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists but cannot be read as a file.
        let err = load_file_layer(dir.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply_speech_values() {
        let mut settings = VoxSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("AZURE_SPEECH_KEY", "secret"),
                ("AZURE_SPEECH_REGION", "northeurope"),
                ("AZURE_SPEECH_MAX_CONCURRENCY", "8"),
                ("VOX_RECOGNITION_TIMEOUT_SECS", "30"),
                ("VOX_DEFAULT_LANGUAGE", "en-US"),
            ]),
        );
        assert_eq!(settings.speech.subscription_key, "secret");
        assert_eq!(settings.speech.region, "northeurope");
        assert_eq!(settings.speech.max_concurrency, 8);
        assert_eq!(settings.speech.timeout_secs, 30);
        assert_eq!(settings.speech.default_language, "en-US");
    }

    #[test]
    fn overrides_apply_server_and_logging() {
        let mut settings = VoxSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("VOX_HOST", "127.0.0.1"),
                ("VOX_PORT", "9000"),
                ("VOX_LOG_LEVEL", "debug"),
                ("VOX_LOG_FORMAT", "JSON"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = VoxSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("AZURE_SPEECH_MAX_CONCURRENCY", "0"),
                ("VOX_PORT", "not-a-port"),
                ("VOX_RECOGNITION_TIMEOUT_SECS", "99999"),
                ("VOX_LOG_FORMAT", "xml"),
            ]),
        );
        assert_eq!(settings.speech.max_concurrency, 1);
        assert_eq!(settings.server.port, 80);
        assert_eq!(settings.speech.timeout_secs, 120);
        assert_eq!(settings.logging.format, LogFormat::Compact);
    }

    #[test]
    fn empty_overrides_count_as_unset() {
        let mut settings = VoxSettings::default();
        settings.speech.region = "westeurope".into();
        apply_overrides(&mut settings, lookup_from(&[("AZURE_SPEECH_REGION", "")]));
        assert_eq!(settings.speech.region, "westeurope");
    }

    #[test]
    fn endpoint_override_is_set() {
        let mut settings = VoxSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[("AZURE_SPEECH_ENDPOINT", "http://localhost:1234/stt")]),
        );
        assert_eq!(
            settings.speech.endpoint.as_deref(),
            Some("http://localhost:1234/stt")
        );
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn range_parsers() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range("3601", 1, 3600), None);
        assert_eq!(parse_usize_range("4", 1, 1024), Some(4));
        assert_eq!(parse_usize_range("-1", 1, 1024), None);
    }

    #[test]
    fn log_format_parser() {
        assert_eq!(parse_log_format("text"), Some(LogFormat::Compact));
        assert_eq!(parse_log_format("Json"), Some(LogFormat::Json));
        assert_eq!(parse_log_format("yaml"), None);
    }
}
