//! # vox-settings
//!
//! Layered configuration for the vox recognition gateway.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`VoxSettings::default()`]
//! 2. **User file**: `~/.vox/settings.json` or `$VOX_SETTINGS` (deep-merged over defaults)
//! 3. **Environment variables**: `AZURE_SPEECH_*` / `VOX_*` overrides (highest priority)
//!
//! Settings are passed explicitly to the components that need them; there is
//! no global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
