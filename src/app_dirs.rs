//! Application directory paths.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data (polls, ledger, logs) | `~/Library/Application Support/foulbot/` | `~/.local/share/foulbot/` |
//! | Config | `~/Library/Application Support/foulbot/` | `~/.config/foulbot/` |
//!
//! `FOULBOT_DATA_DIR` and `FOULBOT_CONFIG_DIR` override the defaults.

use std::path::PathBuf;

/// Root for persisted state and logs.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FOULBOT_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("foulbot"))
        .unwrap_or_else(|| PathBuf::from("/tmp/foulbot-data"))
}

/// Directory holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FOULBOT_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("foulbot"))
        .unwrap_or_else(|| PathBuf::from("/tmp/foulbot-config"))
}
