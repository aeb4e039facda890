//! Atomic JSON state files.
//!
//! Every write goes temp file → fsync → rename so a crash mid-write leaves
//! either the previous file or the new one, never a truncated one.

use crate::error::{BotError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Read a JSON state file, returning `T::default()` when it does not exist.
///
/// # Errors
/// Returns `BotError::Config` when the file exists but cannot be read or
/// parsed. Startup treats that as fatal.
pub fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(BotError::Config(format!(
                "cannot read '{}': {e}",
                path.display()
            )));
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| BotError::Config(format!("cannot parse '{}': {e}", path.display())))
}

/// Serialize `value` and atomically replace `path` with it.
///
/// # Errors
/// Returns `BotError::Persistence` on serialization, write, sync or rename
/// failure.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| BotError::Persistence(format!("cannot serialize state: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            BotError::Persistence(format!(
                "cannot create state directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = temp_path_for(path);
    let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
        BotError::Persistence(format!(
            "cannot create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;
    file.write_all(&json)
        .map_err(|e| BotError::Persistence(format!("cannot write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| BotError::Persistence(format!("cannot sync temp file: {e}")))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        BotError::Persistence(format!(
            "cannot rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

fn temp_path_for(path: &Path) -> PathBuf {
    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("state"),
        std::process::id()
    );
    path.parent()
        .map(|p| p.join(&tmp_name))
        .unwrap_or_else(|| PathBuf::from(&tmp_name))
}
