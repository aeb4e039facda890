//! Durable snapshot of the poll registry.
//!
//! The store file is `{"polls": {"<message id>": <PollRecord>}}` and is
//! rewritten in full after every registry mutation. It exists only so that
//! recovery can rebuild the registry after a restart.

use crate::error::{BotError, Result};
use crate::persist::{read_json_or_default, write_json_atomic};
use crate::polls::record::PollRecord;
use crate::polls::registry::PollRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// On-disk layout of the poll store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredPolls {
    #[serde(default)]
    pub polls: BTreeMap<String, PollRecord>,
}

/// File-backed poll store. Cheap to clone; clones share the write lock.
#[derive(Debug, Clone)]
pub struct PollStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl PollStore {
    /// Bind a store to `path`. Nothing is read until [`load`](Self::load).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored record, creating an empty store file when none
    /// exists.
    ///
    /// # Errors
    /// Returns `BotError::Config` for an unreadable or malformed file.
    pub fn load(&self) -> Result<Vec<PollRecord>> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| BotError::Persistence("poll store lock poisoned".to_owned()))?;

        let existed = self.path.exists();
        let stored: StoredPolls = read_json_or_default(&self.path)?;
        if !existed {
            write_json_atomic(&self.path, &stored)?;
        }

        let records: Vec<PollRecord> = stored
            .polls
            .into_iter()
            .map(|(key, record)| {
                if key != record.message_id {
                    warn!(
                        "stored poll key {key} does not match message id {}, using message id",
                        record.message_id
                    );
                }
                record
            })
            .collect();

        debug!(
            "loaded {} pending polls from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }

    /// Rewrite the store from the registry's current contents.
    ///
    /// The snapshot is taken while holding the store's write lock, so the
    /// last save to finish always reflects the newest registry state even
    /// when several handlers persist concurrently.
    ///
    /// # Errors
    /// Returns `BotError::Persistence` when the file cannot be written.
    pub fn save(&self, registry: &PollRegistry) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| BotError::Persistence("poll store lock poisoned".to_owned()))?;

        let stored = StoredPolls {
            polls: registry
                .snapshot()
                .into_iter()
                .map(|record| (record.message_id.clone(), record))
                .collect(),
        };
        write_json_atomic(&self.path, &stored)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::{Duration, Utc};

    fn record(id: &str) -> PollRecord {
        PollRecord {
            message_id: id.to_owned(),
            channel_id: "c1".to_owned(),
            beneficiary_id: "u1".to_owned(),
            creator_id: Some("u2".to_owned()),
            point_delta: 3,
            reason: "demo".to_owned(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn load_creates_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PollStore::new(dir.path().join("polls.json"));
        assert!(store.load().expect("load").is_empty());

        let raw = std::fs::read_to_string(store.path()).expect("created");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert!(json["polls"].as_object().unwrap().is_empty());
    }

    #[test]
    fn save_writes_keyed_polls_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PollStore::new(dir.path().join("polls.json"));
        let registry = PollRegistry::new();
        registry.register(record("m1"));
        registry.register(record("m2"));
        store.save(&registry).expect("save");

        let raw = std::fs::read_to_string(store.path()).expect("read");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(json["polls"]["m1"]["messageId"], "m1");
        assert_eq!(json["polls"]["m2"]["pointDelta"], 3);

        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn save_after_unregister_drops_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PollStore::new(dir.path().join("polls.json"));
        let registry = PollRegistry::new();
        registry.register(record("m1"));
        store.save(&registry).expect("save");

        registry.unregister("m1");
        store.save(&registry).expect("save");
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn malformed_store_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("polls.json");
        std::fs::write(&path, r#"{"polls": {"m1": {"messageId": 5}}}"#).expect("write");
        let store = PollStore::new(path);
        assert!(matches!(store.load(), Err(BotError::Config(_))));
    }
}
