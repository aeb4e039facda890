//! In-memory registry of pending polls.
//!
//! The registry is the live source of truth while the process runs. Reads
//! share a lock, mutations take it exclusively, so callers never observe a
//! half-written record. `unregister` is the exactly-once gate for conclusion:
//! only the caller that actually removes a record may conclude it.

use crate::polls::record::PollRecord;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Concurrency-safe map of message id → poll record. Cheap to clone; clones
/// share state.
#[derive(Debug, Clone, Default)]
pub struct PollRegistry {
    polls: Arc<RwLock<HashMap<String, PollRecord>>>,
}

impl PollRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same message id.
    pub fn register(&self, record: PollRecord) -> Option<PollRecord> {
        self.polls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.message_id.clone(), record)
    }

    /// Remove and return a record. Absent keys return `None`.
    pub fn unregister(&self, message_id: &str) -> Option<PollRecord> {
        self.polls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(message_id)
    }

    /// Copy of the record for `message_id`, if pending.
    #[must_use]
    pub fn lookup(&self, message_id: &str) -> Option<PollRecord> {
        self.polls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(message_id)
            .cloned()
    }

    /// Copy of every pending record, ordered by deadline.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PollRecord> {
        let mut records: Vec<PollRecord> = self
            .polls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.expires_at
                .cmp(&b.expires_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        records
    }

    /// Number of pending polls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.polls.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` when no polls are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::{Duration, Utc};

    fn record(id: &str, minutes: i64) -> PollRecord {
        PollRecord {
            message_id: id.to_owned(),
            channel_id: "c".to_owned(),
            beneficiary_id: "u".to_owned(),
            creator_id: None,
            point_delta: 1,
            reason: "r".to_owned(),
            expires_at: Utc::now() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn register_then_lookup() {
        let registry = PollRegistry::new();
        assert!(registry.register(record("m1", 5)).is_none());
        assert_eq!(registry.lookup("m1").unwrap().message_id, "m1");
        assert!(registry.lookup("m2").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_missing_is_noop() {
        let registry = PollRegistry::new();
        assert!(registry.unregister("absent").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_only_succeeds_once() {
        let registry = PollRegistry::new();
        registry.register(record("m1", 5));
        assert!(registry.unregister("m1").is_some());
        assert!(registry.unregister("m1").is_none());
    }

    #[test]
    fn snapshot_orders_by_deadline() {
        let registry = PollRegistry::new();
        registry.register(record("late", 60));
        registry.register(record("early", 1));
        let ids: Vec<String> = registry
            .snapshot()
            .into_iter()
            .map(|r| r.message_id)
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn racing_unregisters_have_one_winner() {
        let registry = PollRegistry::new();
        registry.register(record("contested", 1));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.unregister("contested").is_some())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
