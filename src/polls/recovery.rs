//! Startup recovery of pending polls.
//!
//! Rebuilds the registry from the poll store, concludes everything whose
//! deadline passed while the process was down, and only then re-arms the
//! rest for whatever time they have left.

use crate::error::Result;
use crate::polls::conclusion::ConclusionEngine;
use crate::polls::registry::PollRegistry;
use crate::polls::scheduler::{ExpiryHandler, PollScheduler};
use crate::polls::store::PollStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// What recovery did with each stored poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Polls concluded immediately because their deadline had passed.
    pub concluded: Vec<String>,
    /// Polls re-armed, with the delay each was armed for.
    pub armed: Vec<(String, Duration)>,
}

/// Components recovery operates on.
pub struct Recovery<'a> {
    pub store: &'a PollStore,
    pub registry: &'a PollRegistry,
    pub scheduler: &'a PollScheduler,
    pub engine: &'a Arc<ConclusionEngine>,
}

impl Recovery<'_> {
    /// Run recovery against wall-clock `now`.
    ///
    /// Expiry is judged at `now`. Pending polls are armed against `now` plus
    /// however long concluding the expired ones took, so their timers still
    /// fire at their deadlines.
    ///
    /// # Errors
    /// Returns `BotError::Config` when the store cannot be read and
    /// `BotError::Persistence` when concluding an expired poll cannot be
    /// persisted. Both abort startup.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RecoveryReport> {
        let records = self.store.load()?;
        for record in &records {
            self.registry.register(record.clone());
        }

        let (expired, pending): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.is_expired_at(now));

        let started = tokio::time::Instant::now();
        let mut report = RecoveryReport::default();
        for record in expired {
            if self.engine.conclude(&record.message_id).await?.is_some() {
                report.concluded.push(record.message_id);
            }
        }

        let arm_now = now
            + chrono::Duration::from_std(started.elapsed()).unwrap_or(chrono::Duration::zero());
        let handler: Arc<dyn ExpiryHandler> = self.engine.clone();
        for record in pending {
            let delay = self.scheduler.arm_at(&record, arm_now, Arc::clone(&handler));
            report.armed.push((record.message_id, delay));
        }

        info!(
            "recovered polls: {} concluded on startup, {} re-armed",
            report.concluded.len(),
            report.armed.len()
        );
        Ok(report)
    }
}
