//! Deferred poll conclusion.
//!
//! Each armed poll gets one tokio task that sleeps until the poll's deadline
//! and then hands the poll's message id to an [`ExpiryHandler`]. The task
//! owns only the key; the handler re-reads current state from the registry,
//! so a poll that was already concluded elsewhere is simply skipped.

use crate::error::{FatalReporter, Result};
use crate::polls::record::PollRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Invoked once an armed poll reaches its deadline.
#[async_trait]
pub trait ExpiryHandler: Send + Sync {
    /// Resolve the poll keyed by `message_id`.
    async fn on_expire(&self, message_id: String) -> Result<()>;
}

/// Arms and tracks per-poll expiry tasks.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    tracker: TaskTracker,
    shutdown: CancellationToken,
    fatal: FatalReporter,
}

impl PollScheduler {
    /// Create a scheduler that forwards fatal handler errors to `fatal`.
    #[must_use]
    pub fn new(fatal: FatalReporter) -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            fatal,
        }
    }

    /// Arm `record` against the current wall clock. Returns the delay used.
    pub fn arm(&self, record: &PollRecord, handler: Arc<dyn ExpiryHandler>) -> Duration {
        self.arm_at(record, Utc::now(), handler)
    }

    /// Arm `record` for `expires_at - now`, or immediately when that is
    /// already past. Returns the delay used.
    pub fn arm_at(
        &self,
        record: &PollRecord,
        now: DateTime<Utc>,
        handler: Arc<dyn ExpiryHandler>,
    ) -> Duration {
        let delay = record.remaining_at(now);
        self.arm_after(record.message_id.clone(), delay, handler);
        delay
    }

    /// Invoke `handler.on_expire(message_id)` once after `delay`.
    pub fn arm_after(&self, message_id: String, delay: Duration, handler: Arc<dyn ExpiryHandler>) {
        let shutdown = self.shutdown.clone();
        let fatal = self.fatal.clone();

        debug!("armed poll {message_id} to conclude in {}s", delay.as_secs());
        self.tracker.spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("poll {message_id} timer dropped at shutdown");
                }
                () = tokio::time::sleep(delay) => {
                    if let Err(e) = handler.on_expire(message_id.clone()).await {
                        fatal.report(&format!("concluding poll {message_id} failed"), e);
                    }
                }
            }
        });
    }

    /// Number of timers that have not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Drop every pending timer and wait for running conclusions to finish.
    /// Dropped polls stay in the store and are recovered on next start.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
