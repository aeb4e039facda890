//! Poll conclusion.
//!
//! Concluding a poll removes it from the registry, counts reactions, credits
//! the ledger on a strict majority, rewrites the poll store and announces the
//! result. Removal from the registry happens first and gates everything else,
//! so however many timers, recovery passes or manual closes race on the same
//! poll, only one of them reaches the ledger.

use crate::error::Result;
use crate::ledger::PointsLedger;
use crate::platform::{NotificationSink, VoteTallySource};
use crate::polls::record::{PollOutcome, PollRecord, Tally};
use crate::polls::registry::PollRegistry;
use crate::polls::scheduler::ExpiryHandler;
use crate::polls::store::PollStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Reactions that count as votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReactions {
    /// Reaction counted as approval.
    pub approve: String,
    /// Reaction counted as rejection.
    pub reject: String,
    /// Maximum reactors fetched per reaction.
    pub page_size: u16,
}

impl Default for VoteReactions {
    fn default() -> Self {
        Self {
            approve: "✅".to_owned(),
            reject: "❌".to_owned(),
            page_size: 100,
        }
    }
}

/// Resolves polls exactly once.
pub struct ConclusionEngine {
    registry: PollRegistry,
    store: PollStore,
    ledger: PointsLedger,
    tally_source: Arc<dyn VoteTallySource>,
    notifier: Arc<dyn NotificationSink>,
    reactions: VoteReactions,
    /// Our own participant id; its seed reactions are never counted.
    self_id: Option<String>,
}

impl ConclusionEngine {
    #[must_use]
    pub fn new(
        registry: PollRegistry,
        store: PollStore,
        ledger: PointsLedger,
        tally_source: Arc<dyn VoteTallySource>,
        notifier: Arc<dyn NotificationSink>,
        reactions: VoteReactions,
    ) -> Self {
        Self {
            registry,
            store,
            ledger,
            tally_source,
            notifier,
            reactions,
            self_id: None,
        }
    }

    /// Exclude `self_id` from every tally.
    #[must_use]
    pub fn with_self_id(mut self, self_id: impl Into<String>) -> Self {
        self.self_id = Some(self_id.into());
        self
    }

    /// Conclude the poll keyed by `message_id`.
    ///
    /// Returns `Ok(None)` when the poll is no longer pending, which is the
    /// expected result for the loser of a conclusion race.
    ///
    /// # Errors
    /// Returns `BotError::Persistence` when the ledger or poll store cannot
    /// be written. Callers treat that as fatal.
    pub async fn conclude(&self, message_id: &str) -> Result<Option<PollOutcome>> {
        let Some(record) = self.registry.unregister(message_id) else {
            return Ok(None);
        };

        let tally = self.tally(&record).await;
        let new_balance = if tally.passed() {
            Some(
                self.ledger
                    .credit(&record.beneficiary_id, record.point_delta)?,
            )
        } else {
            None
        };

        self.store.save(&self.registry)?;

        let outcome = PollOutcome {
            record,
            tally,
            new_balance,
        };
        info!(
            message_id = %outcome.record.message_id,
            beneficiary = %outcome.record.beneficiary_id,
            delta = outcome.record.point_delta,
            approvals = tally.approvals,
            rejections = tally.rejections,
            passed = outcome.passed(),
            "poll concluded"
        );

        if let Err(e) = self
            .notifier
            .notify(&outcome.record.channel_id, &outcome.summary())
            .await
        {
            warn!(
                "cannot announce result of poll {}: {e}",
                outcome.record.message_id
            );
        }

        Ok(Some(outcome))
    }

    /// Count approvals and rejections. A failed query counts as zero votes
    /// for both sides, so the poll fails rather than waiting on a retry.
    async fn tally(&self, record: &PollRecord) -> Tally {
        let approvers = self.reactors(record, &self.reactions.approve).await;
        let rejecters = self.reactors(record, &self.reactions.reject).await;

        match (approvers, rejecters) {
            (Some(approvals), Some(rejections)) => Tally {
                approvals,
                rejections,
            },
            _ => Tally::default(),
        }
    }

    async fn reactors(&self, record: &PollRecord, reaction: &str) -> Option<usize> {
        match self
            .tally_source
            .reactors(
                &record.channel_id,
                &record.message_id,
                reaction,
                self.reactions.page_size,
            )
            .await
        {
            Ok(ids) => {
                if ids.len() >= usize::from(self.reactions.page_size) {
                    warn!(
                        "{reaction} reactions on poll {} reached the page limit of {}; extra votes are not counted",
                        record.message_id, self.reactions.page_size
                    );
                }
                let voters: HashSet<String> = ids
                    .into_iter()
                    .filter(|id| Some(id.as_str()) != self.self_id.as_deref())
                    .collect();
                Some(voters.len())
            }
            Err(e) => {
                warn!(
                    "cannot read {reaction} reactions on poll {}, counting it as failed: {e}",
                    record.message_id
                );
                None
            }
        }
    }
}

#[async_trait]
impl ExpiryHandler for ConclusionEngine {
    async fn on_expire(&self, message_id: String) -> Result<()> {
        self.conclude(&message_id).await.map(|_| ())
    }
}
