//! Poll record and tally types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pending point-award vote, keyed by the platform message that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRecord {
    /// Platform-assigned id of the poll message. Unique within the registry.
    pub message_id: String,
    /// Channel holding the poll message.
    pub channel_id: String,
    /// Participant who gains (or loses) points if the poll passes.
    pub beneficiary_id: String,
    /// Participant who proposed the poll, if known. Stored as `null` when
    /// unknown.
    #[serde(default)]
    pub creator_id: Option<String>,
    /// Signed, non-zero point change applied on pass.
    pub point_delta: i64,
    /// Free-text justification.
    pub reason: String,
    /// Deadline after which the poll is concluded.
    pub expires_at: DateTime<Utc>,
}

impl PollRecord {
    /// Returns `true` once `now` has reached the deadline.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left until the deadline, zero when already expired.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }
}

/// Vote counts for one poll, with the bot's own reactions already removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub approvals: usize,
    pub rejections: usize,
}

impl Tally {
    /// A poll passes only on a strict approval majority. Ties fail.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.approvals > self.rejections
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for, {} against", self.approvals, self.rejections)
    }
}

/// Result of concluding a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// The concluded poll.
    pub record: PollRecord,
    /// Counted votes.
    pub tally: Tally,
    /// Beneficiary balance after crediting; `None` when the poll failed.
    pub new_balance: Option<i64>,
}

impl PollOutcome {
    /// Whether the points were awarded.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.tally.passed()
    }

    /// Human-readable announcement for the poll's channel.
    #[must_use]
    pub fn summary(&self) -> String {
        let points = format_delta(self.record.point_delta);
        match self.new_balance {
            Some(balance) => format!(
                "Poll passed ({}). <@{}> receives {points} points for \"{}\" and now has {balance}.",
                self.tally, self.record.beneficiary_id, self.record.reason
            ),
            None => format!(
                "Poll failed ({}). <@{}> does not receive {points} points for \"{}\".",
                self.tally, self.record.beneficiary_id, self.record.reason
            ),
        }
    }
}

/// Render a delta with an explicit sign, e.g. `+3` or `-2`.
#[must_use]
pub fn format_delta(delta: i64) -> String {
    if delta > 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    }
}
