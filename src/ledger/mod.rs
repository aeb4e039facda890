//! Persistent participant → point balance ledger.
//!
//! The ledger file is a flat JSON object `{"<participant id>": <balance>}`,
//! rewritten in full after every credit.

pub mod leaderboard;

pub use leaderboard::{LeaderboardEntry, RankMarkers, rank, render_leaderboard, top_n};

use crate::error::{BotError, Result};
use crate::persist::{read_json_or_default, write_json_atomic};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// File-backed points ledger. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct PointsLedger {
    path: PathBuf,
    balances: Arc<Mutex<BTreeMap<String, i64>>>,
}

impl PointsLedger {
    /// Load the ledger from `path`, creating an empty file when none exists.
    ///
    /// # Errors
    /// Returns `BotError::Config` for an unreadable or malformed file and
    /// `BotError::Persistence` when the initial empty file cannot be created.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let existed = path.exists();
        let balances: BTreeMap<String, i64> = read_json_or_default(&path)?;
        if !existed {
            write_json_atomic(&path, &balances)?;
        }
        debug!(
            "loaded {} ledger balances from {}",
            balances.len(),
            path.display()
        );
        Ok(Self {
            path,
            balances: Arc::new(Mutex::new(balances)),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add `delta` (may be negative) to a participant's balance and persist
    /// the whole ledger. Returns the new balance.
    ///
    /// # Errors
    /// Returns `BotError::Persistence` when the ledger cannot be written. The
    /// in-memory balance is rolled back in that case.
    pub fn credit(&self, participant_id: &str, delta: i64) -> Result<i64> {
        let mut balances = self
            .balances
            .lock()
            .map_err(|_| BotError::Persistence("ledger lock poisoned".to_owned()))?;

        let previous = balances.get(participant_id).copied();
        let updated = previous.unwrap_or(0).saturating_add(delta);
        balances.insert(participant_id.to_owned(), updated);

        if let Err(e) = write_json_atomic(&self.path, &*balances) {
            match previous {
                Some(value) => balances.insert(participant_id.to_owned(), value),
                None => balances.remove(participant_id),
            };
            return Err(e);
        }

        debug!("credited {participant_id} by {delta}, balance now {updated}");
        Ok(updated)
    }

    /// Current balance for a participant; unseen participants have 0.
    #[must_use]
    pub fn balance(&self, participant_id: &str) -> i64 {
        self.balances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(participant_id)
            .copied()
            .unwrap_or(0)
    }

    /// Snapshot of all balances, ordered by participant id.
    #[must_use]
    pub fn balances(&self) -> BTreeMap<String, i64> {
        self.balances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
