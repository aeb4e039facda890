//! Leaderboard ranking and rendering.
//!
//! [`top_n`] is a pure function over balances. [`render_leaderboard`] is the
//! presentation step that resolves display names and pairs each row with a
//! rank marker.

use crate::error::{BotError, Result};
use crate::platform::DisplayNameResolver;
use tracing::warn;

/// Rank markers shipped by default, one per leaderboard row.
pub const DEFAULT_RANK_MARKERS: [&str; 10] = [
    "🥇", "🥈", "🥉", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣", "🔟",
];

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// Participant id.
    pub participant_id: String,
    /// Point balance.
    pub balance: i64,
}

/// Ordered, fixed table of rank markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankMarkers {
    markers: Vec<String>,
}

impl RankMarkers {
    /// Build a marker table that must cover at least `size` rows.
    ///
    /// # Errors
    /// Returns `BotError::Config` when fewer than `size` markers are given or
    /// any marker is blank.
    pub fn new(markers: Vec<String>, size: usize) -> Result<Self> {
        if markers.iter().any(|m| m.trim().is_empty()) {
            return Err(BotError::Config("rank markers must not be blank".to_owned()));
        }
        if markers.len() < size {
            return Err(BotError::Config(format!(
                "leaderboard size {size} needs at least {size} rank markers, got {}",
                markers.len()
            )));
        }
        Ok(Self { markers })
    }

    /// Number of rows this table can label.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Returns `true` when the table holds no markers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Marker for the zero-based row `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.markers.get(index).map(String::as_str)
    }
}

impl Default for RankMarkers {
    fn default() -> Self {
        Self {
            markers: DEFAULT_RANK_MARKERS.iter().map(|m| (*m).to_owned()).collect(),
        }
    }
}

/// All balances, descending.
///
/// The sort is stable: equal balances keep the order in which `balances`
/// yields them. For a `BTreeMap` that is participant-id order. Other inputs
/// get whatever order they iterate in, so tie order is only as deterministic
/// as the caller's collection.
#[must_use]
pub fn rank<I>(balances: I) -> Vec<LeaderboardEntry>
where
    I: IntoIterator<Item = (String, i64)>,
{
    let mut entries: Vec<LeaderboardEntry> = balances
        .into_iter()
        .map(|(participant_id, balance)| LeaderboardEntry {
            participant_id,
            balance,
        })
        .collect();
    entries.sort_by(|a, b| b.balance.cmp(&a.balance));
    entries
}

/// Highest `n` balances, descending. Same tie order as [`rank`].
#[must_use]
pub fn top_n<I>(balances: I, n: usize) -> Vec<LeaderboardEntry>
where
    I: IntoIterator<Item = (String, i64)>,
{
    let mut entries = rank(balances);
    entries.truncate(n);
    entries
}

/// Render up to `rows` ranked entries, one line per participant.
///
/// A participant whose name cannot be resolved is skipped; the following
/// entries move up and take the next marker. Rendering also stops when the
/// marker table runs out.
pub async fn render_leaderboard(
    entries: &[LeaderboardEntry],
    rows: usize,
    markers: &RankMarkers,
    resolver: &dyn DisplayNameResolver,
) -> String {
    let mut lines = Vec::with_capacity(rows.min(entries.len()));

    for entry in entries {
        if lines.len() == rows {
            break;
        }
        let Some(marker) = markers.get(lines.len()) else {
            break;
        };
        match resolver.display_name(&entry.participant_id).await {
            Ok(name) => lines.push(format!("{marker} {name}: {} points", entry.balance)),
            Err(e) => warn!(
                "skipping leaderboard row for {}: {e}",
                entry.participant_id
            ),
        }
    }

    if lines.is_empty() {
        return "No points have been awarded yet.".to_owned();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct Names;

    #[async_trait]
    impl DisplayNameResolver for Names {
        async fn display_name(&self, participant_id: &str) -> Result<String> {
            if participant_id == "ghost" {
                return Err(BotError::Platform("unknown user".to_owned()));
            }
            Ok(format!("name-{participant_id}"))
        }
    }

    fn balances(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
    }

    #[test]
    fn top_n_orders_descending_and_truncates() {
        let ranked = top_n(balances(&[("a", 1), ("b", 9), ("c", -3), ("d", 4)]), 3);
        let ids: Vec<&str> = ranked.iter().map(|e| e.participant_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
    }

    #[test]
    fn top_n_never_exceeds_n() {
        let input = balances(&[("a", 1), ("b", 2)]);
        assert_eq!(top_n(input.clone(), 10).len(), 2);
        assert_eq!(top_n(input.clone(), 1).len(), 1);
        assert!(top_n(input, 0).is_empty());
    }

    #[test]
    fn top_n_is_stable_across_reruns() {
        let input = balances(&[("x", 5), ("y", 5), ("z", 5), ("w", 7)]);
        let first = top_n(input.clone(), 4);
        let second = top_n(input, 4);
        assert_eq!(first, second);
        assert_eq!(first[0].participant_id, "w");
        assert_eq!(first[1].participant_id, "x");
    }

    #[test]
    fn rank_markers_must_cover_size() {
        let err = RankMarkers::new(vec!["1".to_owned(), "2".to_owned()], 3).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
        assert!(RankMarkers::new(vec!["1".to_owned()], 1).is_ok());
    }

    #[test]
    fn rank_markers_reject_blank_entries() {
        assert!(RankMarkers::new(vec![" ".to_owned()], 1).is_err());
    }

    #[test]
    fn default_markers_cover_ten_rows() {
        let markers = RankMarkers::default();
        assert_eq!(markers.len(), 10);
        assert_eq!(markers.get(0), Some("🥇"));
        assert_eq!(markers.get(9), Some("🔟"));
    }

    #[tokio::test]
    async fn render_skips_unresolvable_participants() {
        let ranked = top_n(balances(&[("ghost", 10), ("u1", 5), ("u2", 1)]), 10);
        let text = render_leaderboard(&ranked, 10, &RankMarkers::default(), &Names).await;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "🥇 name-u1: 5 points");
        assert_eq!(lines[1], "🥈 name-u2: 1 points");
    }

    #[tokio::test]
    async fn render_fills_skipped_rows_up_to_the_limit() {
        let ranked = rank(balances(&[("ghost", 10), ("u1", 5), ("u2", 3), ("u3", 1)]));
        let text = render_leaderboard(&ranked, 2, &RankMarkers::default(), &Names).await;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["🥇 name-u1: 5 points", "🥈 name-u2: 3 points"]);
    }

    #[tokio::test]
    async fn render_stops_when_markers_run_out() {
        let markers = RankMarkers::new(vec!["A".to_owned()], 1).expect("markers");
        let ranked = rank(balances(&[("u1", 5), ("u2", 3)]));
        let text = render_leaderboard(&ranked, 5, &markers, &Names).await;
        assert_eq!(text, "A name-u1: 5 points");
    }

    #[tokio::test]
    async fn render_empty_ledger_has_placeholder() {
        let text = render_leaderboard(&[], 10, &RankMarkers::default(), &Names).await;
        assert!(text.contains("No points"));
    }
}
