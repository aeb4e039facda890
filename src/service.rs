//! Points service: the entry point command handlers talk to.
//!
//! Owns the registry, store, ledger, scheduler and conclusion engine and wires
//! them together. [`PointsService::start`] must finish before any proposal is
//! accepted so that polls that expired while the process was down are
//! resolved first.

use crate::config::BotConfig;
use crate::error::{BotError, FatalReporter, Result};
use crate::ledger::{PointsLedger, RankMarkers, rank, render_leaderboard};
use crate::platform::{DisplayNameResolver, NotificationSink, PollPoster, VoteTallySource};
use crate::polls::record::format_delta;
use crate::polls::{
    ConclusionEngine, ExpiryHandler, PollOutcome, PollRecord, PollRegistry, PollScheduler,
    PollStore, Recovery, RecoveryReport, VoteReactions,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Longest accepted proposal reason, in characters.
pub const MAX_REASON_CHARS: usize = 300;

/// A request to open a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRequest {
    pub beneficiary_id: String,
    pub point_delta: i64,
    pub reason: String,
    pub creator_id: Option<String>,
    pub channel_id: String,
}

/// Settings the service needs, independent of where they came from.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub polls_path: PathBuf,
    pub ledger_path: PathBuf,
    pub poll_duration: Duration,
    pub reactions: VoteReactions,
    pub rank_markers: RankMarkers,
    pub leaderboard_size: usize,
    pub admin_user_ids: Vec<String>,
    /// Our own participant id, excluded from vote counts.
    pub self_id: Option<String>,
}

impl ServiceSettings {
    /// Derive settings from a validated config.
    ///
    /// # Errors
    /// Returns `BotError::Config` when the rank markers do not cover the
    /// leaderboard size.
    pub fn from_config(config: &BotConfig, self_id: Option<String>) -> Result<Self> {
        Ok(Self {
            polls_path: config.storage.polls_path(),
            ledger_path: config.storage.ledger_path(),
            poll_duration: config.polls.duration(),
            reactions: config.polls.vote_reactions(),
            rank_markers: config.leaderboard.rank_markers()?,
            leaderboard_size: config.leaderboard.size,
            admin_user_ids: config.commands.admin_user_ids.clone(),
            self_id,
        })
    }
}

/// Chat platform capabilities the service depends on.
pub trait ChatPlatform:
    VoteTallySource + NotificationSink + PollPoster + DisplayNameResolver + 'static
{
}

impl<T> ChatPlatform for T where
    T: VoteTallySource + NotificationSink + PollPoster + DisplayNameResolver + 'static
{
}

/// Poll and ledger operations exposed to command handlers.
pub struct PointsService {
    registry: PollRegistry,
    store: PollStore,
    ledger: PointsLedger,
    scheduler: PollScheduler,
    engine: Arc<ConclusionEngine>,
    poster: Arc<dyn PollPoster>,
    names: Arc<dyn DisplayNameResolver>,
    settings: ServiceSettings,
}

impl PointsService {
    /// Open persisted state and wire the components. Nothing is concluded
    /// or armed until [`start`](Self::start).
    ///
    /// # Errors
    /// Returns `BotError::Config` when the ledger file is unreadable or
    /// malformed.
    pub fn open<P: ChatPlatform>(
        settings: ServiceSettings,
        platform: Arc<P>,
        fatal: FatalReporter,
    ) -> Result<Self> {
        let registry = PollRegistry::new();
        let store = PollStore::new(settings.polls_path.clone());
        let ledger = PointsLedger::load(settings.ledger_path.clone())?;
        let scheduler = PollScheduler::new(fatal);

        let mut engine = ConclusionEngine::new(
            registry.clone(),
            store.clone(),
            ledger.clone(),
            platform.clone(),
            platform.clone(),
            settings.reactions.clone(),
        );
        if let Some(self_id) = &settings.self_id {
            engine = engine.with_self_id(self_id.clone());
        }

        Ok(Self {
            registry,
            store,
            ledger,
            scheduler,
            engine: Arc::new(engine),
            poster: platform.clone(),
            names: platform,
            settings,
        })
    }

    /// Recover persisted polls: conclude the expired ones, re-arm the rest.
    ///
    /// # Errors
    /// Propagates fatal store and ledger errors.
    pub async fn start(&self) -> Result<RecoveryReport> {
        Recovery {
            store: &self.store,
            registry: &self.registry,
            scheduler: &self.scheduler,
            engine: &self.engine,
        }
        .run_at(Utc::now())
        .await
    }

    /// Open a poll: post it, register it, persist it and arm its deadline.
    ///
    /// # Errors
    /// `InvalidProposal` for bad input, `Config` (fatal) when the poll
    /// duration cannot be added to the clock, `Platform` when the poll message
    /// cannot be posted, `Persistence` (fatal) when the store cannot be
    /// written.
    pub async fn propose(&self, request: ProposalRequest) -> Result<PollRecord> {
        let reason = validate_proposal(&request)?;

        let expires_at = chrono::Duration::from_std(self.settings.poll_duration)
            .ok()
            .and_then(|duration| Utc::now().checked_add_signed(duration))
            .ok_or_else(|| {
                BotError::Config(format!(
                    "poll duration of {}s is out of range",
                    self.settings.poll_duration.as_secs()
                ))
            })?;

        let text = format!(
            "{} proposes {} points for <@{}>: \"{reason}\"\nReact {} to approve or {} to reject. Voting closes <t:{}:R>.",
            request
                .creator_id
                .as_deref()
                .map(|id| format!("<@{id}>"))
                .unwrap_or_else(|| "Someone".to_owned()),
            format_delta(request.point_delta),
            request.beneficiary_id,
            self.settings.reactions.approve,
            self.settings.reactions.reject,
            expires_at.timestamp(),
        );
        let reactions = [
            self.settings.reactions.approve.as_str(),
            self.settings.reactions.reject.as_str(),
        ];
        let message_id = self
            .poster
            .post_poll(&request.channel_id, &text, &reactions)
            .await?;

        let record = PollRecord {
            message_id,
            channel_id: request.channel_id,
            beneficiary_id: request.beneficiary_id,
            creator_id: request.creator_id,
            point_delta: request.point_delta,
            reason,
            expires_at,
        };

        self.registry.register(record.clone());
        self.store.save(&self.registry)?;
        let handler: Arc<dyn ExpiryHandler> = self.engine.clone();
        self.scheduler.arm(&record, handler);

        info!(
            message_id = %record.message_id,
            beneficiary = %record.beneficiary_id,
            delta = record.point_delta,
            "poll opened"
        );
        Ok(record)
    }

    /// Conclude a poll before its deadline. Allowed for the poll's creator
    /// and configured admins.
    ///
    /// # Errors
    /// `PollNotFound` when the poll is not pending, `NotPermitted` for other
    /// requesters, `Persistence` (fatal) from the conclusion itself.
    pub async fn conclude_now(&self, message_id: &str, requester_id: &str) -> Result<PollOutcome> {
        let record = self
            .registry
            .lookup(message_id)
            .ok_or_else(|| BotError::PollNotFound(message_id.to_owned()))?;

        let is_creator = record.creator_id.as_deref() == Some(requester_id);
        let is_admin = self
            .settings
            .admin_user_ids
            .iter()
            .any(|id| id == requester_id);
        if !is_creator && !is_admin {
            return Err(BotError::NotPermitted(
                "only the poll's creator or an admin can close it early".to_owned(),
            ));
        }

        self.engine
            .conclude(message_id)
            .await?
            .ok_or_else(|| BotError::PollNotFound(message_id.to_owned()))
    }

    /// Rendered top-N leaderboard.
    pub async fn leaderboard(&self) -> String {
        // Rank everyone so rows skipped for unknown names are backfilled.
        let ranked = rank(self.ledger.balances());
        render_leaderboard(
            &ranked,
            self.settings.leaderboard_size,
            &self.settings.rank_markers,
            self.names.as_ref(),
        )
        .await
    }

    /// Current balance of one participant.
    #[must_use]
    pub fn balance(&self, participant_id: &str) -> i64 {
        self.ledger.balance(participant_id)
    }

    /// Pending polls, soonest deadline first.
    #[must_use]
    pub fn pending(&self) -> Vec<PollRecord> {
        self.registry.snapshot()
    }

    /// Stop all poll timers. Pending polls stay in the store.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("{} polls left pending for next start", self.registry.len());
    }
}

fn validate_proposal(request: &ProposalRequest) -> Result<String> {
    if request.point_delta == 0 {
        return Err(BotError::InvalidProposal(
            "point change must not be zero".to_owned(),
        ));
    }
    if request.beneficiary_id.trim().is_empty() {
        return Err(BotError::InvalidProposal("no participant named".to_owned()));
    }
    if request.channel_id.trim().is_empty() {
        return Err(BotError::InvalidProposal("no channel for the poll".to_owned()));
    }
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(BotError::InvalidProposal("a reason is required".to_owned()));
    }
    if reason.chars().count() > MAX_REASON_CHARS {
        return Err(BotError::InvalidProposal(format!(
            "reason is longer than {MAX_REASON_CHARS} characters"
        )));
    }
    Ok(reason.to_owned())
}
