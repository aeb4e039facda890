//! Foulbot: community points awarded by reaction-vote polls.
//!
//! A member proposes a point change for another member. The bot posts a poll
//! message, and when the poll's deadline passes the approve and reject
//! reactions are counted. A strict majority of approvals applies the change
//! to the points ledger.
//!
//! # Architecture
//!
//! - **Polls**: in-memory registry, durable store, per-poll deadline timers,
//!   the conclusion engine and startup recovery
//! - **Ledger**: persisted balances and the leaderboard
//! - **Platform**: chat traits and their Discord REST/gateway implementation
//! - **Service / commands**: the operations exposed to `!points` commands

pub mod app_dirs;
pub mod commands;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod persist;
pub mod platform;
pub mod polls;
pub mod service;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::BotConfig;
pub use error::{BotError, FatalReporter, Result};
pub use service::{PointsService, ProposalRequest, ServiceSettings};
