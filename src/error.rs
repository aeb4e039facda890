//! Error types for the points bot.

use tokio::sync::mpsc;
use tracing::{error, warn};

/// Top-level error type for poll, ledger and platform operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Configuration or startup state error.
    #[error("config error: {0}")]
    Config(String),

    /// Durable state (poll store or ledger) could not be written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Chat platform call failed (REST, gateway, reactions).
    #[error("platform error: {0}")]
    Platform(String),

    /// A proposal was rejected before a poll was created.
    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    /// No pending poll with the given message id.
    #[error("no pending poll for message {0}")]
    PollNotFound(String),

    /// The requester may not perform the operation.
    #[error("not permitted: {0}")]
    NotPermitted(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Returns `true` when the process must stop rather than continue with
    /// in-memory state that no longer matches disk.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Persistence(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BotError>;

/// Hands fatal errors from background tasks to the process owner, which
/// shuts down instead of running on with state it could not persist.
#[derive(Debug, Clone)]
pub struct FatalReporter {
    tx: mpsc::UnboundedSender<BotError>,
}

impl FatalReporter {
    /// Create a reporter and the receiver the process owner waits on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BotError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Log `err` and forward it when fatal. Returns `true` if it was fatal.
    pub fn report(&self, context: &str, err: BotError) -> bool {
        if !err.is_fatal() {
            warn!("{context}: {err}");
            return false;
        }
        error!("{context}: {err}");
        if self.tx.send(err).is_err() {
            error!("fatal error receiver dropped");
        }
        true
    }
}
