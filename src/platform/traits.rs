use crate::error::Result;
use async_trait::async_trait;

/// Chat message received from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel_id: String,
    pub author_id: String,
    pub message_id: String,
    pub content: String,
}

/// Source of reaction votes on a poll message.
#[async_trait]
pub trait VoteTallySource: Send + Sync {
    /// Participant ids that reacted to `message_id` with `reaction`, up to
    /// `limit` entries.
    async fn reactors(
        &self,
        channel_id: &str,
        message_id: &str,
        reaction: &str,
        limit: u16,
    ) -> Result<Vec<String>>;
}

/// Best-effort sink for human-readable results.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Post `text` to `channel_id`.
    async fn notify(&self, channel_id: &str, text: &str) -> Result<()>;
}

/// Posts a new poll message and returns the id the platform assigned to it.
#[async_trait]
pub trait PollPoster: Send + Sync {
    /// Post `text` to `channel_id`, seed it with each of `reactions`, and
    /// return the new message id.
    async fn post_poll(&self, channel_id: &str, text: &str, reactions: &[&str]) -> Result<String>;
}

/// Resolves participant ids to display names.
#[async_trait]
pub trait DisplayNameResolver: Send + Sync {
    /// Human-readable name for `participant_id`.
    async fn display_name(&self, participant_id: &str) -> Result<String>;
}
