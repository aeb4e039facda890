//! Text command parsing and dispatch.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `!points propose <@user> <+N\|-N> <reason>` | open a poll |
//! | `!points close <messageId>` | conclude a poll early |
//! | `!points leaderboard` | top balances |
//! | `!points balance [<@user>]` | one balance, default the caller |
//! | `!points pending` | open polls |

use crate::error::FatalReporter;
use crate::platform::{InboundMessage, NotificationSink};
use crate::service::{PointsService, ProposalRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A parsed text command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Propose {
        beneficiary_id: String,
        point_delta: i64,
        reason: String,
    },
    Close {
        message_id: String,
    },
    Leaderboard,
    Balance {
        /// `None` means the caller.
        participant_id: Option<String>,
    },
    Pending,
    Help,
}

/// Why a prefixed message could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` is not a user mention")]
    BadMention(String),
    #[error("`{0}` is not a whole number of points")]
    BadDelta(String),
    #[error("missing {0}")]
    Missing(&'static str),
}

/// Usage text replied after a parse error or `help`.
#[must_use]
pub fn usage(prefix: &str) -> String {
    format!(
        "Usage:\n\
         `{prefix} propose <@user> <+N|-N> <reason>`\n\
         `{prefix} close <messageId>`\n\
         `{prefix} leaderboard`\n\
         `{prefix} balance [<@user>]`\n\
         `{prefix} pending`"
    )
}

/// Parse `content` as a command. Returns `None` when it does not start with
/// `prefix` as a whole word.
pub fn parse_command(prefix: &str, content: &str) -> Option<Result<Command, CommandError>> {
    let rest = content.trim().strip_prefix(prefix)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut words = rest.split_whitespace();
    let Some(verb) = words.next() else {
        return Some(Ok(Command::Help));
    };

    let parsed = match verb.to_ascii_lowercase().as_str() {
        "propose" => parse_propose(words),
        "close" => words
            .next()
            .map(|id| Command::Close {
                message_id: id.to_owned(),
            })
            .ok_or(CommandError::Missing("message id")),
        "leaderboard" | "top" => Ok(Command::Leaderboard),
        "balance" => match words.next() {
            None => Ok(Command::Balance {
                participant_id: None,
            }),
            Some(word) => parse_mention(word).map(|id| Command::Balance {
                participant_id: Some(id),
            }),
        },
        "pending" => Ok(Command::Pending),
        "help" => Ok(Command::Help),
        other => Err(CommandError::Unknown(other.to_owned())),
    };
    Some(parsed)
}

fn parse_propose<'a>(mut words: impl Iterator<Item = &'a str>) -> Result<Command, CommandError> {
    let mention = words.next().ok_or(CommandError::Missing("user"))?;
    let beneficiary_id = parse_mention(mention)?;

    let delta = words.next().ok_or(CommandError::Missing("point change"))?;
    let point_delta = delta
        .parse::<i64>()
        .map_err(|_| CommandError::BadDelta(delta.to_owned()))?;

    let reason = words.collect::<Vec<_>>().join(" ");
    if reason.is_empty() {
        return Err(CommandError::Missing("reason"));
    }

    Ok(Command::Propose {
        beneficiary_id,
        point_delta,
        reason,
    })
}

/// Accepts `<@id>`, `<@!id>` or a bare id.
fn parse_mention(word: &str) -> Result<String, CommandError> {
    let id = word
        .strip_prefix("<@")
        .and_then(|inner| inner.strip_suffix('>'))
        .map(|inner| inner.trim_start_matches('!'))
        .unwrap_or(word);
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id.to_owned())
    } else {
        Err(CommandError::BadMention(word.to_owned()))
    }
}

/// Routes inbound messages to the [`PointsService`] and replies in-channel.
pub struct CommandRouter {
    service: Arc<PointsService>,
    replies: Arc<dyn NotificationSink>,
    prefix: String,
    fatal: FatalReporter,
}

impl CommandRouter {
    #[must_use]
    pub fn new(
        service: Arc<PointsService>,
        replies: Arc<dyn NotificationSink>,
        prefix: impl Into<String>,
        fatal: FatalReporter,
    ) -> Self {
        Self {
            service,
            replies,
            prefix: prefix.into(),
            fatal,
        }
    }

    /// Handle one message and return the reply text, if any. Fatal service
    /// errors are forwarded to the fatal channel.
    pub async fn handle(&self, message: &InboundMessage) -> Option<String> {
        let command = match parse_command(&self.prefix, &message.content)? {
            Ok(command) => command,
            Err(e) => return Some(format!("{e}\n{}", usage(&self.prefix))),
        };
        debug!(
            "command {} from {}: {command:?}",
            message.message_id, message.author_id
        );

        match command {
            Command::Propose {
                beneficiary_id,
                point_delta,
                reason,
            } => {
                let request = ProposalRequest {
                    beneficiary_id,
                    point_delta,
                    reason,
                    creator_id: Some(message.author_id.clone()),
                    channel_id: message.channel_id.clone(),
                };
                // The poll message itself is the reply.
                match self.service.propose(request).await {
                    Ok(_) => None,
                    Err(e) => self.reply_error("propose", e),
                }
            }
            Command::Close { message_id } => {
                // The conclusion engine announces the result.
                match self
                    .service
                    .conclude_now(&message_id, &message.author_id)
                    .await
                {
                    Ok(_) => None,
                    Err(e) => self.reply_error("close", e),
                }
            }
            Command::Leaderboard => Some(self.service.leaderboard().await),
            Command::Balance { participant_id } => {
                let id = participant_id.unwrap_or_else(|| message.author_id.clone());
                Some(format!("<@{id}> has {} points.", self.service.balance(&id)))
            }
            Command::Pending => Some(render_pending(&self.service)),
            Command::Help => Some(usage(&self.prefix)),
        }
    }

    fn reply_error(&self, context: &str, err: crate::error::BotError) -> Option<String> {
        let text = err.to_string();
        if self.fatal.report(context, err) {
            return Some("Points are unavailable right now.".to_owned());
        }
        Some(text)
    }

    /// Consume messages until the channel closes or `shutdown` fires.
    pub async fn run(&self, mut inbound: mpsc::Receiver<InboundMessage>, shutdown: CancellationToken) {
        loop {
            let message = tokio::select! {
                () = shutdown.cancelled() => break,
                next = inbound.recv() => match next {
                    Some(message) => message,
                    None => break,
                },
            };

            let Some(reply) = self.handle(&message).await else {
                continue;
            };
            if let Err(e) = self.replies.notify(&message.channel_id, &reply).await {
                warn!("failed to reply in {}: {e}", message.channel_id);
            }
        }
        info!("command router stopped");
    }
}

fn render_pending(service: &PointsService) -> String {
    let pending = service.pending();
    if pending.is_empty() {
        return "No polls are open.".to_owned();
    }
    pending
        .iter()
        .map(|poll| {
            format!(
                "`{}` {} for <@{}>: \"{}\" closes <t:{}:R>",
                poll.message_id,
                crate::polls::record::format_delta(poll.point_delta),
                poll.beneficiary_id,
                poll.reason,
                poll.expires_at.timestamp()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
