use crate::platform::rest::DiscordRest;
use crate::platform::traits::InboundMessage;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
const INTENTS: u64 = 33281;

const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Discord gateway websocket reader that forwards channel messages.
pub struct DiscordGateway {
    rest: DiscordRest,
    bot_user_id: String,
    allowed_channel_ids: Vec<String>,
}

enum SessionEnd {
    Shutdown,
    Reconnect,
}

impl DiscordGateway {
    #[must_use]
    pub fn new(rest: DiscordRest, bot_user_id: String, allowed_channel_ids: Vec<String>) -> Self {
        Self {
            rest,
            bot_user_id,
            allowed_channel_ids,
        }
    }

    /// Keep a gateway session open until `shutdown` fires, reconnecting with
    /// exponential backoff after errors.
    ///
    /// # Errors
    /// Returns an error when the inbound receiver has been dropped.
    pub async fn run(
        &self,
        inbound_tx: mpsc::Sender<InboundMessage>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let mut backoff = Duration::from_secs(1);
        loop {
            match self.session(&inbound_tx, &shutdown).await {
                Ok(SessionEnd::Shutdown) => return Ok(()),
                Ok(SessionEnd::Reconnect) => {
                    backoff = Duration::from_secs(1);
                    info!("discord gateway asked for reconnect");
                }
                Err(e) => {
                    if inbound_tx.is_closed() {
                        anyhow::bail!("inbound command channel closed");
                    }
                    warn!("discord gateway session ended: {e}; retrying in {}s", backoff.as_secs());
                }
            }

            tokio::select! {
                () = shutdown.cancelled() => return Ok(()),
                () = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(RECONNECT_BACKOFF_MAX);
        }
    }

    async fn session(
        &self,
        inbound_tx: &mpsc::Sender<InboundMessage>,
        shutdown: &CancellationToken,
    ) -> anyhow::Result<SessionEnd> {
        let gateway_resp: serde_json::Value = reqwest::Client::new()
            .get(format!("{}/gateway/bot", self.rest.api_base()))
            .header("Authorization", format!("Bot {}", self.rest.bot_token()))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let gateway_url = gateway_resp
            .get("url")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("wss://gateway.discord.gg");
        let ws_url = format!("{gateway_url}/?v=10&encoding=json");

        let (stream, _) = tokio_tungstenite::connect_async(&ws_url).await?;
        let (mut write, mut read) = stream.split();

        let hello = read
            .next()
            .await
            .ok_or_else(|| anyhow::anyhow!("no hello"))??;
        let hello_text = match hello {
            Message::Text(text) => text.to_string(),
            _ => anyhow::bail!("unexpected discord hello payload"),
        };
        let hello_json: serde_json::Value = serde_json::from_str(&hello_text)?;
        let heartbeat_interval_ms = hello_json
            .get("d")
            .and_then(|v| v.get("heartbeat_interval"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(41_250);

        let identify = json!({
            "op": 2,
            "d": {
                "token": self.rest.bot_token(),
                "intents": INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "foulbot",
                    "device": "foulbot"
                }
            }
        });
        write.send(Message::Text(identify.to_string())).await?;
        info!("discord gateway connected");

        let mut heartbeat =
            tokio::time::interval(Duration::from_millis(heartbeat_interval_ms));
        let mut sequence = serde_json::Value::Null;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    info!("discord gateway closed");
                    return Ok(SessionEnd::Shutdown);
                }
                _ = heartbeat.tick() => {
                    let beat = json!({"op": 1, "d": sequence});
                    if write.send(Message::Text(beat.to_string())).await.is_err() {
                        anyhow::bail!("discord heartbeat failed");
                    }
                }
                maybe_msg = read.next() => {
                    let raw = match maybe_msg {
                        Some(Ok(Message::Text(text))) => text.to_string(),
                        Some(Ok(Message::Close(_))) | None => {
                            anyhow::bail!("discord websocket closed");
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => anyhow::bail!("discord websocket error: {err}"),
                    };

                    let payload: serde_json::Value = match serde_json::from_str(&raw) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    if let Some(s) = payload.get("s").filter(|s| !s.is_null()) {
                        sequence = s.clone();
                    }

                    match payload.get("op").and_then(serde_json::Value::as_u64) {
                        // Reconnect / invalid session
                        Some(7 | 9) => return Ok(SessionEnd::Reconnect),
                        Some(1) => {
                            let beat = json!({"op": 1, "d": sequence});
                            write.send(Message::Text(beat.to_string())).await?;
                            continue;
                        }
                        _ => {}
                    }

                    let Some(inbound) = self.inbound_from_event(&payload) else {
                        continue;
                    };
                    debug!("command candidate from {} in {}", inbound.author_id, inbound.channel_id);
                    if inbound_tx.send(inbound).await.is_err() {
                        anyhow::bail!("inbound command channel closed");
                    }
                }
            }
        }
    }

    fn is_channel_allowed(&self, channel_id: &str) -> bool {
        if self.allowed_channel_ids.is_empty() {
            return true;
        }
        self.allowed_channel_ids
            .iter()
            .any(|c| c == "*" || c.as_str() == channel_id)
    }

    /// Extract a user message from a `MESSAGE_CREATE` dispatch. Our own
    /// messages, other bots and disallowed channels are ignored.
    fn inbound_from_event(&self, payload: &serde_json::Value) -> Option<InboundMessage> {
        let event_name = payload.get("t").and_then(serde_json::Value::as_str)?;
        if event_name != "MESSAGE_CREATE" {
            return None;
        }
        let data = payload.get("d")?;

        let author = data.get("author")?;
        let author_id = author.get("id").and_then(serde_json::Value::as_str)?;
        if author_id.is_empty() || author_id == self.bot_user_id {
            return None;
        }
        if author
            .get("bot")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
        {
            return None;
        }

        let channel_id = data.get("channel_id").and_then(serde_json::Value::as_str)?;
        if channel_id.is_empty() || !self.is_channel_allowed(channel_id) {
            return None;
        }

        let content = data
            .get("content")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .trim();
        if content.is_empty() {
            return None;
        }

        Some(InboundMessage {
            channel_id: channel_id.to_owned(),
            author_id: author_id.to_owned(),
            message_id: data
                .get("id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            content: content.to_owned(),
        })
    }
}
