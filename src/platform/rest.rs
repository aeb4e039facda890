use crate::error::{BotError, Result};
use crate::platform::traits::{DisplayNameResolver, NotificationSink, PollPoster, VoteTallySource};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Discord REST API client.
#[derive(Debug, Clone)]
pub struct DiscordRest {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
}

impl DiscordRest {
    #[must_use]
    pub fn new(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// REST base URL, without a trailing slash.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub(crate) fn bot_token(&self) -> &str {
        &self.bot_token
    }

    /// Our own user id from `/users/@me`.
    ///
    /// This is also the startup check that the token is accepted and the API
    /// is reachable. Recovery must not run against a platform that cannot
    /// answer tally queries, so any failure is a `Config` error.
    ///
    /// # Errors
    /// Returns `BotError::Config` when the request fails or is rejected.
    pub async fn current_user_id(&self) -> Result<String> {
        self.get::<DiscordUser>("/users/@me")
            .await
            .map(|user| user.id)
            .map_err(|e| BotError::Config(format!("cannot start a Discord session: {e}")))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.bot_token))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .authorize(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(|e| BotError::Platform(format!("GET {path}: {e}")))?;
        let response = check_status("GET", path, response).await?;
        response
            .json()
            .await
            .map_err(|e| BotError::Platform(format!("GET {path}: bad response body: {e}")))
    }

    async fn seed_reaction(&self, channel_id: &str, message_id: &str, reaction: &str) -> Result<()> {
        let path = format!(
            "{}/@me",
            Self::reaction_path(channel_id, message_id, reaction)
        );
        let response = self
            .authorize(self.client.put(self.url(&path)))
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| BotError::Platform(format!("PUT {path}: {e}")))?;
        check_status("PUT", &path, response).await?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) {
        let path = format!("/channels/{channel_id}/messages/{message_id}");
        let result = match self
            .authorize(self.client.delete(self.url(&path)))
            .send()
            .await
        {
            Ok(response) => check_status("DELETE", &path, response).await.map(|_| ()),
            Err(e) => Err(BotError::Platform(format!("DELETE {path}: {e}"))),
        };
        if let Err(e) = result {
            warn!("cannot remove unseeded poll message {message_id}: {e}");
        }
    }

    fn reaction_path(channel_id: &str, message_id: &str, reaction: &str) -> String {
        format!(
            "/channels/{channel_id}/messages/{message_id}/reactions/{}",
            urlencoding::encode(reaction)
        )
    }
}

async fn check_status(
    method: &str,
    path: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(BotError::Platform(format!(
        "{method} {path} failed ({status}): {body}"
    )))
}

#[async_trait]
impl VoteTallySource for DiscordRest {
    async fn reactors(
        &self,
        channel_id: &str,
        message_id: &str,
        reaction: &str,
        limit: u16,
    ) -> Result<Vec<String>> {
        let path = format!(
            "{}?limit={limit}",
            Self::reaction_path(channel_id, message_id, reaction)
        );
        let users: Vec<DiscordUser> = self.get(&path).await?;
        Ok(users.into_iter().map(|u| u.id).collect())
    }
}

#[async_trait]
impl NotificationSink for DiscordRest {
    async fn notify(&self, channel_id: &str, text: &str) -> Result<()> {
        let path = format!("/channels/{channel_id}/messages");
        let body = json!({
            "content": text,
            "allowed_mentions": { "parse": ["users"] }
        });
        let response = self
            .authorize(self.client.post(self.url(&path)))
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Platform(format!("POST {path}: {e}")))?;
        check_status("POST", &path, response).await?;
        Ok(())
    }
}

#[async_trait]
impl PollPoster for DiscordRest {
    async fn post_poll(&self, channel_id: &str, text: &str, reactions: &[&str]) -> Result<String> {
        let path = format!("/channels/{channel_id}/messages");
        let body = json!({
            "content": text,
            "allowed_mentions": { "parse": ["users"] }
        });
        let response = self
            .authorize(self.client.post(self.url(&path)))
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Platform(format!("POST {path}: {e}")))?;
        let message: DiscordMessage = check_status("POST", &path, response)
            .await?
            .json()
            .await
            .map_err(|e| BotError::Platform(format!("POST {path}: bad response body: {e}")))?;

        for reaction in reactions {
            if let Err(e) = self.seed_reaction(channel_id, &message.id, reaction).await {
                // Nothing will ever conclude a poll we do not register.
                self.delete_message(channel_id, &message.id).await;
                return Err(e);
            }
        }

        debug!("posted poll message {} in {channel_id}", message.id);
        Ok(message.id)
    }
}

#[async_trait]
impl DisplayNameResolver for DiscordRest {
    async fn display_name(&self, participant_id: &str) -> Result<String> {
        let user: DiscordUser = self.get(&format!("/users/{participant_id}")).await?;
        Ok(user
            .global_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(user.username))
    }
}
