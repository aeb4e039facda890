//! Shared test utilities used across multiple test modules.

use crate::error::{BotError, Result};
use crate::platform::{DisplayNameResolver, NotificationSink, PollPoster, VoteTallySource};
use crate::polls::record::PollRecord;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Pending poll for `beneficiary_id` that expires in one hour.
pub fn sample_record(message_id: &str, beneficiary_id: &str, delta: i64) -> PollRecord {
    PollRecord {
        message_id: message_id.to_owned(),
        channel_id: "chan".to_owned(),
        beneficiary_id: beneficiary_id.to_owned(),
        creator_id: Some("creator".to_owned()),
        point_delta: delta,
        reason: "demo".to_owned(),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

/// In-memory chat platform.
///
/// Every poll message carries the bot's own seed reactions in addition to the
/// votes configured with [`set_votes`](Self::set_votes).
pub struct FakeChat {
    bot_id: String,
    votes: Mutex<HashMap<String, (usize, usize)>>,
    notifications: Mutex<Vec<(String, String)>>,
    posted: Mutex<Vec<(String, String)>>,
    next_id: AtomicU64,
    tally_fails: AtomicBool,
    notify_fails: AtomicBool,
    post_fails: AtomicBool,
    tally_delay: Mutex<std::time::Duration>,
}

impl FakeChat {
    pub fn new(bot_id: &str) -> Self {
        Self {
            bot_id: bot_id.to_owned(),
            votes: Mutex::new(HashMap::new()),
            notifications: Mutex::new(Vec::new()),
            posted: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            tally_fails: AtomicBool::new(false),
            notify_fails: AtomicBool::new(false),
            post_fails: AtomicBool::new(false),
            tally_delay: Mutex::new(std::time::Duration::ZERO),
        }
    }

    pub fn set_votes(&self, message_id: &str, approvals: usize, rejections: usize) {
        self.votes
            .lock()
            .unwrap()
            .insert(message_id.to_owned(), (approvals, rejections));
    }

    pub fn fail_tally(&self, fail: bool) {
        self.tally_fails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_notify(&self, fail: bool) {
        self.notify_fails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_post(&self, fail: bool) {
        self.post_fails.store(fail, Ordering::SeqCst);
    }

    /// Make every reaction query take `delay` of tokio time.
    pub fn set_tally_delay(&self, delay: std::time::Duration) {
        *self.tally_delay.lock().unwrap() = delay;
    }

    /// `(channel, text)` pairs sent through the notification sink.
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    /// `(channel, text)` pairs posted as polls.
    pub fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoteTallySource for FakeChat {
    async fn reactors(
        &self,
        _channel_id: &str,
        message_id: &str,
        reaction: &str,
        limit: u16,
    ) -> Result<Vec<String>> {
        let delay = *self.tally_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.tally_fails.load(Ordering::SeqCst) {
            return Err(BotError::Platform("reactions unavailable".to_owned()));
        }
        let (approvals, rejections) = self
            .votes
            .lock()
            .unwrap()
            .get(message_id)
            .copied()
            .unwrap_or_default();
        let (prefix, count) = if reaction == "✅" {
            ("approver", approvals)
        } else {
            ("rejecter", rejections)
        };

        let mut ids = vec![self.bot_id.clone()];
        ids.extend((0..count).map(|i| format!("{prefix}-{i}")));
        ids.truncate(usize::from(limit));
        Ok(ids)
    }
}

#[async_trait]
impl NotificationSink for FakeChat {
    async fn notify(&self, channel_id: &str, text: &str) -> Result<()> {
        if self.notify_fails.load(Ordering::SeqCst) {
            return Err(BotError::Platform("send failed".to_owned()));
        }
        self.notifications
            .lock()
            .unwrap()
            .push((channel_id.to_owned(), text.to_owned()));
        Ok(())
    }
}

#[async_trait]
impl PollPoster for FakeChat {
    async fn post_poll(&self, channel_id: &str, text: &str, _reactions: &[&str]) -> Result<String> {
        if self.post_fails.load(Ordering::SeqCst) {
            return Err(BotError::Platform("post failed".to_owned()));
        }
        self.posted
            .lock()
            .unwrap()
            .push((channel_id.to_owned(), text.to_owned()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("msg-{id}"))
    }
}

#[async_trait]
impl DisplayNameResolver for FakeChat {
    async fn display_name(&self, participant_id: &str) -> Result<String> {
        if participant_id.starts_with("gone") {
            return Err(BotError::Platform(format!("unknown user {participant_id}")));
        }
        Ok(format!("@{participant_id}"))
    }
}
