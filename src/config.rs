//! Configuration for the points bot.
//!
//! Loaded from TOML. Every section and field has a default, so an empty file
//! (or no file) is a valid configuration apart from the bot token, which can
//! also come from `FOULBOT_DISCORD_TOKEN`.

use crate::error::{BotError, Result};
use crate::ledger::RankMarkers;
use crate::ledger::leaderboard::DEFAULT_RANK_MARKERS;
use crate::polls::VoteReactions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `discord.bot_token`.
pub const TOKEN_ENV: &str = "FOULBOT_DISCORD_TOKEN";

/// Environment variable naming the config file to load.
pub const CONFIG_PATH_ENV: &str = "FOULBOT_CONFIG";

/// Longest accepted poll duration: one year.
pub const MAX_POLL_DURATION_SECS: u64 = 365 * 24 * 3600;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Discord connection settings.
    pub discord: DiscordConfig,
    /// Where polls and balances are persisted.
    pub storage: StorageConfig,
    /// Poll timing and vote reactions.
    pub polls: PollConfig,
    /// Leaderboard size and rank markers.
    pub leaderboard: LeaderboardConfig,
    /// Text command surface.
    pub commands: CommandConfig,
}

/// Discord connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token. Prefer `FOULBOT_DISCORD_TOKEN` over writing it to disk.
    pub bot_token: String,
    /// REST API base URL.
    pub api_base: String,
    /// Channels that accept commands. Empty means all channels.
    pub allowed_channel_ids: Vec<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: "https://discord.com/api/v10".to_owned(),
            allowed_channel_ids: Vec::new(),
        }
    }
}

/// Persisted state locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// State directory. `None` uses the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// Pending polls file name, relative to `data_dir`.
    pub polls_file: String,
    /// Points ledger file name, relative to `data_dir`.
    pub ledger_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            polls_file: "polls.json".to_owned(),
            ledger_file: "points.json".to_owned(),
        }
    }
}

impl StorageConfig {
    /// Resolved state directory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(crate::app_dirs::data_dir)
    }

    /// Full path of the poll store.
    #[must_use]
    pub fn polls_path(&self) -> PathBuf {
        self.data_dir().join(&self.polls_file)
    }

    /// Full path of the points ledger.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir().join(&self.ledger_file)
    }

    /// Daily rolling log files.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

/// Poll timing and vote reactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// How long a poll stays open, in seconds.
    pub duration_secs: u64,
    /// Reaction counted as approval.
    pub approve_reaction: String,
    /// Reaction counted as rejection.
    pub reject_reaction: String,
    /// Reactors fetched per reaction (Discord caps this at 100).
    pub tally_page_size: u16,
}

impl Default for PollConfig {
    fn default() -> Self {
        let reactions = VoteReactions::default();
        Self {
            duration_secs: 24 * 3600,
            approve_reaction: reactions.approve,
            reject_reaction: reactions.reject,
            tally_page_size: reactions.page_size,
        }
    }
}

impl PollConfig {
    /// Poll lifetime.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Reactions the conclusion engine counts.
    #[must_use]
    pub fn vote_reactions(&self) -> VoteReactions {
        VoteReactions {
            approve: self.approve_reaction.clone(),
            reject: self.reject_reaction.clone(),
            page_size: self.tally_page_size,
        }
    }
}

/// Leaderboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Rows shown.
    pub size: usize,
    /// One marker per row, in rank order.
    pub rank_markers: Vec<String>,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_RANK_MARKERS.len(),
            rank_markers: DEFAULT_RANK_MARKERS.iter().map(|m| (*m).to_owned()).collect(),
        }
    }
}

impl LeaderboardConfig {
    /// Validated marker table.
    ///
    /// # Errors
    /// Returns `BotError::Config` when the markers do not cover `size` rows.
    pub fn rank_markers(&self) -> Result<RankMarkers> {
        RankMarkers::new(self.rank_markers.clone(), self.size)
    }
}

/// Text command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Prefix that marks a message as a bot command.
    pub prefix: String,
    /// Users allowed to close any poll early.
    pub admin_user_ids: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            prefix: "!points".to_owned(),
            admin_user_ids: Vec::new(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BotError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| BotError::Config(e.to_string()))
    }

    /// Load from `FOULBOT_CONFIG`, else the default path when it exists,
    /// else defaults. Environment overrides are applied last.
    ///
    /// # Errors
    /// Returns an error if a named config file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            Self::from_file(Path::new(&path))?
        } else {
            let path = Self::default_config_path();
            if path.is_file() {
                Self::from_file(&path)?
            } else {
                Self::default()
            }
        };

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.discord.bot_token = token.trim().to_owned();
            }
        }
        Ok(config)
    }

    /// Default config file path: `<config dir>/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_dir().join("config.toml")
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `BotError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.polls.duration_secs == 0 {
            return Err(BotError::Config(
                "polls.duration_secs must be positive".to_owned(),
            ));
        }
        if self.polls.duration_secs > MAX_POLL_DURATION_SECS {
            return Err(BotError::Config(format!(
                "polls.duration_secs must be at most {MAX_POLL_DURATION_SECS}"
            )));
        }
        if !(1..=100).contains(&self.polls.tally_page_size) {
            return Err(BotError::Config(
                "polls.tally_page_size must be between 1 and 100".to_owned(),
            ));
        }
        let approve = self.polls.approve_reaction.trim();
        let reject = self.polls.reject_reaction.trim();
        if approve.is_empty() || reject.is_empty() {
            return Err(BotError::Config("vote reactions must not be empty".to_owned()));
        }
        if approve == reject {
            return Err(BotError::Config(
                "approve and reject reactions must differ".to_owned(),
            ));
        }
        if self.commands.prefix.trim().is_empty() {
            return Err(BotError::Config("commands.prefix must not be empty".to_owned()));
        }
        if self.storage.polls_file == self.storage.ledger_file {
            return Err(BotError::Config(
                "poll store and ledger must use different files".to_owned(),
            ));
        }
        self.leaderboard.rank_markers()?;
        Ok(())
    }
}
