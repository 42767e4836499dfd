//! bdbot configuration system.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BdBotError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BdBotConfig {
    /// First hour of the day a pass may run (inclusive).
    #[serde(default = "default_workday_start")]
    pub workday_start: u32,
    /// Last hour of the day a pass may run (inclusive).
    #[serde(default = "default_workday_end")]
    pub workday_end: u32,
    /// IANA time zone name used for the workday window and birthday math.
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_manager_bucket")]
    pub manager_bucket: String,
    #[serde(default = "default_channel_bucket")]
    pub channel_bucket: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

fn default_workday_start() -> u32 { 10 }
fn default_workday_end() -> u32 { 19 }
fn default_location() -> String { "UTC".into() }
fn default_check_interval() -> u64 { 3600 }
fn default_manager_bucket() -> String { "manager".into() }
fn default_channel_bucket() -> String { "channel".into() }
fn default_db_path() -> String { "~/.bdbot/cache.db".into() }

impl Default for BdBotConfig {
    fn default() -> Self {
        Self {
            workday_start: default_workday_start(),
            workday_end: default_workday_end(),
            location: default_location(),
            check_interval_secs: default_check_interval(),
            manager_bucket: default_manager_bucket(),
            channel_bucket: default_channel_bucket(),
            db_path: default_db_path(),
            slack: SlackConfig::default(),
            messages: MessagesConfig::default(),
        }
    }
}

impl BdBotConfig {
    /// Load config from the default path (~/.bdbot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            return Err(BdBotError::Config(format!(
                "Config file not found at {}",
                path.display()
            )));
        }
        Self::load_from(&path)
    }

    /// Load and validate config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BdBotError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| BdBotError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the bdbot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bdbot")
    }

    /// Cache database path with `~` expanded.
    pub fn expanded_db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).to_string())
    }

    /// Parsed time zone.
    pub fn timezone(&self) -> Result<Tz> {
        self.location.parse::<Tz>().map_err(|_| {
            BdBotError::Config(format!("location '{}' is not a valid time zone", self.location))
        })
    }

    /// Check every required field and invariant.
    pub fn validate(&self) -> Result<()> {
        fn required(value: &str, name: &str) -> Result<()> {
            if value.trim().is_empty() {
                return Err(BdBotError::Config(format!("{name} can't be empty")));
            }
            Ok(())
        }

        required(&self.manager_bucket, "manager_bucket")?;
        required(&self.channel_bucket, "channel_bucket")?;
        if self.manager_bucket == self.channel_bucket {
            return Err(BdBotError::Config(
                "manager_bucket and channel_bucket must differ".into(),
            ));
        }
        if self.workday_end > 23 {
            return Err(BdBotError::Config("workday_end must be within 0..=23".into()));
        }
        if self.workday_start >= self.workday_end {
            return Err(BdBotError::Config(
                "workday_start can't be higher than or equal to workday_end".into(),
            ));
        }
        if self.check_interval_secs == 0 {
            return Err(BdBotError::Config("check_interval_secs can't be zero".into()));
        }
        self.timezone()?;

        let slack = &self.slack;
        required(&slack.bot_token, "slack.bot_token")?;
        required(&slack.api_token, "slack.api_token")?;
        required(&slack.main_channel_id, "slack.main_channel_id")?;
        required(&slack.manager_id, "slack.manager_id")?;
        if slack.bd_threshold_low <= 0 {
            return Err(BdBotError::Config("slack.bd_threshold_low must be positive".into()));
        }
        if slack.bd_threshold_high < slack.bd_threshold_low {
            return Err(BdBotError::Config(
                "slack.bd_threshold_low can't be higher than slack.bd_threshold_high".into(),
            ));
        }
        if slack.reconnect_retry_limit == 0 {
            return Err(BdBotError::Config(
                "slack.reconnect_retry_limit can't be zero".into(),
            ));
        }
        if slack.blacklist.is_empty() {
            tracing::warn!("blacklist is empty");
        }

        let m = &self.messages;
        required(&m.shutdown_error, "messages.shutdown_error")?;
        required(&m.profile_error, "messages.profile_error")?;
        required(&m.bd_parse_error, "messages.bd_parse_error")?;
        required(&m.personal_incoming, "messages.personal_incoming")?;
        required(&m.personal_today, "messages.personal_today")?;
        required(&m.manager_announce, "messages.manager_announce")?;
        required(&m.channel_announce, "messages.channel_announce")?;
        Ok(())
    }
}

/// Slack workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Token for the realtime connection.
    #[serde(default)]
    pub bot_token: String,
    /// Token for Web API calls (roster, channels, invites).
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub main_channel_id: String,
    #[serde(default)]
    pub manager_id: String,
    /// Manager heads-up starts this many days before the birthday.
    #[serde(default)]
    pub bd_threshold_high: i64,
    /// Channel announcement starts this many days before the birthday.
    #[serde(default)]
    pub bd_threshold_low: i64,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default = "default_bot_username")]
    pub bot_username: String,
    #[serde(default = "default_icon_emoji")]
    pub icon_emoji: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_request_retries")]
    pub request_retries: u32,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_retry_limit")]
    pub reconnect_retry_limit: u32,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_api_url() -> String { "https://slack.com/api".into() }
fn default_bot_username() -> String { "Birthday Bot".into() }
fn default_icon_emoji() -> String { ":cake:".into() }
fn default_request_timeout() -> u64 { 2000 }
fn default_request_retries() -> u32 { 3 }
fn default_read_timeout() -> u64 { 100 }
fn default_retry_limit() -> u32 { 3 }
fn default_reconnect_delay() -> u64 { 5000 }

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_token: String::new(),
            api_url: default_api_url(),
            main_channel_id: String::new(),
            manager_id: String::new(),
            bd_threshold_high: 0,
            bd_threshold_low: 0,
            blacklist: Vec::new(),
            bot_username: default_bot_username(),
            icon_emoji: default_icon_emoji(),
            request_timeout_ms: default_request_timeout(),
            request_retries: default_request_retries(),
            read_timeout_ms: default_read_timeout(),
            reconnect_retry_limit: default_retry_limit(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

/// Message templates. Placeholders: `{user}`, `{days}`, `{name}`, `{date}`,
/// `{manager}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Broadcast before a manager-requested shutdown. Empty disables it.
    #[serde(default)]
    pub shutdown_announce: String,
    #[serde(default)]
    pub shutdown_error: String,
    #[serde(default)]
    pub profile_error: String,
    #[serde(default)]
    pub bd_parse_error: String,
    #[serde(default)]
    pub personal_incoming: String,
    #[serde(default)]
    pub personal_today: String,
    #[serde(default)]
    pub manager_announce: String,
    #[serde(default)]
    pub channel_announce: String,
}

fn default_greeting() -> String { "<@{user}> hello!".into() }

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            shutdown_announce: String::new(),
            shutdown_error: String::new(),
            profile_error: String::new(),
            bd_parse_error: String::new(),
            personal_incoming: String::new(),
            personal_today: String::new(),
            manager_announce: String::new(),
            channel_announce: String::new(),
        }
    }
}

/// Substitute `{key}` placeholders in a template in a single pass. Values
/// are copied as-is, so braces inside them are never expanded. Unknown
/// placeholders are left untouched.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        match vars.iter().find(|(key, _)| *key == &after[..close]) {
            Some((_, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
