//! Command listener with a bounded reconnect loop.
//!
//! ```text
//! Connecting ──ok──▶ Listening ──read error──▶ Connecting
//!     │                  │
//!     └─ N consecutive   └─ "turnoff" from the manager / cancel ─▶ done
//!        failures ─▶ ReconnectExhausted
//! ```

use bdbot_core::birthday::days_until_birthday;
use bdbot_core::config::{BdBotConfig, MessagesConfig, render_template};
use bdbot_core::error::{BdBotError, Result};
use bdbot_core::traits::{RealtimeConnector, RealtimeSession, RosterSource};
use bdbot_core::types::InboundEvent;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Hi,
    Birthday,
    Shutdown,
}

impl Command {
    /// Parse a message that starts with a mention of `self_id`.
    pub fn parse(text: &str, self_id: &str) -> Option<Self> {
        let mention = format!("<@{self_id}>");
        let rest = text.strip_prefix(&mention)?;
        match rest.trim().to_lowercase().as_str() {
            "hi" => Some(Self::Hi),
            "birthday" => Some(Self::Birthday),
            "turnoff" => Some(Self::Shutdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub manager_id: String,
    pub location: Tz,
    pub read_timeout: Duration,
    pub retry_limit: u32,
    pub reconnect_delay: Duration,
    pub messages: MessagesConfig,
}

impl ListenerSettings {
    pub fn from_config(config: &BdBotConfig) -> Result<Self> {
        Ok(Self {
            manager_id: config.slack.manager_id.clone(),
            location: config.timezone()?,
            read_timeout: Duration::from_millis(config.slack.read_timeout_ms),
            retry_limit: config.slack.reconnect_retry_limit,
            reconnect_delay: Duration::from_millis(config.slack.reconnect_delay_ms),
            messages: config.messages.clone(),
        })
    }
}

/// Why a listening session ended without an error.
enum SessionEnd {
    Shutdown,
    Cancelled,
}

pub struct CommandListener<C, R: ?Sized> {
    connector: C,
    roster: Arc<R>,
    settings: ListenerSettings,
}

impl<C, R> CommandListener<C, R>
where
    C: RealtimeConnector,
    R: RosterSource + ?Sized,
{
    pub fn new(connector: C, roster: Arc<R>, settings: ListenerSettings) -> Self {
        Self {
            connector,
            roster,
            settings,
        }
    }

    /// Listen until shutdown or cancellation. `initial` is used before any
    /// connect attempt is made. Only consecutive connect failures count
    /// toward the retry limit.
    pub async fn run(
        &self,
        initial: Option<C::Session>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut pending = initial;
        let mut failures: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                tracing::warn!("Stopping message watcher");
                return Ok(());
            }

            let mut session = match pending.take() {
                Some(session) => session,
                None => match self.connector.connect().await {
                    Ok(session) => {
                        failures = 0;
                        session
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::error!(
                            attempt = failures,
                            limit = self.settings.retry_limit,
                            "Unable to connect to Slack: {e}"
                        );
                        if failures >= self.settings.retry_limit {
                            return Err(BdBotError::ReconnectExhausted(failures));
                        }
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
                        }
                        continue;
                    }
                },
            };

            match self.listen(&mut session, &cancel).await {
                Ok(end) => {
                    if let Err(e) = session.close().await {
                        tracing::debug!("Closing RTM session: {e}");
                    }
                    match end {
                        SessionEnd::Shutdown => tracing::warn!("Shutdown requested by manager"),
                        SessionEnd::Cancelled => tracing::warn!("Stopping message watcher"),
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("RTM session lost, reconnecting: {e}");
                }
            }
        }
    }

    async fn listen(
        &self,
        session: &mut C::Session,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                next = session.next_event(self.settings.read_timeout) => next?,
            };
            let Some(event) = next else { continue };
            if !event.is_message() {
                continue;
            }
            let Some(command) = Command::parse(&event.text, session.self_id()) else {
                continue;
            };
            tracing::debug!(user = %event.user, ?command, "command received");

            if self.handle(session, &event, command).await {
                return Ok(SessionEnd::Shutdown);
            }
        }
    }

    /// Execute one command. Returns true when the listener should stop.
    async fn handle(&self, session: &mut C::Session, event: &InboundEvent, command: Command) -> bool {
        let messages = &self.settings.messages;
        let user = event.user.as_str();
        let (reply, stop) = match command {
            Command::Hi => (render_template(&messages.greeting, &[("user", user)]), false),
            Command::Birthday => (self.birthday_reply(user).await, false),
            Command::Shutdown if user != self.settings.manager_id => {
                tracing::warn!(user, "Shutdown requested by non-manager");
                (messages.shutdown_error.clone(), false)
            }
            Command::Shutdown => (messages.shutdown_announce.clone(), true),
        };

        if !reply.is_empty() {
            if let Err(e) = session.send(&event.channel, &reply).await {
                tracing::error!("Unable to send message to Slack: {e}");
            }
        }
        stop
    }

    async fn birthday_reply(&self, user: &str) -> String {
        let messages = &self.settings.messages;
        let profile = match self.roster.get_profile(user).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::error!(user, "Unable to get user profile: {e}");
                return render_template(&messages.profile_error, &[("user", user)]);
            }
        };

        let now = Utc::now().with_timezone(&self.settings.location);
        match days_until_birthday(&now, &profile.birthday) {
            Err(e) => {
                tracing::error!(user, "Unable to get user birthday info: {e}");
                render_template(&messages.bd_parse_error, &[("user", profile.id.as_str())])
            }
            Ok(0) => {
                tracing::info!(user, "Birthday is today");
                render_template(&messages.personal_today, &[("user", profile.id.as_str())])
            }
            Ok(days) => {
                tracing::info!(user, days, "Days left until birthday");
                let days = days.to_string();
                render_template(
                    &messages.personal_incoming,
                    &[("user", profile.id.as_str()), ("days", days.as_str())],
                )
            }
        }
    }
}
