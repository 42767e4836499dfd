//! Capability traits the bot needs from the chat platform.
//!
//! The pipeline only talks to these traits, so a pass can be driven against
//! an in-memory fake in tests and against Slack in production.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Conversation, InboundEvent, InviteFailure, MemberProfile};

/// Read access to the team roster.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Member IDs of a channel.
    async fn list_members(&self, channel_id: &str) -> Result<Vec<String>>;

    /// Profile of a single user.
    async fn get_profile(&self, user_id: &str) -> Result<MemberProfile>;
}

/// Posting messages.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<()>;

    /// ID of the direct message channel with `user_id`.
    async fn find_dm_channel(&self, user_id: &str) -> Result<String>;
}

/// Channel lifecycle.
#[async_trait]
pub trait ChannelManager: Send + Sync {
    /// Create a channel and return its ID. Fails with
    /// [`BdBotError::NameTaken`](crate::error::BdBotError::NameTaken) when the
    /// name is in use.
    async fn create_channel(&self, name: &str, private: bool) -> Result<String>;

    async fn list_channels(&self) -> Result<Vec<Conversation>>;

    /// Invite users one by one. Returns the users that could not be invited;
    /// `Err` is reserved for transport-level failures.
    async fn invite_members(&self, channel_id: &str, users: &[String])
    -> Result<Vec<InviteFailure>>;
}

/// Everything the notification pipeline needs.
pub trait ChatPlatform: RosterSource + MessageSender + ChannelManager {}

impl<T: RosterSource + MessageSender + ChannelManager> ChatPlatform for T {}

/// An open realtime connection.
#[async_trait]
pub trait RealtimeSession: Send {
    /// User ID the bot is connected as.
    fn self_id(&self) -> &str;

    /// Wait up to `timeout` for the next event. `Ok(None)` on timeout or on a
    /// frame that carries no event; `Err` means the connection is unusable.
    async fn next_event(&mut self, timeout: Duration) -> Result<Option<InboundEvent>>;

    async fn send(&mut self, channel_id: &str, text: &str) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens realtime sessions.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    type Session: RealtimeSession;

    async fn connect(&self) -> Result<Self::Session>;
}
