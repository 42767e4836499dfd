//! # bdbot Core
//!
//! Shared types, traits, errors, configuration and birthday arithmetic
//! for the birthday reminder bot.

pub mod birthday;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{BdBotConfig, MessagesConfig, SlackConfig, render_template};
pub use error::{BdBotError, Result};
pub use traits::{
    ChannelManager, ChatPlatform, MessageSender, RealtimeConnector, RealtimeSession, RosterSource,
};
pub use types::{
    BirthdayRecord, Conversation, InboundEvent, InviteFailure, InviteFailureReason, MemberProfile,
    Tier,
};
