//! # bdbot Channels
//! Slack Web API client, RTM connection and the command listener.

pub mod listener;
pub mod slack;

pub use listener::{Command, CommandListener, ListenerSettings};
pub use slack::{SlackClient, SlackRtmConnector};
