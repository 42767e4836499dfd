//! Slack integration: Web API client and RTM connection.

pub mod api;
pub mod models;
pub mod rtm;

pub use api::SlackClient;
pub use rtm::{SlackRtmConnector, SlackRtmSession};
