//! Error types shared by every bdbot crate.

use thiserror::Error;

/// Unified error type.
#[derive(Debug, Error)]
pub enum BdBotError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    /// The platform answered with `ok: false`.
    #[error("API error in {method}: {error}")]
    Api { method: String, error: String },

    /// Channel creation was rejected because the name is already used.
    #[error("Channel name '{0}' is already taken")]
    NameTaken(String),

    #[error("Invalid birthday '{0}': {1}")]
    InvalidBirthday(String, String),

    #[error("Bucket '{0}' does not exist")]
    BucketNotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Channel {0} has no members")]
    EmptyRoster(String),

    #[error("Channel with name '{0}' not found")]
    ChannelNotFound(String),

    /// Real (non-ignorable) invitation failures, one line per user.
    #[error("Unable to invite {} member(s) to {channel}: {}", failures.len(), failures.join("; "))]
    Invite {
        channel: String,
        failures: Vec<String>,
    },

    #[error("Direct message channel for user {0} not found")]
    DmNotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Gave up reconnecting after {0} consecutive failures")]
    ReconnectExhausted(u32),
}

impl BdBotError {
    pub fn api(method: &str, error: impl Into<String>) -> Self {
        Self::Api {
            method: method.to_string(),
            error: error.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BdBotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_error_lists_every_failure() {
        let err = BdBotError::Invite {
            channel: "C1".into(),
            failures: vec!["U1: not_in_team".into(), "U2: unknown error".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 member(s)"));
        assert!(msg.contains("U1: not_in_team"));
        assert!(msg.contains("U2: unknown error"));
    }
}
