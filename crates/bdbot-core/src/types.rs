//! Platform-neutral data types exchanged between the pipeline, the listener
//! and the chat platform adapters.

use serde::{Deserialize, Serialize};

/// A roster member's profile as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: String,
    pub real_name: String,
    pub surname: String,
    /// Raw `DDMM` token, no year.
    pub birthday: String,
}

/// A channel as returned by the platform's channel listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: String,
}

/// Per-user outcome of an invitation call that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteFailure {
    pub user: String,
    pub reason: InviteFailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteFailureReason {
    AlreadyInChannel,
    CantInviteSelf,
    /// Platform gave no error code.
    Unknown,
    Other(String),
}

impl InviteFailureReason {
    /// Parse a platform error code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "already_in_channel" => Self::AlreadyInChannel,
            "cant_invite_self" => Self::CantInviteSelf,
            "" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    /// Failures that count as success.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::AlreadyInChannel | Self::CantInviteSelf)
    }
}

impl std::fmt::Display for InviteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            InviteFailureReason::AlreadyInChannel => write!(f, "{}: already_in_channel", self.user),
            InviteFailureReason::CantInviteSelf => write!(f, "{}: cant_invite_self", self.user),
            InviteFailureReason::Unknown => write!(f, "{}: unknown error", self.user),
            InviteFailureReason::Other(code) => write!(f, "{}: {code}", self.user),
        }
    }
}

/// Event read from the realtime connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub text: String,
}

impl InboundEvent {
    pub const MESSAGE: &'static str = "message";

    pub fn is_message(&self) -> bool {
        self.kind == Self::MESSAGE
    }
}

/// Notification tier. Each tier has its own dedup bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Early private heads-up to the manager.
    Manager,
    /// Public announcement in a dedicated channel.
    Channel,
}

impl Tier {
    /// `(low, high]` is manager tier, `[0, low]` is channel tier.
    pub fn classify(days: i64, high: i64, low: i64) -> Option<Tier> {
        if days > low && days <= high {
            Some(Tier::Manager)
        } else if (0..=low).contains(&days) {
            Some(Tier::Channel)
        } else {
            None
        }
    }
}

/// Birthday info derived for one member during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthdayRecord {
    pub real_name: String,
    /// Lower-cased surname.
    pub surname: String,
    /// `DDMM` + current year, e.g. `15012026`.
    pub token: String,
    pub days_left: i64,
}

impl BirthdayRecord {
    pub fn new(profile: &MemberProfile, year: i32, days_left: i64) -> Self {
        Self {
            real_name: profile.real_name.clone(),
            surname: profile.surname.to_lowercase(),
            token: year_stamped_token(&profile.birthday, year),
            days_left,
        }
    }

    /// `DD.MM.YYYY` view of the token.
    pub fn display_date(&self) -> String {
        if self.token.len() < 5 || !self.token.is_ascii() {
            return self.token.clone();
        }
        format!(
            "{}.{}.{}",
            &self.token[..2],
            &self.token[2..4],
            &self.token[4..]
        )
    }
}

pub fn year_stamped_token(raw: &str, year: i32) -> String {
    format!("{raw}{year}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_partition() {
        let (high, low) = (7, 1);
        assert_eq!(Tier::classify(0, high, low), Some(Tier::Channel));
        assert_eq!(Tier::classify(1, high, low), Some(Tier::Channel));
        assert_eq!(Tier::classify(2, high, low), Some(Tier::Manager));
        assert_eq!(Tier::classify(7, high, low), Some(Tier::Manager));
        assert_eq!(Tier::classify(8, high, low), None);
        assert_eq!(Tier::classify(364, high, low), None);
    }

    #[test]
    fn test_classify_equal_thresholds() {
        // high == low leaves the manager window empty
        for days in 0..=5 {
            assert_eq!(Tier::classify(days, 5, 5), Some(Tier::Channel));
        }
        assert_eq!(Tier::classify(6, 5, 5), None);
    }

    #[test]
    fn test_invite_reason_from_code() {
        assert!(InviteFailureReason::from_code("already_in_channel").is_ignorable());
        assert!(InviteFailureReason::from_code("cant_invite_self").is_ignorable());
        assert_eq!(
            InviteFailureReason::from_code(""),
            InviteFailureReason::Unknown
        );
        assert!(!InviteFailureReason::from_code("not_in_channel").is_ignorable());
    }

    #[test]
    fn test_record_display_date() {
        let profile = MemberProfile {
            id: "U1".into(),
            real_name: "Ivan Petrov".into(),
            surname: "Petrov".into(),
            birthday: "1501".into(),
        };
        let record = BirthdayRecord::new(&profile, 2026, 3);
        assert_eq!(record.token, "15012026");
        assert_eq!(record.surname, "petrov");
        assert_eq!(record.display_date(), "15.01.2026");
    }
}
