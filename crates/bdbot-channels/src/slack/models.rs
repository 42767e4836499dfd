//! Slack Web API and RTM payloads.

use serde::{Deserialize, Serialize};

/// `users.profile.get` → `profile`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackProfile {
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Holds the `DDMM` birthday token.
    #[serde(default)]
    pub skype: String,
}

impl SlackProfile {
    /// `last_name`, or the last word of `real_name` when it is unset.
    pub fn surname(&self) -> String {
        if !self.last_name.trim().is_empty() {
            return self.last_name.trim().to_string();
        }
        self.real_name
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileResponse {
    pub profile: SlackProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConversation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Set for direct message conversations.
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversationsListResponse {
    #[serde(default)]
    pub channels: Vec<SlackConversation>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
pub struct MembersResponse {
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
pub struct CreateResponse {
    pub channel: SlackConversation,
}

/// `conversations.invite` response, read whether `ok` is set or not.
#[derive(Debug, Default, Deserialize)]
pub struct InviteResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub errors: Vec<InviteError>,
}

#[derive(Debug, Deserialize)]
pub struct InviteError {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct RtmSelf {
    pub id: String,
}

/// `rtm.connect` response.
#[derive(Debug, Deserialize)]
pub struct RtmConnectResponse {
    pub url: String,
    #[serde(rename = "self")]
    pub self_user: RtmSelf,
}

/// Outbound RTM message.
#[derive(Debug, Serialize)]
pub struct RtmOutbound<'a> {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub channel: &'a str,
    pub text: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surname_fallback() {
        let p = SlackProfile {
            real_name: "Ivan Petrov".into(),
            last_name: String::new(),
            skype: "1501".into(),
        };
        assert_eq!(p.surname(), "Petrov");

        let p = SlackProfile {
            last_name: " Sidorov ".into(),
            ..p
        };
        assert_eq!(p.surname(), "Sidorov");
        assert_eq!(SlackProfile::default().surname(), "");
    }

    #[test]
    fn test_parse_rtm_connect() {
        let r: RtmConnectResponse = serde_json::from_str(
            r#"{"ok":true,"url":"wss://example/ws","self":{"id":"UBOT","name":"bd"}}"#,
        )
        .unwrap();
        assert_eq!(r.url, "wss://example/ws");
        assert_eq!(r.self_user.id, "UBOT");
    }

    #[test]
    fn test_outbound_shape() {
        let json = serde_json::to_value(RtmOutbound {
            id: 7,
            kind: "message",
            channel: "C1",
            text: "hi",
        })
        .unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["id"], 7);
    }
}
