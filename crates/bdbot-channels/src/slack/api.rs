//! Slack Web API client.

use async_trait::async_trait;
use bdbot_core::config::SlackConfig;
use bdbot_core::error::{BdBotError, Result};
use bdbot_core::traits::{ChannelManager, MessageSender, RosterSource};
use bdbot_core::types::{Conversation, InviteFailure, InviteFailureReason, MemberProfile};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::models::{
    ConversationsListResponse, CreateResponse, InviteResponse, MembersResponse, ProfileResponse,
    SlackConversation,
};

const PAGE_LIMIT: &str = "1000";

/// Web API client. Every call has a timeout and is retried on transport
/// errors and non-2xx statuses.
pub struct SlackClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    retries: u32,
    username: String,
    icon_emoji: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| BdBotError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token: config.api_token.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            retries: config.request_retries.max(1),
            username: config.bot_username.clone(),
            icon_emoji: config.icon_emoji.clone(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Send with retries and return the raw JSON body.
    async fn request<F>(&self, method: &str, build: F) -> Result<serde_json::Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = BdBotError::Http(format!("{method}: no attempt made"));
        for attempt in 1..=self.retries {
            let response = match build().bearer_auth(&self.token).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(method, attempt, "Slack request failed: {e}");
                    last_err = BdBotError::Http(format!("{method} failed: {e}"));
                    continue;
                }
            };
            let status = response.status();
            if !status.is_success() {
                tracing::warn!(method, attempt, %status, "Slack returned non-success status");
                last_err = BdBotError::Http(format!("{method} returned {status}"));
                continue;
            }
            return response
                .json()
                .await
                .map_err(|e| BdBotError::Http(format!("Invalid {method} response: {e}")));
        }
        Err(last_err)
    }

    /// Check `ok` and decode the body.
    fn decode<T: DeserializeOwned>(method: &str, body: serde_json::Value) -> Result<T> {
        if !body["ok"].as_bool().unwrap_or(false) {
            let error = body["error"].as_str().unwrap_or("unknown_error");
            return Err(BdBotError::api(method, error));
        }
        serde_json::from_value(body)
            .map_err(|e| BdBotError::Http(format!("Unexpected {method} payload: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.api_url(method);
        let body = self
            .request(method, || self.client.get(&url).query(query))
            .await?;
        Self::decode(method, body)
    }

    async fn post_raw(&self, method: &str, payload: &serde_json::Value) -> Result<serde_json::Value> {
        let url = self.api_url(method);
        self.request(method, || self.client.post(&url).json(payload))
            .await
    }

    /// Every conversation of the given `types`, following cursors.
    pub async fn list_conversations(&self, types: &str) -> Result<Vec<SlackConversation>> {
        let mut all = Vec::new();
        let mut cursor = String::new();
        loop {
            let page: ConversationsListResponse = self
                .get(
                    "conversations.list",
                    &[
                        ("types", types),
                        ("exclude_archived", "true"),
                        ("limit", PAGE_LIMIT),
                        ("cursor", cursor.as_str()),
                    ],
                )
                .await?;
            all.extend(page.channels);
            if page.response_metadata.next_cursor.is_empty() {
                return Ok(all);
            }
            cursor = page.response_metadata.next_cursor;
        }
    }

    async fn invite_one(&self, channel_id: &str, user: &str) -> Result<Vec<InviteFailure>> {
        tracing::debug!(channel = channel_id, user, "Adding user");
        let body = self
            .post_raw(
                "conversations.invite",
                &serde_json::json!({ "channel": channel_id, "users": user }),
            )
            .await?;
        let resp: InviteResponse = serde_json::from_value(body)
            .map_err(|e| BdBotError::Http(format!("Unexpected conversations.invite payload: {e}")))?;
        if resp.ok {
            return Ok(Vec::new());
        }

        if resp.errors.is_empty() {
            return Ok(vec![InviteFailure {
                user: user.to_string(),
                reason: InviteFailureReason::from_code(resp.error.as_deref().unwrap_or_default()),
            }]);
        }
        Ok(resp
            .errors
            .into_iter()
            .filter(|e| !e.ok)
            .map(|e| InviteFailure {
                user: if e.user.is_empty() { user.to_string() } else { e.user },
                reason: InviteFailureReason::from_code(&e.error),
            })
            .collect())
    }
}

#[async_trait]
impl RosterSource for SlackClient {
    async fn list_members(&self, channel_id: &str) -> Result<Vec<String>> {
        let mut members = Vec::new();
        let mut cursor = String::new();
        loop {
            let page: MembersResponse = self
                .get(
                    "conversations.members",
                    &[("channel", channel_id), ("limit", PAGE_LIMIT), ("cursor", cursor.as_str())],
                )
                .await?;
            members.extend(page.members);
            if page.response_metadata.next_cursor.is_empty() {
                return Ok(members);
            }
            cursor = page.response_metadata.next_cursor;
        }
    }

    async fn get_profile(&self, user_id: &str) -> Result<MemberProfile> {
        let resp: ProfileResponse = self
            .get("users.profile.get", &[("user", user_id)])
            .await?;
        Ok(MemberProfile {
            id: user_id.to_string(),
            surname: resp.profile.surname(),
            real_name: resp.profile.real_name,
            birthday: resp.profile.skype.trim().to_string(),
        })
    }
}

#[async_trait]
impl MessageSender for SlackClient {
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<()> {
        let method = "chat.postMessage";
        let body = self
            .post_raw(
                method,
                &serde_json::json!({
                    "channel": channel_id,
                    "text": text,
                    "as_user": false,
                    "username": self.username,
                    "icon_emoji": self.icon_emoji,
                }),
            )
            .await?;
        Self::decode::<serde_json::Value>(method, body).map(|_| ())
    }

    async fn find_dm_channel(&self, user_id: &str) -> Result<String> {
        self.list_conversations("im")
            .await?
            .into_iter()
            .find(|c| c.user.as_deref() == Some(user_id))
            .map(|c| c.id)
            .ok_or_else(|| BdBotError::DmNotFound(user_id.to_string()))
    }
}

#[async_trait]
impl ChannelManager for SlackClient {
    async fn create_channel(&self, name: &str, private: bool) -> Result<String> {
        let method = "conversations.create";
        let body = self
            .post_raw(method, &serde_json::json!({ "name": name, "is_private": private }))
            .await?;
        match Self::decode::<CreateResponse>(method, body) {
            Ok(resp) => Ok(resp.channel.id),
            Err(BdBotError::Api { error, .. }) if error == "name_taken" => {
                Err(BdBotError::NameTaken(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn list_channels(&self) -> Result<Vec<Conversation>> {
        Ok(self
            .list_conversations("public_channel,private_channel")
            .await?
            .into_iter()
            .map(|c| Conversation { id: c.id, name: c.name })
            .collect())
    }

    async fn invite_members(
        &self,
        channel_id: &str,
        users: &[String],
    ) -> Result<Vec<InviteFailure>> {
        let mut failures = Vec::new();
        for user in users {
            failures.extend(self.invite_one(channel_id, user).await?);
        }
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SlackClient {
        let config = SlackConfig {
            api_token: "xoxp-test".into(),
            api_url: server.uri(),
            request_timeout_ms: 500,
            ..SlackConfig::default()
        };
        SlackClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_list_members_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.members"))
            .and(query_param("cursor", ""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": ["U1", "U2"],
                "response_metadata": {"next_cursor": "page2"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/conversations.members"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": ["U3"],
                "response_metadata": {"next_cursor": ""}
            })))
            .mount(&server)
            .await;

        let members = client(&server).list_members("CMAIN").await.unwrap();
        assert_eq!(members, vec!["U1", "U2", "U3"]);
    }

    #[tokio::test]
    async fn test_get_profile_reads_birthday_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.profile.get"))
            .and(query_param("user", "U1"))
            .and(header("authorization", "Bearer xoxp-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "profile": {"real_name": "Ivan Petrov", "last_name": "Petrov", "skype": "1501"}
            })))
            .mount(&server)
            .await;

        let profile = client(&server).get_profile("U1").await.unwrap();
        assert_eq!(profile.id, "U1");
        assert_eq!(profile.surname, "Petrov");
        assert_eq!(profile.birthday, "1501");
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.profile.get"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "user_not_found"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).get_profile("U404").await.unwrap_err();
        assert!(matches!(
            err,
            BdBotError::Api { ref method, ref error } if method == "users.profile.get" && error == "user_not_found"
        ));
    }

    #[tokio::test]
    async fn test_retries_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(json!({"channel": "C1", "icon_emoji": ":cake:"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).send_message("C1", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server).send_message("C1", "hello").await.unwrap_err();
        assert!(matches!(err, BdBotError::Http(_)));
    }

    #[tokio::test]
    async fn test_create_channel_name_taken() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.create"))
            .and(body_partial_json(json!({"name": "petrov-bd-2026", "is_private": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "name_taken"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .create_channel("petrov-bd-2026", true)
            .await
            .unwrap_err();
        assert!(matches!(err, BdBotError::NameTaken(ref n) if n == "petrov-bd-2026"));
    }

    #[tokio::test]
    async fn test_create_channel_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channel": {"id": "C123", "name": "petrov-bd-2026"}
            })))
            .mount(&server)
            .await;

        let id = client(&server).create_channel("petrov-bd-2026", true).await.unwrap();
        assert_eq!(id, "C123");
    }

    #[tokio::test]
    async fn test_find_dm_channel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .and(query_param("types", "im"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channels": [
                    {"id": "D1", "user": "U1"},
                    {"id": "D2", "user": "UMGR"}
                ]
            })))
            .mount(&server)
            .await;

        let c = client(&server);
        assert_eq!(c.find_dm_channel("UMGR").await.unwrap(), "D2");
        assert!(matches!(
            c.find_dm_channel("UNOPE").await,
            Err(BdBotError::DmNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invite_collects_per_user_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.invite"))
            .and(body_partial_json(json!({"users": "U1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations.invite"))
            .and(body_partial_json(json!({"users": "U2"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "already_in_channel"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations.invite"))
            .and(body_partial_json(json!({"users": "U3"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "error": "failed_for_some_users",
                "errors": [{"user": "U3", "ok": false, "error": "user_is_restricted"}]
            })))
            .mount(&server)
            .await;

        let users: Vec<String> = ["U1", "U2", "U3"].iter().map(|s| s.to_string()).collect();
        let failures = client(&server).invite_members("C1", &users).await.unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].user, "U2");
        assert!(failures[0].reason.is_ignorable());
        assert_eq!(failures[1].user, "U3");
        assert_eq!(
            failures[1].reason,
            InviteFailureReason::Other("user_is_restricted".into())
        );
    }
}
