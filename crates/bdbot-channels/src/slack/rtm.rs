//! Slack RTM connection: `rtm.connect` for the socket URL, then a
//! tokio-tungstenite WebSocket.

use async_trait::async_trait;
use bdbot_core::config::SlackConfig;
use bdbot_core::error::{BdBotError, Result};
use bdbot_core::traits::{RealtimeConnector, RealtimeSession};
use bdbot_core::types::InboundEvent;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::models::{RtmConnectResponse, RtmOutbound};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens RTM sessions with the bot token.
pub struct SlackRtmConnector {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl SlackRtmConnector {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| BdBotError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token: config.bot_token.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Ask Slack for a socket URL and the bot's own user ID.
    pub async fn start(&self) -> Result<RtmConnectResponse> {
        let body: serde_json::Value = self
            .client
            .get(format!("{}/rtm.connect", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| BdBotError::Connection(format!("rtm.connect failed: {e}")))?
            .json()
            .await
            .map_err(|e| BdBotError::Connection(format!("Invalid rtm.connect response: {e}")))?;

        if !body["ok"].as_bool().unwrap_or(false) {
            let error = body["error"].as_str().unwrap_or("unknown_error");
            return Err(BdBotError::api("rtm.connect", error));
        }
        serde_json::from_value(body)
            .map_err(|e| BdBotError::Connection(format!("Unexpected rtm.connect payload: {e}")))
    }
}

#[async_trait]
impl RealtimeConnector for SlackRtmConnector {
    type Session = SlackRtmSession;

    async fn connect(&self) -> Result<SlackRtmSession> {
        let start = self.start().await?;
        tracing::info!("Connecting to Slack RTM as {}", start.self_user.id);

        let (ws, _response) = tokio_tungstenite::connect_async(start.url.as_str())
            .await
            .map_err(|e| BdBotError::Connection(format!("WebSocket connect failed: {e}")))?;
        tracing::info!("Slack RTM connected");

        Ok(SlackRtmSession {
            ws,
            self_id: start.self_user.id,
            next_id: 0,
        })
    }
}

/// One RTM WebSocket. Outbound messages carry a per-session sequence ID.
pub struct SlackRtmSession {
    ws: WsStream,
    self_id: String,
    next_id: u64,
}

/// Decode an RTM text frame. Frames that are not events yield `None`.
pub fn parse_frame(text: &str) -> Option<InboundEvent> {
    match serde_json::from_str::<InboundEvent>(text) {
        Ok(event) if !event.kind.is_empty() => Some(event),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Not an RTM event: {e}");
            None
        }
    }
}

#[async_trait]
impl RealtimeSession for SlackRtmSession {
    fn self_id(&self) -> &str {
        &self.self_id
    }

    async fn next_event(&mut self, timeout: Duration) -> Result<Option<InboundEvent>> {
        let frame = match tokio::time::timeout(timeout, self.ws.next()).await {
            Err(_elapsed) => return Ok(None),
            Ok(frame) => frame,
        };
        match frame {
            Some(Ok(WsMessage::Text(text))) => Ok(parse_frame(&text)),
            Some(Ok(WsMessage::Close(frame))) => {
                tracing::info!("Slack RTM closed: {:?}", frame);
                Err(BdBotError::Connection("RTM connection closed".into()))
            }
            Some(Ok(WsMessage::Ping(data))) => {
                tracing::trace!("RTM ping received ({} bytes)", data.len());
                Ok(None)
            }
            Some(Ok(_)) => Ok(None),
            Some(Err(e)) => Err(BdBotError::Connection(format!("RTM read failed: {e}"))),
            None => Err(BdBotError::Connection("RTM stream ended".into())),
        }
    }

    async fn send(&mut self, channel_id: &str, text: &str) -> Result<()> {
        self.next_id += 1;
        let payload = serde_json::to_string(&RtmOutbound {
            id: self.next_id,
            kind: InboundEvent::MESSAGE,
            channel: channel_id,
            text,
        })
        .map_err(|e| BdBotError::Connection(format!("Failed to encode RTM message: {e}")))?;
        self.ws
            .send(WsMessage::Text(payload))
            .await
            .map_err(|e| BdBotError::Connection(format!("RTM send failed: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        self.ws
            .close(None)
            .await
            .map_err(|e| BdBotError::Connection(format!("RTM close failed: {e}")))
    }
}
