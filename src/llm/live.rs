//! Bidirectional live session.
//!
//! A WebSocket connection to the provider's live endpoint: frames and
//! prompt text go in, synthesized 16-bit PCM audio comes back. The session
//! is single-owner; the commentary consumer connects once at start and
//! closes on every exit path.

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{ClipError, Result};
use crate::llm::{LiveEvent, LiveSession};

const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct GeminiLiveSession {
    ws: WsStream,
}

impl GeminiLiveSession {
    /// Connect and complete the setup handshake.
    pub async fn connect(config: &LlmConfig, system_instruction: &str) -> Result<Self> {
        let url = format!("{}?key={}", LIVE_ENDPOINT, config.api_key);
        let (ws, _) = connect_async(&url)
            .await
            .map_err(|e| ClipError::ProviderSession(format!("live connect failed: {e}")))?;
        let mut session = Self { ws };

        let setup = json!({
            "setup": {
                "model": format!("models/{}", config.live_model),
                "generationConfig": { "responseModalities": ["AUDIO"] },
                "systemInstruction": { "parts": [{ "text": system_instruction }] },
            }
        });
        session.send_json(&setup).await?;

        // The server acknowledges with a setupComplete message before any
        // content may be streamed.
        loop {
            match session.recv_json().await? {
                Some(value) if value.get("setupComplete").is_some() => break,
                Some(other) => {
                    debug!(message = %other, "ignoring pre-setup message");
                }
                None => {
                    return Err(ClipError::ProviderSession(
                        "live session closed during setup".to_string(),
                    ))
                }
            }
        }

        debug!(model = %config.live_model, "live session established");
        Ok(session)
    }

    async fn send_json(&mut self, value: &Value) -> Result<()> {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .map_err(|e| ClipError::ProviderSession(format!("live send failed: {e}")))
    }

    /// Read the next JSON payload, or `None` when the peer closed.
    async fn recv_json(&mut self) -> Result<Option<Value>> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(serde_json::from_str(&text)?));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(serde_json::from_slice(&data)?));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(e)) => {
                    return Err(ClipError::ProviderSession(format!(
                        "live receive failed: {e}"
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl LiveSession for GeminiLiveSession {
    async fn send_frame(&mut self, jpeg: &[u8]) -> Result<()> {
        let message = json!({
            "realtimeInput": {
                "mediaChunks": [{
                    "mimeType": "image/jpeg",
                    "data": base64::engine::general_purpose::STANDARD.encode(jpeg),
                }],
            }
        });
        self.send_json(&message).await
    }

    async fn send_turn(&mut self, text: &str) -> Result<()> {
        let message = json!({
            "clientContent": {
                "turns": [{ "role": "user", "parts": [{ "text": text }] }],
                "turnComplete": true,
            }
        });
        self.send_json(&message).await
    }

    async fn next_event(&mut self) -> Result<LiveEvent> {
        loop {
            let Some(value) = self.recv_json().await? else {
                return Ok(LiveEvent::Closed);
            };
            let Some(server_content) = value.get("serverContent") else {
                debug!("ignoring non-content live message");
                continue;
            };

            if let Some(parts) = server_content
                .get("modelTurn")
                .and_then(|turn| turn.get("parts"))
                .and_then(Value::as_array)
            {
                for part in parts {
                    let Some(data) = part
                        .get("inlineData")
                        .and_then(|inline| inline.get("data"))
                        .and_then(Value::as_str)
                    else {
                        continue;
                    };
                    match base64::engine::general_purpose::STANDARD.decode(data) {
                        Ok(pcm) => return Ok(LiveEvent::Audio(Bytes::from(pcm))),
                        Err(e) => warn!(error = %e, "undecodable audio payload, skipping"),
                    }
                }
            }

            if server_content
                .get("turnComplete")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                return Ok(LiveEvent::TurnComplete);
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.ws
            .close(None)
            .await
            .map_err(|e| ClipError::ProviderSession(format!("live close failed: {e}")))
    }
}

/// Synthesize speech for a block of text over an established live session.
///
/// Sends the text as one turn and collects PCM until the turn completes,
/// the message cap is reached, or `timeout` expires.
pub async fn synthesize_speech<S: LiveSession>(
    session: &mut S,
    text: &str,
    timeout: std::time::Duration,
    max_messages: usize,
) -> Result<Bytes> {
    session.send_turn(text).await?;

    let mut audio = Vec::new();
    let mut messages = 0;
    let collect = async {
        loop {
            match session.next_event().await? {
                LiveEvent::Audio(pcm) => {
                    audio.extend_from_slice(&pcm);
                    messages += 1;
                    if messages >= max_messages {
                        break;
                    }
                }
                LiveEvent::TurnComplete | LiveEvent::Closed => break,
            }
        }
        Ok::<_, ClipError>(())
    };

    match tokio::time::timeout(timeout, collect).await {
        Ok(result) => result?,
        Err(_) => warn!("speech synthesis timed out, keeping partial audio"),
    }
    Ok(Bytes::from(audio))
}
