//! Multimodal model access.
//!
//! Two provider surfaces back the pipeline: a request/response endpoint
//! that accepts typed parts plus declared functions and returns either
//! text or a function call ([`client::GeminiClient`]), and a bidirectional
//! live session that accepts streamed frames and prompt text and returns
//! streamed PCM audio ([`live::GeminiLiveSession`]). Both sit behind
//! traits so the consumers can be driven by mocks in tests.

pub mod client;
pub mod live;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::Result;

/// One typed part of a request to the multimodal endpoint.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    Image { data: Bytes, mime: &'static str },
    Video { data: Bytes, mime: &'static str },
    Audio { data: Bytes, mime: &'static str },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn jpeg(data: impl Into<Bytes>) -> Self {
        Self::Image {
            data: data.into(),
            mime: "image/jpeg",
        }
    }

    pub fn mp4(data: impl Into<Bytes>) -> Self {
        Self::Video {
            data: data.into(),
            mime: "video/mp4",
        }
    }
}

/// Generation parameters forwarded with a request. Unset fields are left to
/// the provider's defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// A function the model is asked to call, as a JSON-schema parameter block.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: &'static str,
    pub description: &'static str,
    /// OBJECT schema with `properties` and `required`
    pub parameters: Value,
}

/// A function-call payload extracted from a model response.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: serde_json::Map<String, Value>,
}

impl FunctionCall {
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    pub fn bool_arg(&self, key: &str) -> Option<bool> {
        self.args.get(key).and_then(Value::as_bool)
    }

    pub fn int_arg(&self, key: &str) -> Option<i64> {
        // Models occasionally return numbers as strings; accept both.
        match self.args.get(key) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// One model response: a function call when the declared function was
/// invoked, otherwise whatever text came back.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub function_call: Option<FunctionCall>,
    pub text: Option<String>,
}

/// The request/response surface the stage chain submits video to.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    /// Submit typed parts with an optional declared function; return the
    /// model's response.
    async fn generate(
        &self,
        parts: &[Part],
        function: Option<&FunctionDecl>,
        config: &GenerationConfig,
    ) -> Result<ModelResponse>;

    /// Submit a video with a prompt and one declared function. This is the
    /// shape every stage uses; the payload is shared, not copied.
    async fn analyze_video(
        &self,
        video: &Bytes,
        prompt: &str,
        function: &FunctionDecl,
    ) -> Result<ModelResponse> {
        let parts = [Part::mp4(video.clone()), Part::text(prompt)];
        self.generate(&parts, Some(function), &GenerationConfig::default())
            .await
    }
}

/// Events produced by a live session while audio is being received.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// A block of 16-bit PCM audio
    Audio(bytes::Bytes),
    /// The model finished its turn
    TurnComplete,
    /// The session was closed by the peer
    Closed,
}

/// The bidirectional live surface the commentary consumer streams into.
#[async_trait]
pub trait LiveSession: Send {
    /// Send one JPEG frame into the session.
    async fn send_frame(&mut self, jpeg: &[u8]) -> Result<()>;

    /// Send the user prompt with an end-of-turn marker.
    async fn send_turn(&mut self, text: &str) -> Result<()>;

    /// Await the next event from the session.
    async fn next_event(&mut self) -> Result<LiveEvent>;

    /// Close the session. Called on every exit path.
    async fn close(&mut self) -> Result<()>;
}
