//! Request/response Gemini client.
//!
//! Speaks the `generateContent` REST surface: typed parts (text, inline
//! image/video/audio bytes), declared functions, generation config, and
//! function-call extraction from the first candidate.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{ClipError, Result};
use crate::llm::{
    FunctionCall, FunctionDecl, GenerationConfig, ModelResponse, Part, VideoAnalyzer,
};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    fn render_part(part: &Part) -> Value {
        let b64 = base64::engine::general_purpose::STANDARD;
        match part {
            Part::Text(text) => json!({ "text": text }),
            Part::Image { data, mime }
            | Part::Video { data, mime }
            | Part::Audio { data, mime } => json!({
                "inline_data": { "mime_type": mime, "data": b64.encode(data) }
            }),
        }
    }

    fn request_body(
        parts: &[Part],
        function: Option<&FunctionDecl>,
        config: &GenerationConfig,
    ) -> Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": parts.iter().map(Self::render_part).collect::<Vec<_>>(),
            }],
        });

        if let Some(function) = function {
            body["tools"] = json!([{
                "function_declarations": [{
                    "name": function.name,
                    "description": function.description,
                    "parameters": function.parameters.clone(),
                }],
            }]);
        }

        let mut generation = serde_json::Map::new();
        if let Some(temperature) = config.temperature {
            generation.insert("temperature".into(), json!(temperature));
        }
        if let Some(max_tokens) = config.max_output_tokens {
            generation.insert("maxOutputTokens".into(), json!(max_tokens));
        }
        if let Some(top_p) = config.top_p {
            generation.insert("topP".into(), json!(top_p));
        }
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }

        body
    }
}

#[async_trait]
impl VideoAnalyzer for GeminiClient {
    async fn generate(
        &self,
        parts: &[Part],
        function: Option<&FunctionDecl>,
        config: &GenerationConfig,
    ) -> Result<ModelResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );
        let body = Self::request_body(parts, function, config);

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClipError::Http(format!(
                "model endpoint returned {status}: {text}"
            )));
        }

        let payload: GenerateContentResponse = response.json().await?;
        let parsed = payload.into_model_response();
        debug!(
            parts = parts.len(),
            has_call = parsed.function_call.is_some(),
            "model response received"
        );
        Ok(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<RawFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct RawFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Map<String, Value>,
}

impl GenerateContentResponse {
    /// The first function call wins; text parts are concatenated as the
    /// fallback payload.
    fn into_model_response(self) -> ModelResponse {
        let mut text = String::new();
        let mut function_call = None;

        for candidate in self.candidates {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if function_call.is_none() {
                    if let Some(raw) = part.function_call {
                        function_call = Some(FunctionCall {
                            name: raw.name,
                            args: raw.args,
                        });
                        continue;
                    }
                }
                if let Some(t) = part.text {
                    text.push_str(&t);
                }
            }
            break;
        }

        ModelResponse {
            function_call,
            text: if text.is_empty() { None } else { Some(text) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_parse_function_call_response() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "parts": [{
                        "functionCall": {
                            "name": "report_highlight_detection",
                            "args": {"is_highlight": true, "confidence": "high", "reason": "goal"}
                        }
                    }]
                }
            }]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let response = parsed.into_model_response();
        let call = response.function_call.unwrap();
        assert_eq!(call.name, "report_highlight_detection");
        assert_eq!(call.bool_arg("is_highlight"), Some(true));
        assert_eq!(call.str_arg("confidence"), Some("high"));
    }

    #[test]
    fn test_parse_text_only_response() {
        let raw = r#"{
            "candidates": [{
                "content": { "parts": [{"text": "NO"}, {"text": " highlight"}] }
            }]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let response = parsed.into_model_response();
        assert!(response.function_call.is_none());
        assert_eq!(response.text.as_deref(), Some("NO highlight"));
    }

    #[test]
    fn test_parse_empty_response() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        let response = parsed.into_model_response();
        assert!(response.function_call.is_none());
        assert!(response.text.is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let decl = FunctionDecl {
            name: "report_trim_segments",
            description: "report trim bounds",
            parameters: json!({"type": "OBJECT", "properties": {}}),
        };
        let parts = [
            Part::mp4(Bytes::from_static(b"vid")),
            Part::text("trim this"),
        ];
        let body = GeminiClient::request_body(&parts, Some(&decl), &GenerationConfig::default());
        assert_eq!(
            body["contents"][0]["parts"][0]["inline_data"]["mime_type"],
            json!("video/mp4")
        );
        assert_eq!(body["contents"][0]["parts"][1]["text"], json!("trim this"));
        assert_eq!(
            body["tools"][0]["function_declarations"][0]["name"],
            json!("report_trim_segments")
        );
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_request_body_with_generation_config() {
        let parts = [Part::text("describe"), Part::jpeg(Bytes::from_static(b"j"))];
        let config = GenerationConfig {
            temperature: Some(0.2),
            max_output_tokens: Some(256),
            top_p: None,
        };
        let body = GeminiClient::request_body(&parts, None, &config);
        assert!(body.get("tools").is_none());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(256));
        assert_eq!(
            body["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            json!("image/jpeg")
        );
    }
}
