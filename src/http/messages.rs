//! JSON message envelopes sent to WebSocket clients.
//!
//! Four kinds: `snippet`, `live_commentary_chunk`, `snippet_complete`, and
//! `error`. Video payloads travel as base64 MP4 inside JSON text frames,
//! and every payload is a complete, independently-playable container.

use base64::Engine;
use serde::Serialize;

use crate::pipeline::RunEvent;
use crate::types::{CommentaryChunk, HighlightArtifact};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Snippet {
        data: SnippetData,
    },
    LiveCommentaryChunk {
        data: CommentaryData,
    },
    SnippetComplete {
        metadata: SourceRef,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<SourceRef>,
    },
}

#[derive(Debug, Serialize)]
pub struct SourceRef {
    pub src_video_url: String,
}

#[derive(Debug, Serialize)]
pub struct SnippetData {
    /// base64-encoded MP4
    pub video_data: String,
    pub metadata: SnippetMetadata,
}

#[derive(Debug, Serialize)]
pub struct SnippetMetadata {
    pub src_video_url: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct CommentaryData {
    /// base64-encoded fragmented MP4
    pub video_data: String,
    pub metadata: CommentaryMetadata,
}

#[derive(Debug, Serialize)]
pub struct CommentaryMetadata {
    pub src_video_url: String,
    pub chunk_number: u64,
    pub format: &'static str,
    pub audio_sample_rate: u32,
    pub commentary_length_bytes: usize,
    pub video_length_bytes: usize,
    pub base_chunks_combined: u32,
    pub total_duration_seconds: u32,
}

impl ServerMessage {
    pub fn from_event(event: RunEvent) -> Self {
        match event {
            RunEvent::Highlight(artifact) => Self::snippet(artifact),
            RunEvent::Commentary(chunk) => Self::commentary(chunk),
            RunEvent::HighlightsComplete { src_url } => Self::SnippetComplete {
                metadata: SourceRef {
                    src_video_url: src_url,
                },
            },
            RunEvent::Error {
                src_url, message, ..
            } => Self::Error {
                message,
                metadata: src_url.map(|src_video_url| SourceRef { src_video_url }),
            },
        }
    }

    fn snippet(artifact: HighlightArtifact) -> Self {
        Self::Snippet {
            data: SnippetData {
                video_data: base64::engine::general_purpose::STANDARD.encode(&artifact.data),
                metadata: SnippetMetadata {
                    src_video_url: artifact.src_url,
                    title: artifact.title,
                    description: artifact.description,
                },
            },
        }
    }

    fn commentary(chunk: CommentaryChunk) -> Self {
        Self::LiveCommentaryChunk {
            data: CommentaryData {
                video_data: base64::engine::general_purpose::STANDARD.encode(&chunk.data),
                metadata: CommentaryMetadata {
                    src_video_url: chunk.src_url,
                    chunk_number: chunk.chunk_number,
                    format: "fragmented_mp4",
                    audio_sample_rate: chunk.audio_sample_rate,
                    commentary_length_bytes: chunk.commentary_len,
                    video_length_bytes: chunk.data.len(),
                    base_chunks_combined: chunk.base_chunks_combined,
                    total_duration_seconds: chunk.duration_secs,
                },
            },
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WindowMetadata;
    use bytes::Bytes;

    #[test]
    fn test_snippet_envelope_shape() {
        let artifact = HighlightArtifact {
            data: Bytes::from_static(b"mp4-bytes"),
            title: "Goal!".to_string(),
            description: "A goal is scored.".to_string(),
            src_url: "https://example.com/v".to_string(),
            metadata: WindowMetadata::for_window("https://example.com/v", 0, 3, 2),
        };
        let message = ServerMessage::from_event(RunEvent::Highlight(artifact));
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();

        assert_eq!(json["type"], "snippet");
        assert_eq!(json["data"]["metadata"]["title"], "Goal!");
        assert_eq!(
            json["data"]["metadata"]["src_video_url"],
            "https://example.com/v"
        );
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(json["data"]["video_data"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, b"mp4-bytes");
    }

    #[test]
    fn test_commentary_envelope_shape() {
        let chunk = CommentaryChunk {
            data: Bytes::from_static(b"fmp4"),
            chunk_number: 2,
            src_url: "u".to_string(),
            audio_sample_rate: 24_000,
            commentary_len: 4096,
            base_chunks_combined: 2,
            duration_secs: 8,
        };
        let message = ServerMessage::from_event(RunEvent::Commentary(chunk));
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();

        assert_eq!(json["type"], "live_commentary_chunk");
        let metadata = &json["data"]["metadata"];
        assert_eq!(metadata["chunk_number"], 2);
        assert_eq!(metadata["format"], "fragmented_mp4");
        assert_eq!(metadata["audio_sample_rate"], 24_000);
        assert_eq!(metadata["commentary_length_bytes"], 4096);
        assert_eq!(metadata["video_length_bytes"], 4);
        assert_eq!(metadata["base_chunks_combined"], 2);
        assert_eq!(metadata["total_duration_seconds"], 8);
    }

    #[test]
    fn test_complete_envelope_shape() {
        let message = ServerMessage::from_event(RunEvent::HighlightsComplete {
            src_url: "u".to_string(),
        });
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();
        assert_eq!(json["type"], "snippet_complete");
        assert_eq!(json["metadata"]["src_video_url"], "u");
    }

    #[test]
    fn test_error_envelope_with_and_without_source() {
        let with = ServerMessage::from_event(RunEvent::Error {
            src_url: Some("u".to_string()),
            message: "boom".to_string(),
            terminal: true,
        });
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&with).unwrap()).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "boom");
        assert_eq!(json["metadata"]["src_video_url"], "u");

        let without = ServerMessage::Error {
            message: "missing parameter".to_string(),
            metadata: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&without).unwrap()).unwrap();
        assert!(json.get("metadata").is_none());
    }
}
