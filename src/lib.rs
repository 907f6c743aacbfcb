//! # clipstream
//!
//! Real-time sports-video highlight extraction and live-commentary
//! streaming. A client supplies a video URL over a WebSocket; the engine
//! ingests the media with `yt-dlp`, segments it into fixed-duration MP4
//! chunks with `ffmpeg`, fans the chunk stream out to bounded consumer
//! queues, detects and trims highlight moments with a multimodal model,
//! and streams short captioned MP4 clips back. An optional commentary
//! consumer feeds the same chunks into a live model session and streams
//! back fragmented MP4s carrying synthesized audio commentary.
//!
//! ## Pipeline shape
//!
//! ```text
//! yt-dlp ──> ffmpeg segmenter ──> dispatcher ──┬──> highlight consumer ──> snippet
//!                                              └──> commentary consumer ──> live_commentary_chunk
//! ```
//!
//! Each URL run is supervised by [`pipeline::run::run_url`]; many runs can
//! share one process because every subprocess invocation confines its
//! cache and scratch space to its own [`scratch::ScratchScope`].

pub mod config;
pub mod config_file;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod media;
pub mod pipeline;
pub mod scratch;
pub mod stages;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use config::{CommentaryConfig, LlmConfig, PipelineConfig, ServerConfig};
pub use error::{ClipError, Result};
pub use scratch::ScratchScope;
pub use types::{BaseChunk, ChunkItem, CommentaryChunk, HighlightArtifact, WindowMetadata};
