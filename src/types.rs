//! Core data types flowing through the pipeline.
//!
//! A URL run produces a stream of [`BaseChunk`]s which the dispatcher fans
//! out to consumer queues as [`ChunkItem`]s. The highlight consumer turns
//! windows of chunks into [`HighlightArtifact`]s; the commentary consumer
//! turns pairs of chunks into [`CommentaryChunk`]s.

use std::collections::BTreeMap;

use bytes::Bytes;

/// One complete, independently-decodable MP4 segment of fixed duration.
///
/// Sequence indices are 0-based, dense, and strictly monotonic within one
/// URL run. The payload is reference-counted so the dispatcher can hand the
/// same chunk to every consumer queue without copying.
#[derive(Debug, Clone)]
pub struct BaseChunk {
    /// Segment payload (a self-contained MP4)
    pub data: Bytes,
    /// 0-based sequence index within the run
    pub index: u64,
    /// Nominal duration in seconds, equal across all chunks of a run
    pub duration_secs: u32,
}

/// Element type of the dispatcher's consumer queues.
///
/// Every queue receives the run's chunks in source order followed by
/// exactly one `End` sentinel, on success and on ingest failure alike.
#[derive(Debug, Clone)]
pub enum ChunkItem {
    Chunk(BaseChunk),
    End,
}

/// Property bag carried alongside a window through the stage chain.
///
/// The fields required after ingestion are always populated; the stage
/// chain fills in its own annotations as it runs. Diagnostic strings from
/// stage fallbacks land in `extra`.
#[derive(Debug, Clone)]
pub struct WindowMetadata {
    /// Source URL of the run
    pub src_url: String,
    /// Absolute index of the first chunk in the window
    pub window_start_chunk: u64,
    /// Absolute index of the last chunk in the window (inclusive)
    pub window_end_chunk: u64,
    /// Window start time in seconds from the beginning of the run
    pub window_start_secs: u64,
    /// Window end time in seconds
    pub window_end_secs: u64,
    /// Base chunk duration in seconds
    pub chunk_duration_secs: u32,

    /// How the detection verdict was produced (`llm` or `error`)
    pub detection_method: Option<String>,
    pub is_highlight: Option<bool>,
    pub detection_confidence: Option<String>,
    pub detection_reason: Option<String>,

    /// How the trim bounds were produced (`llm`, `fallback`, `error_fallback`)
    pub trim_method: Option<String>,
    /// 1-based first kept segment
    pub trim_start: Option<u32>,
    /// 1-based last kept segment (inclusive)
    pub trim_end: Option<u32>,
    pub trim_reasoning: Option<String>,

    /// How the caption was produced (`llm`, `retry_exhausted_fallback`, `error_fallback`)
    pub caption_method: Option<String>,
    pub caption_attempts: Option<u32>,
    pub key_action: Option<String>,

    /// Free-form diagnostics (error strings, attempt counts per stage)
    pub extra: BTreeMap<String, String>,
}

impl WindowMetadata {
    /// Build the post-ingestion metadata for a window of `size` chunks
    /// starting at absolute chunk index `start_chunk`.
    pub fn for_window(
        src_url: &str,
        start_chunk: u64,
        size: usize,
        chunk_duration_secs: u32,
    ) -> Self {
        let end_chunk = start_chunk + size as u64 - 1;
        Self {
            src_url: src_url.to_string(),
            window_start_chunk: start_chunk,
            window_end_chunk: end_chunk,
            window_start_secs: start_chunk * chunk_duration_secs as u64,
            window_end_secs: (end_chunk + 1) * chunk_duration_secs as u64,
            chunk_duration_secs,
            detection_method: None,
            is_highlight: None,
            detection_confidence: None,
            detection_reason: None,
            trim_method: None,
            trim_start: None,
            trim_end: None,
            trim_reasoning: None,
            caption_method: None,
            caption_attempts: None,
            key_action: None,
            extra: BTreeMap::new(),
        }
    }

    /// Record a diagnostic string under `key`.
    pub fn note(&mut self, key: &str, value: impl Into<String>) {
        self.extra.insert(key.to_string(), value.into());
    }

    /// Number of chunks in the window.
    pub fn window_len(&self) -> usize {
        (self.window_end_chunk - self.window_start_chunk + 1) as usize
    }
}

/// A trimmed, captioned highlight clip emitted at most once per detected window.
#[derive(Debug, Clone)]
pub struct HighlightArtifact {
    /// Trimmed MP4 payload
    pub data: Bytes,
    pub title: String,
    pub description: String,
    pub src_url: String,
    /// Metadata accumulated through the stage chain
    pub metadata: WindowMetadata,
}

/// A fragmented MP4 carrying synthesized commentary audio over the original video.
#[derive(Debug, Clone)]
pub struct CommentaryChunk {
    /// Fragmented MP4 payload
    pub data: Bytes,
    /// 1-based emission counter, strictly monotonic within one run
    pub chunk_number: u64,
    pub src_url: String,
    /// Sample rate of the synthesized audio track
    pub audio_sample_rate: u32,
    /// Size of the raw PCM commentary in bytes
    pub commentary_len: usize,
    /// Number of base chunks combined into this window (1 or 2)
    pub base_chunks_combined: u32,
    /// Total window duration in seconds
    pub duration_secs: u32,
}
