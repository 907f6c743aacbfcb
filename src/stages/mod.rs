//! The LLM stage chain: detect, trim, caption (and the narration extra).
//!
//! Every stage follows the same structure: render the window to a single
//! buffer, submit it with a stage-specific declared function, retry on
//! malformed responses, and fall back deterministically when the model is
//! unavailable. Stages never fail upward; their fallbacks and diagnostics
//! land in the window's metadata.
//!
//! The three stages are deliberately separate functions rather than one
//! abstraction: their inputs, outputs, and fallback semantics all differ.

mod caption;
mod detect;
mod narrate;
mod prompts;
mod trim;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::llm::VideoAnalyzer;
use crate::types::WindowMetadata;

/// Attempts per stage before the deterministic fallback applies.
pub(crate) const MAX_ATTEMPTS: u32 = 3;

/// The stage chain as the highlight consumer sees it.
#[async_trait]
pub trait HighlightStages: Send + Sync {
    /// Decide whether the window contains a highlight.
    async fn detect(&self, chunks: &[Bytes], meta: &mut WindowMetadata) -> bool;

    /// Cut the window down to its action segments.
    async fn trim(&self, chunks: &[Bytes], meta: &mut WindowMetadata) -> Bytes;

    /// Produce `(title, description)` for the trimmed clip.
    async fn caption(&self, video: &Bytes, meta: &mut WindowMetadata) -> (String, String);
}

/// Production stage chain over a multimodal analyzer.
pub struct GeminiStages {
    analyzer: Arc<dyn VideoAnalyzer>,
    debug_dir: Option<PathBuf>,
}

impl GeminiStages {
    pub fn new(analyzer: Arc<dyn VideoAnalyzer>, debug_dir: Option<PathBuf>) -> Self {
        Self {
            analyzer,
            debug_dir,
        }
    }
}

#[async_trait]
impl HighlightStages for GeminiStages {
    async fn detect(&self, chunks: &[Bytes], meta: &mut WindowMetadata) -> bool {
        detect::detect_highlight(self.analyzer.as_ref(), chunks, meta).await
    }

    async fn trim(&self, chunks: &[Bytes], meta: &mut WindowMetadata) -> Bytes {
        trim::trim_highlight(
            self.analyzer.as_ref(),
            chunks,
            meta,
            self.debug_dir.as_deref(),
        )
        .await
    }

    async fn caption(&self, video: &Bytes, meta: &mut WindowMetadata) -> (String, String) {
        caption::caption_highlight(self.analyzer.as_ref(), video, meta).await
    }
}

pub use narrate::narrate_video;
