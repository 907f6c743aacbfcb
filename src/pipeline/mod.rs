//! Pipeline consumers and the per-run supervisor.

pub mod commentary;
pub mod highlight;
pub mod run;

use crate::types::{CommentaryChunk, HighlightArtifact};

/// Events a run emits toward its client channel.
///
/// Delivery order within a run: highlights arrive in non-decreasing window
/// order, commentary chunks in strictly increasing `chunk_number` order,
/// and the two kinds may interleave. Each consumer produces at most one
/// terminal event.
#[derive(Debug)]
pub enum RunEvent {
    /// A trimmed, captioned highlight clip
    Highlight(HighlightArtifact),
    /// An ordered live-commentary fragment
    Commentary(CommentaryChunk),
    /// The highlight consumer observed its end-of-stream sentinel
    HighlightsComplete { src_url: String },
    /// A failure; `terminal` failures are the run's last message
    Error {
        src_url: Option<String>,
        message: String,
        terminal: bool,
    },
}
