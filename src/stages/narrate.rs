//! Narration stage: a short spoken-style script for a clip.
//!
//! Used by the CLI's narrated-clip mode; the WebSocket gateway's consumers
//! do not call it.

use bytes::Bytes;
use tracing::{info, warn};

use crate::llm::VideoAnalyzer;
use crate::stages::prompts::{narrate_function, NARRATE_PROMPT};
use crate::stages::MAX_ATTEMPTS;
use crate::types::WindowMetadata;

const FALLBACK_NARRATION: &str = "Exciting sports action continues";

/// Generate a 3-12 word narration for the clip.
pub async fn narrate_video(
    analyzer: &dyn VideoAnalyzer,
    video: &Bytes,
    meta: &mut WindowMetadata,
) -> String {
    let function = narrate_function();
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        match analyzer.analyze_video(video, NARRATE_PROMPT, &function).await {
            Ok(response) => {
                let narration = response
                    .function_call
                    .filter(|c| c.name == function.name)
                    .and_then(|c| c.str_arg("narration").map(str::to_string))
                    .unwrap_or_default();
                if narration.is_empty() {
                    last_error = "model returned no narration text".to_string();
                    warn!(attempt, %last_error, "unexpected narration response");
                    continue;
                }
                info!(window_start = meta.window_start_chunk, %narration, "narration generated");
                meta.note("narration_method", "llm");
                return narration;
            }
            Err(err) => {
                last_error = err.to_string();
                warn!(attempt, error = %err, "narration submission failed");
            }
        }
    }

    meta.note("narration_method", "error_fallback");
    meta.note("narration_error", last_error);
    FALLBACK_NARRATION.to_string()
}
