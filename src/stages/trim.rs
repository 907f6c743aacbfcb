//! Highlight trimming stage.

use std::path::Path;

use bytes::Bytes;
use tracing::{info, warn};

use crate::llm::VideoAnalyzer;
use crate::media::concatenate;
use crate::stages::prompts::{trim_function, trim_prompt};
use crate::stages::MAX_ATTEMPTS;
use crate::types::WindowMetadata;

/// Cut the window down to the segments that hold the action.
///
/// The model answers in 1-based segment numbers over the window's grid.
/// Out-of-range bounds are clamped, inverted bounds are swapped, and any
/// failure falls back to the whole window.
pub(crate) async fn trim_highlight(
    analyzer: &dyn VideoAnalyzer,
    chunks: &[Bytes],
    meta: &mut WindowMetadata,
    debug_dir: Option<&Path>,
) -> Bytes {
    let window_size = chunks.len();
    let full_window = match concatenate(chunks).await {
        Ok(video) => video,
        Err(err) => {
            warn!(error = %err, "could not render window for trimming");
            meta.trim_method = Some("error_fallback".to_string());
            meta.note("trim_error", err.to_string());
            return chunks.first().cloned().unwrap_or_default();
        }
    };

    if let Some(dir) = debug_dir {
        let name = format!("window_{:05}.mp4", meta.window_start_chunk);
        if let Err(err) = tokio::fs::write(dir.join(&name), &full_window).await {
            warn!(error = %err, file = %name, "failed to write debug window");
        }
    }

    let prompt = trim_prompt(
        window_size,
        meta.chunk_duration_secs,
        meta.detection_reason.as_deref(),
        meta.detection_confidence.as_deref(),
    );
    let function = trim_function();

    let mut last_error = String::new();
    let mut shape_failure = false;

    for attempt in 1..=MAX_ATTEMPTS {
        match analyzer.analyze_video(&full_window, &prompt, &function).await {
            Ok(response) => {
                let Some(call) = response.function_call.filter(|c| c.name == function.name)
                else {
                    shape_failure = true;
                    last_error = "model did not call report_trim_segments".to_string();
                    warn!(attempt, %last_error, "unexpected trim response");
                    continue;
                };
                let (Some(start), Some(end)) =
                    (call.int_arg("start_segment"), call.int_arg("end_segment"))
                else {
                    shape_failure = true;
                    last_error = "trim call missing segment bounds".to_string();
                    warn!(attempt, %last_error, "unexpected trim response");
                    continue;
                };
                let reasoning = call.str_arg("reasoning").unwrap_or_default().to_string();

                let (start, end) = normalize_bounds(start, end, window_size);
                info!(
                    window_start = meta.window_start_chunk,
                    start, end, %reasoning,
                    "trim bounds"
                );

                let slice = &chunks[start as usize - 1..end as usize];
                let trimmed = match concatenate(slice).await {
                    Ok(video) => video,
                    Err(err) => {
                        warn!(error = %err, "could not render trimmed slice, keeping full window");
                        meta.trim_method = Some("error_fallback".to_string());
                        meta.note("trim_error", err.to_string());
                        return full_window;
                    }
                };

                meta.trim_method = Some("llm".to_string());
                meta.trim_start = Some(start);
                meta.trim_end = Some(end);
                meta.trim_reasoning = Some(reasoning);
                return trimmed;
            }
            Err(err) => {
                shape_failure = false;
                last_error = err.to_string();
                warn!(attempt, error = %err, "trim submission failed");
            }
        }
    }

    meta.trim_method = Some(if shape_failure { "fallback" } else { "error_fallback" }.to_string());
    meta.trim_start = Some(1);
    meta.trim_end = Some(window_size as u32);
    meta.note("trim_error", last_error);
    full_window
}

/// Clamp 1-based bounds into `[1, window_size]` and swap them if inverted.
fn normalize_bounds(start: i64, end: i64, window_size: usize) -> (u32, u32) {
    let max = window_size as i64;
    let start = start.clamp(1, max);
    let end = end.clamp(1, max);
    if start > end {
        (end as u32, start as u32)
    } else {
        (start as u32, end as u32)
    }
}
