//! Highlight detection stage.

use bytes::Bytes;
use tracing::{info, warn};

use crate::llm::VideoAnalyzer;
use crate::media::concatenate;
use crate::stages::prompts::{detect_function, DETECT_PROMPT};
use crate::stages::MAX_ATTEMPTS;
use crate::types::WindowMetadata;

/// Decide whether the window contains a highlight.
///
/// When the model is unavailable or keeps answering in the wrong shape,
/// the verdict is `false`: a missed highlight is preferable to a stream of
/// false positives.
pub(crate) async fn detect_highlight(
    analyzer: &dyn VideoAnalyzer,
    chunks: &[Bytes],
    meta: &mut WindowMetadata,
) -> bool {
    let video = match concatenate(chunks).await {
        Ok(video) => video,
        Err(err) => {
            warn!(error = %err, "could not render window for detection");
            meta.detection_method = Some("error".to_string());
            meta.is_highlight = Some(false);
            meta.note("detection_error", err.to_string());
            return false;
        }
    };

    let function = detect_function();
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        match analyzer.analyze_video(&video, DETECT_PROMPT, &function).await {
            Ok(response) => {
                let Some(call) = response.function_call else {
                    last_error = format!(
                        "expected {} call, got {:?}",
                        function.name, response.text
                    );
                    warn!(attempt, %last_error, "unexpected detection response");
                    continue;
                };
                if call.name != function.name {
                    last_error = format!("model called unknown function {}", call.name);
                    warn!(attempt, %last_error, "unexpected detection response");
                    continue;
                }

                let is_highlight = call.bool_arg("is_highlight").unwrap_or(false);
                let confidence = call.str_arg("confidence").unwrap_or("unknown").to_string();
                let reason = call.str_arg("reason").unwrap_or_default().to_string();

                info!(
                    window_start = meta.window_start_chunk,
                    is_highlight, %confidence, %reason,
                    "detection verdict"
                );

                meta.detection_method = Some("llm".to_string());
                meta.is_highlight = Some(is_highlight);
                meta.detection_confidence = Some(confidence);
                meta.detection_reason = Some(reason);
                return is_highlight;
            }
            Err(err) => {
                last_error = err.to_string();
                warn!(attempt, error = %err, "detection submission failed");
            }
        }
    }

    meta.detection_method = Some("error".to_string());
    meta.is_highlight = Some(false);
    meta.note("detection_error", last_error);
    meta.note("detection_attempts", MAX_ATTEMPTS.to_string());
    false
}
