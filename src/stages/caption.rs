//! Highlight captioning stage.

use bytes::Bytes;
use tracing::{info, warn};

use crate::llm::VideoAnalyzer;
use crate::stages::prompts::{caption_function, CAPTION_PROMPT};
use crate::stages::MAX_ATTEMPTS;
use crate::types::WindowMetadata;

/// Produce `(title, description)` for a trimmed highlight.
///
/// A response only counts when both fields are non-empty; anything else is
/// retried. Exhausted retries fall back to captions derived from the
/// window's time bounds.
pub(crate) async fn caption_highlight(
    analyzer: &dyn VideoAnalyzer,
    video: &Bytes,
    meta: &mut WindowMetadata,
) -> (String, String) {
    let function = caption_function();
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        match analyzer.analyze_video(video, CAPTION_PROMPT, &function).await {
            Ok(response) => {
                let Some(call) = response.function_call.filter(|c| c.name == function.name)
                else {
                    last_error = "model did not call report_highlight_caption".to_string();
                    warn!(attempt, %last_error, "unexpected caption response");
                    continue;
                };
                let title = call.str_arg("title").unwrap_or_default().to_string();
                let description = call.str_arg("description").unwrap_or_default().to_string();

                if title.is_empty() || description.is_empty() {
                    last_error = format!(
                        "caption call missing fields (title={}, description={})",
                        !title.is_empty(),
                        !description.is_empty()
                    );
                    warn!(attempt, %last_error, "incomplete caption");
                    continue;
                }

                info!(window_start = meta.window_start_chunk, %title, "caption generated");
                meta.caption_method = Some("llm".to_string());
                meta.caption_attempts = Some(attempt);
                meta.key_action = call.str_arg("key_action").map(str::to_string);
                return (title, description);
            }
            Err(err) => {
                last_error = err.to_string();
                warn!(attempt, error = %err, "caption submission failed");
            }
        }
    }

    warn!(
        window_start = meta.window_start_chunk,
        %last_error,
        "caption retries exhausted, using fallback"
    );
    meta.caption_method = Some("retry_exhausted_fallback".to_string());
    meta.caption_attempts = Some(MAX_ATTEMPTS);
    meta.note("caption_error", last_error);
    fallback_captions(meta)
}

/// Deterministic captions built from the window's time bounds.
pub(crate) fn fallback_captions(meta: &WindowMetadata) -> (String, String) {
    (
        format!("Highlight at {}s", meta.window_start_secs),
        format!(
            "Highlight from {}s to {}s",
            meta.window_start_secs, meta.window_end_secs
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tests_support::{FailingAnalyzer, ScriptedAnalyzer};
    use serde_json::json;

    fn meta() -> WindowMetadata {
        WindowMetadata::for_window("url", 3, 3, 2)
    }

    #[tokio::test]
    async fn test_caption_success() {
        let analyzer = ScriptedAnalyzer::function_call(
            "report_highlight_caption",
            json!({"title": "Goal!", "description": "A goal is scored.", "key_action": "goal"}),
        );
        let mut meta = meta();
        let (title, description) =
            caption_highlight(&analyzer, &Bytes::from_static(b"clip"), &mut meta).await;
        assert_eq!(title, "Goal!");
        assert_eq!(description, "A goal is scored.");
        assert_eq!(meta.caption_method.as_deref(), Some("llm"));
        assert_eq!(meta.caption_attempts, Some(1));
        assert_eq!(meta.key_action.as_deref(), Some("goal"));
    }

    #[tokio::test]
    async fn test_caption_retries_on_empty_title_then_falls_back() {
        let analyzer = ScriptedAnalyzer::function_call(
            "report_highlight_caption",
            json!({"title": "", "description": "something happened"}),
        );
        let mut meta = meta();
        let (title, description) =
            caption_highlight(&analyzer, &Bytes::from_static(b"clip"), &mut meta).await;
        assert_eq!(analyzer.calls(), MAX_ATTEMPTS as usize);
        assert_eq!(title, "Highlight at 6s");
        assert_eq!(description, "Highlight from 6s to 12s");
        assert_eq!(
            meta.caption_method.as_deref(),
            Some("retry_exhausted_fallback")
        );
    }

    #[tokio::test]
    async fn test_caption_fallback_on_submission_errors() {
        let analyzer = FailingAnalyzer::new("timeout");
        let mut meta = meta();
        let (title, _) =
            caption_highlight(&analyzer, &Bytes::from_static(b"clip"), &mut meta).await;
        assert!(title.starts_with("Highlight at"));
        assert!(meta
            .extra
            .get("caption_error")
            .is_some_and(|e| e.contains("timeout")));
    }
}
