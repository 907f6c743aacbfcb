//! Prompts and declared-function schemas for the stage chain.

use serde_json::json;

use crate::llm::FunctionDecl;

pub(crate) const DETECT_PROMPT: &str = "\
Analyze this sports video clip and determine if it contains a highlight moment worthy of saving.

A highlight is:
- An exciting play or action (goals, dunks, touchdowns, impressive saves, etc.)
- A key moment in the game (close calls, dramatic moments)
- Exceptional athletic performance
- Crowd reactions to big moments

NOT a highlight:
- Standard gameplay with no notable action
- Replays of commercials or commentary
- Setup moments before action
- Timeout or break periods

Use the report_highlight_detection function to report your verdict.";

pub(crate) fn detect_function() -> FunctionDecl {
    FunctionDecl {
        name: "report_highlight_detection",
        description: "Report whether a sports video clip contains a highlight moment",
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "is_highlight": {
                    "type": "BOOLEAN",
                    "description": "True if the clip contains a highlight moment"
                },
                "confidence": {
                    "type": "STRING",
                    "enum": ["high", "medium", "low"],
                    "description": "Confidence in the verdict"
                },
                "reason": {
                    "type": "STRING",
                    "description": "Brief explanation of the verdict"
                },
            },
            "required": ["is_highlight", "confidence", "reason"],
        }),
    }
}

/// The trim prompt names the window's segment grid so the model can answer
/// in segment numbers.
pub(crate) fn trim_prompt(
    window_size: usize,
    chunk_duration_secs: u32,
    detection_reason: Option<&str>,
    detection_confidence: Option<&str>,
) -> String {
    let total = window_size as u32 * chunk_duration_secs;
    let mut grid = String::new();
    for segment in 1..=window_size as u32 {
        grid.push_str(&format!(
            "- Segment {}: {}-{}s\n",
            segment,
            (segment - 1) * chunk_duration_secs,
            segment * chunk_duration_secs
        ));
    }

    let mut context = String::new();
    if let Some(reason) = detection_reason {
        context = format!(
            "\nDetection analysis:\n- Confidence: {}\n- Reason: {}\n",
            detection_confidence.unwrap_or("unknown"),
            reason
        );
    }

    format!(
        "Analyze this video clip which contains a highlight moment. Identify the exact \
         portion that should be kept.\n\n\
         The video is divided into {window_size} segments of {chunk_duration_secs} seconds \
         each (total {total} seconds):\n{grid}\n\
         Identify which consecutive segments contain the actual highlight action. Include \
         a brief buildup and follow-through, but exclude unnecessary footage before or \
         after.\n{context}\n\
         Use the report_trim_segments function to report the segment range."
    )
}

pub(crate) fn trim_function() -> FunctionDecl {
    FunctionDecl {
        name: "report_trim_segments",
        description: "Report which consecutive segments of the clip contain the highlight",
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "start_segment": {
                    "type": "INTEGER",
                    "description": "1-based first segment to keep"
                },
                "end_segment": {
                    "type": "INTEGER",
                    "description": "1-based last segment to keep (inclusive)"
                },
                "reasoning": {
                    "type": "STRING",
                    "description": "Why this range was chosen"
                },
            },
            "required": ["start_segment", "end_segment", "reasoning"],
        }),
    }
}

pub(crate) const CAPTION_PROMPT: &str = "\
Analyze this sports highlight video and generate a compelling title and description.

TITLE: a short, exciting title (5-10 words) that captures the essence of the play. \
Use action words and be specific about what happened.

DESCRIPTION: a brief description (1-2 sentences) that provides context and details \
about the highlight.

Use the report_highlight_caption function to report both.";

pub(crate) fn caption_function() -> FunctionDecl {
    FunctionDecl {
        name: "report_highlight_caption",
        description: "Report a title and description for a sports highlight video",
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "title": {
                    "type": "STRING",
                    "description": "Short, exciting title (5-10 words)"
                },
                "description": {
                    "type": "STRING",
                    "description": "Brief description (1-2 sentences)"
                },
                "key_action": {
                    "type": "STRING",
                    "description": "The single key action shown (e.g. 'goal', 'dunk')"
                },
            },
            "required": ["title", "description", "key_action"],
        }),
    }
}

pub(crate) const NARRATE_PROMPT: &str = "\
Analyze this sports video clip and generate a brief, engaging narration script that \
captures the key action.

Your narration should:
- Be 3-12 words maximum (short enough to speak in 2-3 seconds)
- Use present tense and action words
- Focus on the most exciting or important moment
- Be conversational and enthusiastic like a sports commentator

Use the report_video_narration function to provide your narration text.";

pub(crate) fn narrate_function() -> FunctionDecl {
    FunctionDecl {
        name: "report_video_narration",
        description: "Report the generated narration text for a sports video clip",
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "narration": {
                    "type": "STRING",
                    "description": "Brief narration text (3-12 words) describing the key action"
                },
            },
            "required": ["narration"],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_prompt_lists_every_segment() {
        let prompt = trim_prompt(3, 2, None, None);
        assert!(prompt.contains("Segment 1: 0-2s"));
        assert!(prompt.contains("Segment 3: 4-6s"));
        assert!(prompt.contains("total 6 seconds"));
        assert!(!prompt.contains("Detection analysis"));
    }

    #[test]
    fn test_trim_prompt_includes_detection_context() {
        let prompt = trim_prompt(9, 4, Some("late goal"), Some("high"));
        assert!(prompt.contains("Confidence: high"));
        assert!(prompt.contains("Reason: late goal"));
    }

    #[test]
    fn test_function_names_are_stable() {
        assert_eq!(detect_function().name, "report_highlight_detection");
        assert_eq!(trim_function().name, "report_trim_segments");
        assert_eq!(caption_function().name, "report_highlight_caption");
        assert_eq!(narrate_function().name, "report_video_narration");
    }
}
