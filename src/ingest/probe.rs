//! Source liveness probing.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{ClipError, Result};
use crate::scratch::ScratchScope;

/// Probe a URL's metadata and return true iff the source is a live or
/// upcoming broadcast.
///
/// One `yt-dlp --dump-json` call; callers that already know the liveness
/// of their URL should skip it.
pub async fn probe_is_live(url: &str, cookies_file: Option<&Path>) -> Result<bool> {
    let scratch = ScratchScope::new("probe")?;

    let mut cmd = Command::new("yt-dlp");
    cmd.arg("--dump-json")
        .arg("--quiet")
        .arg("--no-warnings")
        .arg("--cache-dir")
        .arg(scratch.path());
    if let Some(cookies) = cookies_file {
        cmd.arg("--cookies").arg(cookies);
    }
    cmd.arg(url);

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ClipError::ingest(format!("failed to spawn yt-dlp: {e}"), ""))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(ClipError::ingest_transient(
            format!("yt-dlp metadata probe exited with {}", output.status),
            stderr,
        ));
    }

    let info: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let live = interpret_liveness(&info);
    debug!(url, live, "probed source liveness");
    Ok(live)
}

/// A source counts as live when it is broadcasting now or scheduled to.
fn interpret_liveness(info: &serde_json::Value) -> bool {
    let is_live = info
        .get("is_live")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let live_status = info
        .get("live_status")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    is_live || live_status == "is_live" || live_status == "is_upcoming"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vod_metadata_is_not_live() {
        let info = serde_json::json!({"is_live": false, "live_status": "not_live"});
        assert!(!interpret_liveness(&info));
    }

    #[test]
    fn test_live_flag_detected() {
        let info = serde_json::json!({"is_live": true});
        assert!(interpret_liveness(&info));
    }

    #[test]
    fn test_upcoming_counts_as_live() {
        let info = serde_json::json!({"live_status": "is_upcoming"});
        assert!(interpret_liveness(&info));
    }

    #[test]
    fn test_missing_fields_default_to_vod() {
        let info = serde_json::json!({"title": "x"});
        assert!(!interpret_liveness(&info));
    }
}
