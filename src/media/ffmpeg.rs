//! ffmpeg subprocess runner.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{ClipError, Result};

/// Run ffmpeg with the given arguments, working directory `cwd`.
///
/// Standard output is discarded; standard error is captured and attached
/// to the returned [`ClipError::Transform`] on a non-zero exit.
pub(crate) async fn run_ffmpeg<I, S>(op: &'static str, cwd: &Path, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ClipError::transform(op, format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(ClipError::transform(op, stderr));
    }

    debug!(op, "ffmpeg completed");
    Ok(())
}
