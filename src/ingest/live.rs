//! Live ingestion: downloader and segmenter run as a linked pair.
//!
//! yt-dlp writes the broadcast to a pipe; ffmpeg reads the pipe and cuts
//! keyframe-aligned MP4 segments with per-segment timestamp reset. A
//! polling loop watches the segment directory and yields a segment only
//! once its successor exists, which proves the file is closed for writing.
//! When both processes exit, the remaining completed segments are drained.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClipError, Result};
use crate::ingest::downloader::{cache_dir, download_command, live_safe_format};
use crate::ingest::vod::terminate;
use crate::ingest::{deliver, IngestOptions};
use crate::scratch::ScratchScope;
use crate::types::BaseChunk;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub(crate) async fn run(
    opts: &IngestOptions,
    tx: mpsc::Sender<BaseChunk>,
    cancel: CancellationToken,
) -> Result<()> {
    let scratch = ScratchScope::new("ingest_live")?;
    let cache = cache_dir(scratch.path());
    tokio::fs::create_dir_all(&cache).await?;
    let segments = scratch.subdir("segments")?;

    let format = live_safe_format(&opts.format_selector);
    if format != opts.format_selector {
        info!(
            requested = %opts.format_selector,
            using = %format,
            "format selector overridden for live input"
        );
    }

    let mut downloader = download_command(opts, &format, &cache)
        .spawn()
        .map_err(|e| ClipError::ingest(format!("failed to spawn yt-dlp: {e}"), ""))?;

    let downloader_stdout = downloader
        .stdout
        .take()
        .ok_or_else(|| ClipError::ingest("failed to open yt-dlp stdout pipe", ""))?;
    let downloader_stderr = collect_stderr(&mut downloader);

    // The segmenter's stdin IS the downloader's stdout: a single pipe links
    // the pair, so downloader backpressure follows segmenter consumption.
    let stdin: Stdio = downloader_stdout
        .try_into()
        .map_err(|_| ClipError::ingest("failed to link downloader to segmenter", ""))?;

    let mut segmenter = segment_command(&segments, opts.chunk_duration_secs, stdin)
        .spawn()
        .map_err(|e| ClipError::ingest(format!("failed to spawn ffmpeg segmenter: {e}"), ""))?;
    let segmenter_stderr = collect_stderr(&mut segmenter);

    let mut next_index: u64 = 0;
    let mut downloader_status = None;
    let mut segmenter_status = None;

    loop {
        if cancel.is_cancelled() {
            terminate(&mut downloader).await;
            terminate(&mut segmenter).await;
            return Ok(());
        }

        if downloader_status.is_none() {
            downloader_status = downloader
                .try_wait()
                .map_err(|e| ClipError::ingest(format!("failed to poll yt-dlp: {e}"), ""))?;
        }
        if segmenter_status.is_none() {
            segmenter_status = segmenter
                .try_wait()
                .map_err(|e| ClipError::ingest(format!("failed to poll segmenter: {e}"), ""))?;
        }
        let both_exited = downloader_status.is_some() && segmenter_status.is_some();

        let available = list_segments(&segments).await?;
        let ready = ready_count(available.len(), both_exited);

        while (next_index as usize) < ready {
            let name = &available[next_index as usize];
            let data = tokio::fs::read(segments.join(name)).await?;
            debug!(segment = %name, bytes = data.len(), "yielding live segment");
            let chunk = BaseChunk {
                data: data.into(),
                index: next_index,
                duration_secs: opts.chunk_duration_secs,
            };
            if !deliver(&tx, &cancel, chunk).await {
                terminate(&mut downloader).await;
                terminate(&mut segmenter).await;
                return Ok(());
            }
            next_index += 1;
        }

        if both_exited {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }

    let (downloader_status, segmenter_status) = match (downloader_status, segmenter_status) {
        (Some(d), Some(s)) => (d, s),
        // The loop above only breaks once both statuses are known.
        _ => return Err(ClipError::ingest("lost track of child process status", "")),
    };

    // The downloader reports non-zero when a live broadcast it was reading
    // ends; treat that as end-of-stream as long as the segmenter produced a
    // clean tail.
    if !segmenter_status.success() {
        let stderr = segmenter_stderr.await.unwrap_or_default();
        return Err(ClipError::ingest(
            format!("ffmpeg segmenter exited with {segmenter_status}"),
            stderr,
        ));
    }
    if !downloader_status.success() && next_index == 0 {
        let stderr = downloader_stderr.await.unwrap_or_default();
        return Err(ClipError::ingest_transient(
            format!("yt-dlp exited with {downloader_status}"),
            stderr,
        ));
    }
    if !downloader_status.success() {
        warn!(status = %downloader_status, "downloader exited non-zero after stream ended");
    }

    info!(chunks = next_index, "live ingest drained");
    Ok(())
}

fn segment_command(segments: &Path, chunk_duration: u32, stdin: Stdio) -> Command {
    let duration = chunk_duration.to_string();
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-i", "pipe:0"])
        .args([
            "-c",
            "copy",
            "-f",
            "segment",
            "-segment_time",
            duration.as_str(),
            "-reset_timestamps",
            "1",
        ])
        .arg(segments.join("chunk_%05d.mp4"))
        .stdin(stdin)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// How many of the present segments are safe to read.
///
/// While the segmenter is running, a segment is proven closed for writing
/// only once its successor exists, so the newest file is always withheld.
/// Once both processes have exited every file is final.
fn ready_count(available: usize, both_exited: bool) -> usize {
    if both_exited {
        available
    } else {
        available.saturating_sub(1)
    }
}

/// Sorted list of segment filenames currently present.
async fn list_segments(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("chunk_") && name.ends_with(".mp4") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Drain a child's stderr in the background so the pipe never fills.
fn collect_stderr(child: &mut Child) -> JoinHandle<String> {
    let stderr = child.stderr.take();
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = tokio::io::copy(&mut stderr, &mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
