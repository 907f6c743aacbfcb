//! VOD ingestion: download the full source, segment it, yield the segments.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ClipError, Result};
use crate::ingest::downloader::{cache_dir, download_command};
use crate::ingest::{deliver, IngestOptions};
use crate::scratch::ScratchScope;
use crate::types::BaseChunk;

pub(crate) async fn run(
    opts: &IngestOptions,
    tx: mpsc::Sender<BaseChunk>,
    cancel: CancellationToken,
) -> Result<()> {
    let scratch = ScratchScope::new("ingest_vod")?;
    let cache = cache_dir(scratch.path());
    tokio::fs::create_dir_all(&cache).await?;

    let source = scratch.file("source.mp4");
    download_to_file(opts, &cache, &source, &cancel).await?;
    if cancel.is_cancelled() {
        return Ok(());
    }

    let segments = scratch.subdir("segments")?;
    segment_file(&source, &segments, opts.chunk_duration_secs).await?;

    let mut names: Vec<String> = Vec::new();
    let mut entries = tokio::fs::read_dir(&segments).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    // Segment filenames are zero-padded, so lexical order is temporal order.
    names.sort();

    info!(count = names.len(), "segmented VOD source");

    for (index, name) in names.iter().enumerate() {
        let data = tokio::fs::read(segments.join(name)).await?;
        let chunk = BaseChunk {
            data: data.into(),
            index: index as u64,
            duration_secs: opts.chunk_duration_secs,
        };
        if !deliver(&tx, &cancel, chunk).await {
            break;
        }
    }

    Ok(())
}

/// Stream the downloader's stdout into `dest`, logging progress.
async fn download_to_file(
    opts: &IngestOptions,
    cache: &Path,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut child = download_command(opts, &opts.format_selector, cache)
        .spawn()
        .map_err(|e| ClipError::ingest(format!("failed to spawn yt-dlp: {e}"), ""))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| ClipError::ingest("failed to open yt-dlp stdout pipe", ""))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| ClipError::ingest("failed to open yt-dlp stderr pipe", ""))?;

    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = tokio::io::copy(&mut stderr, &mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    });

    // Manual copy loop so progress is visible on long downloads.
    const PROGRESS_EVERY: u64 = 16 * 1024 * 1024;
    let mut file = tokio::fs::File::create(dest).await?;
    let mut buf = vec![0u8; 256 * 1024];
    let mut copied: u64 = 0;
    let mut last_report: u64 = 0;
    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                let _ = stderr_task.await;
                return Ok(());
            }
            n = stdout.read(&mut buf) => n?,
        };
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).await?;
        copied += n as u64;
        if copied - last_report >= PROGRESS_EVERY {
            debug!(mib = copied / (1024 * 1024), "download progress");
            last_report = copied;
        }
    }
    file.flush().await?;
    debug!(bytes = copied, "download complete");

    let status = child
        .wait()
        .await
        .map_err(|e| ClipError::ingest(format!("failed to wait for yt-dlp: {e}"), ""))?;
    let stderr_text = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(ClipError::ingest_transient(
            format!("yt-dlp exited with {status}"),
            stderr_text,
        ));
    }
    if copied == 0 {
        return Err(ClipError::ingest("yt-dlp produced no data", stderr_text));
    }
    Ok(())
}

/// Cut a local file into `chunk_duration`-second MP4 segments with
/// per-segment timestamp reset.
async fn segment_file(source: &Path, segments: &Path, chunk_duration: u32) -> Result<()> {
    let duration = chunk_duration.to_string();
    let output = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
        .arg(source)
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
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ClipError::ingest(format!("failed to spawn ffmpeg segmenter: {e}"), ""))?;

    if !output.status.success() {
        return Err(ClipError::ingest(
            format!("ffmpeg segmenter exited with {}", output.status),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(())
}

/// SIGTERM the child, then SIGKILL after a short grace period.
pub(crate) async fn terminate(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    let _ = child.start_kill();

    let grace = tokio::time::timeout(std::time::Duration::from_secs(5), child.wait()).await;
    if grace.is_err() {
        let _ = child.kill().await;
    }
}
