//! Chunked media ingestion.
//!
//! Turns a URL into a lazy, in-order sequence of [`BaseChunk`]s of the
//! configured duration, plus an end-of-stream signal. Two modes share the
//! same surface: VOD (download, then segment) and live (download and
//! segment concurrently through a pipe). Each invocation owns its own
//! scratch and downloader-cache directories, disjoint from every other
//! concurrent invocation in the process.

mod downloader;
mod live;
mod probe;
mod vod;

pub use probe::probe_is_live;

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::types::BaseChunk;

/// Internal channel depth between the ingestor and the dispatcher. The
/// dispatcher pulls one chunk at a time, so this only smooths bursts.
const INGEST_CHANNEL_CAPACITY: usize = 2;

/// Options for one ingest invocation.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub url: String,
    pub chunk_duration_secs: u32,
    pub format_selector: String,
    pub live: bool,
    pub live_from_start: bool,
    pub cookies_file: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl IngestOptions {
    pub fn from_config(url: &str, live: bool, config: &PipelineConfig) -> Self {
        Self {
            url: url.to_string(),
            chunk_duration_secs: config.chunk_duration_secs,
            format_selector: config.format_selector.clone(),
            live,
            live_from_start: config.live_from_start,
            cookies_file: config.cookies_file.clone(),
            extra_args: config.extra_downloader_args.clone(),
        }
    }
}

/// Start ingesting `opts.url`.
///
/// Returns the chunk receiver and the ingest task handle. The task
/// resolves to `Ok(())` once every chunk has been delivered (or the run
/// was cancelled), and to an `IngestError` if the downloader or segmenter
/// exited non-zero before end-of-stream. Partial chunks are never emitted.
pub fn ingest(
    opts: IngestOptions,
    cancel: CancellationToken,
) -> (mpsc::Receiver<BaseChunk>, JoinHandle<Result<()>>) {
    let (tx, rx) = mpsc::channel(INGEST_CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mode = if opts.live { "live" } else { "vod" };
        info!(url = %opts.url, mode, chunk_duration = opts.chunk_duration_secs, "starting ingest");

        let result = if opts.live {
            live::run(&opts, tx, cancel).await
        } else {
            vod::run(&opts, tx, cancel).await
        };

        if let Err(err) = &result {
            warn!(url = %opts.url, error = %err, "ingest failed");
        }
        result
    });

    (rx, handle)
}

/// Send a chunk unless the run has been cancelled or the dispatcher is gone.
///
/// Returns `false` when the ingest loop should stop early.
pub(crate) async fn deliver(
    tx: &mpsc::Sender<BaseChunk>,
    cancel: &CancellationToken,
    chunk: BaseChunk,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(chunk) => sent.is_ok(),
    }
}
