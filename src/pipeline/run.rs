//! Per-URL run supervisor.
//!
//! Wires one ingestor, one dispatcher, one highlight consumer, and zero or
//! one commentary consumer together, and owns the run's cancellation
//! discipline: a cancelled token tears down the child processes (via the
//! ingestor), aborts the consumers, and leaves no queue without its
//! sentinel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{CommentaryConfig, LlmConfig, PipelineConfig};
use crate::dispatch::{consumer_queue, dispatch};
use crate::error::{ClipError, Result};
use crate::ingest::{ingest, IngestOptions};
use crate::llm::client::GeminiClient;
use crate::llm::live::GeminiLiveSession;
use crate::pipeline::{commentary, highlight, RunEvent};
use crate::stages::GeminiStages;

/// Everything one URL run needs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub url: String,
    pub is_live: bool,
    pub pipeline: PipelineConfig,
    /// `Some` enables the live commentary consumer
    pub commentary: Option<CommentaryConfig>,
    pub llm: LlmConfig,
}

/// Drive one URL run to completion, emitting [`RunEvent`]s as it goes.
///
/// Never panics outward; every failure becomes an event. Cancelling the
/// token stops ingestion (terminating the downloader and segmenter),
/// aborts the consumers, and returns once everything is reaped.
pub async fn run_url(opts: RunOptions, events: mpsc::Sender<RunEvent>, cancel: CancellationToken) {
    if let Err(err) = validate(&opts) {
        error!(url = %opts.url, error = %err, "run rejected");
        send_error(&events, Some(&opts.url), &err, true).await;
        return;
    }

    info!(
        url = %opts.url,
        is_live = opts.is_live,
        commentary = opts.commentary.is_some(),
        "starting run"
    );

    let ingest_opts = IngestOptions::from_config(&opts.url, opts.is_live, &opts.pipeline);
    let (chunks_rx, ingest_handle) = ingest(ingest_opts, cancel.clone());

    let mut queues = Vec::new();

    let (highlight_tx, highlight_rx) = consumer_queue();
    queues.push(highlight_tx);

    let commentary_rx = opts.commentary.as_ref().map(|_| {
        let (tx, rx) = consumer_queue();
        queues.push(tx);
        rx
    });

    let mut dispatcher = tokio::spawn(dispatch(chunks_rx, ingest_handle, queues));

    let mut highlight_task = {
        let analyzer = Arc::new(GeminiClient::new(&opts.llm));
        let stages = GeminiStages::new(analyzer, opts.pipeline.debug_dir.clone());
        let config = opts.pipeline.clone();
        let url = opts.url.clone();
        let events = events.clone();
        tokio::spawn(async move {
            highlight::run(&stages, &config, &url, highlight_rx, events).await
        })
    };

    let mut commentary_task: Option<JoinHandle<Result<()>>> =
        match (opts.commentary.clone(), commentary_rx) {
            (Some(config), Some(rx)) => {
                let llm = opts.llm.clone();
                let url = opts.url.clone();
                let events = events.clone();
                Some(tokio::spawn(async move {
                    let session =
                        GeminiLiveSession::connect(&llm, &config.system_instruction).await?;
                    commentary::run(session, &config, &url, rx, events).await
                }))
            }
            _ => None,
        };

    // The dispatcher resolves once the ingestor is done and every queue has
    // its sentinel; its error is the run's ingest outcome.
    let ingest_outcome = tokio::select! {
        _ = cancel.cancelled() => {
            shutdown(dispatcher, highlight_task, commentary_task).await;
            return;
        }
        result = &mut dispatcher => flatten("dispatcher", result),
    };

    let highlight_outcome = tokio::select! {
        _ = cancel.cancelled() => {
            shutdown_consumers(highlight_task, commentary_task).await;
            return;
        }
        result = &mut highlight_task => flatten("highlight consumer", result),
    };

    let commentary_outcome = match commentary_task {
        Some(mut task) => tokio::select! {
            _ = cancel.cancelled() => {
                task.abort();
                let _ = task.await;
                return;
            }
            result = &mut task => Some(flatten("commentary consumer", result)),
        },
        None => None,
    };

    if let Err(err) = highlight_outcome {
        warn!(url = %opts.url, error = %err, "highlight consumer failed");
        send_error(&events, Some(&opts.url), &err, false).await;
    }
    if let Some(Err(err)) = commentary_outcome {
        warn!(url = %opts.url, error = %err, "commentary consumer failed");
        send_error(&events, Some(&opts.url), &err, false).await;
    }

    // A terminal ingest error is the run's last message.
    if let Err(err) = ingest_outcome {
        send_error(&events, Some(&opts.url), &err, true).await;
        return;
    }

    info!(url = %opts.url, "run complete");
}

fn validate(opts: &RunOptions) -> Result<()> {
    opts.pipeline.validate()?;
    if let Some(commentary) = &opts.commentary {
        commentary.validate()?;
    }
    Ok(())
}

fn flatten(task: &str, result: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match result {
        Ok(inner) => inner,
        Err(join_err) if join_err.is_cancelled() => Ok(()),
        Err(join_err) => Err(ClipError::stage("supervisor", format!("{task} panicked: {join_err}"))),
    }
}

async fn send_error(
    events: &mpsc::Sender<RunEvent>,
    src_url: Option<&str>,
    err: &ClipError,
    terminal: bool,
) {
    let _ = events
        .send(RunEvent::Error {
            src_url: src_url.map(str::to_string),
            message: err.client_message(),
            terminal,
        })
        .await;
}

/// Abort and reap every task of a cancelled run. The ingestor observes the
/// same token and terminates its child processes on its own.
async fn shutdown(
    dispatcher: JoinHandle<Result<()>>,
    highlight: JoinHandle<Result<()>>,
    commentary: Option<JoinHandle<Result<()>>>,
) {
    // Consumers go first: dropping their queue receivers guarantees the
    // dispatcher can never block on a full queue while it winds down.
    shutdown_consumers(highlight, commentary).await;
    let _ = dispatcher.await;
}

async fn shutdown_consumers(
    highlight: JoinHandle<Result<()>>,
    commentary: Option<JoinHandle<Result<()>>>,
) {
    highlight.abort();
    let _ = highlight.await;
    if let Some(task) = commentary {
        task.abort();
        let _ = task.await;
    }
}
