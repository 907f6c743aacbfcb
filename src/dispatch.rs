//! Chunk fan-out.
//!
//! Duplicates the single chunk stream produced by the ingestor into N
//! bounded per-consumer queues. Each per-queue send is an independent
//! suspending operation, so one blocked consumer cannot stop the others
//! from receiving chunks already buffered; the next chunk is pulled only
//! after every queue has accepted the previous one, which is the engine's
//! only backpressure mechanism.

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{ClipError, Result};
use crate::types::{BaseChunk, ChunkItem};

/// Capacity of each consumer queue.
pub const QUEUE_CAPACITY: usize = 20;

/// Create a consumer queue for the dispatcher.
pub fn consumer_queue() -> (mpsc::Sender<ChunkItem>, mpsc::Receiver<ChunkItem>) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// Fan the chunk stream out to `queues`, then deliver exactly one
/// [`ChunkItem::End`] to every queue, on normal end-of-stream and on
/// ingest failure alike, so consumers never wait forever.
///
/// Returns the ingest task's error, if any, after the sentinels are out.
pub async fn dispatch(
    mut chunks: mpsc::Receiver<BaseChunk>,
    ingest: JoinHandle<Result<()>>,
    queues: Vec<mpsc::Sender<ChunkItem>>,
) -> Result<()> {
    let mut delivered: u64 = 0;
    while let Some(chunk) = chunks.recv().await {
        let sends = queues
            .iter()
            .map(|queue| queue.send(ChunkItem::Chunk(chunk.clone())));
        // A closed queue means its consumer exited; the rest keep receiving.
        let _ = join_all(sends).await;
        delivered += 1;
    }

    let outcome = match ingest.await {
        Ok(result) => result,
        Err(join_err) => Err(ClipError::ingest(
            format!("ingest task panicked: {join_err}"),
            "",
        )),
    };

    if let Err(err) = &outcome {
        error!(error = %err, "ingest failed; notifying consumers");
    }
    for queue in &queues {
        let _ = queue.send(ChunkItem::End).await;
    }
    debug!(chunks = delivered, queues = queues.len(), "dispatch complete");

    outcome
}
