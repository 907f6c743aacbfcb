//! Sliding-window highlight consumer.
//!
//! Maintains a rolling buffer of recent chunks and repeatedly runs the
//! detect → trim → caption chain over overlapping windows. The step is
//! adaptive: a "no highlight" verdict advances the window by `slide_step`;
//! a detected highlight advances it by the full window size so emitted
//! highlights can never overlap.
//!
//! All window arithmetic uses absolute sequence numbers, so trimming the
//! rolling buffer never shifts window positions.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::RunEvent;
use crate::stages::HighlightStages;
use crate::types::{BaseChunk, ChunkItem, HighlightArtifact, WindowMetadata};

pub async fn run<S: HighlightStages>(
    stages: &S,
    config: &PipelineConfig,
    src_url: &str,
    mut queue: mpsc::Receiver<ChunkItem>,
    events: mpsc::Sender<RunEvent>,
) -> Result<()> {
    let window_size = config.window_size;
    let slide_step = config.slide_step as u64;
    let max_cache = config.max_cache();

    // Rolling buffer of the most recent chunks; `buffer[0]` always holds
    // the chunk with absolute index `total_received - buffer.len()`.
    let mut buffer: VecDeque<BaseChunk> = VecDeque::with_capacity(max_cache);
    let mut total_received: u64 = 0;
    let mut current_window_start: u64 = 0;
    let mut last_processed: Option<u64> = None;

    while let Some(item) = queue.recv().await {
        let chunk = match item {
            ChunkItem::Chunk(chunk) => chunk,
            ChunkItem::End => break,
        };

        buffer.push_back(chunk);
        total_received += 1;
        if buffer.len() > max_cache {
            buffer.pop_front();
        }

        if buffer.len() < window_size {
            continue;
        }

        let oldest_cached = total_received - buffer.len() as u64;
        if current_window_start < oldest_cached {
            // The window start fell out of cache; resume from the oldest
            // position that is still available.
            debug!(
                from = current_window_start,
                to = oldest_cached,
                "window start fell out of cache"
            );
            current_window_start = oldest_cached;
        }

        // The buffer must hold the full window starting at the current
        // position before it can be evaluated.
        if current_window_start + window_size as u64 > total_received {
            continue;
        }
        if last_processed.is_some_and(|p| current_window_start <= p) {
            continue;
        }

        let offset = (current_window_start - oldest_cached) as usize;
        let window: Vec<Bytes> = buffer
            .iter()
            .skip(offset)
            .take(window_size)
            .map(|c| c.data.clone())
            .collect();

        let mut meta = WindowMetadata::for_window(
            src_url,
            current_window_start,
            window_size,
            config.chunk_duration_secs,
        );

        debug!(
            window_start = current_window_start,
            window_end = meta.window_end_chunk,
            "evaluating window"
        );

        if stages.detect(&window, &mut meta).await {
            let trimmed = stages.trim(&window, &mut meta).await;
            let (title, description) = stages.caption(&trimmed, &mut meta).await;

            info!(
                window_start = current_window_start,
                %title,
                bytes = trimmed.len(),
                "highlight emitted"
            );
            let artifact = HighlightArtifact {
                data: trimmed,
                title,
                description,
                src_url: src_url.to_string(),
                metadata: meta,
            };
            if events.send(RunEvent::Highlight(artifact)).await.is_err() {
                return Ok(());
            }

            last_processed = Some(current_window_start);
            // Full-window jump: the next window cannot overlap an emitted
            // highlight.
            current_window_start += window_size as u64;
        } else {
            last_processed = Some(current_window_start);
            current_window_start += slide_step;
        }
    }

    info!(chunks = total_received, "highlight stream complete");
    let _ = events
        .send(RunEvent::HighlightsComplete {
            src_url: src_url.to_string(),
        })
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::consumer_queue;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Stage double that records evaluated window starts and answers from a
    /// script keyed by window start index.
    struct ScriptedStages {
        highlight_at: Vec<u64>,
        evaluated: Mutex<Vec<u64>>,
        trim_to_first: bool,
    }

    impl ScriptedStages {
        fn never() -> Self {
            Self {
                highlight_at: vec![],
                evaluated: Mutex::new(vec![]),
                trim_to_first: false,
            }
        }

        fn at(starts: &[u64]) -> Self {
            Self {
                highlight_at: starts.to_vec(),
                evaluated: Mutex::new(vec![]),
                trim_to_first: false,
            }
        }

        fn evaluated(&self) -> Vec<u64> {
            self.evaluated.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HighlightStages for ScriptedStages {
        async fn detect(&self, _chunks: &[Bytes], meta: &mut WindowMetadata) -> bool {
            self.evaluated.lock().unwrap().push(meta.window_start_chunk);
            self.highlight_at.contains(&meta.window_start_chunk)
        }

        async fn trim(&self, chunks: &[Bytes], meta: &mut WindowMetadata) -> Bytes {
            meta.trim_method = Some("llm".to_string());
            if self.trim_to_first {
                chunks[0].clone()
            } else {
                Bytes::from(chunks.concat())
            }
        }

        async fn caption(&self, _video: &Bytes, meta: &mut WindowMetadata) -> (String, String) {
            meta.caption_method = Some("llm".to_string());
            ("Goal!".to_string(), "A goal is scored.".to_string())
        }
    }

    fn config(window: usize, step: usize, duration: u32) -> PipelineConfig {
        PipelineConfig {
            chunk_duration_secs: duration,
            window_size: window,
            slide_step: step,
            ..Default::default()
        }
    }

    async fn feed(tx: &mpsc::Sender<ChunkItem>, count: u64, duration: u32) {
        for index in 0..count {
            tx.send(ChunkItem::Chunk(BaseChunk {
                data: Bytes::from(format!("chunk-{index}")),
                index,
                duration_secs: duration,
            }))
            .await
            .unwrap();
        }
        tx.send(ChunkItem::End).await.unwrap();
    }

    async fn collect(mut rx: mpsc::Receiver<RunEvent>) -> (Vec<HighlightArtifact>, usize, usize) {
        let mut artifacts = Vec::new();
        let mut completes = 0;
        let mut errors = 0;
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::Highlight(a) => artifacts.push(a),
                RunEvent::HighlightsComplete { .. } => completes += 1,
                RunEvent::Error { .. } => errors += 1,
                RunEvent::Commentary(_) => {}
            }
        }
        (artifacts, completes, errors)
    }

    #[tokio::test]
    async fn test_no_highlights_evaluates_every_step() {
        // chunk_duration=2, W=3, S=1; 6 chunks; detect always false:
        // windows evaluated at starts 0,1,2,3 and zero highlights.
        let stages = ScriptedStages::never();
        let config = config(3, 1, 2);
        let (tx, rx) = consumer_queue();
        let (events_tx, events_rx) = mpsc::channel(16);

        feed(&tx, 6, 2).await;
        run(&stages, &config, "url", rx, events_tx).await.unwrap();

        assert_eq!(stages.evaluated(), vec![0, 1, 2, 3]);
        let (artifacts, completes, errors) = collect(events_rx).await;
        assert!(artifacts.is_empty());
        assert_eq!(completes, 1);
        assert_eq!(errors, 0);
    }

    #[tokio::test]
    async fn test_highlight_jumps_full_window() {
        // Same config; detect true only at window start 0: one artifact,
        // then evaluation resumes at 3 (full-window jump), then 4, 5... but
        // only starts 3 fits in 6 chunks... window starting at 3 covers
        // chunks 3..5, the last complete window.
        let stages = ScriptedStages::at(&[0]);
        let config = config(3, 1, 2);
        let (tx, rx) = consumer_queue();
        let (events_tx, events_rx) = mpsc::channel(16);

        feed(&tx, 6, 2).await;
        run(&stages, &config, "url", rx, events_tx).await.unwrap();

        assert_eq!(stages.evaluated(), vec![0, 3]);
        let (artifacts, completes, _) = collect(events_rx).await;
        assert_eq!(artifacts.len(), 1);
        assert_eq!(completes, 1);

        let artifact = &artifacts[0];
        assert_eq!(artifact.title, "Goal!");
        assert_eq!(artifact.description, "A goal is scored.");
        assert_eq!(artifact.metadata.window_start_chunk, 0);
        assert_eq!(artifact.metadata.window_end_chunk, 2);
        assert_eq!(artifact.metadata.window_start_secs, 0);
        assert_eq!(artifact.metadata.window_end_secs, 6);
    }

    #[tokio::test]
    async fn test_consecutive_highlights_never_overlap() {
        let stages = ScriptedStages::at(&[0, 3]);
        let config = config(3, 1, 2);
        let (tx, rx) = consumer_queue();
        let (events_tx, events_rx) = mpsc::channel(16);

        feed(&tx, 9, 2).await;
        run(&stages, &config, "url", rx, events_tx).await.unwrap();

        let (artifacts, _, _) = collect(events_rx).await;
        assert_eq!(artifacts.len(), 2);
        for pair in artifacts.windows(2) {
            assert!(pair[0].metadata.window_end_chunk < pair[1].metadata.window_start_chunk);
        }
    }

    #[tokio::test]
    async fn test_short_stream_produces_no_windows_but_completes() {
        // W=9, S=3; 8 chunks then End: zero windows, complete still emitted.
        let stages = ScriptedStages::never();
        let config = config(9, 3, 2);
        let (tx, rx) = consumer_queue();
        let (events_tx, events_rx) = mpsc::channel(16);

        feed(&tx, 8, 2).await;
        run(&stages, &config, "url", rx, events_tx).await.unwrap();

        assert!(stages.evaluated().is_empty());
        let (artifacts, completes, _) = collect(events_rx).await;
        assert!(artifacts.is_empty());
        assert_eq!(completes, 1);
    }

    #[tokio::test]
    async fn test_empty_stream_emits_exactly_one_complete() {
        let stages = ScriptedStages::never();
        let config = config(3, 1, 2);
        let (tx, rx) = consumer_queue();
        let (events_tx, events_rx) = mpsc::channel(16);

        tx.send(ChunkItem::End).await.unwrap();
        drop(tx);
        run(&stages, &config, "url", rx, events_tx).await.unwrap();

        let (artifacts, completes, _) = collect(events_rx).await;
        assert!(artifacts.is_empty());
        assert_eq!(completes, 1);
    }

    #[tokio::test]
    async fn test_window_size_exactly_met_evaluates_once() {
        // W chunks produce exactly one evaluation; W-1 produce zero.
        let stages = ScriptedStages::never();
        let config = config(5, 2, 1);
        let (tx, rx) = consumer_queue();
        let (events_tx, _events_rx) = mpsc::channel(16);

        feed(&tx, 5, 1).await;
        run(&stages, &config, "url", rx, events_tx).await.unwrap();
        assert_eq!(stages.evaluated(), vec![0]);
    }

    #[tokio::test]
    async fn test_buffer_truncation_does_not_shift_windows() {
        // A tiny window with a large chunk count forces the rolling buffer
        // to truncate; absolute indices must keep advancing monotonically
        // without reprocessing.
        let stages = ScriptedStages::never();
        let config = config(3, 1, 1);
        let (tx, rx) = consumer_queue();
        let (events_tx, _events_rx) = mpsc::channel(64);

        let feeder = tokio::spawn({
            let tx = tx.clone();
            async move { feed(&tx, 60, 1).await }
        });
        drop(tx);
        run(&stages, &config, "url", rx, events_tx).await.unwrap();
        feeder.await.unwrap();

        let evaluated = stages.evaluated();
        assert_eq!(evaluated.first().copied(), Some(0));
        assert!(evaluated.windows(2).all(|w| w[0] < w[1]), "no reprocessing");
        // 60 chunks, W=3: last start is 57.
        assert_eq!(evaluated.last().copied(), Some(57));
    }
}
