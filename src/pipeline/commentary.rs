//! Live commentary consumer.
//!
//! Buffers pairs of base chunks into fixed-length analysis windows,
//! streams their frames plus a prompt into the provider's live session,
//! collects the synthesized PCM, remuxes it over the window's video, and
//! emits ordered fragmented MP4s. A window that yields no audio is skipped;
//! a window that fails in the toolkit is skipped; a session failure ends
//! this consumer without touching the highlight consumer.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::CommentaryConfig;
use crate::error::{ClipError, Result};
use crate::llm::{LiveEvent, LiveSession};
use crate::media::{concatenate, extract_frames, fragment_mp4, remux_audio_video};
use crate::pipeline::RunEvent;
use crate::types::{BaseChunk, ChunkItem, CommentaryChunk};

pub async fn run<S: LiveSession>(
    mut session: S,
    config: &CommentaryConfig,
    src_url: &str,
    mut queue: mpsc::Receiver<ChunkItem>,
    events: mpsc::Sender<RunEvent>,
) -> Result<()> {
    let result = consume(&mut session, config, src_url, &mut queue, &events).await;

    // The session is closed on every exit path; a close failure only
    // matters if the consumer was otherwise healthy.
    let closed = session.close().await;
    match (&result, closed) {
        (Ok(()), Err(err)) => Err(err),
        _ => result,
    }
}

async fn consume<S: LiveSession>(
    session: &mut S,
    config: &CommentaryConfig,
    src_url: &str,
    queue: &mut mpsc::Receiver<ChunkItem>,
    events: &mpsc::Sender<RunEvent>,
) -> Result<()> {
    let mut pending: Option<BaseChunk> = None;
    let mut chunk_number: u64 = 0;

    while let Some(item) = queue.recv().await {
        let window: Vec<BaseChunk> = match item {
            ChunkItem::Chunk(chunk) => match pending.take() {
                Some(first) => vec![first, chunk],
                None => {
                    pending = Some(chunk);
                    continue;
                }
            },
            ChunkItem::End => match pending.take() {
                // A final half-window is processed alone before exiting.
                Some(last) => {
                    emit_window(session, config, src_url, &[last], &mut chunk_number, events)
                        .await?;
                    break;
                }
                None => break,
            },
        };

        if !emit_window(session, config, src_url, &window, &mut chunk_number, events).await? {
            return Ok(());
        }
    }

    info!(windows = chunk_number, "commentary stream complete");
    Ok(())
}

/// Process one window and forward its commentary downstream.
///
/// `chunk_number` advances only when a window is actually emitted, so the
/// client-visible sequence stays dense. Per-window failures are logged and
/// skipped; only session failures propagate. Returns `false` when the
/// events channel is gone.
async fn emit_window<S: LiveSession>(
    session: &mut S,
    config: &CommentaryConfig,
    src_url: &str,
    window: &[BaseChunk],
    chunk_number: &mut u64,
    events: &mpsc::Sender<RunEvent>,
) -> Result<bool> {
    let number = *chunk_number + 1;
    match process_window(session, config, src_url, window, number).await {
        Ok(Some(commentary)) => {
            *chunk_number = number;
            Ok(events.send(RunEvent::Commentary(commentary)).await.is_ok())
        }
        Ok(None) => {
            warn!(chunk_number = number, "no audio for window, skipping emission");
            Ok(true)
        }
        Err(err @ ClipError::ProviderSession(_)) => Err(err),
        Err(err) => {
            warn!(chunk_number = number, error = %err, "window processing failed, skipping");
            Ok(true)
        }
    }
}

/// Process one analysis window; `Ok(None)` means the provider produced no
/// audio and the window is skipped.
async fn process_window<S: LiveSession>(
    session: &mut S,
    config: &CommentaryConfig,
    src_url: &str,
    window: &[BaseChunk],
    chunk_number: u64,
) -> Result<Option<CommentaryChunk>> {
    let chunk_bytes: Vec<Bytes> = window.iter().map(|c| c.data.clone()).collect();
    let video = concatenate(&chunk_bytes).await?;
    let duration_secs: u32 = window.iter().map(|c| c.duration_secs).sum();

    let frames = extract_frames(&video, config.fps).await?;
    debug!(chunk_number, frames = frames.len(), "frames extracted");

    for frame in &frames {
        session.send_frame(frame).await?;
    }
    session.send_turn(&config.prompt).await?;

    let audio = receive_audio(session, config).await?;
    if audio.is_empty() {
        return Ok(None);
    }

    let remuxed = remux_audio_video(&video, &audio, config.audio_sample_rate).await?;
    let fragmented = fragment_mp4(&remuxed).await?;

    info!(
        chunk_number,
        video_bytes = fragmented.len(),
        audio_bytes = audio.len(),
        "commentary window ready"
    );

    Ok(Some(CommentaryChunk {
        data: fragmented,
        chunk_number,
        src_url: src_url.to_string(),
        audio_sample_rate: config.audio_sample_rate,
        commentary_len: audio.len(),
        base_chunks_combined: window.len() as u32,
        duration_secs,
    }))
}

/// Collect PCM until the model's turn completes, the message cap is hit,
/// or the per-window timeout expires. A timeout keeps whatever arrived.
async fn receive_audio<S: LiveSession>(
    session: &mut S,
    config: &CommentaryConfig,
) -> Result<Bytes> {
    let mut audio: Vec<u8> = Vec::new();
    let mut messages = 0usize;

    let deadline = tokio::time::Instant::now() + config.audio_timeout();
    loop {
        let event = match tokio::time::timeout_at(deadline, session.next_event()).await {
            Ok(event) => event?,
            Err(_) => {
                warn!(bytes = audio.len(), "audio receive timed out");
                break;
            }
        };
        match event {
            LiveEvent::Audio(pcm) => {
                audio.extend_from_slice(&pcm);
                messages += 1;
                if messages >= config.max_audio_messages {
                    debug!(messages, "audio message cap reached");
                    break;
                }
            }
            LiveEvent::TurnComplete => break,
            LiveEvent::Closed => {
                if audio.is_empty() {
                    return Err(ClipError::ProviderSession(
                        "live session closed while awaiting audio".to_string(),
                    ));
                }
                break;
            }
        }
    }

    Ok(Bytes::from(audio))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::consumer_queue;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Live-session double that answers each turn with a scripted audio
    /// sequence.
    struct ScriptedLive {
        per_turn: Mutex<VecDeque<Vec<LiveEvent>>>,
        current: Mutex<VecDeque<LiveEvent>>,
        frames_seen: Arc<Mutex<usize>>,
        closed: Arc<Mutex<bool>>,
    }

    impl ScriptedLive {
        fn new(per_turn: Vec<Vec<LiveEvent>>) -> Self {
            Self {
                per_turn: Mutex::new(per_turn.into_iter().collect()),
                current: Mutex::new(VecDeque::new()),
                frames_seen: Arc::new(Mutex::new(0)),
                closed: Arc::new(Mutex::new(false)),
            }
        }
    }

    #[async_trait]
    impl LiveSession for ScriptedLive {
        async fn send_frame(&mut self, _jpeg: &[u8]) -> Result<()> {
            *self.frames_seen.lock().unwrap() += 1;
            Ok(())
        }
        async fn send_turn(&mut self, _text: &str) -> Result<()> {
            let next = self.per_turn.lock().unwrap().pop_front().unwrap_or_default();
            *self.current.lock().unwrap() = next.into_iter().collect();
            Ok(())
        }
        async fn next_event(&mut self) -> Result<LiveEvent> {
            Ok(self
                .current
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(LiveEvent::TurnComplete))
        }
        async fn close(&mut self) -> Result<()> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_receive_audio_concatenates_until_turn_complete() {
        let mut session = ScriptedLive::new(vec![vec![
            LiveEvent::Audio(Bytes::from_static(b"aa")),
            LiveEvent::Audio(Bytes::from_static(b"bb")),
            LiveEvent::TurnComplete,
        ]]);
        session.send_turn("go").await.unwrap();
        let config = CommentaryConfig::default();
        let audio = receive_audio(&mut session, &config).await.unwrap();
        assert_eq!(&audio[..], b"aabb");
    }

    #[tokio::test]
    async fn test_receive_audio_respects_message_cap() {
        let events = (0..100)
            .map(|_| LiveEvent::Audio(Bytes::from_static(b"x")))
            .collect();
        let mut session = ScriptedLive::new(vec![events]);
        session.send_turn("go").await.unwrap();
        let config = CommentaryConfig::default();
        let audio = receive_audio(&mut session, &config).await.unwrap();
        assert_eq!(audio.len(), config.max_audio_messages);
    }

    #[tokio::test]
    async fn test_session_closed_without_audio_is_fatal() {
        let mut session = ScriptedLive::new(vec![vec![LiveEvent::Closed]]);
        session.send_turn("go").await.unwrap();
        let config = CommentaryConfig::default();
        let result = receive_audio(&mut session, &config).await;
        assert!(matches!(result, Err(ClipError::ProviderSession(_))));
    }

    #[tokio::test]
    async fn test_session_is_closed_on_exit() {
        let session = ScriptedLive::new(vec![]);
        let closed = session.closed.clone();
        let config = CommentaryConfig::default();
        let (tx, rx) = consumer_queue();
        let (events_tx, _events_rx) = mpsc::channel(8);

        tx.send(ChunkItem::End).await.unwrap();
        run(session, &config, "url", rx, events_tx).await.unwrap();
        assert!(*closed.lock().unwrap());
    }
}
