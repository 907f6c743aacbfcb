//! WebSocket endpoint: one URL run per connection.
//!
//! The handler validates the query parameters, spawns the run, and relays
//! its events as JSON text frames. A client disconnect cancels the run:
//! the ingestor terminates its child processes and every scratch directory
//! is released.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::http::messages::ServerMessage;
use crate::pipeline::run::{run_url, RunOptions};
use crate::pipeline::RunEvent;
use crate::state::AppState;

/// Events buffered between the run and the socket writer.
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Deserialize)]
pub struct SnippetQuery {
    video_url: Option<String>,
    is_live: Option<String>,
}

/// `GET /ws/video-snippets?video_url=...&is_live=...`
pub async fn video_snippets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SnippetQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(state, query, socket))
}

async fn handle_connection(state: Arc<AppState>, query: SnippetQuery, mut socket: WebSocket) {
    let Some(video_url) = query.video_url.filter(|u| !u.is_empty()) else {
        warn!("WebSocket connection missing video_url parameter");
        send_message(
            &mut socket,
            &ServerMessage::Error {
                message: "Missing required parameter: video_url".to_string(),
                metadata: None,
            },
        )
        .await;
        return;
    };
    let Some(is_live_raw) = query.is_live else {
        warn!("WebSocket connection missing is_live parameter");
        send_message(
            &mut socket,
            &ServerMessage::Error {
                message: "Missing required parameter: is_live".to_string(),
                metadata: None,
            },
        )
        .await;
        return;
    };
    let is_live = matches!(is_live_raw.to_lowercase().as_str(), "true" | "1" | "yes");

    info!(url = %video_url, is_live, "new WebSocket connection");

    let options = RunOptions {
        url: video_url.clone(),
        is_live,
        pipeline: state.config.pipeline.clone(),
        commentary: state
            .config
            .enable_live_commentary
            .then(|| state.config.commentary.clone()),
        llm: state.llm.clone(),
    };

    let Some(run_id) = state.try_register_run(&video_url, is_live) else {
        warn!(url = %video_url, "refusing connection: server at capacity");
        send_message(
            &mut socket,
            &ServerMessage::Error {
                message: "Server is at capacity, try again later".to_string(),
                metadata: None,
            },
        )
        .await;
        return;
    };

    let (events_tx, mut events_rx) = mpsc::channel::<RunEvent>(EVENT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(run_url(options, events_tx, cancel.clone()));

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(event) => {
                    let message = ServerMessage::from_event(event);
                    if !send_message(&mut socket, &message).await {
                        cancel.cancel();
                        break;
                    }
                }
                // The run dropped its event sender: it is finished.
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    info!(url = %video_url, "client disconnected, cancelling run");
                    cancel.cancel();
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(url = %video_url, error = %err, "WebSocket receive error");
                    cancel.cancel();
                    break;
                }
            },
        }
    }

    let _ = run.await;
    state.remove_run(run_id);
    let _ = socket.send(Message::Close(None)).await;
}

/// Serialize and send one message; false when the socket is gone.
async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "failed to serialize server message");
            return true;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}
