//! Command-line runner for the highlight pipeline.
//!
//! Processes one URL through the same pipelines the server runs, saving
//! highlight clips and live-commentary chunks under a timestamped output
//! directory instead of a WebSocket. Commentary chunks are buffered and
//! announced in order once an initial buffer of three has arrived, which
//! is the client-side playback contract.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipstream::config::{CommentaryConfig, LlmConfig, PipelineConfig};
use clipstream::llm::client::GeminiClient;
use clipstream::llm::live::{synthesize_speech, GeminiLiveSession};
use clipstream::llm::{LiveSession, VideoAnalyzer};
use clipstream::media::remux_audio_video;
use clipstream::pipeline::run::{run_url, RunOptions};
use clipstream::pipeline::RunEvent;
use clipstream::stages::narrate_video;
use clipstream::types::{CommentaryChunk, HighlightArtifact};

/// Commentary chunks buffered before ordered playback begins.
const INITIAL_BUFFER_SIZE: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "clipstream-cli")]
#[command(about = "Process a video URL through the highlight pipeline and save clips to disk")]
struct Params {
    /// URL of the video to process (YouTube or other supported platform)
    video_url: String,

    /// Process as a live stream
    #[arg(long)]
    live: bool,

    /// Run the live commentary pipeline alongside highlight detection
    #[arg(long)]
    enable_live_commentary: bool,

    /// Generate a narration script for each highlight and remux it as a
    /// narrated copy of the clip
    #[arg(long)]
    narrate: bool,

    /// Duration of each base chunk in seconds
    #[arg(long, default_value_t = 4)]
    base_chunk: u32,

    /// Number of chunks in the sliding window
    #[arg(long, default_value_t = 9)]
    window_size: usize,

    /// Number of chunks to slide when no highlight is found
    #[arg(long, default_value_t = 3)]
    slide_step: usize,

    /// Custom prompt for live commentary generation
    #[arg(long)]
    commentary_prompt: Option<String>,

    /// Path to a cookies file for the downloader
    #[arg(long)]
    cookies: Option<PathBuf>,

    /// Directory to save output video files
    #[arg(long, default_value = "video_output")]
    output_dir: PathBuf,

    /// Save intermediate window videos for debugging
    #[arg(long)]
    debug_videos: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let params = Params::parse();
    init_logging(params.verbose);

    if let Err(err) = run(params).await {
        error!(error = ?err, "clipstream-cli failed");
        std::process::exit(1);
    }
}

async fn run(params: Params) -> anyhow::Result<()> {
    let llm = LlmConfig::from_env()?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let output_dir = params.output_dir.join(timestamp.to_string());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let debug_dir = if params.debug_videos {
        let dir = output_dir.join("debug_vids");
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "debug mode enabled, saving intermediate videos");
        Some(dir)
    } else {
        None
    };

    let pipeline = PipelineConfig {
        chunk_duration_secs: params.base_chunk,
        window_size: params.window_size,
        slide_step: params.slide_step,
        cookies_file: params.cookies.clone(),
        debug_dir,
        ..Default::default()
    };

    let commentary = params.enable_live_commentary.then(|| {
        let mut config = CommentaryConfig::default();
        if let Some(prompt) = &params.commentary_prompt {
            config.prompt = prompt.clone();
        }
        config
    });

    info!(
        url = %params.video_url,
        base_chunk = params.base_chunk,
        window = params.window_size,
        slide = params.slide_step,
        "pipeline configuration"
    );

    let narrator = params
        .narrate
        .then(|| Narrator::new(&llm));

    let options = RunOptions {
        url: params.video_url.clone(),
        is_live: params.live,
        pipeline,
        commentary,
        llm,
    };

    let (events_tx, mut events_rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling run");
                cancel.cancel();
            }
        });
    }

    let run_task = tokio::spawn(run_url(options, events_tx, cancel));

    let mut handler = OutputHandler::new(output_dir.clone(), narrator);
    while let Some(event) = events_rx.recv().await {
        handler.handle(event).await;
    }
    run_task.await.ok();

    info!(
        highlights = handler.highlight_count,
        commentary_chunks = handler.commentary_count,
        output = %output_dir.display(),
        "processing complete"
    );
    Ok(())
}

/// Saves run output to disk and tracks ordered commentary playback.
struct OutputHandler {
    output_dir: PathBuf,
    narrator: Option<Narrator>,
    highlight_count: usize,
    commentary_count: usize,

    // Ordered playback state for commentary chunks: buffer the first
    // INITIAL_BUFFER_SIZE chunks, then announce strictly in order.
    chunk_buffer: BTreeMap<u64, PathBuf>,
    next_expected_chunk: u64,
    playback_started: bool,
}

impl OutputHandler {
    fn new(output_dir: PathBuf, narrator: Option<Narrator>) -> Self {
        Self {
            output_dir,
            narrator,
            highlight_count: 0,
            commentary_count: 0,
            chunk_buffer: BTreeMap::new(),
            next_expected_chunk: 1,
            playback_started: false,
        }
    }

    async fn handle(&mut self, event: RunEvent) {
        match event {
            RunEvent::Highlight(artifact) => {
                if let Err(err) = self.save_highlight(&artifact).await {
                    warn!(error = ?err, "failed to save highlight");
                }
            }
            RunEvent::Commentary(chunk) => {
                if let Err(err) = self.save_commentary(&chunk).await {
                    warn!(error = ?err, "failed to save commentary chunk");
                }
            }
            RunEvent::HighlightsComplete { .. } => {
                info!(saved = self.highlight_count, "highlight detection complete");
            }
            RunEvent::Error { message, terminal, .. } => {
                if terminal {
                    error!(%message, "pipeline error");
                } else {
                    warn!(%message, "pipeline error");
                }
            }
        }
    }

    async fn save_highlight(&mut self, artifact: &HighlightArtifact) -> anyhow::Result<()> {
        let dir = self.output_dir.join("highlights");
        tokio::fs::create_dir_all(&dir).await?;

        let video_name = format!("highlight_{:04}.mp4", self.highlight_count);
        tokio::fs::write(dir.join(&video_name), &artifact.data).await?;

        let narration = match &self.narrator {
            Some(narrator) => narrator.narrate_and_save(artifact, &dir, self.highlight_count).await,
            None => None,
        };

        let sidecar = serde_json::json!({
            "title": artifact.title,
            "description": artifact.description,
            "src_video_url": artifact.src_url,
            "video_file": video_name,
            "window_start_secs": artifact.metadata.window_start_secs,
            "window_end_secs": artifact.metadata.window_end_secs,
            "narration": narration,
        });
        let sidecar_name = format!("highlight_{:04}.json", self.highlight_count);
        tokio::fs::write(
            dir.join(&sidecar_name),
            serde_json::to_string_pretty(&sidecar)?,
        )
        .await?;

        info!(
            video = %format!("highlights/{video_name}"),
            bytes = artifact.data.len(),
            title = %artifact.title,
            "saved highlight"
        );
        self.highlight_count += 1;
        Ok(())
    }

    async fn save_commentary(&mut self, chunk: &CommentaryChunk) -> anyhow::Result<()> {
        let dir = self.output_dir.join("live_commentary");
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("chunk_{:04}.mp4", chunk.chunk_number);
        let path = dir.join(&name);
        tokio::fs::write(&path, &chunk.data).await?;
        info!(
            video = %format!("live_commentary/{name}"),
            bytes = chunk.data.len(),
            commentary_bytes = chunk.commentary_len,
            "received commentary chunk"
        );
        self.commentary_count += 1;

        // Buffer first, then play every consecutive chunk that is ready.
        self.chunk_buffer.insert(chunk.chunk_number, path);
        if !self.playback_started {
            if self.chunk_buffer.len() < INITIAL_BUFFER_SIZE {
                info!(
                    buffered = self.chunk_buffer.len(),
                    needed = INITIAL_BUFFER_SIZE,
                    "buffering commentary before playback"
                );
                return Ok(());
            }
            info!("initial buffer filled, starting ordered playback");
            self.playback_started = true;
        }
        while let Some(path) = self.chunk_buffer.remove(&self.next_expected_chunk) {
            info!(
                chunk = self.next_expected_chunk,
                file = %path.display(),
                "playing commentary chunk"
            );
            self.next_expected_chunk += 1;
        }
        Ok(())
    }
}

/// Narration pipeline for saved highlights: script via the analyzer, audio
/// via a live session, remuxed over the clip.
struct Narrator {
    analyzer: Arc<GeminiClient>,
    llm: LlmConfig,
}

impl Narrator {
    fn new(llm: &LlmConfig) -> Self {
        Self {
            analyzer: Arc::new(GeminiClient::new(llm)),
            llm: llm.clone(),
        }
    }

    /// Returns the narration text; the narrated clip is written next to
    /// the original. Failures degrade to an unnarrated clip.
    async fn narrate_and_save(
        &self,
        artifact: &HighlightArtifact,
        dir: &Path,
        index: usize,
    ) -> Option<String> {
        let mut meta = artifact.metadata.clone();
        let narration =
            narrate_video(self.analyzer.as_ref() as &dyn VideoAnalyzer, &artifact.data, &mut meta)
                .await;

        match self.speak_and_remux(artifact, &narration).await {
            Ok(narrated) => {
                let name = format!("narrated_{:04}.mp4", index);
                if let Err(err) = tokio::fs::write(dir.join(&name), &narrated).await {
                    warn!(error = %err, "failed to write narrated clip");
                } else {
                    info!(video = %format!("highlights/{name}"), %narration, "saved narrated clip");
                }
            }
            Err(err) => warn!(error = %err, "narration audio failed, keeping silent clip"),
        }
        Some(narration)
    }

    async fn speak_and_remux(
        &self,
        artifact: &HighlightArtifact,
        narration: &str,
    ) -> clipstream::Result<bytes::Bytes> {
        let mut session = GeminiLiveSession::connect(
            &self.llm,
            "You are a sports commentator. Read the given line with energy.",
        )
        .await?;
        let pcm = synthesize_speech(
            &mut session,
            narration,
            std::time::Duration::from_secs(10),
            60,
        )
        .await;
        let close_result = session.close().await;
        let pcm = pcm?;
        close_result?;

        if pcm.is_empty() {
            return Err(clipstream::ClipError::ProviderSession(
                "no narration audio produced".to_string(),
            ));
        }
        remux_audio_video(&artifact.data, &pcm, 24_000).await
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "clipstream=debug"
    } else {
        "clipstream=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
