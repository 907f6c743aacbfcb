//! Configuration file support
//!
//! Loads server configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{CommentaryConfig, PipelineConfig, ServerConfig};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: Option<ServerSettings>,
    /// Pipeline settings
    pub pipeline: Option<PipelineSettings>,
    /// Live commentary settings
    pub commentary: Option<CommentarySettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
    /// Enable the live commentary consumer
    pub enable_live_commentary: Option<bool>,
    /// Maximum URL runs in flight at once
    pub max_concurrent_runs: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Base chunk duration in seconds
    pub chunk_duration_secs: Option<u32>,
    /// Chunks per sliding window
    pub window_size: Option<usize>,
    /// Window advance on a "no highlight" verdict
    pub slide_step: Option<usize>,
    /// yt-dlp format selector
    pub format_selector: Option<String>,
    /// Path to a cookies file for the downloader
    pub cookies_file: Option<String>,
    /// For live sources, start from the beginning of the broadcast
    pub live_from_start: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentarySettings {
    /// Frames per second sent to the live session
    pub fps: Option<f64>,
    /// Commentary prompt
    pub prompt: Option<String>,
    /// Per-window audio timeout in seconds
    pub audio_timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Convert to a ServerConfig, filling unset values with defaults
    pub fn into_server_config(self) -> ServerConfig {
        let mut config = ServerConfig::default();

        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(enable) = server.enable_live_commentary {
                config.enable_live_commentary = enable;
            }
            if let Some(max_runs) = server.max_concurrent_runs {
                config.max_concurrent_runs = max_runs;
            }
        }

        if let Some(pipeline) = self.pipeline {
            let target = &mut config.pipeline;
            if let Some(duration) = pipeline.chunk_duration_secs {
                target.chunk_duration_secs = duration;
            }
            if let Some(window) = pipeline.window_size {
                target.window_size = window;
            }
            if let Some(step) = pipeline.slide_step {
                target.slide_step = step;
            }
            if let Some(selector) = pipeline.format_selector {
                target.format_selector = selector;
            }
            if let Some(cookies) = pipeline.cookies_file {
                target.cookies_file = Some(cookies.into());
            }
            if let Some(from_start) = pipeline.live_from_start {
                target.live_from_start = from_start;
            }
        }

        if let Some(commentary) = self.commentary {
            let target = &mut config.commentary;
            if let Some(fps) = commentary.fps {
                target.fps = fps;
            }
            if let Some(prompt) = commentary.prompt {
                target.prompt = prompt;
            }
            if let Some(timeout) = commentary.audio_timeout_secs {
                target.audio_timeout_secs = timeout;
            }
        }

        config
    }
}
