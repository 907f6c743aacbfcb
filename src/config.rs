//! Engine and server configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClipError, Result};

/// Default yt-dlp format selector for VOD downloads
pub const DEFAULT_FORMAT_SELECTOR: &str = "best[ext=mp4]/best";

/// Sliding-window pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Duration of each base chunk in seconds
    pub chunk_duration_secs: u32,

    /// Number of base chunks per analysis window
    pub window_size: usize,

    /// Number of chunks the window advances after a "no highlight" verdict.
    /// After a highlight the window always jumps by `window_size`.
    pub slide_step: usize,

    /// yt-dlp format selector
    pub format_selector: String,

    /// Additional yt-dlp command-line flags
    pub extra_downloader_args: Vec<String>,

    /// Optional cookies file handed to the downloader
    pub cookies_file: Option<PathBuf>,

    /// For live sources, start from the beginning instead of the live edge
    pub live_from_start: bool,

    /// When set, intermediate window videos are written here before trimming
    pub debug_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: 4,
            window_size: 9,
            slide_step: 3,
            format_selector: DEFAULT_FORMAT_SELECTOR.to_string(),
            extra_downloader_args: Vec::new(),
            cookies_file: None,
            live_from_start: false,
            debug_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Validate window parameters. Called once at run start; failures are
    /// fatal for the run.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_duration_secs == 0 {
            return Err(ClipError::config("chunk_duration_secs must be > 0"));
        }
        if self.window_size == 0 {
            return Err(ClipError::config("window_size must be > 0"));
        }
        if self.slide_step == 0 {
            return Err(ClipError::config("slide_step must be > 0"));
        }
        Ok(())
    }

    /// Maximum number of chunks retained in the rolling buffer.
    pub fn max_cache(&self) -> usize {
        (3 * self.window_size).max(20)
    }
}

/// Live commentary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentaryConfig {
    /// Frames per second extracted from each analysis window
    pub fps: f64,

    /// User prompt sent after the frames of each window
    pub prompt: String,

    /// System instruction for the live session
    pub system_instruction: String,

    /// Sample rate of the provider's synthesized PCM output
    pub audio_sample_rate: u32,

    /// Hard cap on waiting for a window's audio, in seconds
    pub audio_timeout_secs: u64,

    /// Soft cap on PCM messages collected per window
    pub max_audio_messages: usize,
}

impl Default for CommentaryConfig {
    fn default() -> Self {
        Self {
            fps: 1.0,
            prompt: "Provide minimal sports commentary (3-12 words) describing \
                     the key action you see. Be natural and energetic!"
                .to_string(),
            system_instruction: "You are a helpful sports commentator providing \
                                 live audio commentary."
                .to_string(),
            audio_sample_rate: 24_000,
            audio_timeout_secs: 10,
            max_audio_messages: 60,
        }
    }
}

impl CommentaryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fps > 0.0) {
            return Err(ClipError::config("commentary fps must be > 0"));
        }
        if self.audio_sample_rate == 0 {
            return Err(ClipError::config("audio_sample_rate must be > 0"));
        }
        Ok(())
    }

    pub fn audio_timeout(&self) -> Duration {
        Duration::from_secs(self.audio_timeout_secs)
    }
}

/// Model endpoint configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the provider
    pub api_key: String,

    /// Request/response multimodal model
    pub model: String,

    /// Bidirectional live model
    pub live_model: String,
}

impl LlmConfig {
    pub const API_KEY_VAR: &'static str = "GEMINI_API_KEY";

    /// Read the API key from the environment. Missing key is a startup
    /// configuration error.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(Self::API_KEY_VAR)
            .map_err(|_| ClipError::config(format!("{} is not set", Self::API_KEY_VAR)))?;
        if api_key.is_empty() {
            return Err(ClipError::config(format!("{} is empty", Self::API_KEY_VAR)));
        }
        Ok(Self::with_key(api_key))
    }

    pub fn with_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-2.5-flash".to_string(),
            live_model: "gemini-2.0-flash-live-001".to_string(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Run the live commentary consumer alongside highlight detection
    pub enable_live_commentary: bool,

    /// Maximum URL runs in flight at once; further connections are refused
    pub max_concurrent_runs: usize,

    /// Pipeline settings applied to each run
    pub pipeline: PipelineConfig,

    /// Live commentary settings
    pub commentary: CommentaryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            enable_live_commentary: false,
            max_concurrent_runs: 8,
            pipeline: PipelineConfig::default(),
            commentary: CommentaryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_duration_secs, 4);
        assert_eq!(config.window_size, 9);
        assert_eq!(config.slide_step, 3);
        assert_eq!(config.format_selector, "best[ext=mp4]/best");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_validation_rejects_zero_window() {
        let config = PipelineConfig {
            window_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ClipError::Config(_))));
    }

    #[test]
    fn test_pipeline_validation_rejects_zero_step() {
        let config = PipelineConfig {
            slide_step: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_cache_floor() {
        let small = PipelineConfig {
            window_size: 3,
            ..Default::default()
        };
        assert_eq!(small.max_cache(), 20);

        let large = PipelineConfig {
            window_size: 9,
            ..Default::default()
        };
        assert_eq!(large.max_cache(), 27);
    }

    #[test]
    fn test_commentary_defaults() {
        let config = CommentaryConfig::default();
        assert_eq!(config.audio_sample_rate, 24_000);
        assert_eq!(config.audio_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_commentary_rejects_bad_fps() {
        let config = CommentaryConfig {
            fps: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_socket_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr(), "0.0.0.0:5000");
    }
}
