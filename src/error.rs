use thiserror::Error;

/// Main error type for the highlight pipeline engine
#[derive(Error, Debug)]
pub enum ClipError {
    /// Invalid configuration detected at startup (missing API key, bad window parameters)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The downloader or segmenter exited non-zero while the chunk stream was open
    #[error("Ingest error: {message}")]
    Ingest {
        transient: bool,
        message: String,
        stderr: String,
    },

    /// A media toolkit operation failed; carries the tool's standard-error text
    #[error("Transform error in {op}: {stderr}")]
    Transform { op: &'static str, stderr: String },

    /// An LLM stage returned a malformed or unexpected payload, or exhausted retries
    #[error("Stage error in {stage}: {message}")]
    Stage {
        stage: &'static str,
        message: String,
    },

    /// A live-session connect, send, or disconnect failed; fatal to its consumer only
    #[error("Provider session error: {0}")]
    ProviderSession(String),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON serialization or parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An outbound HTTP request to the model endpoint failed
    #[error("HTTP error: {0}")]
    Http(String),
}

impl ClipError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn ingest(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Ingest {
            transient: false,
            message: message.into(),
            stderr: stderr.into(),
        }
    }

    pub(crate) fn ingest_transient(
        message: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Ingest {
            transient: true,
            message: message.into(),
            stderr: stderr.into(),
        }
    }

    pub(crate) fn transform(op: &'static str, stderr: impl Into<String>) -> Self {
        Self::Transform {
            op,
            stderr: stderr.into(),
        }
    }

    pub(crate) fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: message.into(),
        }
    }

    /// The user-facing summary attached to `error` messages: the stderr tail
    /// for tool failures, the plain message otherwise.
    pub fn client_message(&self) -> String {
        match self {
            Self::Ingest {
                message, stderr, ..
            } if !stderr.is_empty() => format!("{}: {}", message, tail(stderr, 500)),
            Self::Transform { op, stderr } => format!("{}: {}", op, tail(stderr, 500)),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClipError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Last `max` bytes of a tool's stderr, trimmed on a char boundary.
fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text.trim_end();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].trim_end()
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ClipError>;
