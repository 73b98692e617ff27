//! Error types shared across Weave crates.

/// Top-level error type for Weave operations.
#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
    #[error("Source error: {message}")]
    Source { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using WeaveError.
pub type WeaveResult<T> = Result<T, WeaveError>;

impl WeaveError {
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error tears down the whole pipeline.
    ///
    /// Per-source failures are absorbed by the composer (the source is
    /// evicted and compositing continues); render and sink failures are
    /// fatal and force a transition back to idle.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Source { .. })
    }
}
