//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.
//!
//! The taxonomy follows the campaign's recovery rules: configuration and
//! state-corruption errors abort before side effects, interrupts unwind
//! cooperatively, everything else is recovered locally (retry schedule or
//! skip-and-continue).

use baitline_core::CoreError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Errors bubbled up from the core crate (driver, cancellation, io)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration errors - fatal before any side effect
    #[error("Configuration error: {0}")]
    Config(String),

    /// Checkpoint document unreadable or inconsistent - fatal
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Scanner infrastructure errors (never raised for a mere crash of an
    /// analyzer run, which degrades to zero findings)
    #[error("Scanner error: {0}")]
    Scanner(String),

    /// Project-level failures (unreadable prompt file, open failure)
    #[error("Project error: {0}")]
    Project(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cooperative interrupt - the checkpoint is marked interrupted and the
    /// process exits with code 2
    #[error("Interrupted")]
    Interrupted,

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a checkpoint error
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a scanner error
    pub fn scanner(msg: impl Into<String>) -> Self {
        Self::Scanner(msg.into())
    }

    /// Create a project error
    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error represents a cooperative interrupt
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted) || matches!(self, Self::Core(e) if e.is_cancelled())
    }

    /// Whether this error must abort the campaign before side effects
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Checkpoint(_))
    }
}
