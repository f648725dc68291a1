//! Core types for recognition orchestration.

use std::fmt;

/// Detail reported when the engine ends a session without a result.
pub const UNEXPECTED_END_DETAIL: &str = "recognition session ended unexpectedly";

/// Detail reported when no terminal event arrives in time.
pub const TIMEOUT_DETAIL: &str = "recognition timed out";

/// Final result of one recognition request.
///
/// Exactly one is produced per request. `Recognized`, `NoMatch` and
/// `EmptyInput` are successes; the rest are failures surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// The engine recognized speech.
    Recognized(String),
    /// The engine ran but found no recognizable speech.
    NoMatch,
    /// The engine cancelled the session with an error.
    EngineError(String),
    /// The engine stopped the session without a result or cancellation.
    SessionEndedUnexpectedly,
    /// No terminal event arrived before the deadline.
    Timeout,
    /// The request carried zero audio bytes; no session was started.
    EmptyInput,
}

impl RecognitionOutcome {
    /// Whether the outcome counts as a successful request.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Recognized(_) | Self::NoMatch | Self::EmptyInput)
    }

    /// Transcript for successful outcomes (`""` for `NoMatch` and `EmptyInput`).
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Recognized(text) => Some(text),
            Self::NoMatch | Self::EmptyInput => Some(""),
            _ => None,
        }
    }

    /// Human-readable failure detail, `None` for successes.
    pub fn failure_detail(&self) -> Option<String> {
        match self {
            Self::EngineError(details) => Some(details.clone()),
            Self::SessionEndedUnexpectedly => Some(UNEXPECTED_END_DETAIL.to_string()),
            Self::Timeout => Some(TIMEOUT_DETAIL.to_string()),
            Self::Recognized(_) | Self::NoMatch | Self::EmptyInput => None,
        }
    }

    /// Stable snake_case label, used for metrics and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Recognized(_) => "recognized",
            Self::NoMatch => "no_match",
            Self::EngineError(_) => "engine_error",
            Self::SessionEndedUnexpectedly => "session_ended",
            Self::Timeout => "timeout",
            Self::EmptyInput => "empty_input",
        }
    }
}

impl fmt::Display for RecognitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recognized(text) => write!(f, "recognized: {text}"),
            Self::NoMatch => f.write_str("no match"),
            Self::EmptyInput => f.write_str("empty input"),
            Self::EngineError(details) => write!(f, "engine error: {details}"),
            Self::SessionEndedUnexpectedly => f.write_str(UNEXPECTED_END_DETAIL),
            Self::Timeout => f.write_str(TIMEOUT_DETAIL),
        }
    }
}

/// Errors that prevent a request from producing an outcome.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    /// The audio source failed while being read.
    #[error("audio ingestion failed: {0}")]
    Ingestion(#[source] std::io::Error),

    /// A push was attempted on a closed audio buffer.
    #[error("audio buffer is closed")]
    BufferClosed,

    /// A session was started on a buffer that is still open for writing.
    #[error("audio buffer must be closed before recognition starts")]
    BufferOpen,

    /// The admission gate was shut down.
    #[error("admission gate closed")]
    GateClosed,

    /// The engine refused to start a session.
    #[error("engine failed to start: {0}")]
    EngineStart(String),

    /// The engine failed to stop a running session.
    #[error("engine failed to stop: {0}")]
    EngineStop(String),
}

/// Extension trait to reduce `.map_err()` boilerplate when wrapping errors into
/// [`RecognitionError`].
pub trait ResultExt<T> {
    /// Wrap the error as [`RecognitionError::EngineStart`] with `context` prefix.
    fn engine_start(self, context: &str) -> Result<T, RecognitionError>;
}

impl<T, E: fmt::Display> ResultExt<T> for Result<T, E> {
    fn engine_start(self, context: &str) -> Result<T, RecognitionError> {
        self.map_err(|e| RecognitionError::EngineStart(format!("{context}: {e}")))
    }
}
