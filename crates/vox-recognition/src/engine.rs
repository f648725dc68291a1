//! Speech engine seam.
//!
//! The engine is an opaque capability: given a closed [`AudioBuffer`] and a
//! language it runs continuous recognition and reports progress through an
//! [`EventSink`] it receives at start time. Events may arrive on any task, more
//! than once, and in any order; the session layer decides which one counts.

use async_trait::async_trait;

use crate::audio::AudioBuffer;
use crate::session::EventSink;
use crate::types::RecognitionError;

/// Why a `Recognized`/`Recognizing` event fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultReason {
    /// Interim hypothesis; more audio is being processed.
    RecognizingSpeech,
    /// Final hypothesis for an utterance.
    RecognizedSpeech,
    /// The engine processed audio but found no speech it could match.
    NoMatch,
}

/// Why the engine cancelled a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// The engine hit an error (credentials, codec, network, quota...).
    Error,
    /// The audio stream ended.
    EndOfStream,
}

/// Asynchronous notification from a running engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine accepted the session.
    SessionStarted,
    /// A recognition result (interim or final).
    Recognized {
        /// Kind of result.
        reason: ResultReason,
        /// Transcript text (empty for `NoMatch`).
        text: String,
    },
    /// The session was cancelled.
    Canceled {
        /// Cancellation cause.
        reason: CancellationReason,
        /// Engine-supplied details.
        details: String,
    },
    /// The engine ended the session.
    SessionStopped,
}

impl EngineEvent {
    /// Final `RecognizedSpeech` result with `text`.
    pub fn recognized(text: impl Into<String>) -> Self {
        Self::Recognized {
            reason: ResultReason::RecognizedSpeech,
            text: text.into(),
        }
    }

    /// Interim `RecognizingSpeech` result with `text`.
    pub fn recognizing(text: impl Into<String>) -> Self {
        Self::Recognized {
            reason: ResultReason::RecognizingSpeech,
            text: text.into(),
        }
    }

    /// `NoMatch` result.
    pub fn no_match() -> Self {
        Self::Recognized {
            reason: ResultReason::NoMatch,
            text: String::new(),
        }
    }

    /// Error cancellation with `details`.
    pub fn error(details: impl Into<String>) -> Self {
        Self::Canceled {
            reason: CancellationReason::Error,
            details: details.into(),
        }
    }
}

/// What the engine should recognize.
#[derive(Debug)]
pub struct EngineRequest {
    /// IETF language tag (e.g. `ru-RU`).
    pub language: String,
    /// Closed audio buffer, owned by the session from here on.
    pub audio: AudioBuffer,
}

/// Starts continuous recognition sessions.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Begin continuous recognition, reporting through `events`.
    ///
    /// Implementations must not block until a result is available; they
    /// return a handle as soon as recognition is running.
    async fn start_continuous(
        &self,
        request: EngineRequest,
        events: EventSink,
    ) -> Result<Box<dyn EngineSession>, RecognitionError>;
}

/// Handle to a running engine session.
#[async_trait]
pub trait EngineSession: Send {
    /// Stop recognition and release engine resources.
    async fn stop(&mut self) -> Result<(), RecognitionError>;
}
