//! Speech recognition orchestration.
//!
//! Bounds concurrent engine sessions behind an admission gate and turns the
//! engine's asynchronous events into exactly one outcome per request.
//!
//! # Architecture
//!
//! ```text
//! audio stream → ingest (80 KB chunks) → closed AudioBuffer
//! → AdmissionGate slot → RecognitionSession::start (engine + EventSink)
//! → race_until(first terminal event | timeout) → stop session → release slot
//! → RecognitionOutcome
//! ```

pub mod arbiter;
pub mod audio;
pub mod azure;
pub mod engine;
pub mod gate;
pub mod recognizer;
pub mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod types;

pub use azure::AzureSpeechEngine;
pub use engine::{EngineEvent, SpeechEngine};
pub use recognizer::Recognizer;
pub use types::{RecognitionError, RecognitionOutcome};
