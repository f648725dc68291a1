//! Recognition orchestrator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::io::AsyncRead;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::arbiter::race_until;
use crate::audio::{Ingested, ingest};
use crate::engine::SpeechEngine;
use crate::gate::AdmissionGate;
use crate::session::RecognitionSession;
use crate::types::{RecognitionError, RecognitionOutcome};

/// Outcome counter name (labelled by `outcome`).
pub const OUTCOMES_TOTAL: &str = "recognition_outcomes_total";

/// End-to-end recognition latency histogram name.
pub const DURATION_SECONDS: &str = "recognition_duration_seconds";

/// Default per-request recognition timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs recognition requests against one engine behind one admission gate.
pub struct Recognizer {
    engine: Arc<dyn SpeechEngine>,
    gate: AdmissionGate,
    default_timeout: Duration,
}

impl Recognizer {
    /// Create a recognizer allowing `max_concurrency` sessions at once.
    pub fn new(engine: Arc<dyn SpeechEngine>, max_concurrency: usize, default_timeout: Duration) -> Self {
        Self {
            engine,
            gate: AdmissionGate::new(max_concurrency),
            default_timeout,
        }
    }

    /// Transcribe `audio` in `language`, giving the engine `timeout` to finish.
    ///
    /// The whole source is read before a slot is taken. Zero bytes short-circuit
    /// to [`RecognitionOutcome::EmptyInput`] without touching the gate. The
    /// timeout bounds only the recognition phase, not the wait for a slot.
    ///
    /// Engine-level failures come back as outcomes; `Err` is reserved for
    /// failures that prevent an outcome (ingestion, engine start).
    pub async fn recognize<R>(
        &self,
        language: &str,
        audio: R,
        timeout: Duration,
    ) -> Result<RecognitionOutcome, RecognitionError>
    where
        R: AsyncRead + Unpin,
    {
        let request_id = Uuid::now_v7();
        let span = info_span!("recognize", %request_id, language);
        let started = Instant::now();

        let result = self.run(language, audio, timeout).instrument(span.clone()).await;

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        counter!(OUTCOMES_TOTAL, "outcome" => label).increment(1);
        histogram!(DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        span.in_scope(|| match &result {
            Ok(outcome) if outcome.is_success() => info!(outcome = label, "recognition finished"),
            Ok(outcome) => warn!(outcome = label, detail = %outcome, "recognition failed"),
            Err(e) => warn!(error = %e, "recognition aborted"),
        });
        result
    }

    /// [`recognize`](Self::recognize) with the configured default timeout.
    pub async fn recognize_with_default_timeout<R>(
        &self,
        language: &str,
        audio: R,
    ) -> Result<RecognitionOutcome, RecognitionError>
    where
        R: AsyncRead + Unpin,
    {
        self.recognize(language, audio, self.default_timeout).await
    }

    async fn run<R>(
        &self,
        language: &str,
        audio: R,
        timeout: Duration,
    ) -> Result<RecognitionOutcome, RecognitionError>
    where
        R: AsyncRead + Unpin,
    {
        let buffer = match ingest(audio).await? {
            Ingested::Empty => return Ok(RecognitionOutcome::EmptyInput),
            Ingested::Audio(buffer) => buffer,
        };

        let slot = self.gate.acquire().await?;
        let (session, completion) =
            RecognitionSession::start(self.engine.as_ref(), buffer, language).await?;
        // If this future is dropped, the session's background stop releases the slot.
        let mut session = session.holding(slot);

        let outcome = race_until(completion, timeout).await;
        session.stop().await;
        Ok(outcome)
    }

    /// Admission gate shared by all requests.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Maximum concurrent sessions.
    pub fn capacity(&self) -> usize {
        self.gate.capacity()
    }

    /// Sessions currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    /// Timeout used by [`recognize_with_default_timeout`](Self::recognize_with_default_timeout).
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

impl std::fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizer")
            .field("gate", &self.gate)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
