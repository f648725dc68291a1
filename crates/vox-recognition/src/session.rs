//! Recognition session lifecycle and engine event routing.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::arbiter::{Completer, Completion, completion_cell};
use crate::audio::AudioBuffer;
use crate::engine::{
    CancellationReason, EngineEvent, EngineRequest, EngineSession, ResultReason, SpeechEngine,
};
use crate::gate::AdmissionSlot;
use crate::types::{RecognitionError, RecognitionOutcome};

/// Map an engine event to the outcome it settles, if any.
///
/// Interim results, session start, and non-error cancellations are not terminal.
pub fn terminal_outcome(event: EngineEvent) -> Option<RecognitionOutcome> {
    match event {
        EngineEvent::Recognized {
            reason: ResultReason::RecognizedSpeech,
            text,
        } => Some(RecognitionOutcome::Recognized(text)),
        EngineEvent::Recognized {
            reason: ResultReason::NoMatch,
            ..
        } => Some(RecognitionOutcome::NoMatch),
        EngineEvent::Canceled {
            reason: CancellationReason::Error,
            details,
        } => Some(RecognitionOutcome::EngineError(details)),
        EngineEvent::SessionStopped => Some(RecognitionOutcome::SessionEndedUnexpectedly),
        EngineEvent::Recognized {
            reason: ResultReason::RecognizingSpeech,
            ..
        }
        | EngineEvent::Canceled {
            reason: CancellationReason::EndOfStream,
            ..
        }
        | EngineEvent::SessionStarted => None,
    }
}

/// Where an engine delivers its events.
///
/// Created before the engine starts so nothing raised right after start is
/// missed. Clones share the same completion cell.
#[derive(Clone)]
pub struct EventSink {
    session_id: Uuid,
    completer: Completer<RecognitionOutcome>,
}

impl EventSink {
    /// Deliver an event. Returns `true` if it settled the session outcome.
    pub fn emit(&self, event: EngineEvent) -> bool {
        let session_id = self.session_id;
        let Some(outcome) = terminal_outcome(event) else {
            debug!(%session_id, "non-terminal engine event");
            return false;
        };
        let label = outcome.label();
        let won = self.completer.complete(outcome);
        if won {
            debug!(%session_id, outcome = label, "session outcome settled");
        } else {
            debug!(%session_id, outcome = label, "outcome already settled, event discarded");
        }
        won
    }

    /// Whether the outcome has already been settled.
    pub fn is_settled(&self) -> bool {
        self.completer.is_completed()
    }

    /// Session this sink belongs to.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

/// One engine invocation bound to one buffer and language.
///
/// A session may hold the admission slot it runs under; the slot is only
/// returned once the engine session has finished stopping.
pub struct RecognitionSession {
    id: Uuid,
    language: String,
    handle: Option<Box<dyn EngineSession>>,
    slot: Option<AdmissionSlot>,
}

impl RecognitionSession {
    /// Start continuous recognition on a closed buffer.
    ///
    /// Returns the session together with the completion its events settle.
    pub async fn start(
        engine: &dyn SpeechEngine,
        audio: AudioBuffer,
        language: &str,
    ) -> Result<(Self, Completion<RecognitionOutcome>), RecognitionError> {
        if !audio.is_closed() {
            return Err(RecognitionError::BufferOpen);
        }

        let id = Uuid::now_v7();
        let (completer, completion) = completion_cell();
        let sink = EventSink {
            session_id: id,
            completer,
        };

        let bytes = audio.len();
        let request = EngineRequest {
            language: language.to_string(),
            audio,
        };
        let handle = engine.start_continuous(request, sink).await?;
        info!(session_id = %id, language, bytes, "recognition session started");

        Ok((
            Self {
                id,
                language: language.to_string(),
                handle: Some(handle),
                slot: None,
            },
            completion,
        ))
    }

    /// Keep `slot` until the engine session is stopped.
    #[must_use]
    pub fn holding(mut self, slot: AdmissionSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Whether the session still holds an admission slot.
    pub fn holds_slot(&self) -> bool {
        self.slot.is_some()
    }

    /// Session identifier (UUID v7).
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Language the session was started with.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether [`stop`](Self::stop) already ran.
    pub fn is_stopped(&self) -> bool {
        self.handle.is_none()
    }

    /// Stop the engine session, then release the held slot. Later calls are no-ops.
    ///
    /// Stop failures are logged, never returned: the outcome is already settled.
    pub async fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            match handle.stop().await {
                Ok(()) => debug!(session_id = %self.id, "recognition session stopped"),
                Err(e) => warn!(session_id = %self.id, error = %e, "failed to stop recognition session"),
            }
        }
        if let Some(slot) = self.slot.take() {
            slot.release();
        }
    }
}

impl std::fmt::Debug for RecognitionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionSession")
            .field("id", &self.id)
            .field("language", &self.language)
            .field("stopped", &self.is_stopped())
            .field("holds_slot", &self.holds_slot())
            .finish_non_exhaustive()
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        let slot = self.slot.take();
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        let session_id = self.id;
        warn!(%session_id, "recognition session dropped while running, stopping in background");
        // Without a runtime the slot is released here, with the engine unstopped.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            drop(runtime.spawn(async move {
                if let Err(e) = handle.stop().await {
                    warn!(%session_id, error = %e, "background stop failed");
                }
                drop(slot);
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use bytes::Bytes;

    use super::*;
    use crate::arbiter::race_until;
    use crate::gate::AdmissionGate;
    use crate::testing::{ScriptedEngine, Step};

    fn closed_buffer(data: &'static [u8]) -> AudioBuffer {
        let mut buffer = AudioBuffer::new();
        buffer.push(Bytes::from_static(data)).unwrap();
        buffer.close();
        buffer
    }

    #[test]
    fn terminal_mapping() {
        assert_eq!(
            terminal_outcome(EngineEvent::recognized("hi")),
            Some(RecognitionOutcome::Recognized("hi".into()))
        );
        assert_eq!(
            terminal_outcome(EngineEvent::no_match()),
            Some(RecognitionOutcome::NoMatch)
        );
        assert_eq!(
            terminal_outcome(EngineEvent::error("bad codec")),
            Some(RecognitionOutcome::EngineError("bad codec".into()))
        );
        assert_eq!(
            terminal_outcome(EngineEvent::SessionStopped),
            Some(RecognitionOutcome::SessionEndedUnexpectedly)
        );
        assert_eq!(terminal_outcome(EngineEvent::recognizing("h")), None);
        assert_eq!(terminal_outcome(EngineEvent::SessionStarted), None);
        assert_eq!(
            terminal_outcome(EngineEvent::Canceled {
                reason: CancellationReason::EndOfStream,
                details: String::new(),
            }),
            None
        );
    }

    #[tokio::test]
    async fn open_buffer_is_rejected() {
        let engine = ScriptedEngine::recognizing("never");
        let probe = engine.probe();
        let result = RecognitionSession::start(&engine, AudioBuffer::new(), "en-US").await;
        assert_matches!(result, Err(RecognitionError::BufferOpen));
        assert_eq!(probe.started(), 0);
    }

    #[tokio::test]
    async fn engine_receives_buffer_and_language() {
        let engine = ScriptedEngine::recognizing("privet");
        let probe = engine.probe();
        let (mut session, completion) =
            RecognitionSession::start(&engine, closed_buffer(b"pcm"), "ru-RU")
                .await
                .unwrap();
        assert_eq!(session.language(), "ru-RU");

        let outcome = race_until(completion, Duration::from_secs(5)).await;
        session.stop().await;

        assert_eq!(outcome, RecognitionOutcome::Recognized("privet".into()));
        let requests = probe.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].language, "ru-RU");
        assert_eq!(requests[0].audio, Bytes::from_static(b"pcm"));
    }

    #[tokio::test]
    async fn immediate_event_is_not_missed() {
        // Emits synchronously inside start_continuous.
        let engine = ScriptedEngine::new(vec![]).with_immediate(EngineEvent::recognized("fast"));
        let (mut session, completion) =
            RecognitionSession::start(&engine, closed_buffer(b"x"), "en-US")
                .await
                .unwrap();
        let outcome = race_until(completion, Duration::from_secs(1)).await;
        session.stop().await;
        assert_eq!(outcome, RecognitionOutcome::Recognized("fast".into()));
    }

    #[tokio::test]
    async fn redundant_events_keep_first() {
        let engine = ScriptedEngine::new(vec![
            Step::Emit(EngineEvent::recognizing("hel")),
            Step::Emit(EngineEvent::recognized("hello")),
            Step::Emit(EngineEvent::error("late failure")),
            Step::Emit(EngineEvent::recognized("again")),
            Step::Emit(EngineEvent::SessionStopped),
        ]);
        let (mut session, completion) =
            RecognitionSession::start(&engine, closed_buffer(b"x"), "en-US")
                .await
                .unwrap();
        let outcome = race_until(completion, Duration::from_secs(1)).await;
        session.stop().await;
        assert_eq!(outcome, RecognitionOutcome::Recognized("hello".into()));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let engine = ScriptedEngine::silent();
        let probe = engine.probe();
        let (mut session, _completion) =
            RecognitionSession::start(&engine, closed_buffer(b"x"), "en-US")
                .await
                .unwrap();
        assert!(!session.is_stopped());
        session.stop().await;
        session.stop().await;
        assert!(session.is_stopped());
        assert_eq!(probe.stopped(), 1);
    }

    #[tokio::test]
    async fn stop_failure_is_swallowed() {
        let engine = ScriptedEngine::recognizing("ok").with_failing_stop();
        let (mut session, completion) =
            RecognitionSession::start(&engine, closed_buffer(b"x"), "en-US")
                .await
                .unwrap();
        let outcome = race_until(completion, Duration::from_secs(1)).await;
        session.stop().await;
        assert_eq!(outcome, RecognitionOutcome::Recognized("ok".into()));
        assert!(session.is_stopped());
    }

    #[tokio::test]
    async fn dropped_session_is_stopped_in_background() {
        let engine = ScriptedEngine::silent();
        let probe = engine.probe();
        let (session, _completion) =
            RecognitionSession::start(&engine, closed_buffer(b"x"), "en-US")
                .await
                .unwrap();
        drop(session);
        for _ in 0..10 {
            if probe.stopped() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(probe.stopped(), 1);
        assert_eq!(probe.live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_session_keeps_slot_until_engine_stopped() {
        let engine = ScriptedEngine::silent().with_slow_stop(Duration::from_secs(1));
        let probe = engine.probe();
        let gate = AdmissionGate::new(1);
        let slot = gate.acquire().await.unwrap();
        let (session, _completion) =
            RecognitionSession::start(&engine, closed_buffer(b"x"), "en-US")
                .await
                .unwrap();
        let session = session.holding(slot);
        assert!(session.holds_slot());

        drop(session);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(probe.stopped(), 0);
        assert_eq!(gate.available(), 0, "slot released before the engine stopped");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(probe.stopped(), 1);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn stop_releases_held_slot() {
        let engine = ScriptedEngine::recognizing("ok");
        let gate = AdmissionGate::new(1);
        let slot = gate.acquire().await.unwrap();
        let (session, completion) =
            RecognitionSession::start(&engine, closed_buffer(b"x"), "en-US")
                .await
                .unwrap();
        let mut session = session.holding(slot);
        let _ = race_until(completion, Duration::from_secs(1)).await;

        assert_eq!(gate.available(), 0);
        session.stop().await;
        assert!(!session.holds_slot());
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn debug_names_session_fields() {
        let engine = ScriptedEngine::silent();
        let (mut session, _completion) =
            RecognitionSession::start(&engine, closed_buffer(b"x"), "de-DE")
                .await
                .unwrap();
        let rendered = format!("{session:?}");
        assert!(rendered.contains("de-DE"));
        assert!(rendered.contains("stopped: false"));
        session.stop().await;
        assert!(format!("{session:?}").contains("stopped: true"));
    }

    #[tokio::test]
    async fn start_failure_is_returned() {
        let engine = ScriptedEngine::failing_to_start("quota exceeded");
        let result = RecognitionSession::start(&engine, closed_buffer(b"x"), "en-US").await;
        assert_matches!(result, Err(RecognitionError::EngineStart(msg)) if msg.contains("quota exceeded"));
    }
}
