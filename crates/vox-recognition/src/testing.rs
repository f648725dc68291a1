//! Scripted speech engine for tests.
//!
//! [`ScriptedEngine`] plays a fixed list of [`Step`]s into the event sink on a
//! background task. An [`EngineProbe`] records how the engine was driven so
//! tests can assert on starts, stops, and peak concurrency.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::engine::{EngineEvent, EngineRequest, EngineSession, SpeechEngine};
use crate::session::EventSink;
use crate::types::RecognitionError;

/// One scripted action.
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver an event to the sink.
    Emit(EngineEvent),
    /// Sleep before the next step.
    Wait(Duration),
}

/// A request as the engine saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    /// Language tag passed to the engine.
    pub language: String,
    /// Full audio payload.
    pub audio: Bytes,
}

#[derive(Debug, Default)]
struct ProbeState {
    started: AtomicUsize,
    stopped: AtomicUsize,
    live: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<CapturedRequest>>,
}

/// Shared view of what a [`ScriptedEngine`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct EngineProbe {
    state: Arc<ProbeState>,
}

impl EngineProbe {
    /// Sessions started.
    pub fn started(&self) -> usize {
        self.state.started.load(Ordering::SeqCst)
    }

    /// Sessions stopped.
    pub fn stopped(&self) -> usize {
        self.state.stopped.load(Ordering::SeqCst)
    }

    /// Sessions started and not yet stopped.
    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Highest number of sessions live at once.
    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    /// Requests in start order.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().clone()
    }

    fn on_start(&self, request: &EngineRequest) {
        let _ = self.state.started.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.state.peak.fetch_max(live, Ordering::SeqCst);
        self.state.requests.lock().push(CapturedRequest {
            language: request.language.clone(),
            audio: request.audio.to_bytes(),
        });
    }

    fn on_stop(&self) {
        let _ = self.state.stopped.fetch_add(1, Ordering::SeqCst);
        let _ = self.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Engine that replays a script for every session.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    steps: Vec<Step>,
    immediate: Vec<EngineEvent>,
    start_error: Option<String>,
    fail_stop: bool,
    stop_delay: Duration,
    probe: EngineProbe,
}

impl ScriptedEngine {
    /// Replay `steps` on a background task for each session.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Interim hypothesis, then the final `text`, then session stop.
    pub fn recognizing(text: &str) -> Self {
        Self::new(vec![
            Step::Emit(EngineEvent::SessionStarted),
            Step::Emit(EngineEvent::recognizing(text)),
            Step::Emit(EngineEvent::recognized(text)),
            Step::Emit(EngineEvent::SessionStopped),
        ])
    }

    /// A `NoMatch` result, then session stop.
    pub fn no_match() -> Self {
        Self::new(vec![
            Step::Emit(EngineEvent::SessionStarted),
            Step::Emit(EngineEvent::no_match()),
            Step::Emit(EngineEvent::SessionStopped),
        ])
    }

    /// An error cancellation with `details`, then session stop.
    pub fn failing(details: &str) -> Self {
        Self::new(vec![
            Step::Emit(EngineEvent::SessionStarted),
            Step::Emit(EngineEvent::error(details)),
            Step::Emit(EngineEvent::SessionStopped),
        ])
    }

    /// Session stop with no result.
    pub fn stopping() -> Self {
        Self::new(vec![
            Step::Emit(EngineEvent::SessionStarted),
            Step::Emit(EngineEvent::SessionStopped),
        ])
    }

    /// Never emits anything.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    /// Refuses to start sessions.
    pub fn failing_to_start(details: &str) -> Self {
        Self {
            start_error: Some(details.to_string()),
            ..Self::default()
        }
    }

    /// Sleep `delay` before the scripted steps.
    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.steps.insert(0, Step::Wait(delay));
        self
    }

    /// Emit `event` from inside `start_continuous`, before it returns.
    #[must_use]
    pub fn with_immediate(mut self, event: EngineEvent) -> Self {
        self.immediate.push(event);
        self
    }

    /// Make every session's `stop` fail (after recording it).
    #[must_use]
    pub fn with_failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Make every session's `stop` take `delay` before it is recorded.
    #[must_use]
    pub fn with_slow_stop(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    /// Probe shared with every session this engine starts.
    pub fn probe(&self) -> EngineProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl SpeechEngine for ScriptedEngine {
    async fn start_continuous(
        &self,
        request: EngineRequest,
        events: EventSink,
    ) -> Result<Box<dyn EngineSession>, RecognitionError> {
        if let Some(details) = &self.start_error {
            return Err(RecognitionError::EngineStart(details.clone()));
        }
        self.probe.on_start(&request);

        for event in &self.immediate {
            let _ = events.emit(event.clone());
        }

        let steps = self.steps.clone();
        let task = tokio::spawn(async move {
            for step in steps {
                match step {
                    Step::Emit(event) => {
                        let _ = events.emit(event);
                    }
                    Step::Wait(delay) => tokio::time::sleep(delay).await,
                }
            }
        });

        Ok(Box::new(ScriptedSession {
            task: Some(task),
            probe: self.probe.clone(),
            fail_stop: self.fail_stop,
            stop_delay: self.stop_delay,
        }))
    }
}

struct ScriptedSession {
    task: Option<JoinHandle<()>>,
    probe: EngineProbe,
    fail_stop: bool,
    stop_delay: Duration,
}

#[async_trait]
impl EngineSession for ScriptedSession {
    async fn stop(&mut self) -> Result<(), RecognitionError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.abort();
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        self.probe.on_stop();
        if self.fail_stop {
            return Err(RecognitionError::EngineStop("scripted stop failure".into()));
        }
        Ok(())
    }
}
