//! Azure Speech engine over the short-audio REST endpoint.
//!
//! Each session POSTs the closed buffer as a chunked body and translates the
//! JSON reply into [`EngineEvent`]s. Stopping a session cancels the request if
//! it is still in flight.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::{EngineEvent, EngineRequest, EngineSession, SpeechEngine};
use crate::session::EventSink;
use crate::types::{RecognitionError, ResultExt};

/// Audio format header sent with every request.
pub const AUDIO_CONTENT_TYPE: &str = "audio/wav; codecs=audio/pcm; samplerate=16000";

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Default regional endpoint for conversation-mode recognition.
pub fn regional_endpoint(region: &str) -> String {
    format!(
        "https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1"
    )
}

/// Simple-format recognition reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SimpleResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: String,
}

/// Translate a reply into the terminal event it represents.
fn response_event(response: SimpleResponse) -> EngineEvent {
    match response.recognition_status.as_str() {
        "Success" => EngineEvent::recognized(response.display_text),
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => EngineEvent::no_match(),
        other => EngineEvent::error(format!("recognition status {other}")),
    }
}

/// Speech engine backed by the Azure Speech service.
#[derive(Debug, Clone)]
pub struct AzureSpeechEngine {
    client: reqwest::Client,
    subscription_key: String,
    endpoint: String,
}

impl AzureSpeechEngine {
    /// Engine for `region` using the regional endpoint.
    pub fn new(subscription_key: impl Into<String>, region: &str) -> Self {
        Self::with_endpoint(subscription_key, regional_endpoint(region))
    }

    /// Engine posting to an explicit endpoint URL.
    pub fn with_endpoint(subscription_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            subscription_key: subscription_key.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn transcribe(&self, request: EngineRequest) -> EngineEvent {
        let body = reqwest::Body::wrap_stream(request.audio.into_stream());
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("language", request.language.as_str()), ("format", "simple")])
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .header(reqwest::header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return EngineEvent::error(format!("speech request failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return EngineEvent::error(format!("speech service returned {status}: {body}"));
        }

        match response.json::<SimpleResponse>().await {
            Ok(reply) => response_event(reply),
            Err(e) => EngineEvent::error(format!("failed to parse speech response: {e}")),
        }
    }
}

#[async_trait]
impl SpeechEngine for AzureSpeechEngine {
    async fn start_continuous(
        &self,
        request: EngineRequest,
        events: EventSink,
    ) -> Result<Box<dyn EngineSession>, RecognitionError> {
        let _ = reqwest::Url::parse(&self.endpoint).engine_start("invalid speech endpoint")?;

        let cancel = CancellationToken::new();
        let engine = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let _ = events.emit(EngineEvent::SessionStarted);
            tokio::select! {
                () = token.cancelled() => {
                    debug!(session_id = %events.session_id(), "speech request cancelled");
                }
                event = engine.transcribe(request) => {
                    let _ = events.emit(event);
                    let _ = events.emit(EngineEvent::SessionStopped);
                }
            }
        });

        Ok(Box::new(AzureSession {
            cancel,
            task: Some(task),
        }))
    }
}

struct AzureSession {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl EngineSession for AzureSession {
    async fn stop(&mut self) -> Result<(), RecognitionError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        self.cancel.cancel();
        if let Err(e) = task.await {
            warn!(error = %e, "speech request task failed");
            return Err(RecognitionError::EngineStop(e.to_string()));
        }
        Ok(())
    }
}
