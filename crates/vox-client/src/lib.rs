//! Client for the vox recognition endpoint.
//!
//! Posts raw audio to `POST {base}/api/recognize/audio?lang=<tag>` and returns
//! the transcript body.

use bytes::Bytes;
use tracing::{debug, instrument};

/// Path of the recognition endpoint.
pub const RECOGNIZE_PATH: &str = "/api/recognize/audio";

/// Language used when the caller does not pick one.
pub const DEFAULT_LANGUAGE: &str = "ru-RU";

/// Errors returned by [`RecognitionClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("recognition request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("recognition failed with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (the server's failure detail).
        body: String,
    },
}

/// HTTP client bound to one gateway.
#[derive(Debug, Clone)]
pub struct RecognitionClient {
    client: reqwest::Client,
    base_uri: String,
}

impl RecognitionClient {
    /// Client for the gateway at `base_uri` (scheme, host and port).
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_uri)
    }

    /// Client reusing an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client, base_uri: impl Into<String>) -> Self {
        let base_uri = base_uri.into().trim_end_matches('/').to_string();
        Self { client, base_uri }
    }

    /// Full URL of the recognition endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}{RECOGNIZE_PATH}", self.base_uri)
    }

    /// Transcribe `audio` in `language`. An empty body means nothing was recognized.
    #[instrument(skip(self, audio), fields(bytes = audio.len()))]
    pub async fn recognize_audio(&self, audio: Bytes, language: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("lang", language)])
            .body(audio)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(chars = body.chars().count(), "recognition succeeded");
        Ok(body)
    }
}
