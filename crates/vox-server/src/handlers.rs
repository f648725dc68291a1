//! Route handlers.

use std::io;

use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::TryStreamExt;
use metrics::counter;
use serde::Deserialize;
use tokio_util::io::StreamReader;
use tracing::error;

use crate::errors::ApiError;
use crate::health::{self, HealthResponse};
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::server::AppState;

/// Query string of `POST /api/recognize/audio`.
#[derive(Debug, Default, Deserialize)]
pub struct RecognizeQuery {
    /// IETF language tag. Missing or blank falls back to the configured default.
    pub lang: Option<String>,
}

impl RecognizeQuery {
    /// Language to recognize in.
    pub fn language<'a>(&'a self, default: &'a str) -> &'a str {
        match self.lang.as_deref().map(str::trim) {
            Some(lang) if !lang.is_empty() => lang,
            _ => default,
        }
    }
}

/// POST /api/recognize/audio
///
/// The body is streamed into the recognizer as raw audio. `200` carries the
/// transcript (empty for no match or empty input); failures are `500` with
/// the detail as body.
pub async fn recognize_audio(
    State(state): State<AppState>,
    Query(query): Query<RecognizeQuery>,
    body: Body,
) -> Result<String, ApiError> {
    let language = query.language(&state.config.default_language);
    let audio = StreamReader::new(body.into_data_stream().map_err(io::Error::other));

    let result = state
        .recognizer
        .recognize(language, audio, state.recognizer.default_timeout())
        .await;

    let response = match result {
        Ok(outcome) => match outcome.text() {
            Some(text) => Ok(text.to_string()),
            None => {
                let detail = outcome.failure_detail().unwrap_or_else(|| outcome.to_string());
                error!(language, outcome = outcome.label(), detail = %detail, "recognition request failed");
                Err(ApiError::Failed(detail))
            }
        },
        Err(e) => {
            error!(language, error = %e, "recognition request aborted");
            Err(ApiError::from(e))
        }
    };

    let status = match &response {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status(),
    };
    counter!(HTTP_REQUESTS_TOTAL, "status" => status.as_str().to_owned()).increment(1);
    response
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.recognizer.in_flight(),
        state.recognizer.capacity(),
    ))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, crate::metrics::render(handle)),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}
