//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vox_recognition::RecognitionError;

/// A request that could not be answered with a transcript.
///
/// Every variant maps to `500` with the human-readable detail as a plain-text
/// body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Recognition ran and produced a failure outcome.
    #[error("{0}")]
    Failed(String),

    /// Recognition could not produce an outcome.
    #[error("{0}")]
    Recognition(#[from] RecognitionError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
