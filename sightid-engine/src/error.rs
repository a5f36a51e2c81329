//! Submission error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::models::MISSING_COORDINATES_DETAIL;
use serde_json::json;
use thiserror::Error;

/// Why a submission did not commit
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Rejected before any side effect (400)
    #[error("{0}")]
    Validation(String),

    /// Neither the photos' EXIF nor the request carried a position (400)
    #[error("Server could not extract coordinates from photo.")]
    MissingCoordinates,

    /// Storage failed; the transaction was rolled back (500)
    #[error("Persistence failure: {0}")]
    Persistence(#[from] sightid_common::Error),

    /// Worker or pipeline failure (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubmissionError {
    pub fn status(&self) -> StatusCode {
        match self {
            SubmissionError::Validation(_) | SubmissionError::MissingCoordinates => {
                StatusCode::BAD_REQUEST
            }
            SubmissionError::Persistence(_) | SubmissionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let body = match self {
            SubmissionError::MissingCoordinates => json!({
                "detail": MISSING_COORDINATES_DETAIL,
                "error": self.to_string(),
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type for submissions
pub type SubmissionResult<T> = Result<T, SubmissionError>;
