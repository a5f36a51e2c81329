//! Submission request and outcome types
//!
//! The outcome maps onto an HTTP-style response (status code plus JSON
//! body) through axum's [`IntoResponse`]; no routes are defined here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// `detail` code of a response for a submission without any position
pub const MISSING_COORDINATES_DETAIL: u16 = 101;

/// `detail` code of a conflict response
pub const CONFLICT_DETAIL: u16 = 102;

/// One sighting as submitted
#[derive(Debug, Clone)]
pub struct SightingSubmission {
    pub photo_body: Vec<u8>,
    pub photo_head: Vec<u8>,
    /// Observation date, `YYYY-MM-DD`
    pub date: String,
    /// Fallback position, used when no photo carries EXIF GPS tags
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub name_hint: Option<String>,
}

/// Committed result of a submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// A new individual was created for this sighting
    Created {
        individual_id: i64,
        sighting_id: i64,
    },
    /// The sighting matched a known individual and was linked to it
    Conflict {
        individual_id: i64,
        matched_name: String,
        sighting_id: i64,
        score: f64,
    },
}

impl SubmissionOutcome {
    pub fn individual_id(&self) -> i64 {
        match self {
            SubmissionOutcome::Created { individual_id, .. }
            | SubmissionOutcome::Conflict { individual_id, .. } => *individual_id,
        }
    }

    pub fn sighting_id(&self) -> i64 {
        match self {
            SubmissionOutcome::Created { sighting_id, .. }
            | SubmissionOutcome::Conflict { sighting_id, .. } => *sighting_id,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SubmissionOutcome::Created { .. } => StatusCode::OK,
            SubmissionOutcome::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Response body
    pub fn body(&self) -> serde_json::Value {
        match self {
            SubmissionOutcome::Created {
                individual_id,
                sighting_id,
            } => json!({
                "status": 200,
                "individual_id": individual_id,
                "sighting_id": sighting_id,
            }),
            SubmissionOutcome::Conflict { matched_name, .. } => json!({
                "detail": CONFLICT_DETAIL,
                "error": matched_name,
            }),
        }
    }
}

impl IntoResponse for SubmissionOutcome {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
