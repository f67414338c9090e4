//! Application error taxonomy and its mapping to structured HTTP responses.
//!
//! Every HTTP-facing failure is one of these variants; the `IntoResponse`
//! impl turns each into a JSON body with a machine-readable `error` reason
//! so clients can adjust their request instead of retrying blindly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// One subject that could not be filled to the requested set size.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SubjectShortfall {
    #[serde(rename = "subjectId")]
    pub subject_id: String,
    pub available: usize,
    pub required: usize,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request fields. Caller error, no side effect.
    #[error("{0}")]
    Validation(String),

    /// Unknown user/category/subject/question reference.
    #[error("{0}")]
    NotFound(String),

    /// A named quota cap was hit. `remaining` tells the client how much of
    /// the window is left for the breached scope.
    #[error("{message}")]
    QuotaExceeded {
        scope: &'static str,
        remaining: u32,
        message: String,
    },

    /// Not enough matching questions to fill every requested subject.
    #[error("insufficient questions for {} subject(s)", insufficient.len())]
    SelectionUnsatisfiable { insufficient: Vec<SubjectShortfall> },

    /// Unexpected failure in a dependency.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "validation", "message": msg }),
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "not_found", "message": msg }),
            ),
            ApiError::QuotaExceeded {
                scope,
                remaining,
                message,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "quota_exceeded",
                    "scope": scope,
                    "remaining": remaining,
                    "message": message,
                }),
            ),
            ApiError::SelectionUnsatisfiable { insufficient } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "insufficient_subjects",
                    "insufficientSubjects": insufficient,
                }),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(target: "quizhive_backend", %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal", "message": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
