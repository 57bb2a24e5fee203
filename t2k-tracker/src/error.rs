//! Error types for t2k-tracker
//!
//! `TrackerError` carries the non-fatal failure taxonomy of the polling
//! pipeline. None of these escape a poll cycle: the coordinator converts them
//! into a [`PollOutcome`](crate::coordinator::PollOutcome) and logs them.
//!
//! `ApiError` is the HTTP-facing error for the read-only API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Pipeline error taxonomy
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Every scraper tier failed or returned nothing (also outside the broadcast window)
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// An airing was observed but no chart entry cleared the acceptance threshold
    #[error("No chart entry matched above threshold (best score {best_score:.3})")]
    MatchBelowThreshold { best_score: f64 },

    /// Cover art lookup failed; the field stays empty
    #[error("Enrichment failed: {0}")]
    EnrichmentFailure(String),

    /// Rejected at configuration time
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// t2k-common error
    #[error("Common error: {0}")]
    Common(#[from] t2k_common::Error),
}

/// Result type for the tracker pipeline
pub type TrackerResult<T> = Result<T, TrackerError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// t2k-common error
    #[error("Common error: {0}")]
    Common(#[from] t2k_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_message_includes_score() {
        let err = TrackerError::MatchBelowThreshold { best_score: 0.4213 };
        assert!(err.to_string().contains("0.421"));
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::NotFound("current song".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
