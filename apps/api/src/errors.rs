use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::entities::models::{DocumentRole, EntityCategory};

// ────────────────────────────────────────────────────────────────────────────
// Domain errors raised by the screening core
// ────────────────────────────────────────────────────────────────────────────

/// A raw span from the recognizer does not describe a valid region of its document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionShapeError {
    #[error("{document}: span #{index} starts at {start} but ends at {end}")]
    InvertedSpan {
        document: DocumentRole,
        index: usize,
        start: i64,
        end: i64,
    },

    #[error("{document}: span #{index} ({start}..{end}) is outside the document ({length} characters)")]
    OutOfBounds {
        document: DocumentRole,
        index: usize,
        start: i64,
        end: i64,
        length: usize,
    },

    #[error("{document}: span #{index} has confidence {confidence}, expected a value in [0, 1]")]
    InvalidConfidence {
        document: DocumentRole,
        index: usize,
        confidence: f64,
    },

    #[error("{document}: span #{index} has blank entity text")]
    BlankText { document: DocumentRole, index: usize },
}

/// The alias table maps one alias to two different canonical terms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("alias '{alias}' resolves to both '{first}' and '{second}' ({scope})")]
pub struct NormalizationConflictError {
    pub alias: String,
    pub scope: String,
    pub first: String,
    pub second: String,
}

/// The rubric cannot be applied as configured.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RubricConfigError {
    #[error("rubric weights sum to {sum}, expected 1.0")]
    WeightSum { sum: f64 },

    #[error("rubric weight for '{category}' is {weight}; weights must be finite and non-negative")]
    InvalidWeight { category: EntityCategory, weight: f64 },

    #[error("rubric threshold '{threshold}' is required to score '{category}'")]
    MissingThreshold {
        category: EntityCategory,
        threshold: &'static str,
    },

    #[error("rubric threshold '{name}' has invalid value {value}")]
    InvalidThreshold { name: String, value: f64 },
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP boundary error
// ────────────────────────────────────────────────────────────────────────────

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Document ingestion failed: {0}")]
    Ingestion(String),

    #[error("Malformed extraction: {0}")]
    Extraction(#[from] ExtractionShapeError),

    #[error("Alias configuration conflict: {0}")]
    Normalization(#[from] NormalizationConflictError),

    #[error("Rubric configuration error: {0}")]
    Rubric(#[from] RubricConfigError),

    #[error("Entity recognizer error: {0}")]
    Recognizer(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Ingestion(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "PARSE_ERROR", msg.clone())
            }
            AppError::Extraction(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "EXTRACTION_SHAPE_ERROR",
                e.to_string(),
            ),
            AppError::Normalization(e) => {
                tracing::error!("Alias map conflict: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    e.to_string(),
                )
            }
            AppError::Rubric(e) => {
                tracing::error!("Rubric configuration error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    e.to_string(),
                )
            }
            AppError::Recognizer(msg) => {
                tracing::error!("Recognizer error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "NER_ERROR",
                    "Entity extraction failed".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_alias_and_targets() {
        let err = NormalizationConflictError {
            alias: "torch".to_string(),
            scope: "category skill".to_string(),
            first: "pytorch".to_string(),
            second: "torch7".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'torch'"));
        assert!(msg.contains("'pytorch'"));
        assert!(msg.contains("'torch7'"));
    }

    #[test]
    fn test_extraction_error_maps_to_unprocessable() {
        let err: AppError = ExtractionShapeError::BlankText {
            document: DocumentRole::Resume,
            index: 3,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_rubric_error_maps_to_server_error() {
        let err: AppError = RubricConfigError::WeightSum { sum: 0.9 }.into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
