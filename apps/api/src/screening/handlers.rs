//! Axum route handlers for the Screening API.

use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::entities::models::EntityCategory;
use crate::errors::AppError;
use crate::rules::AliasMapDetails;
use crate::screening::ingest::{load_document, LoadedDocument};
use crate::screening::pipeline::{run_screening, DocumentInput, ScreeningRequest, ScreeningResult};
use crate::screening::report::{render_report, RenderOptions};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RubricSummary {
    pub version: String,
    pub weights: BTreeMap<EntityCategory, f64>,
    pub thresholds: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct RulesResponse {
    pub alias_map: AliasMapDetails,
    pub rubric: RubricSummary,
    pub recognizer: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub wide: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/rules
pub async fn handle_get_rules(State(state): State<AppState>) -> Json<RulesResponse> {
    Json(RulesResponse {
        alias_map: state.alias_map.details(),
        rubric: RubricSummary {
            version: state.rubric.version.clone(),
            weights: state.rubric.weights.clone(),
            thresholds: state.rubric.thresholds.clone(),
        },
        recognizer: state.recognizer.backend().to_string(),
    })
}

/// POST /api/v1/screenings
pub async fn handle_screen(
    State(state): State<AppState>,
    Json(request): Json<ScreeningRequest>,
) -> Result<Json<ScreeningResult>, AppError> {
    let result = run_screening(&state, request).await?;
    Ok(Json(result))
}

/// POST /api/v1/screenings/report
/// Same input as `handle_screen`; responds with a plain-text report.
pub async fn handle_screen_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    Json(request): Json<ScreeningRequest>,
) -> Result<String, AppError> {
    let result = run_screening(&state, request).await?;
    Ok(render_report(
        &result.collection,
        &result.scorecard,
        RenderOptions { wide: query.wide },
    ))
}

/// POST /api/v1/screenings/upload
/// Multipart fields: `resume`, `job_description` (files), optional
/// `resume_language`, `job_description_language`, `include_assessment`.
pub async fn handle_screen_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ScreeningResult>, AppError> {
    let mut resume: Option<(String, Bytes)> = None;
    let mut job_description: Option<(String, Bytes)> = None;
    let mut resume_language = None;
    let mut job_description_language = None;
    let mut include_assessment = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or(name.as_str()).to_string();
        match name.as_str() {
            "resume" => resume = Some((file_name, read_bytes(field).await?)),
            "job_description" => job_description = Some((file_name, read_bytes(field).await?)),
            "resume_language" => resume_language = Some(read_text(field).await?),
            "job_description_language" => job_description_language = Some(read_text(field).await?),
            "include_assessment" => {
                include_assessment = read_text(field).await?.trim().eq_ignore_ascii_case("true")
            }
            _ => {}
        }
    }

    let (resume_name, resume_bytes) = resume
        .ok_or_else(|| AppError::Validation("Missing multipart field 'resume'".to_string()))?;
    let (jd_name, jd_bytes) = job_description.ok_or_else(|| {
        AppError::Validation("Missing multipart field 'job_description'".to_string())
    })?;

    let (resume_doc, jd_doc) = tokio::try_join!(
        decode_upload(resume_name, resume_bytes, "resume"),
        decode_upload(jd_name, jd_bytes, "job description"),
    )?;

    let request = ScreeningRequest {
        resume: into_input(resume_doc, resume_language),
        job_description: into_input(jd_doc, job_description_language),
        include_assessment,
    };
    let result = run_screening(&state, request).await?;
    Ok(Json(result))
}

async fn read_bytes(field: axum::extract::multipart::Field<'_>) -> Result<Bytes, AppError> {
    field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read uploaded file: {e}")))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))
}

/// PDF extraction is CPU-bound and may panic on malformed input, so it runs
/// on the blocking pool where a panic surfaces as a join error.
async fn decode_upload(
    file_name: String,
    bytes: Bytes,
    description: &'static str,
) -> Result<LoadedDocument, AppError> {
    tokio::task::spawn_blocking(move || load_document(&file_name, &bytes, description))
        .await
        .map_err(|_| AppError::Ingestion(format!("The {description} file could not be parsed")))?
}

fn into_input(document: LoadedDocument, language: Option<String>) -> DocumentInput {
    DocumentInput {
        display_name: document.display_name,
        text: document.text,
        language: language.filter(|l| !l.trim().is_empty()),
        spans: None,
    }
}
