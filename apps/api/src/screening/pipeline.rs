//! Screening pipeline — one run from two documents to a scorecard.
//!
//! 1. Recognize and collect both documents concurrently.
//! 2. Merge in fixed document order (resume, then job description).
//! 3. Normalize the whole merged sequence in one pass.
//! 4. Derive job-description facts and compute the scorecard.
//! 5. Optionally ask the LLM for a narrative; its failure never fails the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::collector::{collect, merge_in_document_order, DocumentOccurrences, SourceDocument};
use crate::entities::models::{DocumentRole, ExtractedEntityCollection, RawSpan};
use crate::errors::AppError;
use crate::scoring::{compute_scorecard, JobDescriptionFacts, RubricScorecard};
use crate::screening::ingest::display_name;
use crate::screening::prompts::{assessment_system_prompt, build_assessment_prompt};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub display_name: String,
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Pre-computed recognizer output; skips the configured recognizer when present.
    #[serde(default)]
    pub spans: Option<Vec<RawSpan>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreeningRequest {
    pub resume: DocumentInput,
    pub job_description: DocumentInput,
    #[serde(default)]
    pub include_assessment: bool,
}

/// Narrative produced by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssessmentOutcome {
    Completed { model: String, assessment: Assessment },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreeningResult {
    pub run_id: Uuid,
    pub collection: ExtractedEntityCollection,
    pub scorecard: RubricScorecard,
    /// Absent unless the request asked for an assessment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentOutcome>,
    pub recognizer: String,
    pub completed_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

pub async fn run_screening(
    state: &AppState,
    request: ScreeningRequest,
) -> Result<ScreeningResult, AppError> {
    validate_document(&request.resume, "resume")?;
    validate_document(&request.job_description, "job description")?;

    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        "Screening started: resume={}, job_description={}",
        display_name(&request.resume.display_name),
        display_name(&request.job_description.display_name)
    );

    let (resume, job_description) = tokio::try_join!(
        extract_document(state, DocumentRole::Resume, &request.resume),
        extract_document(state, DocumentRole::JobDescription, &request.job_description),
    )?;
    info!(
        %run_id,
        "Collected {} resume and {} job description occurrences",
        resume.occurrences.len(),
        job_description.occurrences.len()
    );

    let occurrences = merge_in_document_order(vec![resume, job_description]);
    let collection = state.canonicalizer.normalize(occurrences);
    info!(
        %run_id,
        "Normalized into {} canonical entities",
        collection.canonical_entities.len()
    );

    let facts = JobDescriptionFacts::from_collection(&collection);
    let scorecard = compute_scorecard(&collection, &facts, &state.rubric)?;
    info!(
        %run_id,
        "Scored {} requirements: overall {:.2}",
        facts.total(),
        scorecard.overall_score
    );

    let assessment = if request.include_assessment {
        Some(assess(state, &collection, &scorecard, run_id).await)
    } else {
        None
    };

    Ok(ScreeningResult {
        run_id,
        collection,
        scorecard,
        assessment,
        recognizer: state.recognizer.backend().to_string(),
        completed_at: Utc::now(),
    })
}

fn validate_document(input: &DocumentInput, description: &str) -> Result<(), AppError> {
    if input.display_name.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "The {description} display name must not be empty"
        )));
    }
    if input.text.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "The {description} text must not be empty"
        )));
    }
    Ok(())
}

async fn extract_document(
    state: &AppState,
    role: DocumentRole,
    input: &DocumentInput,
) -> Result<DocumentOccurrences, AppError> {
    let language = input.language.as_deref();
    let spans = match &input.spans {
        Some(spans) => spans.clone(),
        None => state.recognizer.recognize(&input.text, language).await?,
    };

    let display = display_name(&input.display_name);
    let document = SourceDocument {
        role,
        display: &display,
        text: &input.text,
        language,
    };
    collect(&spans, &document, state.config.snippet_window).map_err(AppError::from)
}

async fn assess(
    state: &AppState,
    collection: &ExtractedEntityCollection,
    scorecard: &RubricScorecard,
    run_id: Uuid,
) -> AssessmentOutcome {
    let Some(llm) = &state.llm else {
        return AssessmentOutcome::Unavailable {
            reason: "LLM assessment is not configured".to_string(),
        };
    };

    let prompt = build_assessment_prompt(collection, scorecard);
    match llm
        .call_json::<Assessment>(&prompt, &assessment_system_prompt())
        .await
    {
        Ok(assessment) => AssessmentOutcome::Completed {
            model: llm.model().to_string(),
            assessment,
        },
        Err(e) => {
            warn!(%run_id, "LLM assessment failed, continuing without it: {e}");
            AssessmentOutcome::Unavailable {
                reason: "The language model could not produce an assessment".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::Config;
    use crate::entities::models::EntityCategory;
    use crate::entities::EntityRecognizer;
    use crate::errors::ExtractionShapeError;
    use crate::rules::{AliasMap, RubricConfig};
    use crate::state::test_support::default_state;

    fn document(display_name: &str, text: &str) -> DocumentInput {
        DocumentInput {
            display_name: display_name.to_string(),
            text: text.to_string(),
            language: Some("en".to_string()),
            spans: None,
        }
    }

    fn request(resume: &str, job_description: &str) -> ScreeningRequest {
        ScreeningRequest {
            resume: document("cv.txt", resume),
            job_description: document("jd.txt", job_description),
            include_assessment: false,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_with_gazetteer() {
        let state = default_state();
        let result = run_screening(
            &state,
            request(
                "Built PyTorch models in Python at Google.",
                "We need Python, pytorch and Kubernetes (k8s).",
            ),
        )
        .await
        .unwrap();

        let pytorch = result
            .collection
            .canonical_entities
            .iter()
            .find(|e| e.text == "pytorch")
            .unwrap();
        assert_eq!(pytorch.occurrence_count, 2);
        let roles: Vec<DocumentRole> = pytorch.sources.iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![DocumentRole::Resume, DocumentRole::JobDescription]);

        let skill = result.scorecard.detail(EntityCategory::Skill).unwrap();
        assert_eq!(skill.matched, vec!["python", "pytorch"]);
        assert_eq!(skill.missing, vec!["kubernetes"]);
        assert_eq!(skill.sub_score, 66.67);
        assert_eq!(result.recognizer, "gazetteer");
        assert!(result.assessment.is_none());
    }

    #[tokio::test]
    async fn test_supplied_spans_bypass_recognizer() {
        let state = default_state();
        let mut request = request("Python", "Python and PyTorch");
        request.resume.spans = Some(vec![RawSpan {
            start: 0,
            end: 6,
            text: "Python".to_string(),
            label: "SKILL".to_string(),
            confidence: 0.9,
        }]);
        request.job_description.spans = Some(vec![
            RawSpan {
                start: 0,
                end: 6,
                text: "Python".to_string(),
                label: "SKILL".to_string(),
                confidence: 0.8,
            },
            RawSpan {
                start: 11,
                end: 18,
                text: "PyTorch".to_string(),
                label: "MISC".to_string(),
                confidence: 0.7,
            },
        ]);

        let result = run_screening(&state, request).await.unwrap();
        assert_eq!(result.collection.occurrences.len(), 3);
        assert_eq!(result.scorecard.sub_scores[&EntityCategory::Skill], 50.0);
    }

    #[tokio::test]
    async fn test_malformed_span_fails_the_run() {
        let state = default_state();
        let mut request = request("Python", "Python");
        request.resume.spans = Some(vec![RawSpan {
            start: 0,
            end: 60,
            text: "Python".to_string(),
            label: "SKILL".to_string(),
            confidence: 0.9,
        }]);

        let err = run_screening(&state, request).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Extraction(ExtractionShapeError::OutOfBounds { .. })
        ));
    }

    #[tokio::test]
    async fn test_blank_document_is_a_validation_error() {
        let state = default_state();
        let err = run_screening(&state, request("   ", "Python")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_assessment_without_llm_is_unavailable() {
        let state = default_state();
        let mut request = request("Python", "Python");
        request.include_assessment = true;

        let result = run_screening(&state, request).await.unwrap();
        assert!(matches!(
            result.assessment,
            Some(AssessmentOutcome::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_runs_are_reproducible() {
        let state = default_state();
        let resume = "Python, Rust and Docker at Amazon. BSc Computer Science. English, Spanish.";
        let jd = "Rust, Kubernetes, Docker; MSc preferred; Spanish speaker.";

        let first = run_screening(&state, request(resume, jd)).await.unwrap();
        let second = run_screening(&state, request(resume, jd)).await.unwrap();
        assert_eq!(first.collection, second.collection);
        assert_eq!(
            serde_json::to_string(&first.scorecard).unwrap(),
            serde_json::to_string(&second.scorecard).unwrap()
        );
        assert_ne!(first.run_id, second.run_id);
    }

    /// Returns fixed spans, finishing the resume long after the job description.
    struct SlowResumeRecognizer {
        spans: BTreeMap<String, Vec<RawSpan>>,
    }

    #[async_trait]
    impl EntityRecognizer for SlowResumeRecognizer {
        async fn recognize(&self, text: &str, _language: Option<&str>) -> Result<Vec<RawSpan>, AppError> {
            if text.starts_with("resume") {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(self.spans.get(text).cloned().unwrap_or_default())
        }

        fn backend(&self) -> &'static str {
            "fixture"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order_does_not_affect_merge() {
        let span = |start, end, text: &str| RawSpan {
            start,
            end,
            text: text.to_string(),
            label: "SKILL".to_string(),
            confidence: 0.9,
        };
        let recognizer = SlowResumeRecognizer {
            spans: BTreeMap::from([
                ("resume: Rust".to_string(), vec![span(8, 12, "Rust")]),
                ("jd: Go, Rust".to_string(), vec![span(4, 6, "Go"), span(8, 12, "Rust")]),
            ]),
        };
        let state = AppState::new(
            Config::default(),
            AliasMap::default(),
            RubricConfig::load(None).unwrap(),
            Arc::new(recognizer),
        )
        .unwrap();

        let result = run_screening(&state, request("resume: Rust", "jd: Go, Rust"))
            .await
            .unwrap();

        let order: Vec<(DocumentRole, usize)> = result
            .collection
            .occurrences
            .iter()
            .map(|o| (o.document_role, o.ingestion_index))
            .collect();
        assert_eq!(
            order,
            vec![
                (DocumentRole::Resume, 0),
                (DocumentRole::JobDescription, 1),
                (DocumentRole::JobDescription, 2),
            ]
        );
        assert_eq!(result.recognizer, "fixture");
    }
}
