// Prompt constants for the screening assessment.
// Reuses cross-cutting fragments from llm_client::prompts.

use serde_json::json;

use crate::entities::models::ExtractedEntityCollection;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::scoring::RubricScorecard;

/// Role line of the assessment system prompt.
const ASSESSMENT_ROLE: &str = "You are an experienced technical recruiter reviewing \
    a deterministic resume screening result.";

/// Assessment prompt template.
/// Replace: {grounding_instruction}, {entities_json}, {scorecard_json}
const ASSESSMENT_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Write a short assessment of how well the candidate matches the job description.

Return a JSON object with this EXACT schema (no extra fields):
{
  "summary": "Two or three sentences.",
  "strengths": ["python", "machine learning"],
  "gaps": ["kubernetes"]
}

Strengths and gaps must use the canonical entity labels exactly as given.

CANONICAL ENTITIES:
{entities_json}

SCORECARD:
{scorecard_json}"#;

pub fn assessment_system_prompt() -> String {
    format!("{ASSESSMENT_ROLE} {JSON_ONLY_SYSTEM}")
}

/// Builds the user prompt. Only canonical labels, categories, counts and
/// document roles are included, never snippets of the documents themselves.
pub fn build_assessment_prompt(
    collection: &ExtractedEntityCollection,
    scorecard: &RubricScorecard,
) -> String {
    let entities: Vec<_> = collection
        .canonical_entities
        .iter()
        .map(|entity| {
            json!({
                "text": entity.text,
                "category": entity.category,
                "occurrences": entity.occurrence_count,
                "documents": entity.sources.iter().map(|s| s.role).collect::<Vec<_>>(),
            })
        })
        .collect();

    let entities_json = serde_json::to_string_pretty(&entities).unwrap_or_default();
    let scorecard_json = serde_json::to_string_pretty(scorecard).unwrap_or_default();

    ASSESSMENT_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{entities_json}", &entities_json)
        .replace("{scorecard_json}", &scorecard_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::models::{
        CanonicalEntity, DocumentRole, EntityCategory, EntityOccurrence, SourceRef,
    };
    use std::collections::BTreeMap;

    #[test]
    fn test_prompt_carries_labels_but_not_context() {
        let occurrence = EntityOccurrence {
            raw_text: "PyTorch".to_string(),
            canonical_text: "pytorch".to_string(),
            category: EntityCategory::Skill,
            confidence: 0.9,
            span: (10, 17),
            document_role: DocumentRole::Resume,
            document_display: "cv.pdf".to_string(),
            context_snippet: "secret client project in PyTorch".to_string(),
            source_language: "en".to_string(),
            ingestion_index: 0,
        };
        let collection = ExtractedEntityCollection {
            occurrences: vec![occurrence.clone()],
            canonical_entities: vec![CanonicalEntity {
                text: "pytorch".to_string(),
                category: EntityCategory::Skill,
                top_confidence: 0.9,
                occurrence_count: 1,
                contexts: vec![occurrence.context_snippet.clone()],
                occurrences: vec![occurrence],
                sources: vec![SourceRef {
                    role: DocumentRole::Resume,
                    display: "cv.pdf".to_string(),
                }],
                aliases: vec!["PyTorch".to_string()],
            }],
            normalization_log: vec![],
        };
        let scorecard = RubricScorecard {
            rubric_version: "test".to_string(),
            sub_scores: BTreeMap::from([(EntityCategory::Skill, 100.0)]),
            overall_score: 100.0,
            breakdown: vec![],
            recommendation: "Strong fit.".to_string(),
        };

        let prompt = build_assessment_prompt(&collection, &scorecard);
        assert!(prompt.contains("\"pytorch\""));
        assert!(prompt.contains("\"resume\""));
        assert!(prompt.contains("\"overall_score\": 100.0"));
        assert!(!prompt.contains("secret client project"));
        assert!(!prompt.contains("{entities_json}"));
        assert!(assessment_system_prompt().contains("valid JSON only"));
    }
}
