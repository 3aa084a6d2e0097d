//! Rubric Scoring Engine — deterministic 0–100 scorecard with explainable sub-scores.
//!
//! Comparators, one per category:
//! - skill, language, other: overlap `100 × |candidate ∩ required| / |required|`
//! - company: breadth against `company_target_count`, blended 50/50 with
//!   overlap when the job description names companies
//! - education: same shape as company, against `education_target_count`
//!
//! An overlap category whose job-description requirements are empty has
//! nothing to compare. It is reported with sub-score 0 but left out of the
//! overall score, and the configured weights of the remaining categories are
//! rescaled to sum to 1. Company and education always take part, since
//! breadth is measured without requirements.
//!
//! Only ordered collections are iterated, so the same inputs always produce
//! the same scorecard, byte for byte.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entities::models::{DocumentRole, EntityCategory, ExtractedEntityCollection};
use crate::errors::RubricConfigError;
use crate::rules::rubric::{
    RubricConfig, COMPANY_TARGET_COUNT, EDUCATION_TARGET_COUNT, MIN_CONFIDENCE,
};
use crate::scoring::facts::JobDescriptionFacts;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// How one category's sub-score was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScoreDetail {
    pub category: EntityCategory,
    /// Configured rubric weight.
    pub weight: f64,
    /// Share of the overall score actually carried; 0 when nothing was comparable.
    pub effective_weight: f64,
    pub sub_score: f64,
    /// Required terms the resume covers, sorted.
    pub matched: Vec<String>,
    /// Required terms the resume lacks, sorted.
    pub missing: Vec<String>,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricScorecard {
    pub rubric_version: String,
    /// Weighted categories only, each in [0, 100].
    pub sub_scores: BTreeMap<EntityCategory, f64>,
    /// Weighted sum of sub-scores, rounded to 2 decimals, in [0, 100].
    pub overall_score: f64,
    pub breakdown: Vec<SubScoreDetail>,
    pub recommendation: String,
}

impl RubricScorecard {
    pub fn detail(&self, category: EntityCategory) -> Option<&SubScoreDetail> {
        self.breakdown.iter().find(|d| d.category == category)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

struct Comparison {
    /// False when the job description gave this category nothing to compare.
    comparable: bool,
    score: f64,
    matched: Vec<String>,
    missing: Vec<String>,
    rationale: String,
}

/// Scores the resume side of `collection` against `facts`.
///
/// The rubric is validated before any sub-score is computed; on failure no
/// partial scorecard is produced.
pub fn compute_scorecard(
    collection: &ExtractedEntityCollection,
    facts: &JobDescriptionFacts,
    rubric: &RubricConfig,
) -> Result<RubricScorecard, RubricConfigError> {
    rubric.validate()?;
    let min_confidence = rubric.threshold(MIN_CONFIDENCE).unwrap_or(0.0);

    let mut sub_scores = BTreeMap::new();
    let mut scored = Vec::new();

    for (category, weight) in rubric.scored_categories() {
        let evidence = candidate_evidence(collection, category, min_confidence);
        let required = facts.required(category);

        let comparison = match category {
            EntityCategory::Skill | EntityCategory::Language | EntityCategory::Other => {
                overlap(category, &evidence, &required)
            }
            EntityCategory::Company => breadth_with_overlap(
                category,
                &evidence,
                &required,
                rubric.required_threshold(category, COMPANY_TARGET_COUNT)?,
            ),
            EntityCategory::Education => breadth_with_overlap(
                category,
                &evidence,
                &required,
                rubric.required_threshold(category, EDUCATION_TARGET_COUNT)?,
            ),
        };
        scored.push((category, weight, comparison));
    }

    let comparable_weight: f64 = scored
        .iter()
        .filter(|(_, _, comparison)| comparison.comparable)
        .map(|(_, weight, _)| weight)
        .sum();

    let mut breakdown = Vec::with_capacity(scored.len());
    let mut weighted_total = 0.0;
    for (category, weight, comparison) in scored {
        let sub_score = round2(comparison.score);
        let effective_weight = if comparison.comparable && comparable_weight > 0.0 {
            weight / comparable_weight
        } else {
            0.0
        };
        weighted_total += effective_weight * sub_score;
        sub_scores.insert(category, sub_score);
        breakdown.push(SubScoreDetail {
            category,
            weight,
            effective_weight,
            sub_score,
            matched: comparison.matched,
            missing: comparison.missing,
            rationale: comparison.rationale,
        });
    }

    let overall_score = round2(weighted_total);
    let missing_skills = breakdown
        .iter()
        .find(|d| d.category == EntityCategory::Skill)
        .map(|d| d.missing.as_slice())
        .unwrap_or(&[]);
    let recommendation = build_recommendation(overall_score, missing_skills);

    Ok(RubricScorecard {
        rubric_version: rubric.version.clone(),
        sub_scores,
        overall_score,
        breakdown,
        recommendation,
    })
}

/// Canonical labels the resume supports for a category.
fn candidate_evidence(
    collection: &ExtractedEntityCollection,
    category: EntityCategory,
    min_confidence: f64,
) -> BTreeSet<String> {
    collection
        .entities_in(category)
        .filter(|e| {
            e.top_confidence_in(DocumentRole::Resume)
                .is_some_and(|confidence| confidence >= min_confidence)
        })
        .map(|e| e.text.clone())
        .collect()
}

fn split_required(
    evidence: &BTreeSet<String>,
    required: &BTreeSet<String>,
) -> (Vec<String>, Vec<String>) {
    required
        .iter()
        .cloned()
        .partition(|term| evidence.contains(term))
}

fn overlap(
    category: EntityCategory,
    evidence: &BTreeSet<String>,
    required: &BTreeSet<String>,
) -> Comparison {
    if required.is_empty() {
        return Comparison {
            comparable: false,
            score: 0.0,
            matched: vec![],
            missing: vec![],
            rationale: format!(
                "No {category} requirements in the job description; left out of the overall score."
            ),
        };
    }

    let (matched, missing) = split_required(evidence, required);
    let score = 100.0 * matched.len() as f64 / required.len() as f64;
    Comparison {
        comparable: true,
        rationale: format!(
            "{} of {} required {category} terms found in the resume.",
            matched.len(),
            required.len()
        ),
        score,
        matched,
        missing,
    }
}

fn breadth_with_overlap(
    category: EntityCategory,
    evidence: &BTreeSet<String>,
    required: &BTreeSet<String>,
    target_count: f64,
) -> Comparison {
    let breadth = (evidence.len() as f64 / target_count).min(1.0);

    if required.is_empty() {
        return Comparison {
            comparable: true,
            score: 100.0 * breadth,
            matched: vec![],
            missing: vec![],
            rationale: format!(
                "{} distinct {category} entries on the resume against a target of {target_count}; \
                 no specific {category} requirements.",
                evidence.len()
            ),
        };
    }

    let (matched, missing) = split_required(evidence, required);
    let coverage = matched.len() as f64 / required.len() as f64;
    Comparison {
        comparable: true,
        score: 100.0 * (0.5 * breadth + 0.5 * coverage),
        rationale: format!(
            "{} distinct {category} entries against a target of {target_count}; \
             {} of {} named in the job description.",
            evidence.len(),
            matched.len(),
            required.len()
        ),
        matched,
        missing,
    }
}

/// Rounds to 2 decimals and clamps to [0, 100].
fn round2(value: f64) -> f64 {
    ((value * 100.0).round() / 100.0).clamp(0.0, 100.0)
}

/// Builds a human-readable recommendation string from score and missing skills.
fn build_recommendation(score: f64, missing_skills: &[String]) -> String {
    let top_gaps: Vec<&str> = missing_skills.iter().take(3).map(String::as_str).collect();

    if score >= 80.0 {
        "Strong fit. The resume directly covers the key job description requirements.".to_string()
    } else if top_gaps.is_empty() {
        if score >= 60.0 {
            format!("Moderate fit ({score}/100).")
        } else {
            format!("Low fit ({score}/100).")
        }
    } else if score >= 60.0 {
        format!(
            "Moderate fit ({score}/100). Consider evidence for: {}.",
            top_gaps.join(", ")
        )
    } else {
        format!(
            "Low fit ({score}/100). Significant skill gaps: {}.",
            top_gaps.join(", ")
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
