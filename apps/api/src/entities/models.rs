//! Entity data model shared by the collector, canonicalizer and scoring engine.
//!
//! Every type here is plain data: created once per screening run, never
//! mutated after construction, and serialized as-is into responses and prompts.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Categories and document roles
// ────────────────────────────────────────────────────────────────────────────

/// Closed set of entity categories.
///
/// Variants are declared alphabetically so the derived `Ord` matches the
/// ascending label order used when sorting canonical entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    #[serde(alias = "companies")]
    Company,
    #[serde(alias = "educations")]
    Education,
    #[serde(alias = "languages")]
    Language,
    Other,
    #[serde(alias = "skills")]
    Skill,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 5] = [
        EntityCategory::Company,
        EntityCategory::Education,
        EntityCategory::Language,
        EntityCategory::Other,
        EntityCategory::Skill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Company => "company",
            EntityCategory::Education => "education",
            EntityCategory::Language => "language",
            EntityCategory::Other => "other",
            EntityCategory::Skill => "skill",
        }
    }

    /// Maps a raw recognizer label (e.g. `ORG`, `B-SKILL`, `education`) to a category.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_uppercase();
        let label = label
            .strip_prefix("B-")
            .or_else(|| label.strip_prefix("I-"))
            .unwrap_or(&label);

        match label {
            "ORG" | "ORGANIZATION" | "COMPANY" | "COMPANIES" => EntityCategory::Company,
            "SKILL" | "SKILLS" | "MISC" => EntityCategory::Skill,
            "EDU" | "EDUCATION" => EntityCategory::Education,
            "LANG" | "LANGUAGE" | "LANGUAGES" => EntityCategory::Language,
            _ => EntityCategory::Other,
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which input document an occurrence came from.
///
/// The derived `Ord` (resume first) is the fixed document order of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentRole {
    Resume,
    JobDescription,
}

impl DocumentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentRole::Resume => "resume",
            DocumentRole::JobDescription => "job_description",
        }
    }
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Raw recognizer output
// ────────────────────────────────────────────────────────────────────────────

/// One span as produced by an entity recognizer, before any validation.
///
/// Offsets are character (not byte) offsets into the source document and are
/// signed so malformed input can be reported instead of rejected by serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpan {
    pub start: i64,
    pub end: i64,
    pub text: String,
    pub label: String,
    pub confidence: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Occurrences and canonical entities
// ────────────────────────────────────────────────────────────────────────────

/// One detected span with its document context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityOccurrence {
    pub raw_text: String,
    /// Equal to `raw_text` until the canonicalizer resolves it.
    pub canonical_text: String,
    pub category: EntityCategory,
    pub confidence: f64,
    /// Character offsets `(start, end)` within the source document.
    pub span: (usize, usize),
    pub document_role: DocumentRole,
    pub document_display: String,
    pub context_snippet: String,
    pub source_language: String,
    /// Position in the merged run-wide sequence; assigned when documents are merged.
    pub ingestion_index: usize,
}

impl EntityOccurrence {
    /// Consumes the occurrence, returning it with its resolved canonical label.
    pub(crate) fn with_canonical_text(mut self, canonical: String) -> Self {
        self.canonical_text = canonical;
        self
    }

    pub fn source(&self) -> SourceRef {
        SourceRef {
            role: self.document_role,
            display: self.document_display.clone(),
        }
    }
}

/// Document attribution for a canonical entity: role plus display label, never content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub role: DocumentRole,
    pub display: String,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.display)
    }
}

/// Deduplicated, reportable group of equivalent occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub text: String,
    pub category: EntityCategory,
    pub top_confidence: f64,
    pub occurrence_count: usize,
    /// First-seen (ingestion) order.
    pub occurrences: Vec<EntityOccurrence>,
    /// One snippet per occurrence, mirroring `occurrences`.
    pub contexts: Vec<String>,
    /// Distinct documents in first-seen order.
    pub sources: Vec<SourceRef>,
    /// Distinct trimmed surface forms in first-seen order.
    pub aliases: Vec<String>,
}

impl CanonicalEntity {
    /// Ingestion index of the earliest occurrence.
    pub fn first_seen(&self) -> usize {
        self.occurrences
            .first()
            .map(|o| o.ingestion_index)
            .unwrap_or(usize::MAX)
    }

    pub fn mentioned_in(&self, role: DocumentRole) -> bool {
        self.sources.iter().any(|s| s.role == role)
    }

    /// Highest confidence among occurrences from the given document role.
    pub fn top_confidence_in(&self, role: DocumentRole) -> Option<f64> {
        self.occurrences
            .iter()
            .filter(|o| o.document_role == role)
            .map(|o| o.confidence)
            .fold(None, |best, c| match best {
                Some(b) if b >= c => Some(b),
                _ => Some(c),
            })
    }
}

/// Output of the canonicalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntityCollection {
    /// All occurrences in ingestion order, with `canonical_text` resolved.
    pub occurrences: Vec<EntityOccurrence>,
    /// Sorted by (category, text, first-seen).
    pub canonical_entities: Vec<CanonicalEntity>,
    pub normalization_log: Vec<String>,
}

impl ExtractedEntityCollection {
    pub fn entities_in(&self, category: EntityCategory) -> impl Iterator<Item = &CanonicalEntity> {
        self.canonical_entities
            .iter()
            .filter(move |e| e.category == category)
    }

    /// Canonical labels of a category that were mentioned in the given document.
    pub fn terms_from(&self, category: EntityCategory, role: DocumentRole) -> BTreeSet<String> {
        self.entities_in(category)
            .filter(|e| e.mentioned_in(role))
            .map(|e| e.text.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ordering_is_alphabetical() {
        let mut sorted = EntityCategory::ALL.to_vec();
        sorted.sort();
        let labels: Vec<&str> = sorted.iter().map(|c| c.as_str()).collect();
        let mut alphabetical = labels.clone();
        alphabetical.sort();
        assert_eq!(labels, alphabetical);
    }

    #[test]
    fn test_category_from_label() {
        assert_eq!(EntityCategory::from_label("ORG"), EntityCategory::Company);
        assert_eq!(EntityCategory::from_label("B-SKILL"), EntityCategory::Skill);
        assert_eq!(EntityCategory::from_label("misc"), EntityCategory::Skill);
        assert_eq!(EntityCategory::from_label("education"), EntityCategory::Education);
        assert_eq!(EntityCategory::from_label("LANG"), EntityCategory::Language);
        assert_eq!(EntityCategory::from_label("PER"), EntityCategory::Other);
        assert_eq!(EntityCategory::from_label(""), EntityCategory::Other);
    }

    #[test]
    fn test_category_serde_accepts_plural_alias() {
        let category: EntityCategory = serde_json::from_str(r#""skills""#).unwrap();
        assert_eq!(category, EntityCategory::Skill);
        assert_eq!(serde_json::to_string(&category).unwrap(), r#""skill""#);
    }

    #[test]
    fn test_resume_orders_before_job_description() {
        assert!(DocumentRole::Resume < DocumentRole::JobDescription);
    }

    #[test]
    fn test_source_ref_display() {
        let source = SourceRef {
            role: DocumentRole::JobDescription,
            display: "jd.pdf".to_string(),
        };
        assert_eq!(source.to_string(), "job_description:jd.pdf");
    }
}
