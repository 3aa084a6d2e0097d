//! Occurrence Collector — turns raw recognizer spans into `EntityOccurrence` records.
//!
//! Collection is per document and has no cross-document state, so callers may
//! run it concurrently. `merge_in_document_order` re-joins the batches in the
//! fixed run order before anything downstream sees them.

use std::iter;

use crate::entities::models::{DocumentRole, EntityCategory, EntityOccurrence, RawSpan};
use crate::errors::ExtractionShapeError;

/// Characters of context kept on each side of a span.
pub const DEFAULT_SNIPPET_WINDOW: usize = 40;

const UNDETERMINED_LANGUAGE: &str = "und";
const ELLIPSIS: &str = "...";

/// Identity and content of one input document.
#[derive(Debug, Clone, Copy)]
pub struct SourceDocument<'a> {
    pub role: DocumentRole,
    pub display: &'a str,
    pub text: &'a str,
    pub language: Option<&'a str>,
}

/// Occurrences collected from a single document.
#[derive(Debug, Clone)]
pub struct DocumentOccurrences {
    pub role: DocumentRole,
    pub occurrences: Vec<EntityOccurrence>,
}

/// Converts every raw span of `document` into an occurrence.
///
/// Fails on the first malformed span; no partial batch is returned.
pub fn collect(
    spans: &[RawSpan],
    document: &SourceDocument<'_>,
    window: usize,
) -> Result<DocumentOccurrences, ExtractionShapeError> {
    // Byte offset of every char boundary, including the end of the text.
    let boundaries: Vec<usize> = document
        .text
        .char_indices()
        .map(|(byte, _)| byte)
        .chain(iter::once(document.text.len()))
        .collect();
    let char_len = boundaries.len() - 1;
    let language = normalize_language(document.language);

    let mut occurrences = Vec::with_capacity(spans.len());
    for (index, span) in spans.iter().enumerate() {
        let (start, end) = validate_span(span, index, document.role, char_len)?;

        occurrences.push(EntityOccurrence {
            raw_text: span.text.clone(),
            canonical_text: span.text.clone(),
            category: EntityCategory::from_label(&span.label),
            confidence: span.confidence,
            span: (start, end),
            document_role: document.role,
            document_display: document.display.to_string(),
            context_snippet: build_context_snippet(document.text, &boundaries, start, end, window),
            source_language: language.clone(),
            ingestion_index: index,
        });
    }

    Ok(DocumentOccurrences {
        role: document.role,
        occurrences,
    })
}

/// Concatenates per-document batches in fixed role order (resume, then job
/// description) and assigns run-wide ingestion indices.
///
/// The order batches arrive in never affects the result.
pub fn merge_in_document_order(mut batches: Vec<DocumentOccurrences>) -> Vec<EntityOccurrence> {
    batches.sort_by_key(|batch| batch.role);

    batches
        .into_iter()
        .flat_map(|batch| batch.occurrences)
        .enumerate()
        .map(|(index, mut occurrence)| {
            occurrence.ingestion_index = index;
            occurrence
        })
        .collect()
}

fn validate_span(
    span: &RawSpan,
    index: usize,
    document: DocumentRole,
    char_len: usize,
) -> Result<(usize, usize), ExtractionShapeError> {
    if !span.confidence.is_finite() || !(0.0..=1.0).contains(&span.confidence) {
        return Err(ExtractionShapeError::InvalidConfidence {
            document,
            index,
            confidence: span.confidence,
        });
    }

    let length = char_len as i64;
    if span.start < 0 || span.end < 0 || span.start > length || span.end > length {
        return Err(ExtractionShapeError::OutOfBounds {
            document,
            index,
            start: span.start,
            end: span.end,
            length: char_len,
        });
    }

    if span.start >= span.end {
        return Err(ExtractionShapeError::InvertedSpan {
            document,
            index,
            start: span.start,
            end: span.end,
        });
    }

    if span.text.trim().is_empty() {
        return Err(ExtractionShapeError::BlankText { document, index });
    }

    Ok((span.start as usize, span.end as usize))
}

/// Returns the span plus up to `window` characters either side, with `...`
/// marking trimmed ends and whitespace runs collapsed to single spaces.
fn build_context_snippet(
    text: &str,
    boundaries: &[usize],
    start: usize,
    end: usize,
    window: usize,
) -> String {
    let char_len = boundaries.len() - 1;
    let prefix_start = start.saturating_sub(window);
    let suffix_end = end.saturating_add(window).min(char_len);

    let excerpt = &text[boundaries[prefix_start]..boundaries[suffix_end]];
    let collapsed = excerpt.split_whitespace().collect::<Vec<_>>().join(" ");

    let prefix = if prefix_start > 0 { ELLIPSIS } else { "" };
    let suffix = if suffix_end < char_len { ELLIPSIS } else { "" };
    format!("{prefix}{collapsed}{suffix}")
}

fn normalize_language(language: Option<&str>) -> String {
    language
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: i64, end: i64, text: &str, label: &str, confidence: f64) -> RawSpan {
        RawSpan {
            start,
            end,
            text: text.to_string(),
            label: label.to_string(),
            confidence,
        }
    }

    fn doc(role: DocumentRole, text: &str) -> SourceDocument<'_> {
        SourceDocument {
            role,
            display: "cv.txt",
            text,
            language: Some(" EN "),
        }
    }

    #[test]
    fn test_collect_builds_occurrences_with_metadata() {
        let text = "Built models in PyTorch at Acme";
        let spans = vec![
            span(16, 23, "PyTorch", "SKILL", 0.9),
            span(27, 31, "Acme", "ORG", 0.8),
        ];

        let batch = collect(&spans, &doc(DocumentRole::Resume, text), 40).unwrap();
        assert_eq!(batch.role, DocumentRole::Resume);
        assert_eq!(batch.occurrences.len(), 2);

        let first = &batch.occurrences[0];
        assert_eq!(first.raw_text, "PyTorch");
        assert_eq!(first.canonical_text, "PyTorch");
        assert_eq!(first.category, EntityCategory::Skill);
        assert_eq!(first.span, (16, 23));
        assert_eq!(first.document_display, "cv.txt");
        assert_eq!(first.source_language, "en");
        assert_eq!(first.context_snippet, text);
        assert_eq!(batch.occurrences[1].category, EntityCategory::Company);
    }

    #[test]
    fn test_snippet_is_bounded_with_ellipses() {
        let text = "aaaaaaaaaa Rust bbbbbbbbbb";
        let spans = vec![span(11, 15, "Rust", "SKILL", 0.5)];

        let batch = collect(&spans, &doc(DocumentRole::Resume, text), 3).unwrap();
        assert_eq!(batch.occurrences[0].context_snippet, "...aa Rust bb...");
    }

    #[test]
    fn test_offsets_are_character_based() {
        let text = "Ingeniería en Python";
        let spans = vec![span(14, 20, "Python", "SKILL", 0.7)];

        let batch = collect(&spans, &doc(DocumentRole::Resume, text), 40).unwrap();
        assert_eq!(batch.occurrences[0].context_snippet, text);
    }

    #[test]
    fn test_missing_language_is_undetermined() {
        let text = "Rust";
        let document = SourceDocument {
            role: DocumentRole::JobDescription,
            display: "jd.txt",
            text,
            language: None,
        };
        let batch = collect(&[span(0, 4, "Rust", "SKILL", 1.0)], &document, 40).unwrap();
        assert_eq!(batch.occurrences[0].source_language, "und");
    }

    #[test]
    fn test_out_of_bounds_span_is_rejected() {
        let err = collect(
            &[span(0, 50, "Rust", "SKILL", 0.9)],
            &doc(DocumentRole::Resume, "Rust"),
            40,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionShapeError::OutOfBounds { length: 4, .. }));
    }

    #[test]
    fn test_negative_offset_is_rejected() {
        let err = collect(
            &[span(-1, 2, "Ru", "SKILL", 0.9)],
            &doc(DocumentRole::Resume, "Rust"),
            40,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionShapeError::OutOfBounds { .. }));
    }

    #[test]
    fn test_empty_or_inverted_span_is_rejected() {
        let document = doc(DocumentRole::Resume, "Rust and Go");
        let err = collect(&[span(3, 3, "", "SKILL", 0.9)], &document, 40).unwrap_err();
        assert!(matches!(err, ExtractionShapeError::InvertedSpan { .. }));

        let err = collect(&[span(4, 1, "Rus", "SKILL", 0.9)], &document, 40).unwrap_err();
        assert!(matches!(err, ExtractionShapeError::InvertedSpan { start: 4, end: 1, .. }));
    }

    #[test]
    fn test_invalid_confidence_is_rejected() {
        let document = doc(DocumentRole::Resume, "Rust");
        let err = collect(&[span(0, 4, "Rust", "SKILL", 1.5)], &document, 40).unwrap_err();
        assert!(matches!(err, ExtractionShapeError::InvalidConfidence { .. }));

        let err = collect(&[span(0, 4, "Rust", "SKILL", f64::NAN)], &document, 40).unwrap_err();
        assert!(matches!(err, ExtractionShapeError::InvalidConfidence { .. }));
    }

    #[test]
    fn test_blank_text_is_rejected() {
        let document = doc(DocumentRole::Resume, "Rust    ");
        let err = collect(&[span(4, 7, "   ", "SKILL", 0.4)], &document, 40).unwrap_err();
        assert!(matches!(err, ExtractionShapeError::BlankText { index: 0, .. }));
    }

    #[test]
    fn test_merge_orders_resume_before_job_description() {
        let jd = collect(
            &[span(0, 4, "Rust", "SKILL", 0.8), span(5, 7, "Go", "SKILL", 0.8)],
            &doc(DocumentRole::JobDescription, "Rust Go"),
            40,
        )
        .unwrap();
        let resume = collect(
            &[span(0, 6, "Python", "SKILL", 0.9)],
            &doc(DocumentRole::Resume, "Python"),
            40,
        )
        .unwrap();

        // Job description batch finished first; merge must not care.
        let merged = merge_in_document_order(vec![jd, resume]);
        let order: Vec<(&str, usize)> = merged
            .iter()
            .map(|o| (o.raw_text.as_str(), o.ingestion_index))
            .collect();
        assert_eq!(order, vec![("Python", 0), ("Rust", 1), ("Go", 2)]);
    }
}
