//! Plain-text report: canonical entity table plus scorecard summary.

use crate::entities::models::{CanonicalEntity, ExtractedEntityCollection};
use crate::scoring::RubricScorecard;

const ENTITY_WIDTH: usize = 32;
const CATEGORY_WIDTH: usize = 12;
const MATCHES_WIDTH: usize = 7;
const CONFIDENCE_WIDTH: usize = 10;
const SOURCES_WIDTH: usize = 40;

const EMPTY_MESSAGE: &str = "No canonical entities were extracted during this run.";

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Adds the sources column.
    pub wide: bool,
}

pub fn render_report(
    collection: &ExtractedEntityCollection,
    scorecard: &RubricScorecard,
    options: RenderOptions,
) -> String {
    format!(
        "{}\n\n{}\n",
        render_entities(&collection.canonical_entities, options),
        render_scorecard(scorecard)
    )
}

pub fn render_entities(entities: &[CanonicalEntity], options: RenderOptions) -> String {
    if entities.is_empty() {
        return format!("Canonical Entities\n{EMPTY_MESSAGE}");
    }

    let mut columns = vec![
        ("Entity", ENTITY_WIDTH),
        ("Category", CATEGORY_WIDTH),
        ("Matches", MATCHES_WIDTH),
        ("Confidence", CONFIDENCE_WIDTH),
    ];
    if options.wide {
        columns.push(("Sources", SOURCES_WIDTH));
    }

    let header = columns
        .iter()
        .map(|&(name, width)| format!("{name:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ");
    let separator = columns
        .iter()
        .map(|(_, width)| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut lines = vec!["Canonical Entities".to_string(), separator.clone(), header];
    lines.extend(entities.iter().map(|entity| render_row(entity, options)));
    lines.push(separator);
    lines.push(format!("Total canonical entities: {}", entities.len()));
    if !options.wide {
        lines.push("Tip: request the wide layout to include source columns.".to_string());
    }
    lines.join("\n")
}

fn render_row(entity: &CanonicalEntity, options: RenderOptions) -> String {
    let mut cells = vec![
        fit(&entity.text, ENTITY_WIDTH),
        fit(&title_case(entity.category.as_str()), CATEGORY_WIDTH),
        format!("{:>width$}", entity.occurrence_count, width = MATCHES_WIDTH),
        format!("{:>width$.2}", entity.top_confidence, width = CONFIDENCE_WIDTH),
    ];
    if options.wide {
        let sources = entity
            .sources
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        cells.push(fit(&sources, SOURCES_WIDTH));
    }
    cells.join(" | ")
}

pub fn render_scorecard(scorecard: &RubricScorecard) -> String {
    let mut lines = vec![
        format!("Scorecard (rubric {})", scorecard.rubric_version),
        format!("Overall score: {:.2} / 100", scorecard.overall_score),
    ];
    for detail in &scorecard.breakdown {
        lines.push(format!(
            "  {:<width$} {:>6.2}  weight {:.2}  {}",
            title_case(detail.category.as_str()),
            detail.sub_score,
            detail.effective_weight,
            detail.rationale,
            width = CATEGORY_WIDTH
        ));
        if !detail.missing.is_empty() {
            lines.push(format!("    missing: {}", detail.missing.join(", ")));
        }
    }
    lines.push(format!("Recommendation: {}", scorecard.recommendation));
    lines.join("\n")
}

/// Pads to `width` characters, or truncates with `...` to exactly `width`.
fn fit(value: &str, width: usize) -> String {
    let text = value.trim();
    let length = text.chars().count();
    if length <= width {
        return format!("{text}{}", " ".repeat(width - length));
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::models::{DocumentRole, EntityCategory, SourceRef};
    use std::collections::BTreeMap;

    fn entity(text: &str) -> CanonicalEntity {
        CanonicalEntity {
            text: text.to_string(),
            category: EntityCategory::Skill,
            top_confidence: 0.9,
            occurrence_count: 2,
            occurrences: vec![],
            contexts: vec![],
            sources: vec![
                SourceRef {
                    role: DocumentRole::Resume,
                    display: "cv.pdf".to_string(),
                },
                SourceRef {
                    role: DocumentRole::JobDescription,
                    display: "jd.txt".to_string(),
                },
            ],
            aliases: vec![],
        }
    }

    #[test]
    fn test_empty_state_message() {
        assert_eq!(
            render_entities(&[], RenderOptions::default()),
            "Canonical Entities\nNo canonical entities were extracted during this run."
        );
    }

    #[test]
    fn test_row_layout() {
        let rendered = render_entities(&[entity("pytorch")], RenderOptions::default());
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "Canonical Entities");
        assert!(lines[2].starts_with("Entity"));
        assert_eq!(
            lines[3],
            format!(
                "{:<32} | {:<12} | {:>7} | {:>10}",
                "pytorch", "Skill", 2, "0.90"
            )
        );
        assert_eq!(lines[1].len(), lines[3].len());
        assert_eq!(lines[5], "Total canonical entities: 1");
        assert!(lines[6].starts_with("Tip:"));
    }

    #[test]
    fn test_wide_layout_lists_sources() {
        let rendered = render_entities(&[entity("pytorch")], RenderOptions { wide: true });
        assert!(rendered.contains("resume:cv.pdf, job_description:jd.txt"));
        assert!(!rendered.contains("Tip:"));
    }

    #[test]
    fn test_long_values_are_truncated() {
        assert_eq!(fit("abcdefghij", 8), "abcde...");
        assert_eq!(fit(" ab ", 4), "ab  ");
        assert_eq!(fit("ingeniería de datos", 10).chars().count(), 10);
    }

    #[test]
    fn test_scorecard_summary() {
        let scorecard = RubricScorecard {
            rubric_version: "2024.1".to_string(),
            sub_scores: BTreeMap::from([(EntityCategory::Skill, 50.0)]),
            overall_score: 50.0,
            breakdown: vec![crate::scoring::SubScoreDetail {
                category: EntityCategory::Skill,
                weight: 1.0,
                effective_weight: 1.0,
                sub_score: 50.0,
                matched: vec!["python".to_string()],
                missing: vec!["pytorch".to_string()],
                rationale: "1 of 2 required skill terms found in the resume.".to_string(),
            }],
            recommendation: "Low fit (50/100). Significant skill gaps: pytorch.".to_string(),
        };

        let rendered = render_scorecard(&scorecard);
        assert!(rendered.starts_with("Scorecard (rubric 2024.1)\nOverall score: 50.00 / 100"));
        assert!(rendered.contains("Skill") && rendered.contains(" 50.00  weight 1.00"));
        assert!(rendered.contains("missing: pytorch"));
        assert!(rendered.ends_with("Recommendation: Low fit (50/100). Significant skill gaps: pytorch."));
    }
}
