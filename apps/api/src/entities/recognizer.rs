//! Entity recognizer — pluggable NER seam producing raw spans.
//!
//! Default: `GazetteerRecognizer`, a dictionary tagger built from the alias
//! map's category tables (deterministic, no model download, fully testable).
//!
//! `AppState` holds an `Arc<dyn EntityRecognizer>`, chosen at startup.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::entities::canonicalizer::{fold, language_candidates};
use crate::entities::models::{EntityCategory, RawSpan};
use crate::errors::AppError;
use crate::rules::alias_map::{AliasMap, AliasRules};

/// Confidence for a match on a canonical term.
pub const CANONICAL_CONFIDENCE: f64 = 0.95;
/// Confidence for a match on an alias or locale-specific form.
pub const ALIAS_CONFIDENCE: f64 = 0.85;

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap NER backends without touching the pipeline or handlers.
///
/// Offsets in the returned spans are character offsets into `text`.
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    async fn recognize(&self, text: &str, language: Option<&str>) -> Result<Vec<RawSpan>, AppError>;

    /// Backend label reported with every screening result.
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// GazetteerRecognizer
// ────────────────────────────────────────────────────────────────────────────

struct CategoryMatcher {
    category: EntityCategory,
    pattern: Regex,
    /// One start-anchored pattern per term, longest first; consulted when the
    /// longest alternative at a position fails the boundary check.
    anchored: Vec<Regex>,
    /// Folded term → confidence.
    confidences: BTreeMap<String, f64>,
}

/// Case-insensitive dictionary tagger.
///
/// Algorithm:
/// 1. One alternation per category, longest term first, so `python3` wins over `python`.
/// 2. A match counts only when neither neighbour is a word character. If the
///    longest form fails that check, shorter forms at the same start are tried
///    (`React.jsx` still yields `React`).
/// 3. Locale override forms are tagged under the category that owns their
///    canonical term, for documents in that locale.
pub struct GazetteerRecognizer {
    matchers: Vec<CategoryMatcher>,
    locale_matchers: BTreeMap<String, Vec<CategoryMatcher>>,
}

impl GazetteerRecognizer {
    pub fn new(alias_map: &AliasMap) -> Result<Self> {
        let mut matchers = Vec::new();
        for (category, rules) in &alias_map.categories {
            let confidences = rule_confidences(rules);
            if let Some(matcher) = CategoryMatcher::build(*category, confidences)? {
                matchers.push(matcher);
            }
        }

        let mut locale_matchers = BTreeMap::new();
        for (locale, overrides) in &alias_map.locale_overrides {
            let mut by_category: BTreeMap<EntityCategory, BTreeMap<String, f64>> = BTreeMap::new();
            for (alias, canonical) in overrides {
                let canonical = fold(canonical);
                for (category, rules) in &alias_map.categories {
                    if rules.keys().any(|term| fold(term) == canonical) {
                        by_category
                            .entry(*category)
                            .or_default()
                            .insert(fold(alias), ALIAS_CONFIDENCE);
                    }
                }
            }

            let mut built = Vec::new();
            for (category, confidences) in by_category {
                if let Some(matcher) = CategoryMatcher::build(category, confidences)? {
                    built.push(matcher);
                }
            }
            if !built.is_empty() {
                locale_matchers.insert(locale.trim().to_lowercase().replace('_', "-"), built);
            }
        }

        debug!(
            "Gazetteer built: {} category matchers, {} locale matcher sets",
            matchers.len(),
            locale_matchers.len()
        );
        Ok(Self {
            matchers,
            locale_matchers,
        })
    }

    /// Synchronous core of `recognize`.
    pub fn tag(&self, text: &str, language: Option<&str>) -> Vec<RawSpan> {
        let locale_sets = language
            .map(language_candidates)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|code| self.locale_matchers.get(&code));

        let mut spans: Vec<RawSpan> = std::iter::once(&self.matchers)
            .chain(locale_sets)
            .flatten()
            .flat_map(|matcher| matcher.find(text))
            .collect();

        spans.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.end.cmp(&a.end))
                .then_with(|| a.label.cmp(&b.label))
        });
        spans.dedup_by(|b, a| a.start == b.start && a.end == b.end && a.label == b.label);
        spans
    }
}

#[async_trait]
impl EntityRecognizer for GazetteerRecognizer {
    async fn recognize(&self, text: &str, language: Option<&str>) -> Result<Vec<RawSpan>, AppError> {
        Ok(self.tag(text, language))
    }

    fn backend(&self) -> &'static str {
        "gazetteer"
    }
}

impl CategoryMatcher {
    fn build(category: EntityCategory, confidences: BTreeMap<String, f64>) -> Result<Option<Self>> {
        if confidences.is_empty() {
            return Ok(None);
        }

        let mut terms: Vec<&String> = confidences.keys().collect();
        terms.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
        let patterns: Vec<String> = terms
            .iter()
            .map(|term| regex::escape(term).replace(' ', r"\s+"))
            .collect();

        let compile = |source: String| {
            RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Failed to compile gazetteer pattern for {category}"))
        };
        let pattern = compile(format!("(?:{})", patterns.join("|")))?;
        let anchored = patterns
            .iter()
            .map(|p| compile(format!("^(?:{p})")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self {
            category,
            pattern,
            anchored,
            confidences,
        }))
    }

    fn find(&self, text: &str) -> Vec<RawSpan> {
        let label = self.category.as_str().to_uppercase();
        let mut spans = Vec::new();
        let mut chars_before = 0usize;
        let mut counted_to = 0usize;
        let mut position = 0usize;

        while let Some(found) = self.pattern.find_at(text, position) {
            let start = found.start();
            let Some((end, confidence)) = self.accept_at(text, start, found.end()) else {
                // Skip one character; a valid match may still begin inside the rejected one.
                position = start + text[start..].chars().next().map_or(1, char::len_utf8);
                continue;
            };

            chars_before += text[counted_to..start].chars().count();
            counted_to = start;
            let matched = &text[start..end];
            let length = matched.chars().count();

            spans.push(RawSpan {
                start: chars_before as i64,
                end: (chars_before + length) as i64,
                text: matched.to_string(),
                label: label.clone(),
                confidence,
            });
            position = end;
        }
        spans
    }

    /// End and confidence of the longest known form starting at `start` that
    /// sits on word boundaries. `end` is where the combined pattern stopped.
    fn accept_at(&self, text: &str, start: usize, end: usize) -> Option<(usize, f64)> {
        if !is_boundary_before(text, start) {
            return None;
        }
        let known = |to: usize| {
            self.confidences
                .get(&fold(&text[start..to]))
                .map(|confidence| (to, *confidence))
        };
        if is_boundary_after(text, end) {
            if let Some(accepted) = known(end) {
                return Some(accepted);
            }
        }

        let rest = &text[start..];
        self.anchored
            .iter()
            .filter_map(|p| p.find(rest))
            .map(|m| start + m.end())
            .filter(|&to| to < end && is_boundary_after(text, to))
            .filter_map(known)
            .max_by_key(|(to, _)| *to)
    }
}

/// Canonical terms and their aliases, folded, with the confidence of each form.
fn rule_confidences(rules: &AliasRules) -> BTreeMap<String, f64> {
    let mut confidences = BTreeMap::new();
    for canonical in rules.keys() {
        let term = fold(canonical);
        if !term.is_empty() {
            confidences.insert(term, CANONICAL_CONFIDENCE);
        }
    }
    for aliases in rules.values() {
        for alias in aliases {
            let term = fold(alias);
            if !term.is_empty() {
                confidences.entry(term).or_insert(ALIAS_CONFIDENCE);
            }
        }
    }
    confidences
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_boundary_before(text: &str, byte: usize) -> bool {
    text[..byte].chars().next_back().map_or(true, |c| !is_word_char(c))
}

fn is_boundary_after(text: &str, byte: usize) -> bool {
    text[byte..].chars().next().map_or(true, |c| !is_word_char(c))
}
