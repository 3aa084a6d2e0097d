//! Canonicalizer — groups occurrences into canonical entities.
//!
//! Algorithm:
//! 1. Fold each occurrence (trim, collapse inner whitespace, casefold).
//! 2. Resolve the folded text: locale override, then category table, then
//!    global table, else the folded text itself.
//! 3. Group by `(category, canonical term)` in one pass over the whole merged
//!    sequence, so a term named in both documents becomes one entity with two sources.
//! 4. Sort groups by (category, text, first-seen).
//!
//! Every step is recorded in the normalization log. The log carries entity
//! labels and document display names only, never document text.

use std::collections::BTreeMap;

use tracing::debug;

use crate::entities::models::{
    CanonicalEntity, EntityCategory, EntityOccurrence, ExtractedEntityCollection, SourceRef,
};
use crate::errors::NormalizationConflictError;
use crate::rules::alias_map::{AliasMap, AliasRules};

// ────────────────────────────────────────────────────────────────────────────
// Alias index
// ────────────────────────────────────────────────────────────────────────────

/// Folded lookup tables built from an `AliasMap`.
///
/// Building the index is where contradictory alias rules are detected.
#[derive(Debug, Clone, Default)]
pub struct AliasIndex {
    global: BTreeMap<String, String>,
    by_category: BTreeMap<EntityCategory, BTreeMap<String, String>>,
    locales: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Resolution<'a> {
    Locale { locale: &'a str, canonical: &'a str },
    Alias(&'a str),
    Unmapped,
}

impl AliasIndex {
    pub fn build(map: &AliasMap) -> Result<Self, NormalizationConflictError> {
        let mut global = BTreeMap::new();
        index_rules(&mut global, &map.aliases, "global")?;

        let mut by_category = BTreeMap::new();
        for (category, rules) in &map.categories {
            let scope = format!("category {category}");
            let mut table = BTreeMap::new();
            index_rules(&mut table, rules, &scope)?;

            // The effective table for a category is its own rules plus the
            // global ones; both must agree on every alias.
            for (alias, canonical) in &table {
                if let Some(global_canonical) = global.get(alias) {
                    if global_canonical != canonical {
                        return Err(NormalizationConflictError {
                            alias: alias.clone(),
                            scope,
                            first: global_canonical.clone(),
                            second: canonical.clone(),
                        });
                    }
                }
            }
            by_category.insert(*category, table);
        }

        let mut locales: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (locale, overrides) in &map.locale_overrides {
            let code = normalize_locale(locale);
            let scope = format!("locale {code}");
            let table = locales.entry(code).or_default();
            for (alias, canonical) in overrides {
                let (alias, canonical) = (fold(alias), fold(canonical));
                if alias.is_empty() || canonical.is_empty() {
                    continue;
                }
                insert_rule(table, alias, canonical, &scope)?;
            }
        }

        Ok(Self {
            global,
            by_category,
            locales,
        })
    }

    fn resolve(&self, category: EntityCategory, folded: &str, language: &str) -> Resolution<'_> {
        for candidate in language_candidates(language) {
            if let Some((locale, table)) = self.locales.get_key_value(candidate.as_str()) {
                if let Some(canonical) = table.get(folded) {
                    return Resolution::Locale {
                        locale: locale.as_str(),
                        canonical: canonical.as_str(),
                    };
                }
            }
        }

        self.by_category
            .get(&category)
            .and_then(|table| table.get(folded))
            .or_else(|| self.global.get(folded))
            .map(|canonical| Resolution::Alias(canonical.as_str()))
            .unwrap_or(Resolution::Unmapped)
    }
}

fn index_rules(
    table: &mut BTreeMap<String, String>,
    rules: &AliasRules,
    scope: &str,
) -> Result<(), NormalizationConflictError> {
    for (canonical, aliases) in rules {
        let canonical = fold(canonical);
        if canonical.is_empty() {
            continue;
        }
        // A canonical term always resolves to itself.
        insert_rule(table, canonical.clone(), canonical.clone(), scope)?;
        for alias in aliases {
            let alias = fold(alias);
            if alias.is_empty() {
                continue;
            }
            insert_rule(table, alias, canonical.clone(), scope)?;
        }
    }
    Ok(())
}

fn insert_rule(
    table: &mut BTreeMap<String, String>,
    alias: String,
    canonical: String,
    scope: &str,
) -> Result<(), NormalizationConflictError> {
    match table.get(&alias) {
        Some(existing) if *existing != canonical => Err(NormalizationConflictError {
            alias,
            scope: scope.to_string(),
            first: existing.clone(),
            second: canonical,
        }),
        Some(_) => Ok(()),
        None => {
            table.insert(alias, canonical);
            Ok(())
        }
    }
}

/// Trims, collapses inner whitespace and casefolds.
pub fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub(crate) fn normalize_locale(code: &str) -> String {
    code.trim().to_lowercase().replace('_', "-")
}

/// `es-mx` → [`es-mx`, `es`]; undetermined languages have no candidates.
pub(crate) fn language_candidates(language: &str) -> Vec<String> {
    let language = normalize_locale(language);
    if language.is_empty() || language == "und" {
        return vec![];
    }
    match language.split_once('-') {
        Some((base, _)) if !base.is_empty() => vec![language.clone(), base.to_string()],
        _ => vec![language],
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Canonicalizer
// ────────────────────────────────────────────────────────────────────────────

pub struct Canonicalizer {
    index: AliasIndex,
}

impl Canonicalizer {
    /// Fails if the alias map contains contradictory rules.
    pub fn new(alias_map: &AliasMap) -> Result<Self, NormalizationConflictError> {
        Ok(Self {
            index: AliasIndex::build(alias_map)?,
        })
    }

    /// Groups `occurrences` into canonical entities.
    ///
    /// Input is processed in (document role, ingestion index) order, so the
    /// result does not depend on how the caller concatenated batches.
    pub fn normalize(&self, mut occurrences: Vec<EntityOccurrence>) -> ExtractedEntityCollection {
        occurrences.sort_by_key(|o| (o.document_role, o.ingestion_index));

        let total = occurrences.len();
        let mut log = Vec::new();
        let mut groups: Vec<GroupBuilder> = Vec::new();
        let mut group_slots: BTreeMap<(EntityCategory, String), usize> = BTreeMap::new();
        let mut resolved = Vec::with_capacity(total);

        for occurrence in occurrences {
            let canonical = self.canonical_term(&occurrence, &mut log);
            let category = occurrence.category;

            let slot = *group_slots
                .entry((category, canonical.clone()))
                .or_insert_with(|| {
                    groups.push(GroupBuilder::new(category, canonical.clone()));
                    groups.len() - 1
                });

            let occurrence = occurrence.with_canonical_text(canonical);
            groups[slot].add(&occurrence);
            resolved.push(occurrence);
        }

        let mut canonical_entities: Vec<CanonicalEntity> =
            groups.into_iter().map(GroupBuilder::build).collect();
        canonical_entities.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.text.cmp(&b.text))
                .then_with(|| a.first_seen().cmp(&b.first_seen()))
        });

        log.extend(summarize(&resolved, &canonical_entities));
        debug!(
            "Normalized {} occurrences into {} canonical entities",
            total,
            canonical_entities.len()
        );

        ExtractedEntityCollection {
            occurrences: resolved,
            canonical_entities,
            normalization_log: log,
        }
    }

    /// Canonical label a bare term resolves to, without logging.
    pub fn canonical_label(&self, category: EntityCategory, text: &str, language: &str) -> String {
        let folded = fold(text);
        match self.index.resolve(category, &folded, language) {
            Resolution::Locale { canonical, .. } | Resolution::Alias(canonical) => {
                canonical.to_string()
            }
            Resolution::Unmapped => folded,
        }
    }

    fn canonical_term(&self, occurrence: &EntityOccurrence, log: &mut Vec<String>) -> String {
        let category = occurrence.category;
        let folded = fold(&occurrence.raw_text);
        if folded != occurrence.raw_text {
            log.push(format!(
                "Folded '{}' -> '{}' [{}]",
                occurrence.raw_text, folded, category
            ));
        }

        match self
            .index
            .resolve(category, &folded, &occurrence.source_language)
        {
            Resolution::Locale { locale, canonical } => {
                if canonical != folded {
                    log.push(format!(
                        "Locale override ({locale}) '{folded}' -> '{canonical}' [{category}]"
                    ));
                }
                canonical.to_string()
            }
            Resolution::Alias(canonical) => {
                if canonical != folded {
                    log.push(format!("Alias '{folded}' -> '{canonical}' [{category}]"));
                }
                canonical.to_string()
            }
            Resolution::Unmapped => folded,
        }
    }
}

/// Convenience wrapper: index `alias_map` and normalize in one call.
pub fn normalize(
    occurrences: Vec<EntityOccurrence>,
    alias_map: &AliasMap,
) -> Result<ExtractedEntityCollection, NormalizationConflictError> {
    Ok(Canonicalizer::new(alias_map)?.normalize(occurrences))
}

struct GroupBuilder {
    category: EntityCategory,
    text: String,
    top_confidence: f64,
    occurrences: Vec<EntityOccurrence>,
    contexts: Vec<String>,
    sources: Vec<SourceRef>,
    aliases: Vec<String>,
}

impl GroupBuilder {
    fn new(category: EntityCategory, text: String) -> Self {
        Self {
            category,
            text,
            top_confidence: 0.0,
            occurrences: Vec::new(),
            contexts: Vec::new(),
            sources: Vec::new(),
            aliases: Vec::new(),
        }
    }

    fn add(&mut self, occurrence: &EntityOccurrence) {
        if self.occurrences.is_empty() || occurrence.confidence > self.top_confidence {
            self.top_confidence = occurrence.confidence;
        }
        self.contexts.push(occurrence.context_snippet.clone());

        let source = occurrence.source();
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }

        let surface = occurrence.raw_text.trim();
        if !self.aliases.iter().any(|a| a == surface) {
            self.aliases.push(surface.to_string());
        }

        self.occurrences.push(occurrence.clone());
    }

    fn build(self) -> CanonicalEntity {
        CanonicalEntity {
            text: self.text,
            category: self.category,
            top_confidence: self.top_confidence,
            occurrence_count: self.occurrences.len(),
            occurrences: self.occurrences,
            contexts: self.contexts,
            sources: self.sources,
            aliases: self.aliases,
        }
    }
}

/// Per-category and per-document totals, then the overall line.
fn summarize(occurrences: &[EntityOccurrence], entities: &[CanonicalEntity]) -> Vec<String> {
    let mut lines = Vec::new();

    for category in EntityCategory::ALL {
        let (entity_count, occurrence_count) = entities
            .iter()
            .filter(|e| e.category == category)
            .fold((0, 0), |(n, m), e| (n + 1, m + e.occurrence_count));
        if entity_count > 0 {
            lines.push(format!(
                "[{category}] {entity_count} canonical entities from {occurrence_count} occurrences"
            ));
        }
    }

    let mut per_document: Vec<(SourceRef, usize)> = Vec::new();
    for occurrence in occurrences {
        let source = occurrence.source();
        match per_document.iter_mut().find(|(s, _)| *s == source) {
            Some((_, count)) => *count += 1,
            None => per_document.push((source, 1)),
        }
    }
    for (source, count) in per_document {
        lines.push(format!("[{source}] {count} occurrences"));
    }

    lines.push(format!(
        "{} entities processed into {} canonical entities",
        occurrences.len(),
        entities.len()
    ));
    lines
}
