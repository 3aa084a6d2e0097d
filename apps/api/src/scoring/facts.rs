use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entities::canonicalizer::{fold, Canonicalizer};
use crate::entities::models::{DocumentRole, EntityCategory, ExtractedEntityCollection};

/// Hand-written requirements carry no locale, so locale overrides never apply.
const UNDETERMINED_LANGUAGE: &str = "und";

/// Requirements the resume is compared against, per category.
///
/// Terms are canonical labels, so they compare directly with the
/// canonical entities of a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptionFacts {
    pub requirements: BTreeMap<EntityCategory, BTreeSet<String>>,
}

impl JobDescriptionFacts {
    /// Every canonical entity mentioned in the job description is a requirement.
    pub fn from_collection(collection: &ExtractedEntityCollection) -> Self {
        let requirements = EntityCategory::ALL
            .into_iter()
            .map(|category| {
                (
                    category,
                    collection.terms_from(category, DocumentRole::JobDescription),
                )
            })
            .filter(|(_, terms)| !terms.is_empty())
            .collect();
        Self { requirements }
    }

    /// Adds a requirement by hand. The term is only folded (trimmed, whitespace
    /// collapsed, lowercased); aliases are not applied, so "torch" stays
    /// "torch". Use `with_resolved_requirement` to go through the alias map.
    pub fn with_requirement(mut self, category: EntityCategory, term: &str) -> Self {
        let term = fold(term);
        if !term.is_empty() {
            self.requirements.entry(category).or_default().insert(term);
        }
        self
    }

    /// Adds a requirement under the canonical label the alias map gives it.
    pub fn with_resolved_requirement(
        self,
        canonicalizer: &Canonicalizer,
        category: EntityCategory,
        term: &str,
    ) -> Self {
        let label = canonicalizer.canonical_label(category, term, UNDETERMINED_LANGUAGE);
        self.with_requirement(category, &label)
    }

    pub fn required(&self, category: EntityCategory) -> BTreeSet<String> {
        self.requirements.get(&category).cloned().unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.requirements.values().map(BTreeSet::len).sum()
    }
}
