//! Alias map — canonical terms and their known surface forms.
//!
//! Loaded once at startup from YAML, merged across sources, then shared
//! read-only (`Arc<AliasMap>`) for the lifetime of the process.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::canonicalizer::{fold, normalize_locale};
use crate::entities::models::EntityCategory;
use crate::errors::NormalizationConflictError;

/// Alias document shipped with the service.
pub const DEFAULT_ALIAS_MAP_YAML: &str = include_str!("../../config/alias_map.yaml");

/// Canonical term → list of aliases.
pub type AliasRules = BTreeMap<String, Vec<String>>;

/// Locale code → (alias → canonical term).
pub type LocaleOverrides = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasMap {
    /// Rules that apply to every category.
    #[serde(default)]
    pub aliases: AliasRules,
    /// Rules scoped to a single category.
    #[serde(default)]
    pub categories: BTreeMap<EntityCategory, AliasRules>,
    /// Consulted before any other table for occurrences in that locale.
    #[serde(default)]
    pub locale_overrides: LocaleOverrides,
}

/// Coverage summary used for startup logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasMapDetails {
    pub canonical_count: usize,
    pub alias_count: usize,
    pub locale_codes: Vec<String>,
}

impl AliasMap {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let map: AliasMap = if yaml.trim().is_empty() {
            AliasMap::default()
        } else {
            serde_yaml::from_str(yaml).context("Alias map is not valid YAML for the expected schema")?
        };
        map.check_blank_entries()?;
        Ok(map)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read alias map file {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("Alias map file {} is invalid", path.display()))
    }

    /// Embedded default merged with each extra file, in order.
    pub fn load(extra_paths: &[impl AsRef<Path>]) -> Result<Self> {
        let mut map = Self::from_yaml_str(DEFAULT_ALIAS_MAP_YAML)
            .context("Embedded default alias map is invalid")?;
        for path in extra_paths {
            let path = path.as_ref();
            debug!("Merging alias map from {}", path.display());
            map = map.merge(Self::from_path(path)?).with_context(|| {
                format!(
                    "Alias map file {} contradicts the rules loaded before it",
                    path.display()
                )
            })?;
        }
        Ok(map)
    }

    /// Appends `other`'s rules to this map.
    ///
    /// Global and category rules are kept side by side; contradictions among
    /// them surface when the canonicalizer indexes the merged map. A locale
    /// table holds one target per alias, so a contradicting locale rule is
    /// rejected here rather than overwriting the earlier one.
    pub fn merge(mut self, other: AliasMap) -> Result<Self, NormalizationConflictError> {
        extend_rules(&mut self.aliases, other.aliases);
        for (category, rules) in other.categories {
            extend_rules(self.categories.entry(category).or_default(), rules);
        }
        for (locale, overrides) in other.locale_overrides {
            let code = normalize_locale(&locale);
            let key = self
                .locale_overrides
                .keys()
                .find(|existing| normalize_locale(existing) == code)
                .cloned()
                .unwrap_or(locale);
            let table = self.locale_overrides.entry(key).or_default();

            for (alias, canonical) in overrides {
                let folded_alias = fold(&alias);
                let existing = table
                    .iter()
                    .find(|(known, _)| fold(known) == folded_alias)
                    .map(|(_, target)| fold(target));
                match existing {
                    Some(first) if first != fold(&canonical) => {
                        return Err(NormalizationConflictError {
                            alias: folded_alias,
                            scope: format!("locale {code}"),
                            first,
                            second: fold(&canonical),
                        });
                    }
                    Some(_) => {}
                    None => {
                        table.insert(alias, canonical);
                    }
                }
            }
        }
        Ok(self)
    }

    pub fn details(&self) -> AliasMapDetails {
        let tables = std::iter::once(&self.aliases).chain(self.categories.values());
        let (canonical_count, mut alias_count) = tables.fold((0, 0), |(c, a), rules| {
            (c + rules.len(), a + rules.values().map(Vec::len).sum::<usize>())
        });
        alias_count += self.locale_overrides.values().map(BTreeMap::len).sum::<usize>();

        let mut locale_codes: Vec<String> = self
            .locale_overrides
            .keys()
            .map(|code| code.trim().to_lowercase())
            .collect();
        locale_codes.sort();
        locale_codes.dedup();

        AliasMapDetails {
            canonical_count,
            alias_count,
            locale_codes,
        }
    }

    fn check_blank_entries(&self) -> Result<()> {
        let tables = std::iter::once(("global".to_string(), &self.aliases)).chain(
            self.categories
                .iter()
                .map(|(category, rules)| (format!("category {category}"), rules)),
        );
        for (scope, rules) in tables {
            for (canonical, aliases) in rules {
                if canonical.trim().is_empty() {
                    bail!("Blank canonical term in {scope} aliases");
                }
                if aliases.iter().any(|a| a.trim().is_empty()) {
                    bail!("Blank alias for '{canonical}' in {scope} aliases");
                }
            }
        }
        for (locale, overrides) in &self.locale_overrides {
            if locale.trim().is_empty() {
                bail!("Blank locale code in locale_overrides");
            }
            for (alias, canonical) in overrides {
                if alias.trim().is_empty() || canonical.trim().is_empty() {
                    bail!("Blank alias or canonical term in locale '{locale}' overrides");
                }
            }
        }
        Ok(())
    }
}

fn extend_rules(target: &mut AliasRules, incoming: AliasRules) {
    for (canonical, aliases) in incoming {
        let bucket = target.entry(canonical).or_default();
        for alias in aliases {
            if !bucket.contains(&alias) {
                bucket.push(alias);
            }
        }
    }
}
