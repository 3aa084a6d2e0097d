//! Rubric configuration — category weights and named thresholds.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::entities::models::EntityCategory;
use crate::errors::RubricConfigError;

/// Rubric shipped with the service.
pub const DEFAULT_RUBRIC_YAML: &str = include_str!("../../config/rubric.yaml");

/// Allowed distance of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-4;

pub const COMPANY_TARGET_COUNT: &str = "company_target_count";
pub const EDUCATION_TARGET_COUNT: &str = "education_target_count";
pub const MIN_CONFIDENCE: &str = "min_confidence";

fn default_version() -> String {
    "unversioned".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Categories missing from the map carry no weight and are not scored.
    pub weights: BTreeMap<EntityCategory, f64>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
}

impl RubricConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Rubric is not valid YAML for the expected schema")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read rubric file {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("Rubric file {} is invalid", path.display()))
    }

    /// Loads `path` when given, else the embedded default, and validates it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let rubric = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::from_yaml_str(DEFAULT_RUBRIC_YAML)
                .context("Embedded default rubric is invalid")?,
        };
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn weight(&self, category: EntityCategory) -> f64 {
        self.weights.get(&category).copied().unwrap_or(0.0)
    }

    /// Categories that contribute to the overall score, in category order.
    pub fn scored_categories(&self) -> impl Iterator<Item = (EntityCategory, f64)> + '_ {
        self.weights
            .iter()
            .filter(|(_, weight)| **weight > 0.0)
            .map(|(category, weight)| (*category, *weight))
    }

    pub fn threshold(&self, name: &str) -> Option<f64> {
        self.thresholds.get(name).copied()
    }

    /// Threshold a comparator cannot run without.
    pub fn required_threshold(
        &self,
        category: EntityCategory,
        name: &'static str,
    ) -> Result<f64, RubricConfigError> {
        self.threshold(name)
            .ok_or(RubricConfigError::MissingThreshold {
                category,
                threshold: name,
            })
    }

    /// Checks weights and every threshold a weighted category depends on.
    pub fn validate(&self) -> Result<(), RubricConfigError> {
        for (category, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(RubricConfigError::InvalidWeight {
                    category: *category,
                    weight: *weight,
                });
            }
        }

        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RubricConfigError::WeightSum { sum });
        }

        for (name, value) in &self.thresholds {
            if !value.is_finite() {
                return Err(RubricConfigError::InvalidThreshold {
                    name: name.clone(),
                    value: *value,
                });
            }
        }

        if let Some(value) = self.threshold(MIN_CONFIDENCE) {
            if !(0.0..=1.0).contains(&value) {
                return Err(RubricConfigError::InvalidThreshold {
                    name: MIN_CONFIDENCE.to_string(),
                    value,
                });
            }
        }

        for (category, _) in self.scored_categories() {
            for name in required_thresholds(category) {
                let value = self.required_threshold(category, name)?;
                if value <= 0.0 {
                    return Err(RubricConfigError::InvalidThreshold {
                        name: name.to_string(),
                        value,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Thresholds each category's comparator reads.
pub fn required_thresholds(category: EntityCategory) -> &'static [&'static str] {
    match category {
        EntityCategory::Company => &[COMPANY_TARGET_COUNT],
        EntityCategory::Education => &[EDUCATION_TARGET_COUNT],
        EntityCategory::Skill | EntityCategory::Language | EntityCategory::Other => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rubric(weights: &[(EntityCategory, f64)]) -> RubricConfig {
        RubricConfig {
            version: "test".to_string(),
            weights: weights.iter().copied().collect(),
            thresholds: BTreeMap::from([
                (COMPANY_TARGET_COUNT.to_string(), 3.0),
                (EDUCATION_TARGET_COUNT.to_string(), 1.0),
            ]),
        }
    }

    #[test]
    fn test_default_rubric_is_valid() {
        let rubric = RubricConfig::load(None).unwrap();
        assert_eq!(rubric.version, "2024.1");
        assert_eq!(rubric.weight(EntityCategory::Skill), 0.5);
        assert_eq!(rubric.threshold(COMPANY_TARGET_COUNT), Some(3.0));
    }

    #[test]
    fn test_weight_sum_off_by_a_tenth_is_rejected() {
        for skill in [0.4, 0.6] {
            let err = rubric(&[(EntityCategory::Skill, skill), (EntityCategory::Company, 0.5)])
                .validate()
                .unwrap_err();
            assert!(matches!(err, RubricConfigError::WeightSum { .. }));
        }
    }

    #[test]
    fn test_weight_sum_within_tolerance_is_accepted() {
        for delta in [1e-6, 0.0, -1e-6] {
            rubric(&[
                (EntityCategory::Skill, 0.7 + delta),
                (EntityCategory::Company, 0.3),
            ])
            .validate()
            .unwrap();
        }
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let err = rubric(&[(EntityCategory::Skill, 1.2), (EntityCategory::Other, -0.2)])
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            RubricConfigError::InvalidWeight {
                category: EntityCategory::Other,
                weight: -0.2
            }
        );
    }

    #[test]
    fn test_missing_threshold_for_weighted_category() {
        let mut config = rubric(&[(EntityCategory::Education, 1.0)]);
        config.thresholds.clear();
        assert_eq!(
            config.validate().unwrap_err(),
            RubricConfigError::MissingThreshold {
                category: EntityCategory::Education,
                threshold: EDUCATION_TARGET_COUNT,
            }
        );
    }

    #[test]
    fn test_threshold_not_needed_for_zero_weight_category() {
        let mut config = rubric(&[(EntityCategory::Skill, 1.0), (EntityCategory::Company, 0.0)]);
        config.thresholds.clear();
        config.validate().unwrap();
        assert_eq!(config.scored_categories().count(), 1);
    }

    #[test]
    fn test_non_positive_target_count_is_rejected() {
        let mut config = rubric(&[(EntityCategory::Company, 1.0)]);
        config
            .thresholds
            .insert(COMPANY_TARGET_COUNT.to_string(), 0.0);
        assert!(matches!(
            config.validate().unwrap_err(),
            RubricConfigError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_yaml_accepts_plural_keys_and_defaults_version() {
        let config = RubricConfig::from_yaml_str("weights:\n  skills: 1.0\n").unwrap();
        assert_eq!(config.version, "unversioned");
        assert_eq!(config.weight(EntityCategory::Skill), 1.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "version: custom\nweights:\n  skill: 0.8\n  language: 0.2\n"
        )
        .unwrap();

        let config = RubricConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.version, "custom");
        assert_eq!(config.weight(EntityCategory::Company), 0.0);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "weights:\n  skill: 0.9\n").unwrap();
        let err = RubricConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("sum to"));
    }
}
