// ==============================================================================
// config.rs - Prioritisation Configuration
// ==============================================================================
// Description: Thresholds, column naming, row policies and score weights
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Population allele-frequency cutoffs are study-specific, so every threshold
// here can be set from a JSON file and overridden on the command line.
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What to do with a data row that cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Fail the whole load
    Abort,
    /// Log a warning with the line number and continue
    Skip,
}

/// External population database columns (e.g. gnomAD) in the annotation table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Columns whose name starts with this prefix carry allele frequencies
    pub column_prefix: String,

    /// Frequency columns containing this tag (case-insensitive) form the
    /// ancestry-specific group; the rest form the global group
    pub ancestry_tag: String,

    /// Global group is "common" at or above this frequency
    pub max_global_af: f64,

    /// Ancestry group is "common" at or above this frequency
    pub max_ancestry_af: f64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            column_prefix: "AF".to_string(),
            ancestry_tag: "afr".to_string(),
            max_global_af: 0.01,
            max_ancestry_af: 0.01,
        }
    }
}

/// Cohort reference table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    /// Prefix of the cohort frequency columns (`<prefix>_AF`, `_AC`, `_AN`)
    pub column_prefix: String,

    /// Cohort is "common" at or above this frequency
    pub max_cohort_af: f64,

    /// Frequencies above this raise the `high_cohort_af` reporting flag
    pub high_af_flag: f64,

    pub malformed_rows: RowPolicy,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            column_prefix: "zim".to_string(),
            max_cohort_af: 0.05,
            high_af_flag: 0.01,
            malformed_rows: RowPolicy::Abort,
        }
    }
}

impl CohortConfig {
    pub fn frequency_column(&self) -> String {
        format!("{}_AF", self.column_prefix)
    }

    pub fn allele_count_column(&self) -> String {
        format!("{}_AC", self.column_prefix)
    }

    pub fn allele_number_column(&self) -> String {
        format!("{}_AN", self.column_prefix)
    }
}

/// Multi-database annotation table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Gene model suffix used by the annotator (refGene, ensGene, knownGene)
    pub gene_model: String,

    /// Clinical significance column (ClinVar)
    pub clinical_significance_column: String,

    /// Placeholder the annotator writes for "not observed"
    pub missing_value: String,

    pub malformed_rows: RowPolicy,

    /// Skipped rows beyond this count abort the load
    pub max_skipped_rows: usize,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            gene_model: "refGene".to_string(),
            clinical_significance_column: "CLNSIG".to_string(),
            missing_value: ".".to_string(),
            malformed_rows: RowPolicy::Skip,
            max_skipped_rows: 1000,
        }
    }
}

impl AnnotationConfig {
    pub fn function_column(&self) -> String {
        format!("Func.{}", self.gene_model)
    }

    pub fn exonic_function_column(&self) -> String {
        format!("ExonicFunc.{}", self.gene_model)
    }

    pub fn gene_column(&self) -> String {
        format!("Gene.{}", self.gene_model)
    }
}

/// Weights of the within-tier tie-break score. Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub severity: f64,
    pub reference_rarity: f64,
    pub cohort_rarity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            severity: 0.50,
            reference_rarity: 0.25,
            cohort_rarity: 0.25,
        }
    }
}

impl ScoreWeights {
    fn sum(&self) -> f64 {
        self.severity + self.reference_rarity + self.cohort_rarity
    }

    /// All weights finite, non-negative and summing to ~1.0
    pub fn is_valid(&self) -> bool {
        let parts = [self.severity, self.reference_rarity, self.cohort_rarity];
        parts.iter().all(|w| w.is_finite() && *w >= 0.0) && (self.sum() - 1.0).abs() < 1e-6
    }

    /// Rescale so the weights sum to 1.0
    pub fn normalise(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.severity /= sum;
            self.reference_rarity /= sum;
            self.cohort_rarity /= sum;
        }
    }
}

/// Complete configuration of one prioritisation run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrioritisationConfig {
    pub reference: ReferenceConfig,
    pub cohort: CohortConfig,
    pub annotation: AnnotationConfig,
    pub weights: ScoreWeights,

    /// Also drop synonymous and non-coding variants unless tagged pathogenic
    pub damaging_only: bool,
}

impl PrioritisationConfig {
    /// Load configuration from a JSON file; omitted keys keep their defaults
    ///
    /// # Example
    /// ```no_run
    /// use zim_prioritisation::config::PrioritisationConfig;
    ///
    /// let config = PrioritisationConfig::from_json_file("thresholds.json")?;
    /// config.validate()?;
    /// # Ok::<(), zim_prioritisation::config::ConfigError>(())
    /// ```
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("reference.max_global_af", self.reference.max_global_af),
            ("reference.max_ancestry_af", self.reference.max_ancestry_af),
            ("cohort.max_cohort_af", self.cohort.max_cohort_af),
            ("cohort.high_af_flag", self.cohort.high_af_flag),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if !self.weights.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "score weights must be non-negative and sum to 1.0, got {:?}",
                self.weights
            )));
        }

        if self.reference.column_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "reference.column_prefix must not be empty".to_string(),
            ));
        }
        if self.cohort.column_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "cohort.column_prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = PrioritisationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reference.max_global_af, 0.01);
        assert_eq!(config.reference.max_ancestry_af, 0.01);
        assert_eq!(config.cohort.max_cohort_af, 0.05);
        assert_eq!(config.cohort.malformed_rows, RowPolicy::Abort);
        assert_eq!(config.annotation.malformed_rows, RowPolicy::Skip);
    }

    #[test]
    fn test_derived_column_names() {
        let config = PrioritisationConfig::default();
        assert_eq!(config.cohort.frequency_column(), "zim_AF");
        assert_eq!(config.cohort.allele_count_column(), "zim_AC");
        assert_eq!(config.cohort.allele_number_column(), "zim_AN");
        assert_eq!(config.annotation.function_column(), "Func.refGene");
        assert_eq!(config.annotation.exonic_function_column(), "ExonicFunc.refGene");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"cohort": {{"max_cohort_af": 0.1}}, "annotation": {{"malformed_rows": "abort"}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = PrioritisationConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.cohort.max_cohort_af, 0.1);
        assert_eq!(config.cohort.column_prefix, "zim");
        assert_eq!(config.annotation.malformed_rows, RowPolicy::Abort);
        assert_eq!(config.reference.max_global_af, 0.01);
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        file.flush().unwrap();

        match PrioritisationConfig::from_json_file(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = PrioritisationConfig::default();
        config.cohort.max_cohort_af = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.cohort.max_cohort_af = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_weights_normalise() {
        let mut weights = ScoreWeights {
            severity: 2.0,
            reference_rarity: 1.0,
            cohort_rarity: 1.0,
        };
        assert!(!weights.is_valid());
        weights.normalise();
        assert!(weights.is_valid());
        assert!((weights.severity - 0.5).abs() < 1e-12);
    }
}
