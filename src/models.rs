// ==============================================================================
// models.rs - Variant Prioritisation Data Models
// ==============================================================================
// Description: Locus identity, cohort match, tiers and rule flags
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::parsers::AnnotatedVariant;

/// Genomic identity of a variant; the sole join key between both tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locus {
    /// Chromosome as written in the source table (e.g., "1", "chrX")
    pub chromosome: String,

    /// 1-based start position
    pub position: u64,

    /// Reference allele ("-" for insertions in ANNOVAR notation)
    pub ref_allele: String,

    /// Alternate allele ("-" for deletions in ANNOVAR notation)
    pub alt_allele: String,
}

impl Locus {
    pub fn new(
        chromosome: impl Into<String>,
        position: u64,
        ref_allele: impl Into<String>,
        alt_allele: impl Into<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            ref_allele: ref_allele.into(),
            alt_allele: alt_allele.into(),
        }
    }

    /// Sort key placing autosomes numerically, then X, Y, mitochondrial,
    /// then any other contig by name. A "chr" prefix is ignored.
    fn chromosome_key(&self) -> (u8, u64, &str) {
        let name = self
            .chromosome
            .strip_prefix("chr")
            .or_else(|| self.chromosome.strip_prefix("Chr"))
            .or_else(|| self.chromosome.strip_prefix("CHR"))
            .unwrap_or(&self.chromosome);

        if let Ok(number) = name.parse::<u64>() {
            return (0, number, "");
        }

        match name {
            "X" | "x" => (1, 23, ""),
            "Y" | "y" => (1, 24, ""),
            "M" | "MT" | "m" | "mt" => (1, 25, ""),
            other => (2, 0, other),
        }
    }

    /// Genomic order: chromosome, position, then alleles
    pub fn genomic_cmp(&self, other: &Self) -> Ordering {
        self.chromosome_key()
            .cmp(&other.chromosome_key())
            .then_with(|| self.chromosome.cmp(&other.chromosome))
            .then_with(|| self.position.cmp(&other.position))
            .then_with(|| self.ref_allele.cmp(&other.ref_allele))
            .then_with(|| self.alt_allele.cmp(&other.alt_allele))
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}>{}",
            self.chromosome, self.position, self.ref_allele, self.alt_allele
        )
    }
}

/// Result of looking a locus up in the cohort index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CohortFrequency {
    /// Locus observed in the cohort table with this allele frequency
    Present(f64),
    /// Locus not in the cohort table (not the same as frequency 0)
    Absent,
}

impl CohortFrequency {
    pub fn value(&self) -> Option<f64> {
        match self {
            CohortFrequency::Present(af) => Some(*af),
            CohortFrequency::Absent => None,
        }
    }
}

/// Functional severity derived from the consequence columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Frameshift, stop gain/loss, start loss
    High,
    /// Missense, in-frame indel, splicing
    Moderate,
    /// Synonymous
    Low,
    /// Intronic, UTR, intergenic, unknown or missing
    Minimal,
}

impl Severity {
    /// Contribution to the tie-break score, 1.0 for High down to 0.0
    pub fn points(&self) -> f64 {
        match self {
            Severity::High => 1.0,
            Severity::Moderate => 2.0 / 3.0,
            Severity::Low => 1.0 / 3.0,
            Severity::Minimal => 0.0,
        }
    }

    pub fn is_damaging(&self) -> bool {
        matches!(self, Severity::High | Severity::Moderate)
    }
}

/// Clinical significance tag reduced to what affects ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalSignificance {
    /// Pathogenic or likely pathogenic
    Pathogenic,
    /// Benign or likely benign
    Benign,
    /// Any other curated value (uncertain, conflicting, drug response, ...)
    Other,
    /// No tag, or the column is absent
    NotReported,
}

/// Ordinal priority; Tier1 is the most likely disease candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityTier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl PriorityTier {
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::High => PriorityTier::Tier1,
            Severity::Moderate => PriorityTier::Tier2,
            Severity::Low => PriorityTier::Tier3,
            Severity::Minimal => PriorityTier::Tier4,
        }
    }

    /// One level towards Tier1, saturating
    pub fn raise(self) -> Self {
        match self {
            PriorityTier::Tier1 | PriorityTier::Tier2 => PriorityTier::Tier1,
            PriorityTier::Tier3 => PriorityTier::Tier2,
            PriorityTier::Tier4 => PriorityTier::Tier3,
        }
    }

    /// One level towards Tier4, saturating
    pub fn lower(self) -> Self {
        match self {
            PriorityTier::Tier1 => PriorityTier::Tier2,
            PriorityTier::Tier2 => PriorityTier::Tier3,
            PriorityTier::Tier3 | PriorityTier::Tier4 => PriorityTier::Tier4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Tier1 => "Tier1",
            PriorityTier::Tier2 => "Tier2",
            PriorityTier::Tier3 => "Tier3",
            PriorityTier::Tier4 => "Tier4",
        }
    }
}

/// Rules that fired while scoring a variant. Declaration order is output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFlag {
    Lof,
    Missense,
    Synonymous,
    ConsequenceUnknown,
    RareGlobal,
    CommonGlobal,
    RareAncestry,
    CommonAncestry,
    AbsentCohort,
    RareCohort,
    CommonCohort,
    HighCohortAf,
    ClinsigPathogenic,
    ClinsigBenign,
    Filtered,
}

impl RuleFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleFlag::Lof => "lof",
            RuleFlag::Missense => "missense",
            RuleFlag::Synonymous => "synonymous",
            RuleFlag::ConsequenceUnknown => "consequence_unknown",
            RuleFlag::RareGlobal => "rare_global",
            RuleFlag::CommonGlobal => "common_global",
            RuleFlag::RareAncestry => "rare_ancestry",
            RuleFlag::CommonAncestry => "common_ancestry",
            RuleFlag::AbsentCohort => "absent_cohort",
            RuleFlag::RareCohort => "rare_cohort",
            RuleFlag::CommonCohort => "common_cohort",
            RuleFlag::HighCohortAf => "high_cohort_af",
            RuleFlag::ClinsigPathogenic => "clinsig_pathogenic",
            RuleFlag::ClinsigBenign => "clinsig_benign",
            RuleFlag::Filtered => "filtered",
        }
    }
}

/// Annotation row after the cohort join and scoring
#[derive(Debug, Clone)]
pub struct PrioritisedVariant {
    /// The input row, unchanged
    pub variant: AnnotatedVariant,

    /// Cohort match for the row's locus
    pub cohort: CohortFrequency,

    pub severity: Severity,

    pub clinical_significance: ClinicalSignificance,

    pub tier: PriorityTier,

    /// Tie-break score within a tier (higher ranks first)
    pub score: f64,

    /// Rules that contributed, kept for auditability
    pub flags: BTreeSet<RuleFlag>,
}

impl PrioritisedVariant {
    pub fn locus(&self) -> &Locus {
        &self.variant.locus
    }

    /// True when the filter policy excluded this variant
    pub fn is_filtered(&self) -> bool {
        self.flags.contains(&RuleFlag::Filtered)
    }

    /// Comma-joined flags, "." when none fired
    pub fn flags_field(&self) -> String {
        if self.flags.is_empty() {
            return ".".to_string();
        }
        self.flags
            .iter()
            .map(RuleFlag::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}
