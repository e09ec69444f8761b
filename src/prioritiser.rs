// ==============================================================================
// prioritiser.rs - Population-Aware Variant Prioritisation
// ==============================================================================
// Description: Joins annotation rows to the cohort index, scores, filters, ranks
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Tier:   functional severity (High→Tier1 .. Minimal→Tier4), raised one level
//         for a pathogenic tag, lowered one level for a benign tag.
// Score:  w_sev * severity + w_ref * rarity(reference AF) + w_cohort * rarity(cohort AF)
//         with rarity(af) = clamp(-log10(af) / 6, 0, 1) and unknown/absent = 1.
// Filter: common in the external reference AND common in the cohort, without a
//         pathogenic tag → excluded.
// Order:  tier ascending, score descending, genomic locus, then row text.
// ==============================================================================

use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::classify::{classify_clinical_significance, classify_consequence, consequence_flag};
use crate::config::PrioritisationConfig;
use crate::models::{
    ClinicalSignificance, CohortFrequency, PrioritisedVariant, PriorityTier, RuleFlag,
};
use crate::parsers::{AnnotatedVariant, CohortIndex};

/// Frequencies at or below this floor all score as maximally rare
const RARITY_FLOOR: f64 = 1e-6;

/// Score is rounded to this many decimals so equal displayed scores tie
const SCORE_DECIMALS: i32 = 6;

/// Rarity in [0, 1]; 1 when the frequency is unknown or the locus is absent
fn rarity(af: Option<f64>) -> f64 {
    match af {
        None => 1.0,
        Some(af) => (-af.max(RARITY_FLOOR).log10() / -RARITY_FLOOR.log10()).clamp(0.0, 1.0),
    }
}

fn round_score(score: f64) -> f64 {
    let scale = 10f64.powi(SCORE_DECIMALS);
    (score * scale).round() / scale
}

/// Frequency signal of one source against its threshold
fn frequency_flag(af: Option<f64>, threshold: f64, rare: RuleFlag, common: RuleFlag) -> (bool, Option<RuleFlag>) {
    match af {
        Some(af) if af >= threshold => (true, Some(common)),
        Some(_) => (false, Some(rare)),
        None => (false, None),
    }
}

/// All scored rows of one sample, in input order
#[derive(Debug, Default)]
pub struct Prioritisation {
    pub scored: Vec<PrioritisedVariant>,
}

impl Prioritisation {
    /// Rows excluded by the filter policy
    pub fn filtered_count(&self) -> usize {
        self.scored.iter().filter(|v| v.is_filtered()).count()
    }

    /// Surviving rows, most likely disease candidates first
    pub fn into_ranked(self) -> Vec<PrioritisedVariant> {
        let mut ranked: Vec<PrioritisedVariant> =
            self.scored.into_iter().filter(|v| !v.is_filtered()).collect();
        rank(&mut ranked);
        ranked
    }
}

/// Scores annotation rows against a cohort index
pub struct Prioritiser<'a> {
    config: &'a PrioritisationConfig,
    index: &'a CohortIndex,
}

impl<'a> Prioritiser<'a> {
    pub fn new(config: &'a PrioritisationConfig, index: &'a CohortIndex) -> Self {
        Self { config, index }
    }

    /// Join, classify and score a single row
    ///
    /// Never fails: a row without consequence columns scores at the lowest
    /// severity and carries the `consequence_unknown` flag.
    pub fn score(&self, variant: AnnotatedVariant) -> PrioritisedVariant {
        let reference = &self.config.reference;
        let cohort_config = &self.config.cohort;
        let mut flags = BTreeSet::new();

        // 1. Cohort join (left join: absence is kept, not dropped)
        let cohort = self.index.lookup(&variant.locus);

        // 2. Functional severity
        let severity = classify_consequence(
            variant.function.as_deref(),
            variant.exonic_function.as_deref(),
        );
        let has_consequence = variant.function.is_some() || variant.exonic_function.is_some();
        flags.extend(consequence_flag(severity, has_consequence));

        // 3. Rarity per source
        let (global_common, flag) = frequency_flag(
            variant.global_af,
            reference.max_global_af,
            RuleFlag::RareGlobal,
            RuleFlag::CommonGlobal,
        );
        flags.extend(flag);
        let (ancestry_common, flag) = frequency_flag(
            variant.ancestry_af,
            reference.max_ancestry_af,
            RuleFlag::RareAncestry,
            RuleFlag::CommonAncestry,
        );
        flags.extend(flag);
        let reference_common = global_common || ancestry_common;

        let cohort_common = match cohort {
            CohortFrequency::Absent => {
                flags.insert(RuleFlag::AbsentCohort);
                false
            }
            CohortFrequency::Present(af) => {
                let (common, flag) = frequency_flag(
                    Some(af),
                    cohort_config.max_cohort_af,
                    RuleFlag::RareCohort,
                    RuleFlag::CommonCohort,
                );
                flags.extend(flag);
                if af > cohort_config.high_af_flag {
                    flags.insert(RuleFlag::HighCohortAf);
                }
                common
            }
        };

        // 4. Clinical significance adjusts the tier by one level
        let clinical_significance =
            classify_clinical_significance(variant.clinical_significance.as_deref());
        let base_tier = PriorityTier::from_severity(severity);
        let tier = match clinical_significance {
            ClinicalSignificance::Pathogenic => {
                flags.insert(RuleFlag::ClinsigPathogenic);
                base_tier.raise()
            }
            ClinicalSignificance::Benign => {
                flags.insert(RuleFlag::ClinsigBenign);
                base_tier.lower()
            }
            ClinicalSignificance::Other | ClinicalSignificance::NotReported => base_tier,
        };

        // 5. Tie-break score
        let weights = &self.config.weights;
        let score = round_score(
            weights.severity * severity.points()
                + weights.reference_rarity * rarity(variant.reference_af())
                + weights.cohort_rarity * rarity(cohort.value()),
        );

        // 6. Filter policy
        let pathogenic = clinical_significance == ClinicalSignificance::Pathogenic;
        let common_everywhere = reference_common && cohort_common;
        let not_damaging = self.config.damaging_only && !severity.is_damaging();
        if !pathogenic && (common_everywhere || not_damaging) {
            flags.insert(RuleFlag::Filtered);
        }

        PrioritisedVariant {
            variant,
            cohort,
            severity,
            clinical_significance,
            tier,
            score,
            flags,
        }
    }

    /// Score every row of a sample
    ///
    /// The first error from the row source stops the run and is returned.
    pub fn prioritise<I, E>(&self, variants: I) -> Result<Prioritisation, E>
    where
        I: IntoIterator<Item = Result<AnnotatedVariant, E>>,
    {
        let mut scored = Vec::new();
        for variant in variants {
            let prioritised = self.score(variant?);
            debug!(
                "{} tier={} score={:.6} flags={}",
                prioritised.locus(),
                prioritised.tier.as_str(),
                prioritised.score,
                prioritised.flags_field()
            );
            scored.push(prioritised);
        }

        let prioritisation = Prioritisation { scored };
        info!(
            "Scored {} variants, {} excluded by frequency/impact filters",
            prioritisation.scored.len(),
            prioritisation.filtered_count()
        );
        Ok(prioritisation)
    }
}

/// Total order used for output: tier, score (high first), locus, row text
pub fn compare_priority(a: &PrioritisedVariant, b: &PrioritisedVariant) -> Ordering {
    a.tier
        .cmp(&b.tier)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.locus().genomic_cmp(b.locus()))
        .then_with(|| a.variant.fields().cmp(b.variant.fields()))
}

/// Sort in place; the result never depends on input row order
pub fn rank(variants: &mut [PrioritisedVariant]) {
    variants.sort_by(compare_priority);
}
