// ==============================================================================
// classify.rs - Consequence and Clinical Significance Classification
// ==============================================================================
// Description: Maps annotator consequence terms and ClinVar tags to ranks
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   Exonic sub-class (ExonicFunc.*), normalised to lower_snake_case:
//   - frameshift_*, stopgain, stoploss, startloss (or SO terms) → High
//   - nonsynonymous_snv, missense_variant, nonframeshift_*,
//     splice_site / splice_*_variant                            → Moderate
//   - synonymous_snv, synonymous_variant                        → Low
//   Function class (Func.*), ';'-separated:
//   - any part mentioning splicing / splice                     → Moderate
//   Severity is the higher of the two; everything else, including unknown
//   or missing values, is Minimal.
// ==============================================================================

use crate::models::{ClinicalSignificance, RuleFlag, Severity};

/// Lower-case and replace spaces so ANNOVAR and SO spellings compare equal
fn normalise_term(term: &str) -> String {
    term.trim().to_lowercase().replace([' ', '-'], "_")
}

fn exonic_severity(term: &str) -> Severity {
    let term = normalise_term(term);
    match term.as_str() {
        "stopgain" | "stop_gained" | "stoploss" | "stop_lost" | "startloss" | "start_lost"
        | "frameshift_variant" => Severity::High,
        "nonsynonymous_snv" | "missense_variant" | "inframe_insertion" | "inframe_deletion" => {
            Severity::Moderate
        }
        "synonymous_snv" | "synonymous_variant" => Severity::Low,
        t if t.contains("splic") => Severity::Moderate,
        t if t.starts_with("frameshift") => Severity::High,
        t if t.starts_with("nonframeshift") => Severity::Moderate,
        _ => Severity::Minimal,
    }
}

fn function_severity(function: &str) -> Severity {
    let splicing = function
        .split(';')
        .map(normalise_term)
        .any(|part| part.contains("splicing") || part.contains("splice"));

    if splicing {
        Severity::Moderate
    } else {
        Severity::Minimal
    }
}

fn more_severe(a: Severity, b: Severity) -> Severity {
    if a.points() >= b.points() {
        a
    } else {
        b
    }
}

/// Functional severity of a variant from its consequence columns
///
/// # Arguments
/// * `function` - Function class (e.g. "exonic", "splicing", "intronic")
/// * `exonic_function` - Exonic sub-class (e.g. "stopgain", "nonsynonymous SNV")
///
/// Missing or unrecognised values never fail; they score as `Minimal`.
///
/// # Examples
/// ```
/// use zim_prioritisation::classify::classify_consequence;
/// use zim_prioritisation::models::Severity;
///
/// assert_eq!(classify_consequence(Some("exonic"), Some("stopgain")), Severity::High);
/// assert_eq!(classify_consequence(Some("exonic"), Some("nonsynonymous SNV")), Severity::Moderate);
/// assert_eq!(classify_consequence(Some("splicing"), None), Severity::Moderate);
/// assert_eq!(classify_consequence(Some("exonic"), Some("synonymous SNV")), Severity::Low);
/// assert_eq!(classify_consequence(Some("intronic"), None), Severity::Minimal);
/// assert_eq!(classify_consequence(None, None), Severity::Minimal);
/// ```
pub fn classify_consequence(function: Option<&str>, exonic_function: Option<&str>) -> Severity {
    let exonic = exonic_function.map_or(Severity::Minimal, exonic_severity);
    let function = function.map_or(Severity::Minimal, function_severity);
    more_severe(exonic, function)
}

/// Reporting flag describing the consequence class, if any
pub fn consequence_flag(severity: Severity, has_consequence: bool) -> Option<RuleFlag> {
    if !has_consequence {
        return Some(RuleFlag::ConsequenceUnknown);
    }
    match severity {
        Severity::High => Some(RuleFlag::Lof),
        Severity::Moderate => Some(RuleFlag::Missense),
        Severity::Low => Some(RuleFlag::Synonymous),
        Severity::Minimal => None,
    }
}

/// Reduce a ClinVar-style significance tag to pathogenic / benign / other
///
/// Tags may combine several terms ("Pathogenic/Likely_pathogenic",
/// "Benign|risk_factor"). Any pathogenic or likely-pathogenic term wins;
/// "Conflicting_interpretations_of_pathogenicity" is not pathogenic.
///
/// # Examples
/// ```
/// use zim_prioritisation::classify::classify_clinical_significance;
/// use zim_prioritisation::models::ClinicalSignificance;
///
/// assert_eq!(classify_clinical_significance(Some("Likely_pathogenic")), ClinicalSignificance::Pathogenic);
/// assert_eq!(classify_clinical_significance(Some("Benign/Likely_benign")), ClinicalSignificance::Benign);
/// assert_eq!(
///     classify_clinical_significance(Some("Conflicting_interpretations_of_pathogenicity")),
///     ClinicalSignificance::Other
/// );
/// assert_eq!(classify_clinical_significance(None), ClinicalSignificance::NotReported);
/// ```
pub fn classify_clinical_significance(tag: Option<&str>) -> ClinicalSignificance {
    let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) else {
        return ClinicalSignificance::NotReported;
    };

    let terms: Vec<String> = tag
        .split(['/', '|', ',', ';'])
        .map(normalise_term)
        .filter(|t| !t.is_empty())
        .collect();

    let is = |wanted: &str| {
        terms
            .iter()
            .any(|t| t == wanted || t.strip_prefix("likely_") == Some(wanted))
    };

    if is("pathogenic") {
        ClinicalSignificance::Pathogenic
    } else if is("benign") {
        ClinicalSignificance::Benign
    } else {
        ClinicalSignificance::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lof_terms() {
        for term in [
            "frameshift deletion",
            "frameshift insertion",
            "frameshift_variant",
            "stopgain",
            "stop_gained",
            "stoploss",
            "startloss",
        ] {
            assert_eq!(
                classify_consequence(Some("exonic"), Some(term)),
                Severity::High,
                "{} should be High",
                term
            );
        }
    }

    #[test]
    fn test_nonframeshift_is_not_frameshift() {
        assert_eq!(
            classify_consequence(Some("exonic"), Some("nonframeshift deletion")),
            Severity::Moderate
        );
    }

    #[test]
    fn test_splicing_in_function_class() {
        assert_eq!(classify_consequence(Some("exonic;splicing"), Some("synonymous SNV")), Severity::Moderate);
        assert_eq!(classify_consequence(Some("ncRNA_splicing"), None), Severity::Moderate);
        assert_eq!(classify_consequence(Some("splicing"), Some("stopgain")), Severity::High);
    }

    #[test]
    fn test_splicing_in_exonic_class() {
        for term in [
            "splicing",
            "splice_site",
            "splice_donor_variant",
            "splice_acceptor_variant",
        ] {
            assert_eq!(
                classify_consequence(Some("exonic"), Some(term)),
                Severity::Moderate,
                "{} should be Moderate",
                term
            );
        }
        assert!(classify_consequence(None, Some("splice_site")).is_damaging());
    }

    #[test]
    fn test_unknown_and_non_coding() {
        assert_eq!(classify_consequence(Some("exonic"), Some("unknown")), Severity::Minimal);
        assert_eq!(classify_consequence(Some("UTR3"), None), Severity::Minimal);
        assert_eq!(classify_consequence(Some("intergenic"), None), Severity::Minimal);
        assert_eq!(classify_consequence(Some("something_new"), Some("novel_term")), Severity::Minimal);
    }

    #[test]
    fn test_consequence_flags() {
        assert_eq!(consequence_flag(Severity::High, true), Some(RuleFlag::Lof));
        assert_eq!(consequence_flag(Severity::Low, true), Some(RuleFlag::Synonymous));
        assert_eq!(consequence_flag(Severity::Minimal, true), None);
        assert_eq!(consequence_flag(Severity::Minimal, false), Some(RuleFlag::ConsequenceUnknown));
    }

    #[test]
    fn test_clinical_significance_terms() {
        assert_eq!(classify_clinical_significance(Some("Pathogenic")), ClinicalSignificance::Pathogenic);
        assert_eq!(
            classify_clinical_significance(Some("Pathogenic/Likely_pathogenic")),
            ClinicalSignificance::Pathogenic
        );
        assert_eq!(classify_clinical_significance(Some("Likely benign")), ClinicalSignificance::Benign);
        assert_eq!(
            classify_clinical_significance(Some("Uncertain_significance")),
            ClinicalSignificance::Other
        );
        assert_eq!(
            classify_clinical_significance(Some("Benign|Pathogenic")),
            ClinicalSignificance::Pathogenic
        );
        assert_eq!(classify_clinical_significance(Some("  ")), ClinicalSignificance::NotReported);
    }
}
