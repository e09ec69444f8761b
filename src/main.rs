// ==============================================================================
// main.rs - Variant Prioritisation Entry Point
// ==============================================================================
// Description: Command-line entry point, invoked once per sample
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zim_prioritisation::config::{PrioritisationConfig, RowPolicy};
use zim_prioritisation::processor::PrioritisationJob;

/// Zimbabwe-specific prioritisation of annotated variants
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Multi-database annotation table (e.g. *.hg38_multianno.txt)
    #[arg(long)]
    multianno: PathBuf,

    /// Zimbabwe cohort frequency table (TSV)
    #[arg(long, alias = "zim_db")]
    zim_db: PathBuf,

    /// Prefix for output files
    #[arg(long, alias = "out_prefix")]
    out_prefix: String,

    /// Directory the output prefix is resolved against
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// JSON configuration file (thresholds, column names, weights)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Max global gnomAD AF before a variant counts as common (default 0.01)
    #[arg(long, alias = "max_gnomad_af")]
    max_gnomad_af: Option<f64>,

    /// Max African-ancestry gnomAD AF before a variant counts as common (default 0.01)
    #[arg(long, alias = "max_gnomad_afr_af")]
    max_gnomad_afr_af: Option<f64>,

    /// Max Zimbabwe cohort AF before a variant counts as common (default 0.05)
    #[arg(long, alias = "max_zim_af")]
    max_zim_af: Option<f64>,

    /// Keep only LoF, missense and splicing variants (plus pathogenic ones)
    #[arg(long)]
    damaging_only: bool,

    /// Also write <prefix>.zim_annotated.tsv with every variant
    #[arg(long)]
    annotated: bool,

    /// Abort on the first malformed annotation row instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// File configuration first, then explicit flags on top
    fn build_config(&self) -> Result<PrioritisationConfig> {
        let mut config = match &self.config {
            Some(path) => PrioritisationConfig::from_json_file(path)?,
            None => PrioritisationConfig::default(),
        };

        if let Some(af) = self.max_gnomad_af {
            config.reference.max_global_af = af;
        }
        if let Some(af) = self.max_gnomad_afr_af {
            config.reference.max_ancestry_af = af;
        }
        if let Some(af) = self.max_zim_af {
            config.cohort.max_cohort_af = af;
        }
        if self.damaging_only {
            config.damaging_only = true;
        }
        if self.strict {
            config.annotation.malformed_rows = RowPolicy::Abort;
        }

        config.weights.normalise();
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Diagnostics go to stderr, never into the data output
    let default_directive = if args.verbose {
        "zim_prioritisation=debug"
    } else {
        "zim_prioritisation=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Zimbabwe variant prioritisation starting...");

    let config = args.build_config()?;
    let outcome = PrioritisationJob::new(
        &args.multianno,
        &args.zim_db,
        &args.out_dir,
        &args.out_prefix,
        config,
    )
    .with_annotated_output(args.annotated)
    .run()?;

    info!("Wrote prioritised variant list: {}", outcome.prioritised_path.display());
    if let Some(path) = &outcome.annotated_path {
        info!("Wrote annotated file: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "zim-prioritise",
            "--multianno",
            "a.txt",
            "--zim-db",
            "z.tsv",
            "--out-prefix",
            "s1",
            "--max-zim-af",
            "0.1",
            "--strict",
        ]);

        let config = args.build_config().unwrap();
        assert_eq!(config.cohort.max_cohort_af, 0.1);
        assert_eq!(config.reference.max_global_af, 0.01);
        assert_eq!(config.annotation.malformed_rows, RowPolicy::Abort);
        assert_eq!(args.out_dir, PathBuf::from("."));
    }

    #[test]
    fn test_underscore_aliases() {
        let args = Args::parse_from([
            "zim-prioritise",
            "--multianno",
            "a.txt",
            "--zim_db",
            "z.tsv",
            "--out_prefix",
            "s1",
            "--max_gnomad_af",
            "0.001",
        ]);
        assert_eq!(args.zim_db, PathBuf::from("z.tsv"));
        assert_eq!(args.max_gnomad_af, Some(0.001));
    }

    #[test]
    fn test_config_weights_are_renormalised() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{"weights": {"severity": 2.0, "reference_rarity": 1.0, "cohort_rarity": 1.0}}"#,
        )
        .unwrap();
        let config_path = file.path().to_string_lossy().into_owned();

        let args = Args::parse_from([
            "zim-prioritise",
            "--multianno",
            "a.txt",
            "--zim-db",
            "z.tsv",
            "--out-prefix",
            "s1",
            "--config",
            config_path.as_str(),
        ]);

        let config = args.build_config().unwrap();
        assert!((config.weights.severity - 0.5).abs() < 1e-12);
        assert!((config.weights.cohort_rarity - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let args = Args::parse_from([
            "zim-prioritise",
            "--multianno",
            "a.txt",
            "--zim-db",
            "z.tsv",
            "--out-prefix",
            "s1",
            "--max-gnomad-af",
            "2",
        ]);
        assert!(args.build_config().is_err());
    }
}
