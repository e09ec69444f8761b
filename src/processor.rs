// ==============================================================================
// processor.rs - Single-Sample Prioritisation Job
// ==============================================================================
// Description: Loads both tables, prioritises, publishes results, logs provenance
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// One invocation = one sample. The job owns its file handles for the duration
// of the run and writes only to its declared output paths.
// ==============================================================================

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::audit::{FileDigest, FileRole, RunCounts, RunSummary};
use crate::config::PrioritisationConfig;
use crate::output::ResultWriter;
use crate::parsers::{AnnotationReader, CohortIndex, TableError};
use crate::prioritiser::Prioritiser;

/// Paths and settings for one sample
#[derive(Debug, Clone)]
pub struct PrioritisationJob {
    annotation_path: PathBuf,
    cohort_path: PathBuf,
    output_dir: PathBuf,
    out_prefix: String,
    config: PrioritisationConfig,
    write_annotated: bool,
}

/// What a completed job produced
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub prioritised_path: PathBuf,
    pub annotated_path: Option<PathBuf>,
    pub counts: RunCounts,
}

impl PrioritisationJob {
    pub fn new(
        annotation_path: impl Into<PathBuf>,
        cohort_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        out_prefix: impl Into<String>,
        config: PrioritisationConfig,
    ) -> Self {
        Self {
            annotation_path: annotation_path.into(),
            cohort_path: cohort_path.into(),
            output_dir: output_dir.into(),
            out_prefix: out_prefix.into(),
            config,
            write_annotated: false,
        }
    }

    /// Also publish `<prefix>.zim_annotated.tsv` with every scored row
    pub fn with_annotated_output(mut self, enabled: bool) -> Self {
        self.write_annotated = enabled;
        self
    }

    /// Main processing pipeline
    pub fn run(&self) -> Result<JobOutcome> {
        info!(
            "Prioritising {} against cohort {}",
            self.annotation_path.display(),
            self.cohort_path.display()
        );

        // 1. Validate configuration and check inputs exist before doing any work
        self.config.validate()?;
        ensure_exists(&self.annotation_path)?;
        ensure_exists(&self.cohort_path)?;

        // 2. Build the cohort index
        let index = CohortIndex::load(&self.cohort_path, &self.config.cohort)?;

        // 3. Open the annotation table
        let writer = ResultWriter::new(
            &self.output_dir,
            &self.out_prefix,
            self.config.cohort.frequency_column(),
        );
        let mut reader = AnnotationReader::open(
            &self.annotation_path,
            &self.config.annotation,
            &self.config.reference,
        )?;
        let header = reader.header().clone();
        header.reject_columns(&writer.appended_columns(), &self.annotation_path)?;

        info!(
            "Reference frequency columns: global {:?}, ancestry {:?}",
            reader.schema().global_frequency_columns(),
            reader.schema().ancestry_frequency_columns()
        );

        // 4. Join, score and filter
        let prioritisation = Prioritiser::new(&self.config, &index).prioritise(reader.by_ref())?;
        let skipped = reader.skipped_count();
        if skipped > 0 {
            warn!(
                "Skipped {} malformed rows in {}",
                skipped,
                self.annotation_path.display()
            );
        }

        let mut counts = RunCounts {
            loaded: prioritisation.scored.len(),
            skipped,
            filtered: prioritisation.filtered_count(),
            written: 0,
            cohort_loci: index.len(),
        };

        // 5. Optional unfiltered table, in input order
        let annotated_path = if self.write_annotated {
            Some(writer.write_annotated(&header, &prioritisation.scored)?)
        } else {
            None
        };

        // 6. Rank and publish
        let ranked = prioritisation.into_ranked();
        counts.written = ranked.len();
        let prioritised_path = writer.write_prioritised(&header, &ranked)?;

        // 7. Provenance
        let mut files = vec![
            FileDigest::compute(FileRole::Annotation, &self.annotation_path)?,
            FileDigest::compute(FileRole::Cohort, &self.cohort_path)?,
            FileDigest::compute(FileRole::Prioritised, &prioritised_path)?,
        ];
        if let Some(path) = &annotated_path {
            files.push(FileDigest::compute(FileRole::Annotated, path)?);
        }
        RunSummary {
            files,
            counts: counts.clone(),
            config: self.config.clone(),
        }
        .log()?;

        info!(
            "Prioritisation complete: {} loaded, {} skipped, {} filtered, {} written",
            counts.loaded, counts.skipped, counts.filtered, counts.written
        );

        Ok(JobOutcome {
            prioritised_path,
            annotated_path,
            counts,
        })
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(TableError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}
