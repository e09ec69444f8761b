// ==============================================================================
// output.rs - Prioritised Variant Table Output
// ==============================================================================
// Description: Writes ranked variants as a byte-reproducible TSV
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Columns: every original annotation column in original order, then
//   <cohort>_AF  priority_tier  priority_score  priority_flags
// Files are written to a temporary sibling and renamed into place, so a killed
// run never leaves a truncated file under the final name.
// ==============================================================================

use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{CohortFrequency, PrioritisedVariant};
use crate::parsers::TableHeader;

/// Suffix of the ranked, filtered table
pub const PRIORITISED_SUFFIX: &str = "zim_prioritised.tsv";

/// Suffix of the optional unfiltered table
pub const ANNOTATED_SUFFIX: &str = "zim_annotated.tsv";

/// Written in the cohort column when the locus is not in the cohort table
pub const ABSENT_MARKER: &str = ".";

pub const TIER_COLUMN: &str = "priority_tier";
pub const SCORE_COLUMN: &str = "priority_score";
pub const FLAGS_COLUMN: &str = "priority_flags";

/// Format a cohort match for output
pub fn format_cohort(cohort: &CohortFrequency) -> String {
    match cohort {
        CohortFrequency::Present(af) => af.to_string(),
        CohortFrequency::Absent => ABSENT_MARKER.to_string(),
    }
}

/// Writes result tables for one sample
#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: PathBuf,
    prefix: String,
    cohort_column: String,
}

impl ResultWriter {
    /// # Arguments
    /// * `output_dir` - Directory the prefix is resolved against
    /// * `prefix` - Output-name prefix (may itself contain directories)
    /// * `cohort_column` - Name of the appended cohort frequency column
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>, cohort_column: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            cohort_column: cohort_column.into(),
        }
    }

    /// Column names appended after the original annotation columns
    pub fn appended_columns(&self) -> Vec<String> {
        vec![
            self.cohort_column.clone(),
            TIER_COLUMN.to_string(),
            SCORE_COLUMN.to_string(),
            FLAGS_COLUMN.to_string(),
        ]
    }

    pub fn output_path(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", self.prefix, suffix))
    }

    /// Publish the ranked table; an empty slice still yields a header-only file
    pub fn write_prioritised(&self, header: &TableHeader, variants: &[PrioritisedVariant]) -> Result<PathBuf> {
        self.publish(&self.output_path(PRIORITISED_SUFFIX), header, variants)
    }

    /// Publish every scored row, filtered ones included, in the order given
    pub fn write_annotated(&self, header: &TableHeader, variants: &[PrioritisedVariant]) -> Result<PathBuf> {
        self.publish(&self.output_path(ANNOTATED_SUFFIX), header, variants)
    }

    fn publish(&self, path: &Path, header: &TableHeader, variants: &[PrioritisedVariant]) -> Result<PathBuf> {
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;

        // Unique name per invocation; concurrent samples never share a temp file
        let temp = tempfile::Builder::new()
            .prefix(".zim_prioritisation.")
            .suffix(".partial")
            .tempfile_in(&parent)
            .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;

        debug!("Writing {} rows to {:?}", variants.len(), temp.path());

        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .has_headers(false)
            .from_writer(temp);

        let mut header_row: Vec<String> = header.names().to_vec();
        header_row.extend(self.appended_columns());
        writer
            .write_record(&header_row)
            .with_context(|| format!("Failed to write header to {}", path.display()))?;

        for variant in variants {
            let cohort = format_cohort(&variant.cohort);
            let score = format!("{:.6}", variant.score);
            let flags = variant.flags_field();

            let row = variant
                .variant
                .fields()
                .chain([
                    cohort.as_str(),
                    variant.tier.as_str(),
                    score.as_str(),
                    flags.as_str(),
                ]);
            writer
                .write_record(row)
                .with_context(|| format!("Failed to write {} to {}", variant.locus(), path.display()))?;
        }

        let mut temp = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush {}: {}", path.display(), e.error()))?;
        temp.flush()
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to sync {}", path.display()))?;

        temp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to publish {}", path.display()))?;

        info!("Wrote {} variants to {}", variants.len(), path.display());
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrioritisationConfig;
    use crate::parsers::{AnnotationReader, CohortIndex};
    use crate::prioritiser::Prioritiser;
    use std::io::Write as _;
    use tempfile::{tempdir, NamedTempFile};

    fn load(contents: &str) -> (AnnotationReader, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        let config = PrioritisationConfig::default();
        let reader = AnnotationReader::open(file.path(), &config.annotation, &config.reference).unwrap();
        (reader, file)
    }

    #[test]
    fn test_output_path() {
        let writer = ResultWriter::new("/data/out", "sample1", "zim_AF");
        assert_eq!(
            writer.output_path(PRIORITISED_SUFFIX),
            PathBuf::from("/data/out/sample1.zim_prioritised.tsv")
        );
        assert_eq!(
            writer.appended_columns(),
            vec!["zim_AF", "priority_tier", "priority_score", "priority_flags"]
        );
    }

    #[test]
    fn test_format_cohort() {
        assert_eq!(format_cohort(&CohortFrequency::Absent), ".");
        assert_eq!(format_cohort(&CohortFrequency::Present(0.0)), "0");
        assert_eq!(format_cohort(&CohortFrequency::Present(0.2)), "0.2");
    }

    #[test]
    fn test_empty_result_writes_header() {
        let (reader, _file) = load("Chr\tStart\tRef\tAlt\tFunc.refGene\n");
        let dir = tempdir().unwrap();
        let writer = ResultWriter::new(dir.path(), "empty", "zim_AF");

        let path = writer.write_prioritised(reader.header(), &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Chr\tStart\tRef\tAlt\tFunc.refGene\tzim_AF\tpriority_tier\tpriority_score\tpriority_flags\n"
        );
    }

    #[test]
    fn test_rows_keep_original_columns() {
        let (reader, _file) = load("Chr\tStart\tRef\tAlt\tExonicFunc.refGene\tNote\n1\t100\tA\tG\tstopgain\tsay \"hi\"\n");
        let header = reader.header().clone();
        let variants: Vec<_> = reader.map(|r| r.unwrap()).collect();

        let config = PrioritisationConfig::default();
        let index = CohortIndex::default();
        let prioritiser = Prioritiser::new(&config, &index);
        let scored: Vec<_> = variants.into_iter().map(|v| prioritiser.score(v)).collect();

        let dir = tempdir().unwrap();
        let writer = ResultWriter::new(dir.path(), "s", "zim_AF");
        let path = writer.write_prioritised(&header, &scored).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "1\t100\tA\tG\tstopgain\tsay \"hi\"\t.\tTier1\t1.000000\tlof,absent_cohort");
    }

    #[test]
    fn test_no_temporary_files_left() {
        let (reader, _file) = load("Chr\tStart\tRef\tAlt\n");
        let dir = tempdir().unwrap();
        let writer = ResultWriter::new(dir.path(), "clean", "zim_AF");
        writer.write_prioritised(reader.header(), &[]).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["clean.zim_prioritised.tsv".to_string()]);
    }
}
