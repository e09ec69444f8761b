// ==============================================================================
// audit.rs - Run Provenance for Variant Prioritisation
// ==============================================================================
// Description: Checksums and a structured summary of each prioritisation run
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// The summary goes to the diagnostic (log) channel only; nothing is written
// outside the run's declared output paths.
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::PrioritisationConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Annotation,
    Cohort,
    Prioritised,
    Annotated,
}

/// A file the run read or published, with its SHA-256
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDigest {
    pub role: FileRole,
    pub path: PathBuf,
    pub sha256: String,
}

impl FileDigest {
    pub fn compute(role: FileRole, path: &Path) -> Result<Self> {
        Ok(Self {
            role,
            path: path.to_path_buf(),
            sha256: compute_sha256(path)?,
        })
    }
}

/// Row counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Annotation rows loaded and scored
    pub loaded: usize,
    /// Annotation rows skipped as malformed
    pub skipped: usize,
    /// Rows excluded by the filter policy
    pub filtered: usize,
    /// Rows in the prioritised output
    pub written: usize,
    /// Distinct loci in the cohort index
    pub cohort_loci: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub files: Vec<FileDigest>,
    pub counts: RunCounts,
    pub config: PrioritisationConfig,
}

impl RunSummary {
    /// Emit the summary as a single JSON log event
    pub fn log(&self) -> Result<()> {
        let json = serde_json::to_string(self).context("Failed to serialise run summary")?;
        info!(target: "zim_prioritisation::audit", summary = %json, "Run provenance");
        Ok(())
    }
}

/// SHA-256 of a file as lower-case hex
pub fn compute_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sha256_known_value() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();

        assert_eq!(
            compute_sha256(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_summary_serialises_roles() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"x").unwrap();
        file.flush().unwrap();

        let summary = RunSummary {
            files: vec![FileDigest::compute(FileRole::Cohort, file.path()).unwrap()],
            counts: RunCounts {
                loaded: 3,
                written: 1,
                ..RunCounts::default()
            },
            config: PrioritisationConfig::default(),
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["files"][0]["role"], "cohort");
        assert_eq!(json["counts"]["loaded"], 3);
        assert_eq!(json["config"]["cohort"]["max_cohort_af"], 0.05);
        assert!(summary.log().is_ok());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(compute_sha256(Path::new("/nonexistent/file")).is_err());
    }
}
