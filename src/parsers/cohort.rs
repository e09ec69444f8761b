// ==============================================================================
// parsers/cohort.rs - Cohort Frequency Index
// ==============================================================================
// Description: Loads the reference cohort frequency table into a locus lookup
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited with header; column names are case-insensitive.
// Required: Chr, Start, Ref, Alt and either zim_AF or zim_AC + zim_AN
// (AF = AC / AN). The "zim" prefix is configurable.
// Example:
//   Chr  Start   Ref  Alt  zim_AC  zim_AN
//   1    69134   A    G    3       200
// ==============================================================================

use csv::StringRecord;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{CohortConfig, RowPolicy};
use crate::models::{CohortFrequency, Locus};
use crate::parsers::table::{
    open_table, parse_frequency, record_line, LocusColumns, TableError, TableHeader,
};

/// One row of the cohort reference table
#[derive(Debug, Clone, PartialEq)]
pub struct CohortFrequencyRecord {
    pub locus: Locus,

    /// Cohort allele frequency (given directly or computed as AC / AN)
    pub allele_frequency: f64,

    /// Alternate allele count, when the table carries it
    pub allele_count: Option<u64>,

    /// Total allele number, when the table carries it
    pub allele_number: Option<u64>,

    /// 1-based line in the source file
    pub line: u64,
}

/// Where the frequency of a row comes from
#[derive(Debug, Clone, Copy)]
struct FrequencyColumns {
    frequency: Option<usize>,
    allele_count: Option<usize>,
    allele_number: Option<usize>,
}

impl FrequencyColumns {
    fn resolve(header: &TableHeader, config: &CohortConfig, path: &Path) -> Result<Self, TableError> {
        let columns = Self {
            frequency: header.position(&config.frequency_column()),
            allele_count: header.position(&config.allele_count_column()),
            allele_number: header.position(&config.allele_number_column()),
        };

        let computable = columns.allele_count.is_some() && columns.allele_number.is_some();
        if columns.frequency.is_none() && !computable {
            return Err(TableError::MalformedHeader {
                path: path.to_path_buf(),
                details: format!(
                    "cohort table must have {} or {} + {} (case-insensitive). Got: {:?}",
                    config.frequency_column(),
                    config.allele_count_column(),
                    config.allele_number_column(),
                    header.names()
                ),
            });
        }

        Ok(columns)
    }
}

/// Locus → cohort frequency lookup built from the reference table
#[derive(Debug, Default)]
pub struct CohortIndex {
    records: HashMap<Locus, CohortFrequencyRecord>,
    duplicate_rows: usize,
    skipped_rows: usize,
}

impl CohortIndex {
    /// Build the index from a cohort table
    ///
    /// # Errors
    /// * `FileNotFound` - the path does not exist
    /// * `MalformedHeader` - locus or frequency columns are missing
    /// * `MalformedRow` - unparsable locus or frequency (under `RowPolicy::Abort`)
    /// * `DuplicateKey` - the same locus appears twice with different frequencies
    ///
    /// Rows repeating a locus with the same frequency are tolerated with a warning.
    pub fn load(path: impl AsRef<Path>, config: &CohortConfig) -> Result<Self, TableError> {
        let path = path.as_ref();
        let mut reader = open_table(path)?;
        let header = TableHeader::read(&mut reader, path)?;
        let locus_columns = LocusColumns::resolve(&header, path)?;
        let frequency_columns = FrequencyColumns::resolve(&header, config, path)?;

        let mut index = CohortIndex::default();
        let mut record = StringRecord::new();

        loop {
            let parsed = match reader.read_record(&mut record) {
                Ok(false) => break,
                Ok(true) => parse_row(&record, &locus_columns, &frequency_columns, path),
                Err(err) => Err(TableError::from_csv(path, err)),
            };

            let row = match parsed {
                Ok(row) => row,
                Err(err) if err.is_row_level() && config.malformed_rows == RowPolicy::Skip => {
                    warn!("Skipping cohort row: {}", err);
                    index.skipped_rows += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            index.insert(row, path)?;
        }

        info!(
            "Loaded {} cohort loci from {} ({} duplicate rows, {} skipped rows)",
            index.len(),
            path.display(),
            index.duplicate_rows,
            index.skipped_rows
        );

        Ok(index)
    }

    fn insert(&mut self, row: CohortFrequencyRecord, path: &Path) -> Result<(), TableError> {
        match self.records.entry(row.locus.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(existing) => {
                let first = existing.get();
                if first.allele_frequency != row.allele_frequency {
                    return Err(TableError::DuplicateKey {
                        path: path.to_path_buf(),
                        locus: row.locus.to_string(),
                        line: row.line,
                        first_line: first.line,
                    });
                }
                warn!(
                    "Duplicate cohort locus {} at line {} (same frequency as line {}), keeping first",
                    row.locus,
                    row.line,
                    first.line
                );
                self.duplicate_rows += 1;
            }
        }
        Ok(())
    }

    /// Cohort match for a locus; `Absent` is an expected outcome, not an error
    pub fn lookup(&self, locus: &Locus) -> CohortFrequency {
        self.records
            .get(locus)
            .map_or(CohortFrequency::Absent, |record| {
                CohortFrequency::Present(record.allele_frequency)
            })
    }

    pub fn get(&self, locus: &Locus) -> Option<&CohortFrequencyRecord> {
        self.records.get(locus)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows ignored because they repeated a locus with the same frequency
    pub fn duplicate_rows(&self) -> usize {
        self.duplicate_rows
    }

    /// Rows dropped under `RowPolicy::Skip`
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

impl FromIterator<CohortFrequencyRecord> for CohortIndex {
    /// Build an index directly from records; later duplicates replace earlier ones
    fn from_iter<I: IntoIterator<Item = CohortFrequencyRecord>>(iter: I) -> Self {
        let records = iter
            .into_iter()
            .map(|record| (record.locus.clone(), record))
            .collect();
        Self {
            records,
            duplicate_rows: 0,
            skipped_rows: 0,
        }
    }
}

fn parse_count(
    record: &StringRecord,
    column: Option<usize>,
    line: u64,
    path: &Path,
) -> Result<Option<u64>, TableError> {
    let Some(idx) = column else {
        return Ok(None);
    };
    let value = record.get(idx).map(str::trim).unwrap_or("");
    if value.is_empty() || value == "." {
        return Ok(None);
    }
    value.parse::<u64>().map(Some).map_err(|_| TableError::MalformedRow {
        path: path.to_path_buf(),
        line,
        details: format!("invalid allele count '{}'", value),
    })
}

fn parse_row(
    record: &StringRecord,
    locus_columns: &LocusColumns,
    frequency_columns: &FrequencyColumns,
    path: &Path,
) -> Result<CohortFrequencyRecord, TableError> {
    let line = record_line(record);
    let locus = locus_columns.parse(record, line, path)?;
    let malformed = |details: String| TableError::MalformedRow {
        path: path.to_path_buf(),
        line,
        details,
    };

    let allele_count = parse_count(record, frequency_columns.allele_count, line, path)?;
    let allele_number = parse_count(record, frequency_columns.allele_number, line, path)?;

    let allele_frequency = match frequency_columns.frequency {
        Some(idx) => {
            let raw = record.get(idx).unwrap_or("");
            parse_frequency(raw, ".")
                .map_err(malformed)?
                .ok_or_else(|| malformed("missing cohort allele frequency".to_string()))?
        }
        None => match (allele_count, allele_number) {
            (Some(_), Some(0)) => return Err(malformed("allele number is 0".to_string())),
            (Some(ac), Some(an)) if ac > an => {
                return Err(malformed(format!("allele count {} exceeds allele number {}", ac, an)))
            }
            (Some(ac), Some(an)) => ac as f64 / an as f64,
            _ => return Err(malformed("missing cohort allele count or number".to_string())),
        },
    };

    Ok(CohortFrequencyRecord {
        locus,
        allele_frequency,
        allele_count,
        allele_number,
        line,
    })
}
