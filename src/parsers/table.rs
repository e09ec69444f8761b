// ==============================================================================
// parsers/table.rs - Shared Tab-Delimited Table Handling
// ==============================================================================
// Description: Opening, header resolution and field parsing for TSV inputs
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Both inputs are UTF-8, tab-delimited, newline-terminated, with one header
// row. Line numbers are 1-based and count the header as line 1.
// ==============================================================================

use csv::{ReaderBuilder, StringRecord};
use flate2::read::MultiGzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Locus;

/// Reader over either a plain or a gzip-compressed table
pub type TableReader = csv::Reader<Box<dyn Read>>;

/// Errors raised while loading either input table
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Input file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Malformed header in {}: {details}", path.display())]
    MalformedHeader { path: PathBuf, details: String },

    #[error("Malformed row in {} at line {line}: {details}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: u64,
        details: String,
    },

    #[error(
        "Duplicate locus {locus} in {} at line {line} (first seen at line {first_line}) with a different frequency",
        path.display()
    )]
    DuplicateKey {
        path: PathBuf,
        locus: String,
        line: u64,
        first_line: u64,
    },

    #[error("Too many malformed rows in {}: {count} > {max}", path.display())]
    TooManyMalformedRows {
        path: PathBuf,
        count: usize,
        max: usize,
    },

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TableError {
    /// Row-level problems are subject to the configured row policy;
    /// everything else is always fatal
    pub fn is_row_level(&self) -> bool {
        matches!(self, TableError::MalformedRow { .. })
    }

    /// Classify a csv read error. I/O failures stay fatal, the rest
    /// (bad UTF-8, wrong field count) describe a single row.
    pub fn from_csv(path: &Path, err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        if err.is_io_error() {
            return match err.into_kind() {
                csv::ErrorKind::Io(source) => TableError::Io {
                    path: path.to_path_buf(),
                    source,
                },
                other => TableError::MalformedRow {
                    path: path.to_path_buf(),
                    line,
                    details: format!("{:?}", other),
                },
            };
        }

        let details = match err.kind() {
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => format!("expected {} tab-delimited fields, found {}", expected_len, len),
            csv::ErrorKind::Utf8 { .. } => "row is not valid UTF-8".to_string(),
            _ => err.to_string(),
        };

        TableError::MalformedRow {
            path: path.to_path_buf(),
            line,
            details,
        }
    }
}

/// Open a tab-delimited table, decompressing `.gz` inputs transparently
///
/// A missing path is reported as `FileNotFound` before anything is read.
pub fn open_table(path: &Path) -> Result<TableReader, TableError> {
    if !path.is_file() {
        return Err(TableError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let inner: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    // ANNOVAR output is never quoted and free-text columns may contain '"'
    Ok(ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .quoting(false)
        .flexible(false)
        .from_reader(inner))
}

/// Column names of a table, resolvable by name
#[derive(Debug, Clone)]
pub struct TableHeader {
    names: Vec<String>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl TableHeader {
    /// Build from a header record; repeated names resolve to their first column
    pub fn from_record(record: &StringRecord) -> Self {
        let names: Vec<String> = record.iter().map(|name| name.trim().to_string()).collect();

        let mut exact = HashMap::new();
        let mut folded = HashMap::new();
        for (idx, name) in names.iter().enumerate() {
            exact.entry(name.clone()).or_insert(idx);
            folded.entry(name.to_lowercase()).or_insert(idx);
        }

        Self {
            names,
            exact,
            folded,
        }
    }

    /// Read the header row of an opened table
    pub fn read(reader: &mut TableReader, path: &Path) -> Result<Self, TableError> {
        let record = reader
            .headers()
            .map_err(|err| match TableError::from_csv(path, err) {
                TableError::MalformedRow { details, .. } => TableError::MalformedHeader {
                    path: path.to_path_buf(),
                    details,
                },
                other => other,
            })?;

        let header = Self::from_record(record);
        if header.names.iter().all(|name| name.is_empty()) {
            return Err(TableError::MalformedHeader {
                path: path.to_path_buf(),
                details: "file is empty or has no header row".to_string(),
            });
        }

        Ok(header)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column index by name; an exact match wins over a case-insensitive one
    pub fn position(&self, name: &str) -> Option<usize> {
        self.exact
            .get(name)
            .or_else(|| self.folded.get(&name.to_lowercase()))
            .copied()
    }

    /// Column index of a column the table cannot be used without
    pub fn require(&self, name: &str, path: &Path) -> Result<usize, TableError> {
        self.position(name).ok_or_else(|| TableError::MalformedHeader {
            path: path.to_path_buf(),
            details: format!(
                "required column '{}' not found (case-insensitive). Got: {:?}",
                name, self.names
            ),
        })
    }

    /// Fail when any of `names` already exists in this header, in any case
    pub fn reject_columns(&self, names: &[String], path: &Path) -> Result<(), TableError> {
        for name in names {
            if self.exact.contains_key(name) || self.folded.contains_key(&name.to_lowercase()) {
                return Err(TableError::MalformedHeader {
                    path: path.to_path_buf(),
                    details: format!(
                        "column '{}' is reserved for prioritisation output",
                        name
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Indices of the four locus identity columns
#[derive(Debug, Clone, Copy)]
pub struct LocusColumns {
    chromosome: usize,
    position: usize,
    ref_allele: usize,
    alt_allele: usize,
}

impl LocusColumns {
    pub fn resolve(header: &TableHeader, path: &Path) -> Result<Self, TableError> {
        Ok(Self {
            chromosome: header.require("Chr", path)?,
            position: header.require("Start", path)?,
            ref_allele: header.require("Ref", path)?,
            alt_allele: header.require("Alt", path)?,
        })
    }

    /// Parse the locus of one data row
    pub fn parse(&self, record: &StringRecord, line: u64, path: &Path) -> Result<Locus, TableError> {
        let malformed = |details: String| TableError::MalformedRow {
            path: path.to_path_buf(),
            line,
            details,
        };

        let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

        let chromosome = field(self.chromosome);
        if chromosome.is_empty() {
            return Err(malformed("empty chromosome".to_string()));
        }

        let position_str = field(self.position);
        let position = position_str
            .parse::<u64>()
            .map_err(|_| malformed(format!("invalid position '{}'", position_str)))?;

        let ref_allele = field(self.ref_allele);
        if ref_allele.is_empty() {
            return Err(malformed("empty reference allele".to_string()));
        }

        let alt_allele = field(self.alt_allele);
        if alt_allele.is_empty() {
            return Err(malformed("empty alternate allele".to_string()));
        }

        Ok(Locus::new(chromosome, position, ref_allele, alt_allele))
    }
}

/// Parse an allele frequency field
///
/// # Returns
/// * `Ok(None)` - empty or equal to the missing-value sentinel ("unknown")
/// * `Ok(Some(af))` - a frequency within [0, 1]
/// * `Err(details)` - anything else; never coerced to zero
pub fn parse_frequency(raw: &str, missing_value: &str) -> Result<Option<f64>, String> {
    let value = raw.trim();
    if value.is_empty() || value == missing_value {
        return Ok(None);
    }

    let af = value
        .parse::<f64>()
        .map_err(|_| format!("invalid allele frequency '{}'", value))?;

    if !af.is_finite() || !(0.0..=1.0).contains(&af) {
        return Err(format!("allele frequency '{}' outside [0, 1]", value));
    }

    Ok(Some(af))
}

/// Line number of a record read from a table, header being line 1
pub fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}
