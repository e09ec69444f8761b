// ==============================================================================
// parsers/annotation.rs - Multi-Database Annotation Table Loader
// ==============================================================================
// Description: Streams ANNOVAR-style multianno rows as typed annotated variants
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited with a header row; the column set depends on which
// annotation databases were configured upstream.
// Example:
//   Chr  Start  End  Ref  Alt  Func.refGene  Gene.refGene  ExonicFunc.refGene  AF  AF_afr  CLNSIG
//   1    69134  69134  A  G    exonic        OR4F5         nonsynonymous SNV   .   .       .
// ==============================================================================

use csv::StringRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{AnnotationConfig, ReferenceConfig, RowPolicy};
use crate::models::Locus;
use crate::parsers::table::{
    open_table, parse_frequency, record_line, LocusColumns, TableError, TableHeader, TableReader,
};

/// A required field was not present on an annotation row
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Missing required field '{field}' at line {line}")]
pub struct MissingFieldError {
    pub field: String,
    pub line: u64,
}

/// Column layout of one annotation table, shared by all of its rows
#[derive(Debug)]
pub struct AnnotationSchema {
    header: TableHeader,
    locus: LocusColumns,
    function: Option<usize>,
    exonic_function: Option<usize>,
    gene: Option<usize>,
    clinical_significance: Option<usize>,
    global_frequencies: Vec<usize>,
    ancestry_frequencies: Vec<usize>,
    missing_value: String,
}

impl AnnotationSchema {
    /// Resolve semantic fields by column name
    pub fn resolve(
        header: TableHeader,
        annotation: &AnnotationConfig,
        reference: &ReferenceConfig,
        path: &Path,
    ) -> Result<Self, TableError> {
        let locus = LocusColumns::resolve(&header, path)?;

        // Frequency columns are matched by prefix exactly as the annotator names them
        let tag = reference.ancestry_tag.to_lowercase();
        let mut global_frequencies = Vec::new();
        let mut ancestry_frequencies = Vec::new();
        for (idx, name) in header.names().iter().enumerate() {
            if !name.starts_with(&reference.column_prefix) {
                continue;
            }
            if !tag.is_empty() && name.to_lowercase().contains(&tag) {
                ancestry_frequencies.push(idx);
            } else {
                global_frequencies.push(idx);
            }
        }

        let schema = Self {
            locus,
            function: header.position(&annotation.function_column()),
            exonic_function: header.position(&annotation.exonic_function_column()),
            gene: header.position(&annotation.gene_column()),
            clinical_significance: header.position(&annotation.clinical_significance_column),
            global_frequencies,
            ancestry_frequencies,
            missing_value: annotation.missing_value.clone(),
            header,
        };

        if schema.function.is_none() && schema.exonic_function.is_none() {
            warn!(
                "{} has no {} / {} columns; all variants will be scored at the lowest severity",
                path.display(),
                annotation.function_column(),
                annotation.exonic_function_column()
            );
        }

        debug!(
            "Frequency columns: global {:?}, ancestry {:?}",
            schema.column_names(&schema.global_frequencies),
            schema.column_names(&schema.ancestry_frequencies)
        );

        Ok(schema)
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn global_frequency_columns(&self) -> Vec<&str> {
        self.column_names(&self.global_frequencies)
    }

    pub fn ancestry_frequency_columns(&self) -> Vec<&str> {
        self.column_names(&self.ancestry_frequencies)
    }

    fn column_names(&self, indices: &[usize]) -> Vec<&str> {
        indices
            .iter()
            .map(|&idx| self.header.names()[idx].as_str())
            .collect()
    }

    /// Non-missing value of an optional column
    fn optional(&self, record: &StringRecord, column: Option<usize>) -> Option<String> {
        let value = record.get(column?)?.trim();
        if value.is_empty() || value == self.missing_value {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Maximum known frequency over a group of columns
    fn max_frequency(
        &self,
        record: &StringRecord,
        columns: &[usize],
        line: u64,
        path: &Path,
    ) -> Result<Option<f64>, TableError> {
        let mut max: Option<f64> = None;
        for &idx in columns {
            let raw = record.get(idx).unwrap_or("");
            let value = parse_frequency(raw, &self.missing_value).map_err(|details| {
                TableError::MalformedRow {
                    path: path.to_path_buf(),
                    line,
                    details: format!("column '{}': {}", self.header.names()[idx], details),
                }
            })?;
            if let Some(af) = value {
                max = Some(max.map_or(af, |current| current.max(af)));
            }
        }
        Ok(max)
    }

    fn parse_row(
        schema: &Arc<Self>,
        record: StringRecord,
        path: &Path,
    ) -> Result<AnnotatedVariant, TableError> {
        let line = record_line(&record);
        let locus = schema.locus.parse(&record, line, path)?;

        let global_af = schema.max_frequency(&record, &schema.global_frequencies, line, path)?;
        let ancestry_af = schema.max_frequency(&record, &schema.ancestry_frequencies, line, path)?;

        // ANNOVAR separates overlapping genes with ';' and uses ',' inside a gene list
        let genes = schema
            .optional(&record, schema.gene)
            .map(|value| {
                value
                    .split([';', ','])
                    .map(str::trim)
                    .filter(|gene| !gene.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(AnnotatedVariant {
            locus,
            line,
            genes,
            function: schema.optional(&record, schema.function),
            exonic_function: schema.optional(&record, schema.exonic_function),
            global_af,
            ancestry_af,
            clinical_significance: schema.optional(&record, schema.clinical_significance),
            schema: Arc::clone(schema),
            fields: record,
        })
    }
}

/// One row of the annotation table
///
/// Typed fields are resolved once at load time; every original column stays
/// reachable by name through [`AnnotatedVariant::get`].
#[derive(Debug, Clone)]
pub struct AnnotatedVariant {
    pub locus: Locus,

    /// 1-based line in the source file
    pub line: u64,

    /// Gene symbol(s); empty when not annotated
    pub genes: Vec<String>,

    /// Functional consequence class (e.g. "exonic", "intronic", "splicing")
    pub function: Option<String>,

    /// Exonic sub-classification (e.g. "stopgain", "nonsynonymous SNV")
    pub exonic_function: Option<String>,

    /// Maximum over the global population frequency columns, None if unknown
    pub global_af: Option<f64>,

    /// Maximum over the ancestry-specific frequency columns, None if unknown
    pub ancestry_af: Option<f64>,

    /// Clinical significance tag as written (e.g. "Pathogenic/Likely_pathogenic")
    pub clinical_significance: Option<String>,

    schema: Arc<AnnotationSchema>,
    fields: StringRecord,
}

impl AnnotatedVariant {
    /// Raw value of a column, None when the table has no such column
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.schema.header.position(column)?;
        self.fields.get(idx)
    }

    /// Value of a column that must be present and not missing
    pub fn require(&self, column: &str) -> Result<&str, MissingFieldError> {
        match self.get(column).map(str::trim) {
            Some(value) if !value.is_empty() && value != self.schema.missing_value => Ok(value),
            _ => Err(MissingFieldError {
                field: column.to_string(),
                line: self.line,
            }),
        }
    }

    /// All original fields, in original column order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter()
    }

    /// Frequency of the most common external population group
    pub fn reference_af(&self) -> Option<f64> {
        match (self.global_af, self.ancestry_af) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Lazy reader over an annotation table
///
/// Yields one item per data row and is not restartable; open the file again
/// to iterate a second time. Malformed rows are handled per [`RowPolicy`]:
/// with `Skip` they are logged and counted, with `Abort` the error is yielded
/// and iteration ends.
pub struct AnnotationReader {
    path: PathBuf,
    reader: TableReader,
    schema: Arc<AnnotationSchema>,
    policy: RowPolicy,
    max_skipped: usize,
    skipped_count: usize,
    finished: bool,
}

impl AnnotationReader {
    /// Open an annotation table and resolve its columns
    ///
    /// # Example
    /// ```no_run
    /// use zim_prioritisation::config::PrioritisationConfig;
    /// use zim_prioritisation::parsers::AnnotationReader;
    ///
    /// let config = PrioritisationConfig::default();
    /// let reader = AnnotationReader::open("sample.hg38_multianno.txt", &config.annotation, &config.reference)?;
    /// for variant in reader {
    ///     println!("{}", variant?.locus);
    /// }
    /// # Ok::<(), zim_prioritisation::parsers::TableError>(())
    /// ```
    pub fn open(
        path: impl AsRef<Path>,
        annotation: &AnnotationConfig,
        reference: &ReferenceConfig,
    ) -> Result<Self, TableError> {
        let path = path.as_ref();
        let mut reader = open_table(path)?;
        let header = TableHeader::read(&mut reader, path)?;
        let schema = AnnotationSchema::resolve(header, annotation, reference, path)?;

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            schema: Arc::new(schema),
            policy: annotation.malformed_rows,
            max_skipped: annotation.max_skipped_rows,
            skipped_count: 0,
            finished: false,
        })
    }

    pub fn header(&self) -> &TableHeader {
        self.schema.header()
    }

    pub fn schema(&self) -> &AnnotationSchema {
        &self.schema
    }

    /// Rows dropped so far under the `Skip` policy
    pub fn skipped_count(&self) -> usize {
        self.skipped_count
    }

    /// Apply the row policy. Returns the error to yield, or None to continue.
    fn handle_malformed(&mut self, err: TableError) -> Option<TableError> {
        if !err.is_row_level() || self.policy == RowPolicy::Abort {
            return Some(err);
        }

        self.skipped_count += 1;
        warn!("Skipping annotation row: {}", err);

        if self.skipped_count > self.max_skipped {
            return Some(TableError::TooManyMalformedRows {
                path: self.path.clone(),
                count: self.skipped_count,
                max: self.max_skipped,
            });
        }
        None
    }
}

impl Iterator for AnnotationReader {
    type Item = Result<AnnotatedVariant, TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let mut record = StringRecord::new();
            let parsed = match self.reader.read_record(&mut record) {
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Ok(true) => AnnotationSchema::parse_row(&self.schema, record, &self.path),
                Err(err) => Err(TableError::from_csv(&self.path, err)),
            };

            match parsed {
                Ok(variant) => return Some(Ok(variant)),
                Err(err) => {
                    if let Some(fatal) = self.handle_malformed(err) {
                        self.finished = true;
                        return Some(Err(fatal));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrioritisationConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Chr\tStart\tEnd\tRef\tAlt\tFunc.refGene\tGene.refGene\tExonicFunc.refGene\tAF\tAF_afr\tgnomad41_exome_AF\tCLNSIG\n";

    fn create_test_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn open(file: &NamedTempFile, config: &PrioritisationConfig) -> AnnotationReader {
        AnnotationReader::open(file.path(), &config.annotation, &config.reference).unwrap()
    }

    #[test]
    fn test_parse_valid_rows() {
        let contents = format!(
            "{}{}{}",
            HEADER,
            "1\t69134\t69134\tA\tG\texonic\tOR4F5\tnonsynonymous SNV\t0.002\t0.03\t.\t.\n",
            "2\t500\t500\tC\tT\texonic;splicing\tGENE1;GENE2\tstopgain\t.\t.\t.\tPathogenic\n"
        );
        let file = create_test_file(&contents);
        let config = PrioritisationConfig::default();

        let records: Vec<AnnotatedVariant> = open(&file, &config).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.locus, Locus::new("1", 69134, "A", "G"));
        assert_eq!(first.line, 2);
        assert_eq!(first.genes, vec!["OR4F5".to_string()]);
        assert_eq!(first.function.as_deref(), Some("exonic"));
        assert_eq!(first.exonic_function.as_deref(), Some("nonsynonymous SNV"));
        assert_eq!(first.global_af, Some(0.002));
        assert_eq!(first.ancestry_af, Some(0.03));
        assert_eq!(first.reference_af(), Some(0.03));
        assert_eq!(first.clinical_significance, None);

        let second = &records[1];
        assert_eq!(second.genes, vec!["GENE1".to_string(), "GENE2".to_string()]);
        assert_eq!(second.global_af, None);
        assert_eq!(second.reference_af(), None);
        assert_eq!(second.clinical_significance.as_deref(), Some("Pathogenic"));
    }

    #[test]
    fn test_frequency_groups_by_prefix_and_tag() {
        let file = create_test_file(HEADER);
        let config = PrioritisationConfig::default();
        let reader = open(&file, &config);

        // gnomad41_exome_AF does not start with the prefix
        assert_eq!(reader.schema().global_frequency_columns(), vec!["AF"]);
        assert_eq!(reader.schema().ancestry_frequency_columns(), vec!["AF_afr"]);
    }

    #[test]
    fn test_zero_is_not_unknown() {
        let contents = format!("{}1\t1\t1\tA\tG\texonic\tX\tsynonymous SNV\t0\t.\t.\t.\n", HEADER);
        let file = create_test_file(&contents);
        let config = PrioritisationConfig::default();

        let record = open(&file, &config).next().unwrap().unwrap();
        assert_eq!(record.global_af, Some(0.0));
        assert_eq!(record.ancestry_af, None);
    }

    #[test]
    fn test_optional_columns_absent() {
        let file = create_test_file("Chr\tStart\tRef\tAlt\n1\t100\tA\tG\n");
        let config = PrioritisationConfig::default();

        let record = open(&file, &config).next().unwrap().unwrap();
        assert_eq!(record.function, None);
        assert_eq!(record.exonic_function, None);
        assert!(record.genes.is_empty());
        assert_eq!(record.global_af, None);
        assert_eq!(record.clinical_significance, None);
    }

    #[test]
    fn test_named_accessors() {
        let contents = format!("{}1\t100\t100\tA\tG\t.\tX\t.\t.\t.\t.\t.\n", HEADER);
        let file = create_test_file(&contents);
        let config = PrioritisationConfig::default();

        let record = open(&file, &config).next().unwrap().unwrap();
        assert_eq!(record.get("Chr"), Some("1"));
        assert_eq!(record.get("chr"), Some("1"));
        assert_eq!(record.get("NotAColumn"), None);
        assert_eq!(record.require("Gene.refGene"), Ok("X"));

        let err = record.require("Func.refGene").unwrap_err();
        assert_eq!(err.field, "Func.refGene");
        assert_eq!(err.line, 2);
        assert!(record.require("NotAColumn").is_err());

        assert_eq!(record.fields().count(), 12);
    }

    #[test]
    fn test_missing_locus_column_is_header_error() {
        let file = create_test_file("Chr\tStart\tRef\n1\t100\tA\n");
        let config = PrioritisationConfig::default();

        match AnnotationReader::open(file.path(), &config.annotation, &config.reference) {
            Err(TableError::MalformedHeader { .. }) => {}
            other => panic!("Expected MalformedHeader, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_skip_policy_skips_and_counts() {
        let contents = format!(
            "{}{}{}{}",
            HEADER,
            "1\tabc\t1\tA\tG\texonic\tX\tstopgain\t.\t.\t.\t.\n",
            "1\t200\t200\tA\tG\texonic\tX\tstopgain\tnot_a_number\t.\t.\t.\n",
            "1\t300\t300\tA\tG\texonic\tX\tstopgain\t.\t.\t.\t.\n"
        );
        let file = create_test_file(&contents);
        let config = PrioritisationConfig::default();

        let mut reader = open(&file, &config);
        let records: Vec<_> = reader.by_ref().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_ref().unwrap().locus.position, 300);
        assert_eq!(reader.skipped_count(), 2);
    }

    #[test]
    fn test_abort_policy_reports_line() {
        let contents = format!(
            "{}{}{}",
            HEADER,
            "1\t100\t100\tA\tG\texonic\tX\tstopgain\t.\t.\t.\t.\n",
            "1\t\t200\tA\tG\texonic\tX\tstopgain\t.\t.\t.\t.\n"
        );
        let file = create_test_file(&contents);
        let mut config = PrioritisationConfig::default();
        config.annotation.malformed_rows = RowPolicy::Abort;

        let mut reader = open(&file, &config);
        assert!(reader.next().unwrap().is_ok());
        match reader.next().unwrap() {
            Err(TableError::MalformedRow { line, path, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(path, file.path());
            }
            other => panic!("Expected MalformedRow, got {:?}", other),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_too_many_skipped_rows() {
        let contents = format!(
            "{}{}{}",
            HEADER,
            "1\tx\t1\tA\tG\t.\t.\t.\t.\t.\t.\t.\n",
            "1\ty\t1\tA\tG\t.\t.\t.\t.\t.\t.\t.\n"
        );
        let file = create_test_file(&contents);
        let mut config = PrioritisationConfig::default();
        config.annotation.max_skipped_rows = 1;

        let results: Vec<_> = open(&file, &config).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(TableError::TooManyMalformedRows { count: 2, max: 1, .. })
        ));
    }

    #[test]
    fn test_wrong_field_count_is_skipped() {
        let contents = "Chr\tStart\tRef\tAlt\n1\t100\tA\n1\t200\tA\tG\n";
        let file = create_test_file(contents);
        let config = PrioritisationConfig::default();

        let mut reader = open(&file, &config);
        let records: Vec<_> = reader.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].locus.position, 200);
        assert_eq!(reader.skipped_count(), 1);
    }
}
