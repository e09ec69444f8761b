// ==============================================================================
// parsers/mod.rs - Input table parsers
// ==============================================================================
// Description: Loaders for the annotation table and the cohort frequency table
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod annotation;
pub mod cohort;
pub mod table;

pub use annotation::{AnnotatedVariant, AnnotationReader, AnnotationSchema, MissingFieldError};
pub use cohort::{CohortFrequencyRecord, CohortIndex};
pub use table::{TableError, TableHeader};
