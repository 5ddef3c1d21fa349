//! Bootstrap prediction: every input record scored by every replicate.
//!
//! The input table is held fixed and each replicate scores it in a single
//! batch call. Column coverage is checked for every distinct configuration
//! before any replicate runs. A replicate that fails contributes no rows
//! and is recorded in the [`FailureReport`] instead.

use std::fmt;

use ndarray::Array1;
use serde::Serialize;

use super::adapter::{BatchPredict, ModelAdapter, PredictionError};
use crate::data::{Column, SoilRecord, SoilTable};
use crate::encode::FeatureEncoder;
use crate::logger::{PipelineLogger, Verbosity};
use crate::model::{FittedReplicate, ModelConfig, ReplicateCollection, SampleId};
use crate::utils::Parallelism;

// =============================================================================
// Output rows
// =============================================================================

/// One record scored by one replicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRow {
    #[serde(flatten)]
    pub record: SoilRecord,
    pub sample_id: SampleId,
    #[serde(rename = "model_type", serialize_with = "crate::model::config::serialize_label")]
    pub config: ModelConfig,
    /// Predicted conductivity in physical units.
    pub kfs: f64,
}

impl PredictionRow {
    #[inline]
    pub fn model_type(&self) -> &'static str {
        self.config.label()
    }
}

/// Long-form prediction output, replicate-major.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PredictionTable {
    rows: Vec<PredictionRow>,
}

impl PredictionTable {
    pub fn from_rows(rows: Vec<PredictionRow>) -> Self {
        Self { rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn rows(&self) -> &[PredictionRow] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredictionRow> {
        self.rows.iter()
    }

    /// Rows produced by one bootstrap sample.
    pub fn for_sample(&self, sample_id: SampleId) -> impl Iterator<Item = &PredictionRow> {
        self.rows.iter().filter(move |r| r.sample_id == sample_id)
    }

    /// Predicted values in row order.
    pub fn kfs(&self) -> Array1<f64> {
        self.rows.iter().map(|r| r.kfs).collect()
    }

    pub fn into_rows(self) -> Vec<PredictionRow> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a PredictionTable {
    type Item = &'a PredictionRow;
    type IntoIter = std::slice::Iter<'a, PredictionRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl FromIterator<PredictionRow> for PredictionTable {
    fn from_iter<I: IntoIterator<Item = PredictionRow>>(iter: I) -> Self {
        Self { rows: iter.into_iter().collect() }
    }
}

// =============================================================================
// Failures
// =============================================================================

/// One replicate that could not score the input table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("replicate {sample_id} ({config}) failed")]
pub struct PartialFailure {
    pub sample_id: SampleId,
    pub config: ModelConfig,
    #[source]
    pub cause: PredictionError,
}

/// Side-channel report of failed replicates, in replicate order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureReport {
    failures: Vec<PartialFailure>,
}

impl FailureReport {
    #[inline]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartialFailure> {
        self.failures.iter()
    }

    pub fn sample_ids(&self) -> Vec<SampleId> {
        self.failures.iter().map(|f| f.sample_id).collect()
    }

    pub fn contains(&self, sample_id: SampleId) -> bool {
        self.failures.iter().any(|f| f.sample_id == sample_id)
    }

    fn push(&mut self, failure: PartialFailure) {
        self.failures.push(failure);
    }
}

impl<'a> IntoIterator for &'a FailureReport {
    type Item = &'a PartialFailure;
    type IntoIter = std::slice::Iter<'a, PartialFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.iter()
    }
}

/// A configuration in the collection needs a column the table lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingRequirement {
    pub config: ModelConfig,
    pub column: Column,
}

impl fmt::Display for MissingRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires {}", self.config, self.column)
    }
}

/// Pre-flight column coverage failure. Lists every unmet requirement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
    pub missing: Vec<MissingRequirement>,
}

impl ValidationError {
    /// Distinct missing columns, in first-occurrence order.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        for requirement in &self.missing {
            if !columns.contains(&requirement.column) {
                columns.push(requirement.column);
            }
        }
        columns
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input table is missing {} required column(s): ", self.missing.len())?;
        for (i, requirement) in self.missing.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{requirement}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Predictor
// =============================================================================

/// Successful rows plus the report of replicates that failed.
#[derive(Debug, Clone, Default)]
pub struct BootstrapOutput {
    pub predictions: PredictionTable,
    pub failures: FailureReport,
}

/// Scores a fixed input table against a collection of replicates.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapPredictor {
    texture_tolerance: f64,
    parallelism: Parallelism,
    verbosity: Verbosity,
}

impl Default for BootstrapPredictor {
    fn default() -> Self {
        Self {
            texture_tolerance: FeatureEncoder::DEFAULT_TEXTURE_TOLERANCE,
            parallelism: Parallelism::Sequential,
            verbosity: Verbosity::Silent,
        }
    }
}

impl BootstrapPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_texture_tolerance(mut self, tolerance: f64) -> Self {
        self.texture_tolerance = tolerance;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Check that `table` provides every column each configuration needs.
    pub fn validate(
        &self,
        table: &SoilTable,
        collection: &ReplicateCollection,
    ) -> Result<(), ValidationError> {
        let missing: Vec<_> = collection
            .configs()
            .into_iter()
            .flat_map(|config| {
                config
                    .required_columns()
                    .into_iter()
                    .filter(|&column| !table.has_column(column))
                    .map(move |column| MissingRequirement { config, column })
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }

    /// Score `table` with every replicate in `collection`.
    ///
    /// Rows are emitted replicate-major in collection order, records in
    /// table order within each replicate.
    pub fn run(
        &self,
        table: &SoilTable,
        collection: &ReplicateCollection,
    ) -> Result<BootstrapOutput, ValidationError> {
        self.validate(table, collection)?;

        let mut logger = PipelineLogger::new(self.verbosity);
        logger.start_run(table.len(), collection.len(), collection.configs().len());

        let outcomes = self
            .parallelism
            .maybe_par_map(collection.as_slice(), |replicate| self.score(table, replicate));

        let mut rows = Vec::with_capacity(table.len() * collection.len());
        let mut failures = FailureReport::default();
        for (replicate, outcome) in collection.iter().zip(outcomes) {
            match outcome {
                Ok(kfs) => {
                    logger.log_replicate(replicate.sample_id(), replicate.config(), kfs.len());
                    rows.extend(table.iter().zip(kfs.iter()).map(|(record, &kfs)| PredictionRow {
                        record: record.clone(),
                        sample_id: replicate.sample_id(),
                        config: *replicate.config(),
                        kfs,
                    }));
                }
                Err(cause) => {
                    logger.log_partial_failure(replicate.sample_id(), replicate.config(), &cause);
                    failures.push(PartialFailure {
                        sample_id: replicate.sample_id(),
                        config: *replicate.config(),
                        cause,
                    });
                }
            }
        }

        logger.finish_run(rows.len(), failures.len());
        Ok(BootstrapOutput { predictions: PredictionTable::from_rows(rows), failures })
    }

    fn score(&self, table: &SoilTable, replicate: &FittedReplicate) -> Result<Array1<f64>, PredictionError> {
        let encoder = FeatureEncoder::new(*replicate.config()).with_texture_tolerance(self.texture_tolerance);
        ModelAdapter::for_replicate(replicate, encoder).predict(table)
    }
}
