//! End-to-end prediction and summary.
//!
//! [`PipelineConfig`] collects the run options and validates them at build
//! time. [`KfsPipeline::run`] scores an input table against a replicate
//! collection and summarizes the result:
//!
//! ```
//! use urbankfs::pipeline::{KfsPipeline, PipelineConfig};
//! use urbankfs::testing::{blocky_table, rf2_replicate};
//! use urbankfs::model::ReplicateCollection;
//!
//! let replicates = ReplicateCollection::from_replicates(vec![
//!     rf2_replicate(1, vec![12.5, 9.0]),
//!     rf2_replicate(2, vec![13.0, 8.5]),
//! ])
//! .unwrap();
//!
//! let pipeline = KfsPipeline::new(PipelineConfig::builder().n_threads(1).build().unwrap());
//! let output = pipeline.run(&blocky_table(), &replicates).unwrap();
//! assert_eq!(output.predictions.len(), 4);
//! assert_eq!(output.summary.len(), 2);
//! assert!(output.failures.is_empty());
//! ```

use bon::Builder;

use crate::data::SoilTable;
use crate::inference::{BootstrapOutput, BootstrapPredictor, FailureReport, PredictionTable, ValidationError};
use crate::logger::{PipelineLogger, Verbosity};
use crate::model::ReplicateCollection;
use crate::summary::{validate_quantiles, Summarizer, SummaryError, SummaryTable, DEFAULT_QUANTILES};
use crate::utils::{run_with_threads, Parallelism};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Quantile list rejected by [`validate_quantiles`].
    Quantiles(SummaryError),
    /// Texture tolerance must be finite and non-negative.
    InvalidTextureTolerance(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quantiles(e) => write!(f, "invalid quantiles: {}", e),
            Self::InvalidTextureTolerance(v) => {
                write!(f, "texture_tolerance must be finite and non-negative, got {}", v)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// PipelineConfig
// =============================================================================

/// Options for a prediction-and-summary run.
///
/// # Example
///
/// ```
/// use urbankfs::pipeline::PipelineConfig;
/// use urbankfs::logger::Verbosity;
///
/// let config = PipelineConfig::builder()
///     .quantiles(vec![0.025, 0.5, 0.975])
///     .verbosity(Verbosity::Info)
///     .build()
///     .unwrap();
/// assert_eq!(config.n_threads, 0);
///
/// assert!(PipelineConfig::builder().quantiles(vec![1.5]).build().is_err());
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct PipelineConfig {
    /// Quantile fractions to report, each rounding to a permille code in
    /// 1..=999. Default: 0.05, 0.5, 0.95.
    #[builder(default = DEFAULT_QUANTILES.to_vec())]
    pub quantiles: Vec<f64>,

    /// Worker threads for replicate scoring. 0 = auto, 1 = sequential.
    #[builder(default)]
    pub n_threads: usize,

    /// Allowed distance of sand + silt + clay from 100, in percentage points.
    /// Default: 1.0.
    #[builder(default = 1.0)]
    pub texture_tolerance: f64,

    /// Map field structure descriptions onto the canonical vocabulary
    /// before encoding. Default: off.
    #[builder(default)]
    pub canonicalize_structure: bool,

    /// Verbosity level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

/// Custom finishing function that validates the config.
impl<S: pipeline_config_builder::IsComplete> PipelineConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for quantiles without a distinct three-digit
    /// column name, or a negative or non-finite tolerance.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_quantiles(&self.quantiles).map_err(ConfigError::Quantiles)?;

        if !self.texture_tolerance.is_finite() || self.texture_tolerance < 0.0 {
            return Err(ConfigError::InvalidTextureTolerance(self.texture_tolerance));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config is valid")
    }
}

// =============================================================================
// KfsPipeline
// =============================================================================

/// Fatal errors of a pipeline run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Summary(#[from] SummaryError),
}

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub predictions: PredictionTable,
    pub summary: SummaryTable,
    /// Replicates whose rows are missing from `predictions`.
    pub failures: FailureReport,
}

impl PipelineOutput {
    /// Whether every replicate contributed.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Scores input tables against a replicate collection and summarizes them.
#[derive(Debug, Clone, Default)]
pub struct KfsPipeline {
    config: PipelineConfig,
}

impl KfsPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn predictor(&self, parallelism: Parallelism) -> BootstrapPredictor {
        BootstrapPredictor::new()
            .with_texture_tolerance(self.config.texture_tolerance)
            .with_parallelism(parallelism)
            .with_verbosity(self.config.verbosity)
    }

    fn prepare(&self, table: &SoilTable) -> Option<SoilTable> {
        self.config.canonicalize_structure.then(|| table.with_canonical_structure())
    }

    /// Bootstrap predictions only, without the summary.
    pub fn predict(
        &self,
        table: &SoilTable,
        collection: &ReplicateCollection,
    ) -> Result<BootstrapOutput, PipelineError> {
        let prepared = self.prepare(table);
        let table = prepared.as_ref().unwrap_or(table);
        run_with_threads(self.config.n_threads, |parallelism| {
            Ok(self.predictor(parallelism).run(table, collection)?)
        })
    }

    /// Predict every record with every replicate and summarize per record
    /// and configuration.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Validation`] if the table lacks a column some
    ///   configuration needs; no replicate runs in that case.
    /// - [`PipelineError::Summary`] if no prediction rows were produced.
    pub fn run(
        &self,
        table: &SoilTable,
        collection: &ReplicateCollection,
    ) -> Result<PipelineOutput, PipelineError> {
        let summarizer = Summarizer::new(self.config.quantiles.clone())?;
        let BootstrapOutput { predictions, failures } = self.predict(table, collection)?;

        let summary = summarizer.summarize(&predictions)?;
        PipelineLogger::new(self.config.verbosity).log_summary(
            predictions.len(),
            summary.len(),
            summarizer.quantiles(),
        );

        Ok(PipelineOutput { predictions, summary, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SoilRecord;
    use crate::model::ModelConfig;
    use crate::testing::{blocky_table, failing_replicate, rf2_replicate};
    use approx::assert_abs_diff_eq;

    fn replicates() -> ReplicateCollection {
        ReplicateCollection::from_replicates(vec![
            rf2_replicate(1, vec![12.5, 9.0]),
            rf2_replicate(2, vec![13.0, 8.5]),
        ])
        .unwrap()
    }

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.quantiles, vec![0.05, 0.5, 0.95]);
        assert_eq!(config.n_threads, 0);
        assert_eq!(config.texture_tolerance, 1.0);
        assert!(!config.canonicalize_structure);
        assert_eq!(config.verbosity, Verbosity::Silent);
    }

    #[test]
    fn invalid_configs_rejected() {
        assert_eq!(
            PipelineConfig::builder().quantiles(vec![0.5, 0.0]).build().unwrap_err(),
            ConfigError::Quantiles(SummaryError::InvalidQuantile(0.0))
        );
        assert_eq!(
            PipelineConfig::builder().quantiles(vec![0.9996]).build().unwrap_err(),
            ConfigError::Quantiles(SummaryError::InvalidQuantile(0.9996))
        );
        assert_eq!(
            PipelineConfig::builder().quantiles(vec![0.5, 0.5]).build().unwrap_err(),
            ConfigError::Quantiles(SummaryError::DuplicateQuantileColumn("q500".into()))
        );
        assert_eq!(
            PipelineConfig::builder().texture_tolerance(-1.0).build().unwrap_err(),
            ConfigError::InvalidTextureTolerance(-1.0)
        );
    }

    #[test]
    fn run_summarizes_scenario() {
        let output = KfsPipeline::default().run(&blocky_table(), &replicates()).unwrap();
        assert!(output.is_complete());
        assert_eq!(output.predictions.len(), 4);

        let first = &output.summary.rows()[0];
        assert_abs_diff_eq!(first.mean, 12.75, epsilon = 1e-12);
        assert_abs_diff_eq!(first.quantile("q950").unwrap(), 12.975, epsilon = 1e-12);
    }

    #[test]
    fn thread_counts_agree() {
        let table = blocky_table();
        let sequential = KfsPipeline::new(PipelineConfig::builder().n_threads(1).build().unwrap())
            .run(&table, &replicates())
            .unwrap();
        let pooled = KfsPipeline::new(PipelineConfig::builder().n_threads(2).build().unwrap())
            .run(&table, &replicates())
            .unwrap();
        assert_eq!(sequential.predictions, pooled.predictions);
        assert_eq!(sequential.summary, pooled.summary);
    }

    #[test]
    fn failures_reported_alongside_summary() {
        let mut collection = replicates();
        collection.push(failing_replicate(7, ModelConfig::rf(false, true))).unwrap();
        let output = KfsPipeline::default().run(&blocky_table(), &collection).unwrap();
        assert!(!output.is_complete());
        assert_eq!(output.failures.sample_ids(), vec![7]);
        assert_eq!(output.summary.rows()[0].count, 2);
    }

    #[test]
    fn all_replicates_failing_is_fatal() {
        let collection =
            ReplicateCollection::from_replicates(vec![failing_replicate(1, ModelConfig::rf(false, false))])
                .unwrap();
        let err = KfsPipeline::default().run(&blocky_table(), &collection).unwrap_err();
        assert_eq!(err, PipelineError::Summary(SummaryError::EmptyGroup));
    }

    #[test]
    fn missing_structure_is_fatal() {
        let table = SoilTable::from_records(vec![SoilRecord::new(14.0, 63.0, 23.0)]);
        let err = KfsPipeline::default().run(&table, &replicates()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn canonicalization_maps_field_descriptions() {
        let table = SoilTable::from_records(vec![
            SoilRecord::new(14.0, 63.0, 23.0).with_structure_type("subangular blocky"),
            SoilRecord::new(18.0, 59.0, 23.0).with_structure_type("blocky"),
        ]);
        let raw = KfsPipeline::default().predict(&table, &replicates()).unwrap();
        assert_eq!(raw.failures.len(), 2);

        let config = PipelineConfig::builder().canonicalize_structure(true).build().unwrap();
        let output = KfsPipeline::new(config).run(&table, &replicates()).unwrap();
        assert!(output.is_complete());
        assert_eq!(output.summary.rows()[0].record.structure_type(), Some("blocky"));
    }
}
