//! Verbosity-gated progress logging.
//!
//! [`PipelineLogger`] follows a run from start to finish and emits
//! structured `tracing` events. Nothing is printed unless the embedding
//! application installs a subscriber, and nothing is emitted above the
//! configured [`Verbosity`].

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{ModelConfig, SampleId};

/// Logging verbosity, ordered from quietest to loudest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    #[default]
    Silent,
    Warning,
    Info,
    Debug,
}

/// Run-scoped logger.
#[derive(Debug)]
pub struct PipelineLogger {
    verbosity: Verbosity,
    started: Option<Instant>,
}

impl PipelineLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity, started: None }
    }

    #[inline]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    #[inline]
    fn enabled(&self, level: Verbosity) -> bool {
        self.verbosity >= level
    }

    pub fn start_run(&mut self, n_records: usize, n_replicates: usize, n_configs: usize) {
        self.started = Some(Instant::now());
        if self.enabled(Verbosity::Info) {
            info!(
                records = n_records,
                replicates = n_replicates,
                configs = n_configs,
                "scoring bootstrap replicates"
            );
        }
    }

    pub fn log_replicate(&self, sample_id: SampleId, config: &ModelConfig, n_predictions: usize) {
        if self.enabled(Verbosity::Debug) {
            debug!(sample_id, model_type = config.label(), predictions = n_predictions, "replicate scored");
        }
    }

    pub fn log_partial_failure(&self, sample_id: SampleId, config: &ModelConfig, cause: &dyn std::fmt::Display) {
        if self.enabled(Verbosity::Warning) {
            warn!(sample_id, model_type = config.label(), cause = %cause, "replicate failed, rows omitted");
        }
    }

    pub fn log_summary(&self, n_rows: usize, n_groups: usize, quantiles: &[f64]) {
        if self.enabled(Verbosity::Info) {
            info!(rows = n_rows, groups = n_groups, quantiles = ?quantiles, "summarized predictions");
        }
    }

    pub fn finish_run(&mut self, n_rows: usize, n_failures: usize) {
        let elapsed_ms = self.started.take().map(|t| t.elapsed().as_millis()).unwrap_or_default();
        if n_failures > 0 && self.enabled(Verbosity::Warning) {
            warn!(rows = n_rows, failures = n_failures, elapsed_ms, "bootstrap run finished with failures");
        } else if self.enabled(Verbosity::Info) {
            info!(rows = n_rows, elapsed_ms, "bootstrap run finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_is_ordered() {
        assert!(Verbosity::Silent < Verbosity::Warning);
        assert!(Verbosity::Warning < Verbosity::Info);
        assert!(Verbosity::Info < Verbosity::Debug);
        assert_eq!(Verbosity::default(), Verbosity::Silent);
    }

    #[test]
    fn gating_follows_verbosity() {
        let logger = PipelineLogger::new(Verbosity::Warning);
        assert!(logger.enabled(Verbosity::Warning));
        assert!(!logger.enabled(Verbosity::Info));
    }

    #[test]
    fn lifecycle_runs_under_a_subscriber() {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        tracing::subscriber::with_default(subscriber, || {
            let mut logger = PipelineLogger::new(Verbosity::Debug);
            logger.start_run(2, 3, 1);
            logger.log_replicate(1, &ModelConfig::rf(false, true), 2);
            logger.log_partial_failure(7, &ModelConfig::ann(false), &"diverged");
            logger.log_summary(4, 2, &[0.05, 0.5, 0.95]);
            logger.finish_run(4, 1);
            assert!(logger.started.is_none());
        });
    }
}
