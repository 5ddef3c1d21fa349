//! Test fixtures shared by unit tests, integration tests and benches.
//!
//! Provides small deterministic handles whose outputs are easy to reason
//! about, plus the two-record blocky-soil table used in several scenarios.

use ndarray::{Array1, ArrayView2};

use crate::data::{SoilRecord, SoilTable};
use crate::model::{
    FittedReplicate, ForestHandle, HandleError, ModelConfig, ModelFit, NetworkHandle, SampleId,
};

/// Default absolute tolerance for comparing summary statistics.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Network computing `x · weights + bias`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearNetwork {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearNetwork {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    /// Three-input network returning `percent_sand / 100`.
    pub fn sand_fraction() -> Self {
        Self::new(vec![0.01, 0.0, 0.0], 0.0)
    }
}

impl NetworkHandle for LinearNetwork {
    fn compute(&self, features: ArrayView2<f64>) -> Result<Array1<f64>, HandleError> {
        HandleError::check_width(&features, self.weights.len())?;
        Ok(features
            .rows()
            .into_iter()
            .map(|row| row.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>() + self.bias)
            .collect())
    }
}

/// Forest returning a fixed prediction per row, whatever the features.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantForest {
    values: Vec<f64>,
}

impl ConstantForest {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

impl ForestHandle for ConstantForest {
    fn predict_mean(&self, _features: ArrayView2<f64>) -> Result<Array1<f64>, HandleError> {
        Ok(Array1::from(self.values.clone()))
    }
}

/// Handle that always fails.
#[derive(Debug, Clone, PartialEq)]
pub struct FailingHandle {
    message: String,
}

impl FailingHandle {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl NetworkHandle for FailingHandle {
    fn compute(&self, _features: ArrayView2<f64>) -> Result<Array1<f64>, HandleError> {
        Err(HandleError::Other(self.message.clone()))
    }
}

impl ForestHandle for FailingHandle {
    fn predict_mean(&self, _features: ArrayView2<f64>) -> Result<Array1<f64>, HandleError> {
        Err(HandleError::Other(self.message.clone()))
    }
}

/// Two silt-loam records with blocky structure.
pub fn blocky_table() -> SoilTable {
    SoilTable::from_records(vec![
        SoilRecord::new(14.0, 63.0, 23.0).with_structure_type("blocky"),
        SoilRecord::new(18.0, 59.0, 23.0).with_structure_type("blocky"),
    ])
}

/// `rf2` replicate predicting fixed per-row values.
pub fn rf2_replicate(sample_id: SampleId, values: Vec<f64>) -> FittedReplicate {
    FittedReplicate::new(
        sample_id,
        ModelConfig::rf(false, true),
        ModelFit::forest(ConstantForest::new(values)),
    )
    .expect("forest handle matches rf config")
}

/// Replicate of `config` whose handle always fails.
pub fn failing_replicate(sample_id: SampleId, config: ModelConfig) -> FittedReplicate {
    let fit = match config.family {
        crate::model::ModelFamily::Ann => ModelFit::network(
            FailingHandle::new(format!("replicate {sample_id} diverged")),
            crate::model::ScaleFactors::new(0.0, 1.0).expect("valid range"),
        ),
        crate::model::ModelFamily::Rf => {
            ModelFit::forest(FailingHandle::new(format!("replicate {sample_id} diverged")))
        }
    };
    FittedReplicate::new(sample_id, config, fit).expect("handle matches config family")
}
