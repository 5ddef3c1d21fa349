//! Uniform prediction over network and forest replicates.
//!
//! [`ModelAdapter`] is resolved once per replicate from its config's
//! family and then scores whole tables:
//!
//! - [`NetworkAdapter`]: encode → forward compute → rescale → target inverse
//! - [`ForestAdapter`]: encode → ensemble mean (already in physical units)

use ndarray::Array1;

use crate::data::SoilTable;
use crate::encode::{EncodeError, FeatureEncoder};
use crate::model::{
    ForestHandle, HandleError, ModelFamily, ModelFit, FittedReplicate, NetworkFit,
};

/// Failure to score one replicate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    #[error("feature encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("model invocation failed: {0}")]
    Handle(#[from] HandleError),

    #[error("model returned {got} predictions for {expected} rows")]
    OutputLength { expected: usize, got: usize },
}

/// Batch prediction in physical units.
pub trait BatchPredict {
    /// Predict conductivity for every record in `table`, in row order.
    fn predict(&self, table: &SoilTable) -> Result<Array1<f64>, PredictionError>;
}

fn check_len(predictions: &Array1<f64>, expected: usize) -> Result<(), PredictionError> {
    if predictions.len() == expected {
        Ok(())
    } else {
        Err(PredictionError::OutputLength { expected, got: predictions.len() })
    }
}

/// Scores a network replicate.
#[derive(Debug, Clone, Copy)]
pub struct NetworkAdapter<'a> {
    encoder: FeatureEncoder,
    fit: &'a NetworkFit,
}

impl<'a> NetworkAdapter<'a> {
    pub fn new(encoder: FeatureEncoder, fit: &'a NetworkFit) -> Self {
        Self { encoder, fit }
    }
}

impl BatchPredict for NetworkAdapter<'_> {
    fn predict(&self, table: &SoilTable) -> Result<Array1<f64>, PredictionError> {
        let features = self.encoder.encode(table)?;
        let mut predictions = self.fit.handle().compute(features.view())?;
        check_len(&predictions, table.len())?;

        self.fit.scale_factors().rescale_inplace(predictions.view_mut());
        self.fit.target_transform().inverse_inplace(predictions.view_mut());
        Ok(predictions)
    }
}

/// Scores a forest replicate.
#[derive(Debug, Clone, Copy)]
pub struct ForestAdapter<'a> {
    encoder: FeatureEncoder,
    handle: &'a dyn ForestHandle,
}

impl<'a> ForestAdapter<'a> {
    pub fn new(encoder: FeatureEncoder, handle: &'a dyn ForestHandle) -> Self {
        Self { encoder, handle }
    }
}

impl BatchPredict for ForestAdapter<'_> {
    fn predict(&self, table: &SoilTable) -> Result<Array1<f64>, PredictionError> {
        let features = self.encoder.encode(table)?;
        let predictions = self.handle.predict_mean(features.view())?;
        check_len(&predictions, table.len())?;
        Ok(predictions)
    }
}

/// Closed set of prediction strategies.
#[derive(Debug, Clone, Copy)]
pub enum ModelAdapter<'a> {
    Network(NetworkAdapter<'a>),
    Forest(ForestAdapter<'a>),
}

impl<'a> ModelAdapter<'a> {
    /// Select the adapter for a replicate from its config's family.
    pub fn for_replicate(replicate: &'a FittedReplicate, encoder: FeatureEncoder) -> Self {
        match (replicate.config().family, replicate.fit()) {
            (ModelFamily::Ann, ModelFit::Network(fit)) => {
                ModelAdapter::Network(NetworkAdapter::new(encoder, fit))
            }
            (ModelFamily::Rf, ModelFit::Forest(handle)) => {
                ModelAdapter::Forest(ForestAdapter::new(encoder, handle.as_ref()))
            }
            (family, fit) => unreachable!(
                "FittedReplicate::new pairs {family:?} configs with {:?} handles",
                fit.family()
            ),
        }
    }
}

impl BatchPredict for ModelAdapter<'_> {
    fn predict(&self, table: &SoilTable) -> Result<Array1<f64>, PredictionError> {
        match self {
            ModelAdapter::Network(adapter) => adapter.predict(table),
            ModelAdapter::Forest(adapter) => adapter.predict(table),
        }
    }
}
