//! Trained-model handles.
//!
//! The fitting subsystem owns the trained models; this crate only needs to
//! invoke them. [`NetworkHandle`] and [`ForestHandle`] are the two
//! capabilities the adapters rely on. The crate ships one implementation
//! of each ([`Mlp`](super::Mlp), [`RandomForest`](super::RandomForest)),
//! and callers can plug in their own.

use std::fmt;

use ndarray::{Array1, ArrayView2};

use super::forest::RandomForest;
use super::network::Mlp;

/// Failure reported by a trained-model handle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandleError {
    /// Input matrix has the wrong number of columns.
    #[error("expected {expected} input features, got {got}")]
    FeatureCountMismatch { expected: usize, got: usize },

    /// Input row contains NaN or infinite values the model cannot handle.
    #[error("non-finite input at row {row}, feature {feature}")]
    NonFiniteInput { row: usize, feature: usize },

    /// Any other failure, described by the handle.
    #[error("{0}")]
    Other(String),
}

impl HandleError {
    /// Check that `features` has `expected` columns.
    pub fn check_width(features: &ArrayView2<f64>, expected: usize) -> Result<(), HandleError> {
        let got = features.ncols();
        if got == expected {
            Ok(())
        } else {
            Err(HandleError::FeatureCountMismatch { expected, got })
        }
    }
}

/// A trained network: forward compute on a feature batch.
///
/// Outputs are in the normalized target domain, one value per input row.
pub trait NetworkHandle: fmt::Debug + Send + Sync {
    fn compute(&self, features: ArrayView2<f64>) -> Result<Array1<f64>, HandleError>;

    /// The built-in representation of this handle, if it has one.
    ///
    /// Only handles that return `Some` can be saved to JSON.
    fn as_mlp(&self) -> Option<&Mlp> {
        None
    }
}

/// A trained forest: ensemble-average prediction on a feature batch.
///
/// Outputs are in physical units, one value per input row.
pub trait ForestHandle: fmt::Debug + Send + Sync {
    fn predict_mean(&self, features: ArrayView2<f64>) -> Result<Array1<f64>, HandleError>;

    /// See [`NetworkHandle::as_mlp`].
    fn as_random_forest(&self) -> Option<&RandomForest> {
        None
    }
}
