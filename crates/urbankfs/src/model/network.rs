//! Multilayer perceptron handle.
//!
//! Each [`DenseLayer`] stores its weights as `[n_inputs + 1, n_outputs]`
//! with the bias in the last row:
//!
//! ```text
//! weights[[input, unit]]    → coefficient
//! weights[[n_inputs, unit]] → bias
//! ```
//!
//! so a layer computes `x · W[:-1, :] + W[-1, :]`. Hidden layers apply the
//! network's [`Activation`]; the output layer is linear.

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::handle::{HandleError, NetworkHandle};
use super::transform::ScaleFactors;

/// Hidden-layer activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// `1 / (1 + exp(-x))`.
    #[default]
    Logistic,
    Tanh,
    Relu,
}

impl Activation {
    #[inline]
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Logistic => logistic(x),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
        }
    }
}

/// Numerically stable logistic function.
#[inline]
fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Fully connected layer (weights + bias row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    weights: Array2<f64>,
}

impl DenseLayer {
    /// Create a layer from a `[n_inputs + 1, n_outputs]` matrix whose last
    /// row is the bias.
    ///
    /// Returns `None` if the matrix has no rows or no columns.
    pub fn from_array(weights: Array2<f64>) -> Option<Self> {
        (weights.nrows() >= 1 && weights.ncols() >= 1).then_some(Self { weights })
    }

    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.weights.nrows().saturating_sub(1)
    }

    fn is_empty(&self) -> bool {
        self.weights.nrows() == 0 || self.weights.ncols() == 0
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.weights.ncols()
    }

    fn forward(&self, input: ArrayView2<f64>) -> Array2<f64> {
        let n_in = self.n_inputs();
        let mut out = input.dot(&self.weights.slice(s![..n_in, ..]));
        out += &self.weights.row(n_in);
        out
    }
}

/// Structural errors when assembling an [`Mlp`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MlpError {
    #[error("network has no layers")]
    NoLayers,

    #[error("layer {0} has an empty weight matrix")]
    EmptyLayer(usize),

    #[error("layer {layer} expects {expected} inputs but the previous layer produces {got}")]
    LayerShapeMismatch { layer: usize, expected: usize, got: usize },

    #[error("network must have a single output, got {0}")]
    MultiOutput(usize),

    #[error("input scaling has {got} entries for {expected} inputs")]
    InputScalingMismatch { expected: usize, got: usize },
}

/// Feed-forward network with a single linear output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<DenseLayer>,
    #[serde(default)]
    activation: Activation,
    /// Per-input min-max scaling applied before the first layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_scaling: Option<Vec<ScaleFactors>>,
}

impl Mlp {
    /// Create a network, checking that consecutive layer shapes agree and
    /// that the last layer has a single output.
    pub fn new(layers: Vec<DenseLayer>, activation: Activation) -> Result<Self, MlpError> {
        let mlp = Self { layers, activation, input_scaling: None };
        mlp.validate()?;
        Ok(mlp)
    }

    /// Normalize each input with its own scale factors before the forward pass.
    pub fn with_input_scaling(mut self, scaling: Vec<ScaleFactors>) -> Result<Self, MlpError> {
        self.input_scaling = Some(scaling);
        self.validate()?;
        Ok(self)
    }

    /// Validate structural invariants (used after deserialization too).
    pub fn validate(&self) -> Result<(), MlpError> {
        let first = self.layers.first().ok_or(MlpError::NoLayers)?;
        if let Some(i) = self.layers.iter().position(DenseLayer::is_empty) {
            return Err(MlpError::EmptyLayer(i));
        }
        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[1].n_inputs() != pair[0].n_outputs() {
                return Err(MlpError::LayerShapeMismatch {
                    layer: i + 1,
                    expected: pair[1].n_inputs(),
                    got: pair[0].n_outputs(),
                });
            }
        }
        let n_out = self.layers[self.layers.len() - 1].n_outputs();
        if n_out != 1 {
            return Err(MlpError::MultiOutput(n_out));
        }
        if let Some(scaling) = &self.input_scaling {
            if scaling.len() != first.n_inputs() {
                return Err(MlpError::InputScalingMismatch {
                    expected: first.n_inputs(),
                    got: scaling.len(),
                });
            }
        }
        Ok(())
    }

    /// Number of input features.
    pub fn n_inputs(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::n_inputs)
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }
}

impl NetworkHandle for Mlp {
    fn compute(&self, features: ArrayView2<f64>) -> Result<Array1<f64>, HandleError> {
        HandleError::check_width(&features, self.n_inputs())?;
        if let Some((row, feature)) = first_non_finite(&features) {
            return Err(HandleError::NonFiniteInput { row, feature });
        }

        let mut hidden = features.to_owned();
        if let Some(scaling) = &self.input_scaling {
            for (mut column, sf) in hidden.axis_iter_mut(Axis(1)).zip(scaling) {
                column.mapv_inplace(|x| sf.normalize(x));
            }
        }

        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            hidden = layer.forward(hidden.view());
            if i < last {
                hidden.mapv_inplace(|x| self.activation.apply(x));
            }
        }

        Ok(hidden.column(0).to_owned())
    }

    fn as_mlp(&self) -> Option<&Mlp> {
        Some(self)
    }
}

pub(crate) fn first_non_finite(features: &ArrayView2<f64>) -> Option<(usize, usize)> {
    features
        .indexed_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(idx, _)| idx)
}
