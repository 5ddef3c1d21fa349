//! Model family and feature configuration.
//!
//! A [`ModelConfig`] is fixed at fit time and travels with every replicate.
//! It decides which columns the encoder produces and which adapter scores
//! the replicate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::Column;

/// Model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Artificial neural network; output is min-max normalized.
    Ann,
    /// Random forest; output is in physical units.
    Rf,
}

/// Model family plus feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelConfig {
    pub family: ModelFamily,
    pub use_rock: bool,
    pub include_structure_type: bool,
}

/// Error for an unrecognised `model_type` label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model type '{0}' (expected one of ann, rf1, rf1r, rf2, rf2r)")]
pub struct UnknownModelType(pub String);

impl ModelConfig {
    /// Network configuration. Networks use texture and optionally rock fragments.
    pub fn ann(use_rock: bool) -> Self {
        Self { family: ModelFamily::Ann, use_rock, include_structure_type: false }
    }

    /// Forest configuration.
    pub fn rf(use_rock: bool, include_structure_type: bool) -> Self {
        Self { family: ModelFamily::Rf, use_rock, include_structure_type }
    }

    /// Parse a `model_type` label.
    ///
    /// `ann` parses to a network without rock fragments; the rock flag of a
    /// network comes from replicate metadata, see [`ModelConfig::ann`].
    pub fn from_label(label: &str) -> Result<Self, UnknownModelType> {
        match label {
            "ann" => Ok(Self::ann(false)),
            "rf1" => Ok(Self::rf(false, false)),
            "rf1r" => Ok(Self::rf(true, false)),
            "rf2" => Ok(Self::rf(false, true)),
            "rf2r" => Ok(Self::rf(true, true)),
            other => Err(UnknownModelType(other.to_string())),
        }
    }

    /// The `model_type` label reported in prediction and summary tables.
    pub fn label(&self) -> &'static str {
        match (self.family, self.include_structure_type, self.use_rock) {
            (ModelFamily::Ann, _, _) => "ann",
            (ModelFamily::Rf, false, false) => "rf1",
            (ModelFamily::Rf, false, true) => "rf1r",
            (ModelFamily::Rf, true, false) => "rf2",
            (ModelFamily::Rf, true, true) => "rf2r",
        }
    }

    /// Columns the encoder reads, in feature order.
    pub fn required_columns(&self) -> Vec<Column> {
        let mut columns = Column::TEXTURE.to_vec();
        if self.use_rock {
            columns.push(Column::PercentRockFragment);
        }
        if self.include_structure_type {
            columns.push(Column::StructureType);
        }
        columns
    }

    /// Width of the encoded feature vector.
    #[inline]
    pub fn n_features(&self) -> usize {
        3 + usize::from(self.use_rock) + usize::from(self.include_structure_type)
    }
}

/// Serialize a config as its `model_type` label (output tables).
pub(crate) fn serialize_label<S: serde::Serializer>(
    config: &ModelConfig,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(config.label())
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())?;
        if self.family == ModelFamily::Ann && self.use_rock {
            f.write_str(" (rock)")?;
        }
        Ok(())
    }
}
