//! Scoring replicates against input tables.
//!
//! - [`ModelAdapter`]: per-replicate prediction strategy, resolved from the config
//! - [`BootstrapPredictor`]: every record × every replicate, with partial-failure isolation

pub mod adapter;
pub mod bootstrap;

pub use adapter::{BatchPredict, ForestAdapter, ModelAdapter, NetworkAdapter, PredictionError};
pub use bootstrap::{
    BootstrapOutput, BootstrapPredictor, FailureReport, MissingRequirement, PartialFailure,
    PredictionRow, PredictionTable, ValidationError,
};
