//! urbankfs: bootstrapped Kfs prediction for urban soils.
//!
//! Scores soil records with many bootstrap replicates of neural-network and
//! random-forest models, then summarizes the spread of predicted saturated
//! hydraulic conductivity per record and model configuration.
//!
//! # Key Types
//!
//! - [`SoilTable`] / [`SoilRecord`] - Input texture, rock fragments and structure
//! - [`ModelConfig`] - Model family plus feature flags (`ann`, `rf1` … `rf2r`)
//! - [`ReplicateCollection`] - Fitted replicates keyed by `(sample_id, model_type)`
//! - [`BootstrapPredictor`] - Every record × every replicate, with failure isolation
//! - [`Summarizer`] - Count, mean, sd and type-7 quantiles per group
//! - [`KfsPipeline`] / [`PipelineConfig`] - Both stages behind one call
//!
//! # Prediction flow
//!
//! Records are encoded per configuration by the [`FeatureEncoder`]. Network
//! outputs live in the min-max normalized target domain and are rescaled
//! with the replicate's [`ScaleFactors`]; forest outputs are already in
//! physical units. See the [`inference`] module for details.
//!
//! # Saving replicates
//!
//! Collections built from the built-in [`Mlp`] and [`RandomForest`] handles
//! can be written to and read from JSON, see [`persist`].

// Re-export approx for users who want to compare predictions
pub use approx;

pub mod data;
pub mod encode;
pub mod inference;
pub mod logger;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod summary;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Input data
pub use data::{Column, SoilRecord, SoilTable, StructureType};

// Encoding
pub use encode::{EncodeError, FeatureEncoder};

// Models and replicates
pub use model::{
    FittedReplicate, Mlp, ModelConfig, ModelFamily, ModelFit, RandomForest, ReplicateCollection,
    SampleId, ScaleFactors,
};

// Prediction
pub use inference::{
    BootstrapOutput, BootstrapPredictor, FailureReport, ModelAdapter, PartialFailure,
    PredictionError, PredictionTable, ValidationError,
};

// Aggregation
pub use summary::{Summarizer, SummaryError, SummaryTable};

// End-to-end
pub use pipeline::{KfsPipeline, PipelineConfig, PipelineError, PipelineOutput};

// Shared utilities
pub use logger::Verbosity;
pub use utils::{run_with_threads, Parallelism};
