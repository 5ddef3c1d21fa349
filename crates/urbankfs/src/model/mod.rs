//! Model configurations, trained-model handles, and bootstrap replicates.
//!
//! # Overview
//!
//! - [`ModelConfig`]: model family plus feature flags, fixed at fit time
//! - [`NetworkHandle`] / [`ForestHandle`]: what the adapters invoke
//! - [`Mlp`] / [`RandomForest`]: the built-in handle implementations
//! - [`ScaleFactors`]: inverse min-max normalization of network outputs
//! - [`FittedReplicate`] / [`ReplicateCollection`]: the bootstrap ensemble

pub mod config;
pub mod forest;
pub mod handle;
pub mod network;
pub mod replicate;
pub mod transform;

pub use config::{ModelConfig, ModelFamily, UnknownModelType};
pub use forest::{Node, RandomForest, Tree, TreeValidationError};
pub use handle::{ForestHandle, HandleError, NetworkHandle};
pub use network::{Activation, DenseLayer, Mlp, MlpError};
pub use replicate::{FittedReplicate, ModelFit, NetworkFit, ReplicateCollection, ReplicateError, SampleId};
pub use transform::{normalize, rescale, DegenerateScaleError, ScaleFactors, TargetTransform};
