//! Schema types for replicate-collection serialization.
//!
//! The JSON layout is kept separate from the runtime types so that it can
//! be validated on load and evolve under an explicit version number.

use serde::{Deserialize, Serialize};

use crate::model::{Mlp, RandomForest, SampleId, ScaleFactors, TargetTransform};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// A saved replicate collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub version: u32,
    pub replicates: Vec<ReplicateSchema>,
}

/// One saved replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateSchema {
    pub sample_id: SampleId,
    /// `ann`, `rf1`, `rf1r`, `rf2` or `rf2r`.
    pub model_type: String,
    /// Rock-fragment input flag. Read for `ann` only; forest labels carry it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_rock: bool,
    /// `[lo, hi]` of the target at fit time (`ann` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_factors: Option<ScaleFactors>,
    #[serde(default, skip_serializing_if = "is_identity")]
    pub target: TargetTransform,
    pub model: HandleSchema,
}

fn is_identity(target: &TargetTransform) -> bool {
    *target == TargetTransform::Identity
}

/// Built-in handle payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandleSchema {
    Mlp(Mlp),
    RandomForest(RandomForest),
}
