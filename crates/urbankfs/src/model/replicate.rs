//! Fitted bootstrap replicates.
//!
//! A [`FittedReplicate`] pairs a trained-model handle with the
//! [`ModelConfig`] it was fit under and the bootstrap `sample_id` that
//! produced it. Replicates are read-only once built; handles are shared
//! behind `Arc` so collections clone cheaply and can be scored from many
//! threads at once.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::config::{ModelConfig, ModelFamily};
use super::handle::{ForestHandle, NetworkHandle};
use super::transform::{ScaleFactors, TargetTransform};

/// Bootstrap resample identifier.
pub type SampleId = u32;

/// Network handle plus what is needed to map its output to physical units.
#[derive(Debug, Clone)]
pub struct NetworkFit {
    handle: Arc<dyn NetworkHandle>,
    scale_factors: ScaleFactors,
    target: TargetTransform,
}

impl NetworkFit {
    pub fn new(handle: Arc<dyn NetworkHandle>, scale_factors: ScaleFactors) -> Self {
        Self { handle, scale_factors, target: TargetTransform::Identity }
    }

    /// Declare the transform applied to the target before normalization.
    pub fn with_target_transform(mut self, target: TargetTransform) -> Self {
        self.target = target;
        self
    }

    #[inline]
    pub fn handle(&self) -> &dyn NetworkHandle {
        self.handle.as_ref()
    }

    #[inline]
    pub fn scale_factors(&self) -> ScaleFactors {
        self.scale_factors
    }

    #[inline]
    pub fn target_transform(&self) -> TargetTransform {
        self.target
    }
}

/// Trained-model handle of either family.
#[derive(Debug, Clone)]
pub enum ModelFit {
    Network(NetworkFit),
    Forest(Arc<dyn ForestHandle>),
}

impl ModelFit {
    /// Wrap a network handle with its target scale factors.
    pub fn network(handle: impl NetworkHandle + 'static, scale_factors: ScaleFactors) -> Self {
        ModelFit::Network(NetworkFit::new(Arc::new(handle), scale_factors))
    }

    /// Wrap a forest handle.
    pub fn forest(handle: impl ForestHandle + 'static) -> Self {
        ModelFit::Forest(Arc::new(handle))
    }

    /// Family this handle belongs to.
    pub fn family(&self) -> ModelFamily {
        match self {
            ModelFit::Network(_) => ModelFamily::Ann,
            ModelFit::Forest(_) => ModelFamily::Rf,
        }
    }
}

/// Errors when building replicates or collections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicateError {
    #[error("replicate {sample_id}: config {config} does not match a {fit:?} handle")]
    FamilyMismatch { sample_id: SampleId, config: ModelConfig, fit: ModelFamily },

    #[error("duplicate replicate for sample {sample_id}, model type {config}")]
    DuplicateKey { sample_id: SampleId, config: ModelConfig },
}

/// One trained bootstrap replicate.
#[derive(Debug, Clone)]
pub struct FittedReplicate {
    sample_id: SampleId,
    config: ModelConfig,
    fit: ModelFit,
}

impl FittedReplicate {
    /// Create a replicate, checking that the handle matches the config's family.
    pub fn new(sample_id: SampleId, config: ModelConfig, fit: ModelFit) -> Result<Self, ReplicateError> {
        if fit.family() != config.family {
            return Err(ReplicateError::FamilyMismatch { sample_id, config, fit: fit.family() });
        }
        Ok(Self { sample_id, config, fit })
    }

    #[inline]
    pub fn sample_id(&self) -> SampleId {
        self.sample_id
    }

    #[inline]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    #[inline]
    pub fn model_type(&self) -> &'static str {
        self.config.label()
    }

    #[inline]
    pub fn fit(&self) -> &ModelFit {
        &self.fit
    }
}

impl fmt::Display for FittedReplicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.config, self.sample_id)
    }
}

/// Replicates keyed by `(sample_id, model config)`, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ReplicateCollection {
    replicates: Vec<FittedReplicate>,
    keys: HashSet<(SampleId, ModelConfig)>,
}

impl ReplicateCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, rejecting duplicate keys.
    pub fn from_replicates(
        replicates: impl IntoIterator<Item = FittedReplicate>,
    ) -> Result<Self, ReplicateError> {
        let mut collection = Self::new();
        for replicate in replicates {
            collection.push(replicate)?;
        }
        Ok(collection)
    }

    /// Add a replicate.
    pub fn push(&mut self, replicate: FittedReplicate) -> Result<(), ReplicateError> {
        let key = (replicate.sample_id, replicate.config);
        if !self.keys.insert(key) {
            return Err(ReplicateError::DuplicateKey {
                sample_id: replicate.sample_id,
                config: replicate.config,
            });
        }
        self.replicates.push(replicate);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.replicates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.replicates.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[FittedReplicate] {
        &self.replicates
    }

    pub fn iter(&self) -> impl Iterator<Item = &FittedReplicate> {
        self.replicates.iter()
    }

    /// Look up a replicate by key.
    pub fn get(&self, sample_id: SampleId, config: &ModelConfig) -> Option<&FittedReplicate> {
        self.replicates
            .iter()
            .find(|r| r.sample_id == sample_id && r.config == *config)
    }

    /// Distinct configurations, in first-occurrence order.
    pub fn configs(&self) -> Vec<ModelConfig> {
        let mut seen = HashSet::new();
        self.replicates
            .iter()
            .map(|r| r.config)
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Sub-collection of replicates with the given `model_type` labels.
    pub fn select_labels(&self, labels: &[&str]) -> ReplicateCollection {
        let replicates: Vec<_> = self
            .replicates
            .iter()
            .filter(|r| labels.contains(&r.model_type()))
            .cloned()
            .collect();
        let keys = replicates.iter().map(|r| (r.sample_id, r.config)).collect();
        ReplicateCollection { replicates, keys }
    }
}

impl<'a> IntoIterator for &'a ReplicateCollection {
    type Item = &'a FittedReplicate;
    type IntoIter = std::slice::Iter<'a, FittedReplicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.replicates.iter()
    }
}
