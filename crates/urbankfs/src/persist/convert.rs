//! Conversion between runtime replicates and their schema counterparts.
//!
//! Saving fails for handles without a built-in representation. Loading
//! re-validates every handle and checks its input width against the
//! configuration it is declared under.

use std::sync::Arc;

use super::schema::{CollectionSchema, HandleSchema, ReplicateSchema, SCHEMA_VERSION};
use super::PersistError;
use crate::model::{
    FittedReplicate, ModelConfig, ModelFamily, ModelFit, NetworkFit, ReplicateCollection, SampleId,
};

// =============================================================================
// Runtime -> schema
// =============================================================================

impl TryFrom<&FittedReplicate> for ReplicateSchema {
    type Error = PersistError;

    fn try_from(replicate: &FittedReplicate) -> Result<Self, Self::Error> {
        let sample_id = replicate.sample_id();
        let config = replicate.config();
        let unsupported = || PersistError::Unsupported { sample_id, model_type: config.label() };

        let (model, scale_factors, target) = match replicate.fit() {
            ModelFit::Network(fit) => {
                let mlp = fit.handle().as_mlp().ok_or_else(unsupported)?;
                (HandleSchema::Mlp(mlp.clone()), Some(fit.scale_factors()), fit.target_transform())
            }
            ModelFit::Forest(handle) => {
                let forest = handle.as_random_forest().ok_or_else(unsupported)?;
                (HandleSchema::RandomForest(forest.clone()), None, Default::default())
            }
        };

        Ok(Self {
            sample_id,
            model_type: config.label().to_string(),
            use_rock: config.family == ModelFamily::Ann && config.use_rock,
            scale_factors,
            target,
            model,
        })
    }
}

impl TryFrom<&ReplicateCollection> for CollectionSchema {
    type Error = PersistError;

    fn try_from(collection: &ReplicateCollection) -> Result<Self, Self::Error> {
        let replicates = collection
            .iter()
            .map(ReplicateSchema::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Self { version: SCHEMA_VERSION, replicates })
    }
}

// =============================================================================
// Schema -> runtime
// =============================================================================

fn check_width(
    sample_id: SampleId,
    config: &ModelConfig,
    n_inputs: usize,
) -> Result<(), PersistError> {
    if n_inputs == config.n_features() {
        Ok(())
    } else {
        Err(PersistError::Invalid {
            sample_id,
            reason: format!(
                "{} expects {} inputs, handle takes {}",
                config,
                config.n_features(),
                n_inputs
            ),
        })
    }
}

impl TryFrom<ReplicateSchema> for FittedReplicate {
    type Error = PersistError;

    fn try_from(schema: ReplicateSchema) -> Result<Self, Self::Error> {
        let sample_id = schema.sample_id;
        let invalid = |reason: String| PersistError::Invalid { sample_id, reason };

        let mut config = ModelConfig::from_label(&schema.model_type)?;
        if config.family == ModelFamily::Ann {
            config.use_rock = schema.use_rock;
        }

        let fit = match schema.model {
            HandleSchema::Mlp(mlp) => {
                mlp.validate().map_err(|e| invalid(e.to_string()))?;
                check_width(sample_id, &config, mlp.n_inputs())?;
                let scale_factors = schema
                    .scale_factors
                    .ok_or_else(|| invalid("network replicate has no scale_factors".into()))?;
                ModelFit::Network(
                    NetworkFit::new(Arc::new(mlp), scale_factors).with_target_transform(schema.target),
                )
            }
            HandleSchema::RandomForest(forest) => {
                forest.validate().map_err(|e| invalid(e.to_string()))?;
                check_width(sample_id, &config, forest.n_features())?;
                ModelFit::forest(forest)
            }
        };

        Ok(FittedReplicate::new(sample_id, config, fit)?)
    }
}

impl TryFrom<CollectionSchema> for ReplicateCollection {
    type Error = PersistError;

    fn try_from(schema: CollectionSchema) -> Result<Self, Self::Error> {
        if schema.version != SCHEMA_VERSION {
            return Err(PersistError::UnsupportedVersion(schema.version));
        }
        let replicates = schema
            .replicates
            .into_iter()
            .map(FittedReplicate::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ReplicateCollection::from_replicates(replicates)?)
    }
}
