//! JSON persistence of replicate collections.
//!
//! Only the built-in handles ([`Mlp`](crate::model::Mlp) and
//! [`RandomForest`](crate::model::RandomForest)) can be saved. Loaded
//! handles are validated before they are wrapped into replicates.
//!
//! ```
//! use urbankfs::model::{ModelConfig, ModelFit, FittedReplicate, RandomForest, ReplicateCollection, Tree};
//! use urbankfs::persist;
//!
//! let forest = RandomForest::new(vec![Tree::constant(4.2)], 3).unwrap();
//! let replicate = FittedReplicate::new(1, ModelConfig::rf(false, false), ModelFit::forest(forest)).unwrap();
//! let collection = ReplicateCollection::from_replicates(vec![replicate]).unwrap();
//!
//! let json = persist::to_json_string(&collection).unwrap();
//! let restored = persist::from_json_str(&json).unwrap();
//! assert_eq!(restored.len(), 1);
//! ```

mod convert;
pub mod schema;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::model::{ReplicateCollection, ReplicateError, SampleId, UnknownModelType};

pub use schema::{CollectionSchema, HandleSchema, ReplicateSchema, SCHEMA_VERSION};

/// Errors raised while saving or loading a collection.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema version {0} (expected {SCHEMA_VERSION})")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    ModelType(#[from] UnknownModelType),

    #[error(transparent)]
    Replicate(#[from] ReplicateError),

    #[error("replicate {sample_id}: {reason}")]
    Invalid { sample_id: SampleId, reason: String },

    #[error("replicate {sample_id} ({model_type}) has no built-in representation")]
    Unsupported { sample_id: SampleId, model_type: &'static str },
}

/// Serialize a collection to pretty-printed JSON.
pub fn to_json_string(collection: &ReplicateCollection) -> Result<String, PersistError> {
    let schema = CollectionSchema::try_from(collection)?;
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Parse and validate a collection from JSON.
pub fn from_json_str(json: &str) -> Result<ReplicateCollection, PersistError> {
    let schema: CollectionSchema = serde_json::from_str(json)?;
    ReplicateCollection::try_from(schema)
}

/// Write a collection to `path` as JSON.
pub fn save_collection_json(
    path: impl AsRef<Path>,
    collection: &ReplicateCollection,
) -> Result<(), PersistError> {
    let schema = CollectionSchema::try_from(collection)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &schema)?;
    writer.flush()?;
    Ok(())
}

/// Read a collection from a JSON file.
pub fn load_collection_json(path: impl AsRef<Path>) -> Result<ReplicateCollection, PersistError> {
    let reader = BufReader::new(File::open(path)?);
    let schema: CollectionSchema = serde_json::from_reader(reader)?;
    ReplicateCollection::try_from(schema)
}
