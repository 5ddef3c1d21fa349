//! Input data: soil records, the input table, and the structure vocabulary.

pub mod record;
pub mod structure;

pub use record::{Column, SoilRecord, SoilTable, SoilTableBuilder, TableError};
pub use structure::{StructureType, UnknownStructureType};
