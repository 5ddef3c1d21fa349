//! Feature encoding: soil records → model input matrix.
//!
//! Column order is `[percent_sand, percent_silt, percent_clay]`, then
//! `percent_rock_fragment` if the config uses rock, then the structure-type
//! category code if the config includes it. Category codes come from the
//! fixed vocabulary in [`StructureType`], never from the levels present in
//! a particular batch, so every replicate sees identical codes.
//!
//! Encoding is all-or-nothing: the first invalid record fails the batch.

use ndarray::{Array2, ArrayViewMut1};

use crate::data::{Column, SoilRecord, SoilTable, StructureType};
use crate::model::ModelConfig;

/// Why a record value was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidReason {
    #[error("structure type '{0}' is not in the canonical vocabulary")]
    UnknownStructureType(String),

    #[error("{column} = {value} is outside [0, 100]")]
    OutOfRange { column: Column, value: f64 },

    #[error("sand + silt + clay = {sum}, expected 100 ± {tolerance}")]
    TextureSum { sum: f64, tolerance: f64 },
}

/// Feature encoding error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// A value is malformed or outside the closed vocabulary.
    #[error("invalid input at row {row}: {reason}")]
    InvalidInput { row: usize, reason: InvalidReason },

    /// A value the configuration needs is absent.
    #[error("row {row} is missing required column {column}")]
    MissingColumn { row: usize, column: Column },
}

/// Encodes soil tables into the feature matrix one [`ModelConfig`] expects.
#[derive(Debug, Clone, Copy)]
pub struct FeatureEncoder {
    config: ModelConfig,
    texture_tolerance: f64,
}

impl FeatureEncoder {
    /// Allowed deviation of sand + silt + clay from 100, in percentage points.
    pub const DEFAULT_TEXTURE_TOLERANCE: f64 = 1.0;

    pub fn new(config: ModelConfig) -> Self {
        Self { config, texture_tolerance: Self::DEFAULT_TEXTURE_TOLERANCE }
    }

    pub fn with_texture_tolerance(mut self, tolerance: f64) -> Self {
        self.texture_tolerance = tolerance;
        self
    }

    #[inline]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.config.n_features()
    }

    /// Feature names in column order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        self.config.required_columns().into_iter().map(Column::name).collect()
    }

    /// Encode a whole table into a `[n_rows, n_features]` matrix.
    ///
    /// # Errors
    ///
    /// Fails on the first record that is missing a required value or holds
    /// an invalid one; no partial matrix is returned.
    pub fn encode(&self, table: &SoilTable) -> Result<Array2<f64>, EncodeError> {
        let mut features = Array2::<f64>::zeros((table.len(), self.n_features()));
        for (row, (record, out)) in table.iter().zip(features.rows_mut()).enumerate() {
            self.encode_into(record, row, out)?;
        }
        Ok(features)
    }

    /// Encode a single record.
    pub fn encode_record(&self, record: &SoilRecord) -> Result<Vec<f64>, EncodeError> {
        let mut out = vec![0.0; self.n_features()];
        self.encode_into(record, 0, ArrayViewMut1::from(out.as_mut_slice()))?;
        Ok(out)
    }

    fn encode_into(
        &self,
        record: &SoilRecord,
        row: usize,
        mut out: ArrayViewMut1<f64>,
    ) -> Result<(), EncodeError> {
        let invalid = |reason| EncodeError::InvalidInput { row, reason };

        let texture = [record.percent_sand(), record.percent_silt(), record.percent_clay()];
        for (column, value) in Column::TEXTURE.into_iter().zip(texture) {
            check_percent(column, value).map_err(invalid)?;
        }
        let sum = record.texture_sum();
        if (sum - 100.0).abs() > self.texture_tolerance {
            return Err(invalid(InvalidReason::TextureSum { sum, tolerance: self.texture_tolerance }));
        }

        out[0] = texture[0];
        out[1] = texture[1];
        out[2] = texture[2];
        let mut col = 3;

        if self.config.use_rock {
            let rock = record.percent_rock_fragment().ok_or(EncodeError::MissingColumn {
                row,
                column: Column::PercentRockFragment,
            })?;
            check_percent(Column::PercentRockFragment, rock).map_err(invalid)?;
            out[col] = rock;
            col += 1;
        }

        if self.config.include_structure_type {
            let raw = record.structure_type().ok_or(EncodeError::MissingColumn {
                row,
                column: Column::StructureType,
            })?;
            let structure = StructureType::parse_canonical(raw)
                .ok_or_else(|| invalid(InvalidReason::UnknownStructureType(raw.to_string())))?;
            out[col] = f64::from(structure.code());
        }

        Ok(())
    }
}

fn check_percent(column: Column, value: f64) -> Result<(), InvalidReason> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(InvalidReason::OutOfRange { column, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn loam() -> SoilRecord {
        SoilRecord::new(40.0, 40.0, 20.0)
    }

    #[test]
    fn texture_only() {
        let encoder = FeatureEncoder::new(ModelConfig::rf(false, false));
        assert_eq!(encoder.encode_record(&loam()).unwrap(), vec![40.0, 40.0, 20.0]);
        assert_eq!(
            encoder.feature_names(),
            vec!["percent_sand", "percent_silt", "percent_clay"]
        );
    }

    #[test]
    fn rock_and_structure_appended_in_order() {
        let encoder = FeatureEncoder::new(ModelConfig::rf(true, true));
        let record = loam().with_rock_fragment(12.5).with_structure_type("platy");
        let expected = vec![40.0, 40.0, 20.0, 12.5, f64::from(StructureType::Platy.code())];
        assert_eq!(encoder.encode_record(&record).unwrap(), expected);
    }

    #[test]
    fn structure_codes_do_not_depend_on_batch() {
        let encoder = FeatureEncoder::new(ModelConfig::rf(false, true));
        let only_massive = SoilTable::from_records(vec![loam().with_structure_type("massive")]);
        let mixed = SoilTable::from_records(vec![
            loam().with_structure_type("blocky"),
            loam().with_structure_type("massive"),
        ]);

        let a = encoder.encode(&only_massive).unwrap();
        let b = encoder.encode(&mixed).unwrap();
        assert_eq!(a[[0, 3]], b[[1, 3]]);
        assert_eq!(b[[0, 3]], 0.0);
    }

    #[test]
    fn out_of_vocabulary_rejects_batch() {
        let encoder = FeatureEncoder::new(ModelConfig::rf(false, true));
        let table = SoilTable::from_records(vec![
            loam().with_structure_type("blocky"),
            loam().with_structure_type("Blocky"),
        ]);
        let err = encoder.encode(&table).unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvalidInput {
                row: 1,
                reason: InvalidReason::UnknownStructureType("Blocky".into()),
            }
        );
    }

    #[test]
    fn missing_rock_reported_with_row() {
        let encoder = FeatureEncoder::new(ModelConfig::ann(true));
        let table = SoilTable::from_records(vec![loam().with_rock_fragment(3.0), loam()]);
        assert_eq!(
            encoder.encode(&table).unwrap_err(),
            EncodeError::MissingColumn { row: 1, column: Column::PercentRockFragment }
        );
    }

    #[rstest]
    #[case(SoilRecord::new(-1.0, 81.0, 20.0))]
    #[case(SoilRecord::new(f64::NAN, 80.0, 20.0))]
    #[case(SoilRecord::new(40.0, 40.0, 10.0))]
    fn malformed_texture_is_invalid(#[case] record: SoilRecord) {
        let encoder = FeatureEncoder::new(ModelConfig::rf(false, false));
        assert!(matches!(
            encoder.encode_record(&record),
            Err(EncodeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn texture_tolerance_is_configurable() {
        let record = SoilRecord::new(40.0, 40.0, 18.5);
        let strict = FeatureEncoder::new(ModelConfig::rf(false, false));
        let loose = strict.with_texture_tolerance(2.0);
        assert!(strict.encode_record(&record).is_err());
        assert!(loose.encode_record(&record).is_ok());
    }

    #[test]
    fn empty_table_encodes_to_empty_matrix() {
        let encoder = FeatureEncoder::new(ModelConfig::rf(true, true));
        let features = encoder.encode(&SoilTable::default()).unwrap();
        assert_eq!(features.shape(), &[0, 5]);
    }
}
