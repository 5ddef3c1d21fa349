//! Soil observations and the columnar input table.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::structure::StructureType;

// =============================================================================
// Column
// =============================================================================

/// Named input column a model configuration may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    PercentSand,
    PercentSilt,
    PercentClay,
    PercentRockFragment,
    StructureType,
}

impl Column {
    /// Texture columns every configuration needs, in feature order.
    pub const TEXTURE: [Column; 3] = [Column::PercentSand, Column::PercentSilt, Column::PercentClay];

    /// Column name as it appears in survey tables.
    pub fn name(self) -> &'static str {
        match self {
            Column::PercentSand => "percent_sand",
            Column::PercentSilt => "percent_silt",
            Column::PercentClay => "percent_clay",
            Column::PercentRockFragment => "percent_rock_fragment",
            Column::StructureType => "Top_Type",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// SoilRecord
// =============================================================================

/// One soil observation.
///
/// Texture percentages are expected to be normalized to sum to 100 by the
/// cleaning stage; the encoder re-checks this. The structure type is kept as
/// the raw string so that out-of-vocabulary values surface as encoding
/// errors instead of being dropped at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilRecord {
    percent_sand: f64,
    percent_silt: f64,
    percent_clay: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    percent_rock_fragment: Option<f64>,
    #[serde(default, rename = "Top_Type", skip_serializing_if = "Option::is_none")]
    structure_type: Option<String>,
}

impl SoilRecord {
    /// Create a record with texture fractions only.
    pub fn new(percent_sand: f64, percent_silt: f64, percent_clay: f64) -> Self {
        Self {
            percent_sand,
            percent_silt,
            percent_clay,
            percent_rock_fragment: None,
            structure_type: None,
        }
    }

    /// Attach a rock-fragment percentage. NaN is treated as missing.
    pub fn with_rock_fragment(mut self, percent: f64) -> Self {
        self.percent_rock_fragment = (!percent.is_nan()).then_some(percent);
        self
    }

    /// Attach a structure type (raw string, validated at encoding time).
    pub fn with_structure_type(mut self, structure: impl Into<String>) -> Self {
        self.structure_type = Some(structure.into());
        self
    }

    #[inline]
    pub fn percent_sand(&self) -> f64 {
        self.percent_sand
    }

    #[inline]
    pub fn percent_silt(&self) -> f64 {
        self.percent_silt
    }

    #[inline]
    pub fn percent_clay(&self) -> f64 {
        self.percent_clay
    }

    #[inline]
    pub fn percent_rock_fragment(&self) -> Option<f64> {
        self.percent_rock_fragment
    }

    #[inline]
    pub fn structure_type(&self) -> Option<&str> {
        self.structure_type.as_deref()
    }

    /// Sand + silt + clay.
    #[inline]
    pub fn texture_sum(&self) -> f64 {
        self.percent_sand + self.percent_silt + self.percent_clay
    }

    /// Whether the record carries a value for `column`.
    pub fn has(&self, column: Column) -> bool {
        match column {
            Column::PercentSand | Column::PercentSilt | Column::PercentClay => true,
            Column::PercentRockFragment => self.percent_rock_fragment.is_some(),
            Column::StructureType => self.structure_type.is_some(),
        }
    }
}

// =============================================================================
// SoilTable
// =============================================================================

/// Errors raised while assembling a [`SoilTable`] column by column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("required column {0} was not provided")]
    MissingColumn(Column),

    #[error("column {column} has {got} rows, expected {expected}")]
    LengthMismatch {
        column: Column,
        expected: usize,
        got: usize,
    },
}

/// Ordered, immutable batch of soil records.
///
/// Optional columns (rock fragments, structure type) are present when at
/// least one record carries a value, mirroring a survey table where an
/// absent column and an all-missing column are indistinguishable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoilTable {
    records: Vec<SoilRecord>,
}

impl SoilTable {
    /// Create a table from row records.
    pub fn from_records(records: Vec<SoilRecord>) -> Self {
        Self { records }
    }

    /// Start a column-wise builder.
    pub fn builder() -> SoilTableBuilder {
        SoilTableBuilder::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn records(&self) -> &[SoilRecord] {
        &self.records
    }

    #[inline]
    pub fn get(&self, row: usize) -> Option<&SoilRecord> {
        self.records.get(row)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SoilRecord> {
        self.records.iter()
    }

    /// Whether the table carries `column`.
    pub fn has_column(&self, column: Column) -> bool {
        match column {
            Column::PercentSand | Column::PercentSilt | Column::PercentClay => true,
            _ => self.records.iter().any(|r| r.has(column)),
        }
    }

    /// Columns present in this table, in canonical order.
    pub fn columns(&self) -> Vec<Column> {
        [
            Column::PercentSand,
            Column::PercentSilt,
            Column::PercentClay,
            Column::PercentRockFragment,
            Column::StructureType,
        ]
        .into_iter()
        .filter(|&c| self.has_column(c))
        .collect()
    }

    /// Return a new table whose structure descriptions are collapsed to
    /// canonical names.
    ///
    /// Descriptions without a canonical class become missing. Descriptions
    /// that are already canonical pass through unchanged.
    pub fn with_canonical_structure(&self) -> SoilTable {
        let records = self
            .records
            .iter()
            .map(|r| SoilRecord {
                structure_type: r
                    .structure_type
                    .as_deref()
                    .and_then(StructureType::from_description)
                    .map(|s| s.name().to_string()),
                ..r.clone()
            })
            .collect();
        SoilTable { records }
    }
}

impl FromIterator<SoilRecord> for SoilTable {
    fn from_iter<I: IntoIterator<Item = SoilRecord>>(iter: I) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SoilTable {
    type Item = &'a SoilRecord;
    type IntoIter = std::slice::Iter<'a, SoilRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Column-wise builder for [`SoilTable`].
///
/// Texture columns are required; rock fragments and structure type are
/// optional. NaN rock values and `None` structure values are missing.
#[derive(Debug, Clone, Default)]
pub struct SoilTableBuilder {
    sand: Option<Vec<f64>>,
    silt: Option<Vec<f64>>,
    clay: Option<Vec<f64>>,
    rock: Option<Vec<f64>>,
    structure: Option<Vec<Option<String>>>,
}

impl SoilTableBuilder {
    pub fn sand(mut self, values: Vec<f64>) -> Self {
        self.sand = Some(values);
        self
    }

    pub fn silt(mut self, values: Vec<f64>) -> Self {
        self.silt = Some(values);
        self
    }

    pub fn clay(mut self, values: Vec<f64>) -> Self {
        self.clay = Some(values);
        self
    }

    pub fn rock_fragment(mut self, values: Vec<f64>) -> Self {
        self.rock = Some(values);
        self
    }

    pub fn structure_type<S: Into<String>>(mut self, values: Vec<Option<S>>) -> Self {
        self.structure = Some(values.into_iter().map(|v| v.map(Into::into)).collect());
        self
    }

    /// Assemble the table.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if a texture column is missing or any column's
    /// length differs from the sand column.
    pub fn build(self) -> Result<SoilTable, TableError> {
        let sand = self.sand.ok_or(TableError::MissingColumn(Column::PercentSand))?;
        let silt = self.silt.ok_or(TableError::MissingColumn(Column::PercentSilt))?;
        let clay = self.clay.ok_or(TableError::MissingColumn(Column::PercentClay))?;
        let n_rows = sand.len();

        let check = |column: Column, got: usize| {
            if got == n_rows {
                Ok(())
            } else {
                Err(TableError::LengthMismatch { column, expected: n_rows, got })
            }
        };
        check(Column::PercentSilt, silt.len())?;
        check(Column::PercentClay, clay.len())?;
        if let Some(rock) = &self.rock {
            check(Column::PercentRockFragment, rock.len())?;
        }
        if let Some(structure) = &self.structure {
            check(Column::StructureType, structure.len())?;
        }

        let records = (0..n_rows)
            .map(|i| {
                let mut record = SoilRecord::new(sand[i], silt[i], clay[i]);
                if let Some(rock) = &self.rock {
                    record = record.with_rock_fragment(rock[i]);
                }
                if let Some(Some(s)) = self.structure.as_ref().map(|col| &col[i]) {
                    record = record.with_structure_type(s.clone());
                }
                record
            })
            .collect();

        Ok(SoilTable { records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assembles_rows() {
        let table = SoilTable::builder()
            .sand(vec![14.0, 18.0])
            .silt(vec![63.0, 59.0])
            .clay(vec![23.0, 23.0])
            .structure_type(vec![Some("blocky"), None])
            .build()
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0).unwrap().structure_type(), Some("blocky"));
        assert_eq!(table.get(1).unwrap().structure_type(), None);
        assert!(table.has_column(Column::StructureType));
        assert!(!table.has_column(Column::PercentRockFragment));
    }

    #[test]
    fn builder_rejects_length_mismatch() {
        let err = SoilTable::builder()
            .sand(vec![14.0, 18.0])
            .silt(vec![63.0])
            .clay(vec![23.0, 23.0])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            TableError::LengthMismatch { column: Column::PercentSilt, expected: 2, got: 1 }
        );
    }

    #[test]
    fn builder_requires_texture() {
        let err = SoilTable::builder().sand(vec![1.0]).silt(vec![1.0]).build().unwrap_err();
        assert_eq!(err, TableError::MissingColumn(Column::PercentClay));
    }

    #[test]
    fn nan_rock_is_missing() {
        let record = SoilRecord::new(40.0, 40.0, 20.0).with_rock_fragment(f64::NAN);
        assert_eq!(record.percent_rock_fragment(), None);
        assert!(!record.has(Column::PercentRockFragment));
    }

    #[test]
    fn columns_listed_in_canonical_order() {
        let table = SoilTable::from_records(vec![
            SoilRecord::new(40.0, 40.0, 20.0).with_structure_type("platy"),
            SoilRecord::new(30.0, 50.0, 20.0).with_rock_fragment(5.0),
        ]);
        assert_eq!(
            table.columns(),
            vec![
                Column::PercentSand,
                Column::PercentSilt,
                Column::PercentClay,
                Column::PercentRockFragment,
                Column::StructureType,
            ]
        );
    }

    #[test]
    fn canonical_structure_is_a_new_table() {
        let table = SoilTable::from_records(vec![
            SoilRecord::new(40.0, 40.0, 20.0).with_structure_type("Subangular blocky"),
            SoilRecord::new(40.0, 40.0, 20.0).with_structure_type("no idea"),
        ]);
        let canonical = table.with_canonical_structure();

        assert_eq!(table.get(0).unwrap().structure_type(), Some("Subangular blocky"));
        assert_eq!(canonical.get(0).unwrap().structure_type(), Some("blocky"));
        assert_eq!(canonical.get(1).unwrap().structure_type(), None);
    }

    #[test]
    fn serde_uses_survey_column_names() {
        let record = SoilRecord::new(14.0, 63.0, 23.0).with_structure_type("blocky");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Top_Type"], "blocky");
        assert!(json.get("percent_rock_fragment").is_none());

        let back: SoilRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
