//! Summary aggregation of bootstrap predictions.
//!
//! Prediction rows are grouped by every column except `sample_id` and the
//! predicted value: the record's feature values plus the model
//! configuration. Each group yields one [`SummaryRow`] with the count, mean,
//! sample standard deviation and the requested type-7 quantiles.
//!
//! Group identity is value equality, so the grouping does not depend on row
//! order, while the emitted rows follow the first occurrence of each group.

pub mod stats;

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::data::SoilRecord;
use crate::inference::{PredictionRow, PredictionTable};
use crate::model::ModelConfig;

pub use stats::{mean, quantile_column_name, quantile_sorted, sample_sd};

/// Quantiles reported when none are requested.
pub const DEFAULT_QUANTILES: [f64; 3] = [0.05, 0.5, 0.95];

/// Errors raised by the aggregator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SummaryError {
    #[error("no prediction rows to summarize")]
    EmptyGroup,

    #[error("quantile {0} does not round to a permille column in q001..=q999")]
    InvalidQuantile(f64),

    #[error("quantiles map to the same output column '{0}'")]
    DuplicateQuantileColumn(String),
}

/// Check requested quantiles: each must round to a permille code in
/// `1..=999`, and no two may share a column name.
pub fn validate_quantiles(quantiles: &[f64]) -> Result<(), SummaryError> {
    let mut names: Vec<String> = Vec::with_capacity(quantiles.len());
    for &q in quantiles {
        let permille = (q * 1000.0).round();
        if !(1.0..=999.0).contains(&permille) {
            return Err(SummaryError::InvalidQuantile(q));
        }
        let name = quantile_column_name(q);
        if names.contains(&name) {
            return Err(SummaryError::DuplicateQuantileColumn(name));
        }
        names.push(name);
    }
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

/// Named quantile values of one group, in request order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuantileValues(Vec<(String, f64)>);

impl QuantileValues {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|&(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for QuantileValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One aggregated group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(flatten)]
    pub record: SoilRecord,
    #[serde(rename = "model_type", serialize_with = "crate::model::config::serialize_label")]
    pub config: ModelConfig,
    pub count: usize,
    pub mean: f64,
    /// NaN when the group has a single member.
    pub sd: f64,
    #[serde(flatten)]
    pub quantiles: QuantileValues,
}

impl SummaryRow {
    #[inline]
    pub fn model_type(&self) -> &'static str {
        self.config.label()
    }

    /// Quantile by column name (`"q050"`).
    pub fn quantile(&self, name: &str) -> Option<f64> {
        self.quantiles.get(name)
    }
}

/// Aggregated output, one row per distinct (record, configuration).
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    quantiles: Vec<f64>,
    rows: Vec<SummaryRow>,
}

impl Serialize for SummaryTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}

impl SummaryTable {
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &SummaryRow> {
        self.rows.iter()
    }

    /// Requested quantile fractions, in column order.
    #[inline]
    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }

    /// Statistic column names: `count`, `mean`, `sd`, then one per quantile.
    pub fn column_names(&self) -> Vec<String> {
        ["count", "mean", "sd"]
            .into_iter()
            .map(String::from)
            .chain(self.quantiles.iter().map(|&q| quantile_column_name(q)))
            .collect()
    }

    /// One quantile column across all rows, or `None` if it was not requested.
    pub fn quantile_column(&self, name: &str) -> Option<Vec<f64>> {
        self.rows.iter().map(|row| row.quantile(name)).collect()
    }

    /// The row for `record` under `config`.
    pub fn find(&self, record: &SoilRecord, config: &ModelConfig) -> Option<&SummaryRow> {
        let key = GroupKey::new(record, config);
        self.rows.iter().find(|row| GroupKey::new(&row.record, &row.config) == key)
    }
}

impl<'a> IntoIterator for &'a SummaryTable {
    type Item = &'a SummaryRow;
    type IntoIter = std::slice::Iter<'a, SummaryRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

// =============================================================================
// Grouping
// =============================================================================

/// Canonical bits so that `-0.0 == 0.0` and all NaNs share a group.
#[inline]
fn float_key(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GroupKey<'a> {
    texture: [u64; 3],
    rock: Option<u64>,
    structure: Option<&'a str>,
    config: ModelConfig,
}

impl<'a> GroupKey<'a> {
    fn new(record: &'a SoilRecord, config: &ModelConfig) -> Self {
        Self {
            texture: [
                float_key(record.percent_sand()),
                float_key(record.percent_silt()),
                float_key(record.percent_clay()),
            ],
            rock: record.percent_rock_fragment().map(float_key),
            structure: record.structure_type(),
            config: *config,
        }
    }
}

struct Group<'a> {
    first: &'a PredictionRow,
    values: Vec<f64>,
}

// =============================================================================
// Summarizer
// =============================================================================

/// Groups prediction rows and computes per-group statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Summarizer {
    quantiles: Vec<f64>,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self { quantiles: DEFAULT_QUANTILES.to_vec() }
    }
}

impl Summarizer {
    /// Create a summarizer reporting `quantiles`, in the given order.
    pub fn new(quantiles: Vec<f64>) -> Result<Self, SummaryError> {
        validate_quantiles(&quantiles)?;
        Ok(Self { quantiles })
    }

    #[inline]
    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }

    /// Summarize a prediction table.
    pub fn summarize(&self, predictions: &PredictionTable) -> Result<SummaryTable, SummaryError> {
        self.summarize_rows(predictions.rows())
    }

    /// Summarize prediction rows in any order.
    pub fn summarize_rows(&self, rows: &[PredictionRow]) -> Result<SummaryTable, SummaryError> {
        if rows.is_empty() {
            return Err(SummaryError::EmptyGroup);
        }

        let mut index: HashMap<GroupKey<'_>, usize> = HashMap::new();
        let mut groups: Vec<Group<'_>> = Vec::new();
        for row in rows {
            let key = GroupKey::new(&row.record, &row.config);
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Group { first: row, values: Vec::new() });
                groups.len() - 1
            });
            groups[slot].values.push(row.kfs);
        }

        let rows = groups.iter().map(|group| self.summarize_group(group)).collect();
        Ok(SummaryTable { quantiles: self.quantiles.clone(), rows })
    }

    fn summarize_group(&self, group: &Group<'_>) -> SummaryRow {
        let sorted = stats::sorted(&group.values);
        let quantiles = self
            .quantiles
            .iter()
            .map(|&q| (quantile_column_name(q), quantile_sorted(&sorted, q)))
            .collect();

        SummaryRow {
            record: group.first.record.clone(),
            config: group.first.config,
            count: group.values.len(),
            mean: mean(&group.values),
            sd: sample_sd(&group.values),
            quantiles: QuantileValues(quantiles),
        }
    }
}

/// Summarize `predictions` with the given quantiles.
pub fn summarize(predictions: &PredictionTable, quantiles: &[f64]) -> Result<SummaryTable, SummaryError> {
    Summarizer::new(quantiles.to_vec())?.summarize(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn row(record: SoilRecord, sample_id: u32, config: ModelConfig, kfs: f64) -> PredictionRow {
        PredictionRow { record, sample_id, config, kfs }
    }

    fn blocky(sand: f64, silt: f64) -> SoilRecord {
        SoilRecord::new(sand, silt, 23.0).with_structure_type("blocky")
    }

    fn scenario() -> PredictionTable {
        let rf2 = ModelConfig::rf(false, true);
        PredictionTable::from_rows(vec![
            row(blocky(14.0, 63.0), 1, rf2, 12.5),
            row(blocky(18.0, 59.0), 1, rf2, 9.0),
            row(blocky(14.0, 63.0), 2, rf2, 13.0),
            row(blocky(18.0, 59.0), 2, rf2, 8.5),
        ])
    }

    #[test]
    fn scenario_statistics() {
        let table = Summarizer::default().summarize(&scenario()).unwrap();
        assert_eq!(table.len(), 2);

        let first = &table.rows()[0];
        assert_eq!(first.record, blocky(14.0, 63.0));
        assert_eq!(first.count, 2);
        assert_abs_diff_eq!(first.mean, 12.75, epsilon = 1e-12);
        assert_abs_diff_eq!(first.sd, 0.3536, epsilon = 1e-4);
        assert_abs_diff_eq!(first.quantile("q050").unwrap(), 12.525, epsilon = 1e-12);
        assert_abs_diff_eq!(first.quantile("q500").unwrap(), 12.75, epsilon = 1e-12);
        assert_abs_diff_eq!(first.quantile("q950").unwrap(), 12.975, epsilon = 1e-12);

        let second = &table.rows()[1];
        assert_abs_diff_eq!(second.mean, 8.75, epsilon = 1e-12);
    }

    #[test]
    fn grouping_ignores_row_order() {
        let mut rows = scenario().into_rows();
        rows.reverse();
        let table = Summarizer::default().summarize_rows(&rows).unwrap();
        // first occurrence now belongs to the second record
        assert_eq!(table.rows()[0].record, blocky(18.0, 59.0));
        let first = table.find(&blocky(14.0, 63.0), &ModelConfig::rf(false, true)).unwrap();
        assert_abs_diff_eq!(first.mean, 12.75, epsilon = 1e-12);
        assert_abs_diff_eq!(first.quantile("q050").unwrap(), 12.525, epsilon = 1e-12);
    }

    #[test]
    fn configs_form_separate_groups() {
        let record = blocky(14.0, 63.0);
        let rows = vec![
            row(record.clone(), 1, ModelConfig::rf(false, true), 1.0),
            row(record.clone(), 1, ModelConfig::rf(false, false), 2.0),
            row(record.clone(), 1, ModelConfig::ann(false), 3.0),
            row(record, 1, ModelConfig::ann(true), 4.0),
        ];
        let table = Summarizer::default().summarize_rows(&rows).unwrap();
        assert_eq!(table.len(), 4);
        assert!(table.iter().all(|r| r.count == 1));
    }

    #[test]
    fn signed_zero_shares_a_group() {
        let config = ModelConfig::rf(false, false);
        let rows = vec![
            row(SoilRecord::new(0.0, 50.0, 50.0), 1, config, 1.0),
            row(SoilRecord::new(-0.0, 50.0, 50.0), 2, config, 3.0),
        ];
        let table = Summarizer::default().summarize_rows(&rows).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].count, 2);
    }

    #[test]
    fn single_member_group_is_idempotent() {
        let config = ModelConfig::rf(false, false);
        let rows = vec![row(SoilRecord::new(30.0, 40.0, 30.0), 1, config, 6.25)];
        let table = Summarizer::default().summarize_rows(&rows).unwrap();
        let only = &table.rows()[0];
        assert_eq!(only.mean, 6.25);
        assert!(only.sd.is_nan());
        assert!(only.quantiles.iter().all(|(_, v)| v == 6.25));
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = Summarizer::default().summarize(&PredictionTable::default()).unwrap_err();
        assert_eq!(err, SummaryError::EmptyGroup);
    }

    #[rstest]
    #[case(vec![0.0], SummaryError::InvalidQuantile(0.0))]
    #[case(vec![0.5, 1.0], SummaryError::InvalidQuantile(1.0))]
    #[case(vec![0.5, 0.9996], SummaryError::InvalidQuantile(0.9996))]
    #[case(vec![0.0004, 0.5], SummaryError::InvalidQuantile(0.0004))]
    #[case(vec![0.05, 0.0501], SummaryError::DuplicateQuantileColumn("q050".into()))]
    fn invalid_quantiles_rejected(#[case] quantiles: Vec<f64>, #[case] expected: SummaryError) {
        assert_eq!(Summarizer::new(quantiles).unwrap_err(), expected);
    }

    #[rstest]
    #[case(0.0006, "q001")]
    #[case(0.9994, "q999")]
    fn edge_quantiles_keep_three_digit_names(#[case] q: f64, #[case] name: &str) {
        let summarizer = Summarizer::new(vec![q]).unwrap();
        assert_eq!(summarizer.quantiles(), &[q]);
        assert_eq!(quantile_column_name(q), name);
    }

    #[test]
    fn nan_quantile_rejected() {
        assert!(matches!(
            Summarizer::new(vec![f64::NAN]),
            Err(SummaryError::InvalidQuantile(q)) if q.is_nan()
        ));
    }

    #[test]
    fn column_helpers() {
        let table = summarize(&scenario(), &[0.25, 0.75]).unwrap();
        assert_eq!(table.column_names(), vec!["count", "mean", "sd", "q250", "q750"]);
        assert_eq!(table.quantiles(), &[0.25, 0.75]);
        let q250 = table.quantile_column("q250").unwrap();
        assert_abs_diff_eq!(q250[0], 12.625, epsilon = 1e-12);
        assert!(table.quantile_column("q050").is_none());
    }

    #[test]
    fn summary_rows_serialize_flat() {
        let table = Summarizer::default().summarize(&scenario()).unwrap();
        let json = serde_json::to_value(&table.rows()[0]).unwrap();
        assert_eq!(json["model_type"], "rf2");
        assert_eq!(json["Top_Type"], "blocky");
        assert_eq!(json["count"], 2);
        assert_eq!(json["q500"], 12.75);
    }
}
