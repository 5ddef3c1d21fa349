//! Output transformation for network inference.
//!
//! Networks are fit against a min-max normalized target. [`ScaleFactors`]
//! records the `[lo, hi]` range seen at fit time so raw outputs can be
//! mapped back to physical units, and [`TargetTransform`] undoes any
//! transform applied to the target before normalization.
//!
//! No clamping is applied: outputs outside [0, 1] map to values outside
//! `[lo, hi]`, which keeps poor extrapolation visible downstream.
//!
//! # Zero-width range
//!
//! When `hi == lo` the forward transform used a scale of 1, i.e.
//! `x - lo`, so the inverse is `raw + lo`. This case always succeeds.
//! [`DegenerateScaleError`] is only raised for ranges that cannot have come
//! from a fit: non-finite bounds or `hi < lo`.

use ndarray::ArrayViewMut1;
use serde::{Deserialize, Serialize};

/// Invalid normalization range.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("degenerate scale factors [{lo}, {hi}]: bounds must be finite with lo <= hi")]
pub struct DegenerateScaleError {
    pub lo: f64,
    pub hi: f64,
}

/// `[lo, hi]` range used to min-max normalize a network's target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct ScaleFactors {
    lo: f64,
    hi: f64,
}

impl ScaleFactors {
    /// Create scale factors, rejecting non-finite or inverted ranges.
    pub fn new(lo: f64, hi: f64) -> Result<Self, DegenerateScaleError> {
        if lo.is_finite() && hi.is_finite() && lo <= hi {
            Ok(Self { lo, hi })
        } else {
            Err(DegenerateScaleError { lo, hi })
        }
    }

    /// Fit scale factors to observed target values (min and max).
    ///
    /// Returns `None` for empty input or if any value is non-finite.
    pub fn from_observed(values: &[f64]) -> Option<Self> {
        if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { lo, hi })
    }

    #[inline]
    pub fn lo(&self) -> f64 {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// Scale used by the forward transform (1 for a zero-width range).
    #[inline]
    fn scale(&self) -> f64 {
        let width = self.hi - self.lo;
        if width == 0.0 {
            1.0
        } else {
            width
        }
    }

    /// Inverse transform: `raw * (hi - lo) + lo`.
    #[inline]
    pub fn rescale(&self, raw: f64) -> f64 {
        raw * self.scale() + self.lo
    }

    /// Forward transform: `(x - lo) / (hi - lo)`.
    #[inline]
    pub fn normalize(&self, x: f64) -> f64 {
        (x - self.lo) / self.scale()
    }

    /// Rescale a batch of raw outputs in place.
    pub fn rescale_inplace(&self, mut outputs: ArrayViewMut1<f64>) {
        outputs.mapv_inplace(|raw| self.rescale(raw));
    }
}

impl TryFrom<[f64; 2]> for ScaleFactors {
    type Error = DegenerateScaleError;

    fn try_from([lo, hi]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(lo, hi)
    }
}

impl From<ScaleFactors> for [f64; 2] {
    fn from(sf: ScaleFactors) -> Self {
        [sf.lo, sf.hi]
    }
}

/// Free-function form of [`ScaleFactors::rescale`].
#[inline]
pub fn rescale(raw: f64, lo: f64, hi: f64) -> Result<f64, DegenerateScaleError> {
    Ok(ScaleFactors::new(lo, hi)?.rescale(raw))
}

/// Free-function form of [`ScaleFactors::normalize`].
#[inline]
pub fn normalize(x: f64, lo: f64, hi: f64) -> Result<f64, DegenerateScaleError> {
    Ok(ScaleFactors::new(lo, hi)?.normalize(x))
}

/// Transform applied to the target before min-max normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTransform {
    /// Target fit in physical units.
    #[default]
    Identity,
    /// Target fit as `log10(Kfs)`; inverse is `10^y`.
    Log10,
}

impl TargetTransform {
    /// Map a value from the fitted domain back to physical units.
    #[inline]
    pub fn inverse(self, y: f64) -> f64 {
        match self {
            TargetTransform::Identity => y,
            TargetTransform::Log10 => 10f64.powf(y),
        }
    }

    /// Map a physical value into the fitted domain.
    #[inline]
    pub fn forward(self, x: f64) -> f64 {
        match self {
            TargetTransform::Identity => x,
            TargetTransform::Log10 => x.log10(),
        }
    }

    /// Apply [`inverse`](Self::inverse) in place.
    pub fn inverse_inplace(self, mut values: ArrayViewMut1<f64>) {
        if self != TargetTransform::Identity {
            values.mapv_inplace(|y| self.inverse(y));
        }
    }
}
