//! Descriptive statistics over one group of predictions.

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (denominator `n - 1`).
///
/// Undefined for fewer than two values and reported as NaN.
pub fn sample_sd(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Sort a copy of `values` ascending (NaN last).
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Type-7 quantile of an ascending-sorted slice.
///
/// Linear interpolation between order statistics at `h = (n - 1) * q`.
/// `q` is expected in `[0, 1]`; NaN for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    match n {
        0 => f64::NAN,
        1 => sorted[0],
        _ => {
            let h = (n - 1) as f64 * q;
            let lo = (h.floor() as usize).min(n - 1);
            let hi = (h.ceil() as usize).min(n - 1);
            let frac = h - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}

/// Output column name for quantile `q`: three-digit permille code.
///
/// `0.05` → `q050`, `0.5` → `q500`, `0.975` → `q975`.
pub fn quantile_column_name(q: f64) -> String {
    format!("q{:03}", (q * 1000.0).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[test]
    fn mean_and_sd_of_pair() {
        let values = [12.5, 13.0];
        assert_abs_diff_eq!(mean(&values), 12.75, epsilon = 1e-12);
        assert_abs_diff_eq!(sample_sd(&values), 0.125f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn sd_of_single_value_is_nan() {
        assert!(sample_sd(&[4.2]).is_nan());
        assert!(mean(&[]).is_nan());
    }

    #[rstest]
    #[case(0.05, 12.525)]
    #[case(0.5, 12.75)]
    #[case(0.95, 12.975)]
    #[case(0.0, 12.5)]
    #[case(1.0, 13.0)]
    fn type7_on_two_values(#[case] q: f64, #[case] expected: f64) {
        assert_abs_diff_eq!(quantile_sorted(&[12.5, 13.0], q), expected, epsilon = 1e-12);
    }

    #[test]
    fn type7_matches_reference_values() {
        // R: quantile(1:10, c(0.1, 0.25, 0.9), type = 7) → 1.9, 3.25, 9.1
        let data: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_abs_diff_eq!(quantile_sorted(&data, 0.1), 1.9, epsilon = 1e-12);
        assert_abs_diff_eq!(quantile_sorted(&data, 0.25), 3.25, epsilon = 1e-12);
        assert_abs_diff_eq!(quantile_sorted(&data, 0.9), 9.1, epsilon = 1e-12);
    }

    #[test]
    fn sorted_puts_values_in_order() {
        assert_eq!(sorted(&[3.0, -1.0, 2.0]), vec![-1.0, 2.0, 3.0]);
    }

    #[rstest]
    #[case(0.05, "q050")]
    #[case(0.5, "q500")]
    #[case(0.95, "q950")]
    #[case(0.025, "q025")]
    #[case(0.001, "q001")]
    fn column_names(#[case] q: f64, #[case] name: &str) {
        assert_eq!(quantile_column_name(q), name);
    }
}
