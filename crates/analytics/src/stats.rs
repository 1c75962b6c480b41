//! Descriptive statistics used by the engine.

/// The `q`-quantile of `values` using linear interpolation between order
/// statistics (the "R-7" definition: position `(n - 1) * q` in the sorted sample).
///
/// Returns 0 for an empty sample. `q` is clamped into `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let base = pos.floor() as usize;
    let rest = pos - base as f64;

    match sorted.get(base + 1) {
        Some(next) => sorted[base] + rest * (next - sorted[base]),
        None => sorted[base],
    }
}

/// Mean and population standard deviation. `(0, 0)` for an empty sample.
pub fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

    (mean, variance.sqrt())
}

/// Rounds half away from zero to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
