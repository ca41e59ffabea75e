// rate_utils.rs

/// Rounds `value` to `decimals` decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Rescales one crime-category rate column to [0, 1] by dividing every value
/// by the column maximum across districts, so legends stay comparable across
/// categories.
///
/// Negative inputs are clamped to 0 first. Results are rounded to 4 decimal
/// places and re-clamped to [0, 1] to guard against floating-point overshoot.
/// When the maximum is 0 (no incidents of that type anywhere) the whole
/// column becomes 0.0 rather than NaN. Output is a relative-severity score;
/// callers needing the absolute per-100k rate must read the
/// pre-normalization column.
pub fn normalize_category(values: &[f64]) -> Vec<f64> {
    let clamped: Vec<f64> = values.iter().map(|v| v.max(0.0)).collect();
    let max_value = clamped.iter().cloned().fold(0.0f64, f64::max);

    if max_value > 0.0 {
        clamped
            .iter()
            .map(|v| round_to(v / max_value, 4).clamp(0.0, 1.0))
            .collect()
    } else {
        vec![0.0; values.len()]
    }
}

/// Averages the per-category normalized columns into one overall score per
/// district, rounded to 4 decimal places. Fed to the choropleth sink, which
/// colours districts by a single value. A column shorter than the first
/// contributes 0.0 for its missing districts.
pub fn mean_of_columns(columns: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = columns.first() else {
        return Vec::new();
    };

    (0..first.len())
        .map(|i| {
            let sum: f64 = columns
                .iter()
                .map(|column| column.get(i).copied().unwrap_or(0.0))
                .sum();
            round_to(sum / columns.len() as f64, 4)
        })
        .collect()
}
