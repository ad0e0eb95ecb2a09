use crate::quantile::criterion::Criterion;
use crate::quantile::error::SketchError;

/// Validates that split points are finite, strictly increasing, and
/// non-empty, per the wire-format-independent argument contract shared by
/// `get_cdf`/`get_pmf`.
pub fn validate_split_points(split_points: &[f32]) -> Result<(), SketchError> {
    if split_points.is_empty() {
        return Err(SketchError::InvalidSplitPoints(
            "split points must not be empty".to_string(),
        ));
    }
    for &s in split_points {
        if !s.is_finite() {
            return Err(SketchError::InvalidSplitPoints(format!(
                "split point {} is not finite",
                s
            )));
        }
    }
    for pair in split_points.windows(2) {
        if pair[0] >= pair[1] {
            return Err(SketchError::InvalidSplitPoints(
                "split points must be strictly increasing".to_string(),
            ));
        }
    }
    Ok(())
}

/// Turns a `getCount` closure into the bucket boundaries shared by CDF and
/// PMF: `[count(s0), .., count(sm-1), total_n]`.
///
/// Always counts under `crit`'s lower/inclusive complement
/// (`complementary_lower`), never under `crit` itself: the bucket column
/// is a cumulative count over rising split points and must be
/// non-decreasing, which only holds for a `Lt`/`Le`-style count. Counting
/// directly under `Gt`/`Ge` would make `buckets` *fall* as the split
/// rises, underflowing the `pmf` difference and producing a non-monotone
/// `cdf`.
fn buckets<F>(split_points: &[f32], crit: Criterion, total_n: u64, mut get_count: F) -> Vec<u64>
where
    F: FnMut(f32, Criterion) -> u64,
{
    let lower = crit.complementary_lower();
    let mut buckets: Vec<u64> = split_points
        .iter()
        .map(|&s| get_count(s, lower))
        .collect();
    buckets.push(total_n);
    buckets
}

/// `get_cdf`: cumulative distribution at each split point plus the tail.
pub fn cdf<F>(
    split_points: &[f32],
    crit: Criterion,
    total_n: u64,
    get_count: F,
) -> Result<Vec<f64>, SketchError>
where
    F: FnMut(f32, Criterion) -> u64,
{
    validate_split_points(split_points)?;
    let b = buckets(split_points, crit, total_n, get_count);
    Ok(b.iter().map(|&c| c as f64 / total_n as f64).collect())
}

/// `get_pmf`: per-bucket mass between consecutive split points.
pub fn pmf<F>(
    split_points: &[f32],
    crit: Criterion,
    total_n: u64,
    get_count: F,
) -> Result<Vec<f64>, SketchError>
where
    F: FnMut(f32, Criterion) -> u64,
{
    validate_split_points(split_points)?;
    let b = buckets(split_points, crit, total_n, get_count);
    let mut result = Vec::with_capacity(b.len());
    let mut prev = 0u64;
    for &c in &b {
        result.push((c - prev) as f64 / total_n as f64);
        prev = c;
    }
    Ok(result)
}
