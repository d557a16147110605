use nalgebra::DVector;

/// Pearson correlation of paired samples.
///
/// Pairs where either value is not finite are ignored. Returns `0.0` when fewer than two
/// pairs remain or either axis has no spread.
///
/// # Arguments
///
/// * `xs` - Samples of the first axis.
/// * `ys` - Samples of the second axis, paired by index with `xs`.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let (a, b): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    if a.len() < 2 {
        return 0.0;
    }

    let a = DVector::from_vec(a);
    let b = DVector::from_vec(b);
    let da = a.add_scalar(-a.mean());
    let db = b.add_scalar(-b.mean());
    let denom = da.norm() * db.norm();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (da.dot(&db) / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfectly_linear_samples_correlate_fully() {
        let r = pearson(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]);
        assert!((r - 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]);
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_yield_zero() {
        assert_eq!(pearson(&[1.0], &[2.0]), 0.0);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(pearson(&[], &[]), 0.0);
    }

    #[test]
    fn non_finite_pairs_are_skipped() {
        let r = pearson(&[1.0, f64::NAN, 2.0, 3.0], &[2.0, 5.0, 4.0, 6.0]);
        assert!((r - 1.0).abs() < 1e-12);
    }
}
