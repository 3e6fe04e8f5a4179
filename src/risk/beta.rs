use crate::market::ReturnSeries;
use statrs::statistics::Statistics;

/// Fewer aligned observations than this leave beta undefined.
pub const MIN_BETA_OBSERVATIONS: usize = 10;

/// Beta of `asset` against `benchmark`: sample covariance over sample
/// variance of the benchmark, on the dates both series share.
///
/// Returns NaN when fewer than 10 dates overlap or the benchmark variance
/// is exactly zero. Both are expected data conditions, not failures.
pub fn simple_beta(asset: &ReturnSeries, benchmark: &ReturnSeries) -> f64 {
    let (a, b): (Vec<f64>, Vec<f64>) = asset
        .dates
        .iter()
        .zip(&asset.values)
        .filter_map(|(d, r)| benchmark.value_on(*d).map(|br| (*r, br)))
        .unzip();

    if a.len() < MIN_BETA_OBSERVATIONS {
        return f64::NAN;
    }

    let var = b.iter().variance();
    if var == 0.0 {
        return f64::NAN;
    }

    a.iter().covariance(b.iter()) / var
}
