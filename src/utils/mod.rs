use ndarray::Array1;
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Column-wise scaling applied to a dense matrix, kept so callers can report
/// or invert it.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnScaling {
    pub means: Array1<f64>,
    /// Population standard deviation per column, or `1.0` for constant columns.
    pub divisors: Array1<f64>,
}

pub trait Standardize {
    /// Subtracts the column mean from every column and returns the means.
    fn center_columns(&mut self) -> Array1<f64>;

    /// Rescales every column to zero mean and unit population variance.
    ///
    /// Constant columns are divided by `1` and end up exactly zero.
    fn standardize_columns(&mut self) -> ColumnScaling;
}

/// Median of the given values, `None` when there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut data = Data::new(values.to_vec());
    Some(data.median())
}

/// Sample quantile (`tau` in `[0, 1]`), `None` when there are no values.
pub fn quantile(values: &[f64], tau: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut data = Data::new(values.to_vec());
    Some(data.quantile(tau.clamp(0.0, 1.0)))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean())
}

/// Observed `(min, max)` of the values.
pub fn value_range(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    Some((Statistics::min(values.iter()), Statistics::max(values.iter())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median_even_and_odd() {
        assert_relative_eq!(median(&[40.0, 60.0]).unwrap(), 50.0);
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert!(median(&[]).is_none());
    }

    #[test]
    fn test_range_and_mean() {
        let values = [4.0, -1.0, 7.0, 2.0];
        assert_eq!(value_range(&values), Some((-1.0, 7.0)));
        assert_relative_eq!(mean(&values).unwrap(), 3.0);
        assert!(value_range(&[]).is_none());
    }

    #[test]
    fn test_quantile_bounds() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(quantile(&values, 1.0).unwrap(), 5.0);
        assert_relative_eq!(quantile(&values, 0.5).unwrap(), 3.0);
    }
}
