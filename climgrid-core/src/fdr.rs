//! False discovery rate control for multiple hypothesis tests
//!
//! Implements the Benjamini and Hochberg (1995) procedure as described by
//! Wilks (2016), doi:10.1175/BAMS-D-15-00267.1.

use crate::errors::{GridError, GridResult};
use crate::grid::FloatValue;
use ndarray::{ArrayView, Dimension};

/// Default significance level
pub const DEFAULT_ALPHA: FloatValue = 0.10;

/// p-value threshold controlling the false discovery rate at level `alpha`
///
/// The p-values are sorted and the threshold is the largest `(i / n) * alpha`
/// for which the i-th smallest p-value satisfies `p(i) <= (i / n) * alpha`,
/// scanning upwards from `i = 1` and stopping at the first failure. Returns
/// zero if even the smallest p-value fails.
///
/// This differs from Wilks (2016), who takes the largest `p(i)` satisfying
/// the inequality, but selecting `p <= threshold` gives the same cells with
/// either definition.
///
/// The p-values may have any shape and are not modified.
///
/// # Errors
///
/// [`GridError::InvalidInput`] if `alpha` is not in the open interval (0, 1)
/// or any p-value is NaN.
///
/// # Examples
///
/// ```rust
/// use climgrid_core::fdr::fdr_threshold;
/// use ndarray::array;
///
/// let p_values = array![[0.04, 0.001], [0.5, 0.02]];
/// // Sorted: 0.001, 0.02 and 0.04 pass; 0.5 > 0.1 fails
/// assert_eq!(fdr_threshold(p_values.view(), 0.1).unwrap(), 0.75 * 0.1);
/// ```
pub fn fdr_threshold<D: Dimension>(
    p_values: ArrayView<'_, FloatValue, D>,
    alpha: FloatValue,
) -> GridResult<FloatValue> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(GridError::InvalidInput(format!(
            "alpha should be in range 0.0 < alpha < 1.0, got {}",
            alpha
        )));
    }
    if p_values.iter().any(|p| p.is_nan()) {
        return Err(GridError::InvalidInput(
            "p_values must not contain NaN".to_string(),
        ));
    }

    let mut sorted: Vec<FloatValue> = p_values.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as FloatValue;

    let mut threshold = 0.0;
    for (i, p) in sorted.iter().enumerate() {
        let candidate = ((i + 1) as FloatValue / n) * alpha;
        if *p <= candidate {
            threshold = candidate;
        } else {
            break;
        }
    }
    Ok(threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    /// Benjamini and Hochberg (1995), deliberately out of order
    fn bh95() -> Array1<f64> {
        array![
            0.0344, 0.4262, 0.0001, 1.0000, 0.0278, 0.0095, 0.6528, 0.0459, 0.0019, 0.3240,
            0.0201, 0.7590, 0.0004, 0.5719, 0.0298
        ]
    }

    #[test]
    fn example_bh95() {
        let p_fdr = fdr_threshold(bh95().view(), 0.05).unwrap();
        assert_eq!(p_fdr, 4.0 / 15.0 * 0.05);
    }

    #[test]
    fn example_bh95_2d() {
        let p_values = bh95().into_shape_with_order((3, 5)).unwrap();
        let p_fdr = fdr_threshold(p_values.view(), 0.05).unwrap();
        assert_eq!(p_fdr, 4.0 / 15.0 * 0.05);
    }

    #[test]
    fn input_unchanged() {
        let p_values = bh95();
        let copy = p_values.clone();
        fdr_threshold(p_values.view(), 0.05).unwrap();
        assert_eq!(p_values, copy);
    }

    #[test]
    fn nothing_significant() {
        let p_fdr = fdr_threshold(array![0.5, 0.9].view(), DEFAULT_ALPHA).unwrap();
        assert_eq!(p_fdr, 0.0);
    }

    #[test]
    fn invalid_alpha() {
        let p_values = Array1::linspace(0.0, 0.9, 10);
        for alpha in [-0.01, 0.0, 1.0, 1.1, f64::NAN] {
            assert!(matches!(
                fdr_threshold(p_values.view(), alpha),
                Err(GridError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn nan_p_value_rejected() {
        let result = fdr_threshold(array![0.01, f64::NAN].view(), 0.05);
        assert!(matches!(result, Err(GridError::InvalidInput(_))));
    }
}
