//! One-dimensional piecewise-linear interpolation

use crate::grid::FloatValue;

/// Linearly interpolate `fp(xp)` at each point in `x`
///
/// `xp` must be increasing. Points left of `xp[0]` take `fp[0]` and points
/// right of the last sample take the last value of `fp`, matching `numpy.interp`.
///
/// # Panics
///
/// Panics if `xp` and `fp` differ in length or are empty.
pub fn interp(x: &[FloatValue], xp: &[FloatValue], fp: &[FloatValue]) -> Vec<FloatValue> {
    assert_eq!(xp.len(), fp.len(), "xp and fp must have the same length");
    assert!(!xp.is_empty(), "xp must not be empty");
    let last = xp.len() - 1;

    x.iter()
        .map(|&target| {
            if target <= xp[0] {
                return fp[0];
            }
            if target >= xp[last] {
                return fp[last];
            }
            // First sample strictly greater than target; guaranteed in 1..=last
            let upper = xp.partition_point(|&v| v <= target);
            let lower = upper - 1;
            let fraction = (target - xp[lower]) / (xp[upper] - xp[lower]);
            fp[lower] + fraction * (fp[upper] - fp[lower])
        })
        .collect()
}
