//! Numeric helpers shared by the sampling and table stages.

/// Largest number of fractional digits that still changes an `f64` when rounding.
const MAX_ROUNDING_DIGITS: u32 = 15;

/// Round `value` to `digits` fractional digits, half away from zero.
///
/// Exact ties therefore differ from numpy/pandas `round`, which rounds half
/// to even (`0.125` becomes `0.13` here, `0.12` there).
///
/// Values that are not finite, and digit counts beyond what an `f64` can
/// resolve, are returned unchanged.
///
/// # Examples
///
/// ```
/// use nested_synth::utils::round_to;
///
/// assert_eq!(round_to(1.23456, 2), 1.23);
/// assert_eq!(round_to(-0.0876, 3), -0.088);
/// assert_eq!(round_to(2.5, 0), 3.0);
/// ```
#[must_use]
pub fn round_to(value: f64, digits: u32) -> f64 {
    if !value.is_finite() || digits > MAX_ROUNDING_DIGITS {
        return value;
    }
    let Ok(exponent) = i32::try_from(digits) else {
        return value;
    };
    let scale = 10f64.powi(exponent);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

/// Running products of `values`, or `None` if any product overflows `usize`.
///
/// # Examples
///
/// ```
/// use nested_synth::utils::running_product;
///
/// assert_eq!(running_product(&[2, 3, 2]), Some(vec![2, 6, 12]));
/// assert_eq!(running_product(&[]), Some(vec![]));
/// assert_eq!(running_product(&[u32::MAX, u32::MAX, u32::MAX]), None);
/// ```
#[must_use]
pub fn running_product(values: &[u32]) -> Option<Vec<usize>> {
    let mut acc: usize = 1;
    let mut out = Vec::with_capacity(values.len());
    for &v in values {
        acc = acc.checked_mul(v as usize)?;
        out.push(acc);
    }
    Some(out)
}

/// Check two floats are equal within an absolute tolerance.
#[must_use]
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}
