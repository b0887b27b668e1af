//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Share of `part` in `whole` as a percentage clamped to `[0, 100]`.
/// An empty `whole` counts as complete.
#[must_use]
pub fn percent_of(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 100.0;
    }
    let ratio = f64::from(part) / f64::from(whole) * 100.0;
    clamp_percent(ratio)
}

/// Clamp a percentage to `[0, 100]`, returning 0.0 for NaN.
#[must_use]
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Round a percentage to a whole number in `[0, 100]`.
#[must_use]
pub fn round_percent_to_u8(value: f64) -> u8 {
    let rounded = clamp_percent(value).round();
    cast::<f64, u8>(rounded).unwrap_or(0)
}
