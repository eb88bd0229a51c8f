//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Floor a f64 and clamp it to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn floor_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    cast::<f64, i64>(value.clamp(min, max).floor()).unwrap_or(0)
}

/// Board positions and counts as signed cash/offset arithmetic.
#[must_use]
pub fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Wrap a signed board offset onto `len` tiles.
#[must_use]
pub fn wrap_position(raw: i64, len: usize) -> usize {
    let len = usize_to_i64(len.max(1));
    usize::try_from(raw.rem_euclid(len)).unwrap_or(0)
}
