//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value between the given limits.
///
/// NaN values are mapped to `min` so that they never leak into the model.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    if value.is_nan() {
        return min
    }

    value.max(min).min(max)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle in degrees into the range [0, 360).
pub fn wrap_deg<T>(value_deg: T) -> T
where
    T: Float
{
    let full = T::from(360.0).unwrap_or_else(T::one);
    let wrapped = rem_euclid(value_deg, full);

    // Round-off can produce exactly 360
    if wrapped >= full { T::zero() } else { wrapped }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
        assert_eq!(clamp(f64::NAN, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_wrap_deg() {
        assert_eq!(wrap_deg(370f64), 10f64);
        assert_eq!(wrap_deg(-90f64), 270f64);
        assert_eq!(wrap_deg(360f64), 0f64);
        assert_eq!(wrap_deg(45f64), 45f64);
    }
}
