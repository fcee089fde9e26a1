//! Utility maths functions
//!
//! Azimuths are handled in degrees in the range [0, 360). All comparisons of
//! azimuths must go through [`range_reduce_deg`] or [`get_ang_dist_deg`] so
//! that the 0/360 seam is handled in one place.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Reduce an angle in degrees into the range [0, 360).
///
/// The result is idempotent: `range_reduce_deg(range_reduce_deg(x)) ==
/// range_reduce_deg(x)`.
pub fn range_reduce_deg<T>(angle_deg: T) -> T
where
    T: Float,
{
    let full: T = T::from(360.0).unwrap();

    let r = rem_euclid(angle_deg, full);

    // rem_euclid can round up to exactly `full` for tiny negative inputs
    if r >= full {
        T::zero()
    } else {
        r
    }
}

/// Get the signed shortest angular distance in degrees from `from` to `to`.
///
/// Positive values mean `to` is reached from `from` by increasing azimuth
/// (clockwise). The result lies in [-180, 180).
pub fn get_ang_dist_deg<T>(from: T, to: T) -> T
where
    T: Float,
{
    let half: T = T::from(180.0).unwrap();
    let full: T = T::from(360.0).unwrap();

    let d = range_reduce_deg(to - from);

    if d >= half {
        d - full
    } else {
        d
    }
}

/// Determine if moving from `prev_deg` to `new_deg` crossed (or landed on)
/// `target_deg`.
///
/// The target is crossed when `prev_deg` and `new_deg` lie on opposite sides
/// of it. Points 180 degrees from the target also flip sides, so the two
/// distances must together span no more than half a revolution.
pub fn has_crossed_deg<T>(prev_deg: T, new_deg: T, target_deg: T) -> bool
where
    T: Float,
{
    let half: T = T::from(180.0).unwrap();

    let a = get_ang_dist_deg(target_deg, prev_deg);
    let b = get_ang_dist_deg(target_deg, new_deg);

    if a == T::zero() || b == T::zero() {
        return true;
    }

    (a < T::zero()) != (b < T::zero()) && a.abs() + b.abs() <= half
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}
