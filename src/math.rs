use bevy::prelude::*;

/// Split a vector into its unit direction and its length. A zero vector
/// yields a zero direction.
pub fn dir_and_mag(v: Vec3) -> (Vec3, f32) {
    let mag = v.length();
    let dir = if mag > 0.0 { v / mag } else { Vec3::ZERO };
    (dir, mag)
}

/// Wrap a (possibly negative) index into `0..len`.
pub fn wrap_index(index: isize, len: usize) -> usize {
    debug_assert!(len > 0);
    index.rem_euclid(len as isize) as usize
}

/// `clamp01(value / limit)`, treating a non-positive limit as "always past it".
pub(crate) fn saturate_ratio(value: f32, limit: f32) -> f32 {
    if limit > 0.0 {
        (value / limit).clamp(0.0, 1.0)
    } else {
        1.0
    }
}
