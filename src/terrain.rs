//! Deterministic heightmap sampling.
//!
//! The client renders the same terrain from the same formula, so both sides
//! must compute bit-identical heights. The corner noise and interpolation
//! here are the shared definition; do not "improve" the hash.

use crate::math::Vec3;
use crate::tuning::{FEET_OFFSET, HEIGHT_SCALE, TILE_SIZE};

/// Pseudo-random corner value in [0, 1) from integer tile coordinates.
fn corner_noise(tx: f32, tz: f32) -> f32 {
    let s = (tx * 12.9898 + tz * 78.233).sin() * 43758.5453;
    s - s.floor()
}

/// Ground height at any world position, bilinearly interpolated between the
/// four surrounding tile corners.
pub fn ground_height(x: f32, z: f32) -> f32 {
    let tx = (x / TILE_SIZE).floor();
    let tz = (z / TILE_SIZE).floor();
    let fx = x / TILE_SIZE - tx;
    let fz = z / TILE_SIZE - tz;

    let h00 = corner_noise(tx, tz);
    let h10 = corner_noise(tx + 1.0, tz);
    let h01 = corner_noise(tx, tz + 1.0);
    let h11 = corner_noise(tx + 1.0, tz + 1.0);

    let near = h00 + (h10 - h00) * fx;
    let far = h01 + (h11 - h01) * fx;
    (near + (far - near) * fz) * HEIGHT_SCALE
}

/// Height an entity's position sits at over the given column.
pub fn feet_height(x: f32, z: f32) -> f32 {
    ground_height(x, z) + FEET_OFFSET
}

/// Re-seat a position on the ground under it.
pub fn snap_to_ground(pos: &mut Vec3) {
    pos.y = feet_height(pos.x, pos.z);
}
