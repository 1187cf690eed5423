//! 3D vector and axis-aligned box primitives.
//!
//! The server deliberately avoids a linear-algebra dependency: the only
//! geometry it ever needs is vector arithmetic and the segment-vs-AABB slab
//! test below.

use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn dist_sq(self, other: Vec3) -> f32 {
        (self - other).length_sq()
    }

    /// Distance in the XZ plane only.
    pub fn dist_xz(self, other: Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec3::ZERO
        } else {
            self * (1.0 / len)
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Axis-aligned box stored as world-space bounds. Wire messages use the
/// centre/size form; convert through [`Aabb::center`] and [`Aabb::size`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn center(self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// XZ footprint test with the box inflated by `pad` on both axes.
    pub fn contains_xz(self, x: f32, z: f32, pad: f32) -> bool {
        x >= self.min.x - pad && x <= self.max.x + pad && z >= self.min.z - pad && z <= self.max.z + pad
    }

    /// Slab test for the segment `start..end`. A direction component that is
    /// (near) zero collapses to a containment check on that slab: the
    /// segment is rejected only when its origin lies outside the slab.
    pub fn segment_hits(self, start: Vec3, end: Vec3) -> bool {
        let delta = end - start;
        let len = delta.length();
        if len <= 1e-6 {
            return self.contains(start);
        }
        let inv_len = 1.0 / len;
        let dir = [delta.x * inv_len, delta.y * inv_len, delta.z * inv_len];
        let origin = [start.x, start.y, start.z];
        let lo = [self.min.x, self.min.y, self.min.z];
        let hi = [self.max.x, self.max.y, self.max.z];

        let mut t_min = 0.0f32;
        let mut t_max = len;
        for axis in 0..3 {
            if dir[axis].abs() < 1e-8 {
                if origin[axis] < lo[axis] || origin[axis] > hi[axis] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / dir[axis];
            let mut t0 = (lo[axis] - origin[axis]) * inv;
            let mut t1 = (hi[axis] - origin[axis]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}
