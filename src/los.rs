//! Line-of-sight engine.
//!
//! `segment_clear` sweeps a segment's 2D projection through the grid and
//! slab-tests every obstacle it meets; `can_see` wraps it in the four-ray
//! silhouette test that lets a peeker's shoulder reveal a hider even when
//! the centre line is blocked.

use crate::grid::{CellKey, SpatialGrid};
use crate::math::Vec3;
use crate::tuning::{ENTITY_HEIGHT, ENTITY_RADIUS, EYE_HEIGHT};
use crate::world::Obstacle;

/// Reusable per-query state. Obstacles spanning several cells show up once
/// per cell; the stamp array dedups them by stable index without clearing
/// anything between queries. Callers must not nest queries on one scratch.
pub struct LosScratch {
    cells: Vec<CellKey>,
    visited: Vec<u32>,
    stamp: u32,
}

impl LosScratch {
    pub fn new(obstacle_count: usize) -> Self {
        Self {
            cells: Vec::new(),
            visited: vec![0; obstacle_count],
            stamp: 0,
        }
    }
}

/// True when no obstacle box intersects the segment.
pub fn segment_clear(
    start: Vec3,
    end: Vec3,
    obstacles: &[Obstacle],
    grid: &SpatialGrid,
    scratch: &mut LosScratch,
) -> bool {
    let LosScratch {
        cells,
        visited,
        stamp,
    } = scratch;
    *stamp = stamp.wrapping_add(1);
    if *stamp == 0 {
        // Wrapped: stale marks could alias the new stamp.
        visited.fill(0);
        *stamp = 1;
    }

    grid.cells_along_ray(start, end, cells);
    for key in cells.iter() {
        for &index in grid.obstacles_in_cell(*key) {
            let slot = &mut visited[index as usize];
            if *slot == *stamp {
                continue;
            }
            *slot = *stamp;
            if obstacles[index as usize].aabb.segment_hits(start, end) {
                return false;
            }
        }
    }
    true
}

/// Silhouette visibility: casts up to four rays from the viewer's eye to
/// the target's head-top and foot-level edges, offset perpendicular to the
/// sight line. First clear ray wins.
pub fn can_see(
    viewer_pos: Vec3,
    target_pos: Vec3,
    obstacles: &[Obstacle],
    grid: &SpatialGrid,
    scratch: &mut LosScratch,
) -> bool {
    let dx = target_pos.x - viewer_pos.x;
    let dz = target_pos.z - viewer_pos.z;
    let dist_xz = (dx * dx + dz * dz).sqrt();
    if dist_xz < 1e-3 {
        return true;
    }

    // Unit XZ normal of the viewer->target direction.
    let px = -dz / dist_xz * ENTITY_RADIUS;
    let pz = dx / dist_xz * ENTITY_RADIUS;

    let eye = viewer_pos + Vec3::new(0.0, EYE_HEIGHT, 0.0);
    let offsets = [
        Vec3::new(px, ENTITY_HEIGHT, pz),
        Vec3::new(-px, ENTITY_HEIGHT, -pz),
        Vec3::new(px, 0.0, pz),
        Vec3::new(-px, 0.0, -pz),
    ];
    for offset in offsets {
        if segment_clear(eye, target_pos + offset, obstacles, grid, scratch) {
            return true;
        }
    }
    false
}
