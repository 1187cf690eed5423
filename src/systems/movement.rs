//! Wall-sliding movement shared by bots and players.

use crate::grid::SpatialGrid;
use crate::math::Vec3;
use crate::terrain;
use crate::tuning::{PLAYER_RADIUS, PLAYER_SPEED, TERRAIN_SIZE};
use crate::world::{Entity, Obstacle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Full,
    SlideX,
    SlideZ,
    Blocked,
}

impl MoveOutcome {
    pub fn moved(self) -> bool {
        self != MoveOutcome::Blocked
    }
}

/// Point-vs-world collision: any solid obstacle whose inflated footprint
/// contains the point, or the optional hard boundary.
pub fn collides_at(
    x: f32,
    z: f32,
    radius: f32,
    hard_bound: Option<f32>,
    obstacles: &[Obstacle],
    grid: &SpatialGrid,
) -> bool {
    if let Some(bound) = hard_bound {
        if x.abs() >= bound || z.abs() >= bound {
            return true;
        }
    }
    for &index in grid.nearby_obstacles(x, z) {
        let obstacle = &obstacles[index as usize];
        if obstacle.kind.is_solid() && obstacle.aabb.contains_xz(x, z, radius) {
            return true;
        }
    }
    false
}

/// Attempt `(dx, dz)`, then each axis alone. On success the position is
/// updated and re-seated on the ground; the caller refreshes the grid bin.
pub fn try_move(
    position: &mut Vec3,
    dx: f32,
    dz: f32,
    radius: f32,
    hard_bound: Option<f32>,
    obstacles: &[Obstacle],
    grid: &SpatialGrid,
) -> MoveOutcome {
    let attempts = [
        (dx, dz, MoveOutcome::Full),
        (dx, 0.0, MoveOutcome::SlideX),
        (0.0, dz, MoveOutcome::SlideZ),
    ];
    for (ax, az, outcome) in attempts {
        let nx = position.x + ax;
        let nz = position.z + az;
        if !collides_at(nx, nz, radius, hard_bound, obstacles, grid) {
            position.x = nx;
            position.z = nz;
            terrain::snap_to_ground(position);
            return outcome;
        }
    }
    MoveOutcome::Blocked
}

/// Apply a player's last movement intent. The intent is used as received
/// (the client pre-normalises); the hard boundary ring counts as a
/// collision. Returns whether the entity moved.
pub fn apply_player_intent(
    entity: &mut Entity,
    intent: (f32, f32),
    dt: f32,
    obstacles: &[Obstacle],
    grid: &SpatialGrid,
) -> bool {
    let dx = intent.0 * PLAYER_SPEED * dt;
    let dz = intent.1 * PLAYER_SPEED * dt;
    if dx == 0.0 && dz == 0.0 {
        return false;
    }
    try_move(
        &mut entity.position,
        dx,
        dz,
        PLAYER_RADIUS,
        Some(TERRAIN_SIZE / 2.0 - 10.0),
        obstacles,
        grid,
    )
    .moved()
}
