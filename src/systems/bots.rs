//! Bot AI: a random walk with wall-sliding.
//!
//! Bots exist to give the visibility engine a realistic moving population;
//! the walk only has to look alive, not play well.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_8, PI};

use crate::grid::SpatialGrid;
use crate::systems::movement::{self, MoveOutcome};
use crate::tuning::{BOT_RADIUS, BOT_SPEED, BOT_TURN_SPEED, TERRAIN_SIZE};
use crate::utils::rng::XorShift64;
use crate::world::{Entity, Obstacle};

/// Chance per tick that a bot perturbs its heading.
const TURN_CHANCE: f32 = 0.02;

/// Bots turn around before reaching this distance from the world edge.
const SOFT_BOUNDARY_MARGIN: f32 = 50.0;

/// Advance every bot by one tick. Bot ids occupy `[0, bots_count)`; the
/// caller hands us disjoint borrows of the world's fields so the grid can
/// be re-binned as entities cross cells.
pub fn step(
    entities: &mut std::collections::HashMap<u32, Entity>,
    grid: &mut SpatialGrid,
    obstacles: &[Obstacle],
    bots_count: u32,
    dt: f32,
    rng: &mut XorShift64,
) {
    for id in 0..bots_count {
        let Some(bot) = entities.get_mut(&id) else {
            continue;
        };
        if step_bot(bot, obstacles, grid, dt, rng) {
            grid.move_entity(id, bot.position);
        }
    }
}

/// One bot's walk. Returns whether it moved.
fn step_bot(
    bot: &mut Entity,
    obstacles: &[Obstacle],
    grid: &SpatialGrid,
    dt: f32,
    rng: &mut XorShift64,
) -> bool {
    if rng.next_f32() < TURN_CHANCE {
        bot.yaw += rng.range_f32(-0.5, 0.5) * BOT_TURN_SPEED * dt * 10.0;
    }

    let step = BOT_SPEED * dt;
    if step <= 0.0 {
        return false;
    }

    // Same forward basis as aiming: yaw 0 walks along -Z.
    let dx = -bot.yaw.sin() * step;
    let dz = -bot.yaw.cos() * step;

    // Soft boundary: turn around instead of grinding along the edge wall.
    let soft = TERRAIN_SIZE / 2.0 - SOFT_BOUNDARY_MARGIN;
    let nx = bot.position.x + dx;
    let nz = bot.position.z + dz;
    if nx.abs() > soft || nz.abs() > soft {
        bot.yaw += PI;
        return false;
    }

    match movement::try_move(&mut bot.position, dx, dz, BOT_RADIUS, None, obstacles, grid) {
        MoveOutcome::Blocked => {
            // Wedged in a corner: pick a sideways-ish heading to unstick.
            bot.yaw += FRAC_PI_2 + rng.range_f32(-FRAC_PI_8, FRAC_PI_8);
            false
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use crate::terrain;
    use std::collections::HashMap;

    fn single_bot_world(position: Vec3, yaw: f32) -> (HashMap<u32, Entity>, SpatialGrid, Vec<Obstacle>) {
        let obstacles: Vec<Obstacle> = Vec::new();
        let mut grid = SpatialGrid::new(&obstacles);
        let mut entities = HashMap::new();
        grid.insert_entity(0, position);
        entities.insert(0, Entity::spawn(0, position, yaw, false));
        (entities, grid, obstacles)
    }

    #[test]
    fn zero_dt_never_moves_positions() {
        let start = Vec3::new(10.0, 0.0, 10.0);
        let (mut entities, mut grid, obstacles) = single_bot_world(start, 1.2);
        let mut rng = XorShift64::new(5);
        for _ in 0..50 {
            step(&mut entities, &mut grid, &obstacles, 1, 0.0, &mut rng);
        }
        let bot = &entities[&0];
        assert_eq!(bot.position.x, start.x);
        assert_eq!(bot.position.z, start.z);
    }

    #[test]
    fn walking_bot_keeps_feet_on_the_ground() {
        let start = Vec3::new(0.0, terrain::feet_height(0.0, 0.0), 0.0);
        let (mut entities, mut grid, obstacles) = single_bot_world(start, 0.7);
        let mut rng = XorShift64::new(11);
        for _ in 0..200 {
            step(&mut entities, &mut grid, &obstacles, 1, 1.0 / 30.0, &mut rng);
        }
        let bot = &entities[&0];
        let expected = terrain::feet_height(bot.position.x, bot.position.z);
        assert!((bot.position.y - expected).abs() < 1e-3);
        // And the grid bin tracks the walk.
        assert_eq!(
            grid.entity_cell(0),
            Some(crate::grid::key_at(bot.position.x, bot.position.z))
        );
    }

    #[test]
    fn soft_boundary_reverses_heading() {
        let soft = TERRAIN_SIZE / 2.0 - 50.0;
        // Right at the soft edge, heading outward (+x is yaw = -pi/2).
        let start = Vec3::new(soft - 0.01, 0.0, 0.0);
        let (mut entities, mut grid, obstacles) = single_bot_world(start, -FRAC_PI_2);
        let mut rng = XorShift64::new(2);
        let yaw_before = entities[&0].yaw;
        step(&mut entities, &mut grid, &obstacles, 1, 1.0 / 30.0, &mut rng);
        let bot = &entities[&0];
        assert_eq!(bot.position.x, start.x, "boundary tick must not move");
        // Heading flipped (modulo the occasional random perturbation).
        assert!((bot.yaw - yaw_before).abs() > 2.5);
    }

    #[test]
    fn cornered_bot_rotates_to_unstick() {
        // Walls close enough that every slide attempt lands inside an
        // inflated footprint while the start cell itself is the only gap.
        let obstacles = vec![
            Obstacle::new(Vec3::new(1.6, 5.0, 0.0), Vec3::new(0.2, 10.0, 40.0), crate::world::ObstacleKind::Rock),
            Obstacle::new(Vec3::new(0.0, 5.0, -1.6), Vec3::new(40.0, 10.0, 0.2), crate::world::ObstacleKind::Rock),
            Obstacle::new(Vec3::new(-1.6, 5.0, 0.0), Vec3::new(0.2, 10.0, 40.0), crate::world::ObstacleKind::Rock),
            Obstacle::new(Vec3::new(0.0, 5.0, 1.6), Vec3::new(40.0, 10.0, 0.2), crate::world::ObstacleKind::Rock),
        ];
        let mut grid = SpatialGrid::new(&obstacles);
        let mut entities = HashMap::new();
        grid.insert_entity(0, Vec3::ZERO);
        entities.insert(0, Entity::spawn(0, Vec3::ZERO, 0.3, false));
        let mut rng = XorShift64::new(9);

        let yaw_before = entities[&0].yaw;
        step(&mut entities, &mut grid, &obstacles, 1, 1.0 / 30.0, &mut rng);
        let bot = &entities[&0];
        assert_eq!(bot.position.x, 0.0);
        assert_eq!(bot.position.z, 0.0);
        assert!(bot.yaw != yaw_before);
    }
}
