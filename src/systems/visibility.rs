//! Per-client visible-set computation.
//!
//! Classical mode is a radial filter; LOS mode additionally requires a
//! clear silhouette ray. The grace window keeps an entity in the set for a
//! bounded number of ticks after occlusion so client-side interpolation
//! does not pop, without re-opening a wallhack surface.

use std::collections::HashMap;

use crate::los::{self, LosScratch};
use crate::tuning::LOS_GRACE_TICKS;
use crate::world::World;

/// Fill `out` with the ids broadcast to this viewer on this tick.
///
/// In LOS mode the first `visible_now` portion of `out` is the set that
/// passed `can_see` this tick; grace-extended ids follow it.
pub fn visible_entities(
    viewer_id: u32,
    los_mode: bool,
    view_distance: f32,
    grace: &mut HashMap<u32, u8>,
    world: &World,
    scratch: &mut LosScratch,
    out: &mut Vec<u32>,
) {
    out.clear();
    let Some(viewer) = world.entities.get(&viewer_id) else {
        return;
    };
    let viewer_pos = viewer.position;
    let radius_sq = view_distance * view_distance;

    for (&id, entity) in &world.entities {
        if id == viewer_id {
            continue;
        }
        if viewer_pos.dist_sq(entity.position) > radius_sq {
            continue;
        }
        if !los_mode
            || los::can_see(viewer_pos, entity.position, &world.obstacles, &world.grid, scratch)
        {
            out.push(id);
        }
    }

    if !los_mode {
        return;
    }

    // Grace pass: entities that just dropped out of sight ride along for
    // their remaining ticks, provided they still exist.
    let visible_now = out.len();
    grace.retain(|id, ticks| {
        if out.iter().take(visible_now).any(|v| v == id) {
            // Still visible; refreshed below.
            return true;
        }
        if !world.entities.contains_key(id) {
            return false;
        }
        out.push(*id);
        *ticks -= 1;
        *ticks > 0
    });
    for id in out.iter().take(visible_now) {
        grace.insert(*id, LOS_GRACE_TICKS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use crate::tuning::VIEW_DISTANCE;
    use crate::world::{Entity, Obstacle, ObstacleKind};

    fn world_with_pair(viewer: Vec3, bot: Vec3) -> World {
        let mut world = World::generate_empty_for_tests();
        world.grid.insert_entity(1000, viewer);
        world
            .entities
            .insert(1000, Entity::spawn(1000, viewer, 0.0, true));
        world.grid.insert_entity(0, bot);
        world.entities.insert(0, Entity::spawn(0, bot, 0.0, false));
        world
    }

    fn run(
        world: &World,
        los_mode: bool,
        grace: &mut HashMap<u32, u8>,
        scratch: &mut LosScratch,
    ) -> Vec<u32> {
        let mut out = Vec::new();
        visible_entities(1000, los_mode, VIEW_DISTANCE, grace, world, scratch, &mut out);
        out
    }

    #[test]
    fn clear_line_is_visible_in_both_modes() {
        let world = world_with_pair(Vec3::new(0.0, 2.0, 0.0), Vec3::new(50.0, 2.0, 50.0));
        let mut scratch = LosScratch::new(world.obstacles.len());
        let mut grace = HashMap::new();
        assert_eq!(run(&world, false, &mut grace, &mut scratch), vec![0]);
        assert_eq!(run(&world, true, &mut grace, &mut scratch), vec![0]);
    }

    #[test]
    fn out_of_radius_is_hidden_even_in_classical_mode() {
        let world = world_with_pair(
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(VIEW_DISTANCE + 10.0, 2.0, 0.0),
        );
        let mut scratch = LosScratch::new(world.obstacles.len());
        let mut grace = HashMap::new();
        assert!(run(&world, false, &mut grace, &mut scratch).is_empty());
    }

    #[test]
    fn wall_hides_in_los_mode_but_not_classical() {
        let mut world = world_with_pair(Vec3::new(0.0, 2.0, 0.0), Vec3::new(20.0, 2.0, 0.0));
        world.add_obstacle_for_tests(Obstacle::new(
            Vec3::new(10.0, 5.0, 0.0),
            Vec3::new(4.0, 10.0, 4.0),
            ObstacleKind::HouseWall,
        ));
        let mut scratch = LosScratch::new(world.obstacles.len());
        let mut grace = HashMap::new();
        assert_eq!(run(&world, false, &mut grace, &mut scratch), vec![0]);
        // Starting hidden: no grace credit, stays hidden tick after tick.
        assert!(run(&world, true, &mut grace, &mut scratch).is_empty());
        assert!(run(&world, true, &mut grace, &mut scratch).is_empty());
    }

    #[test]
    fn grace_window_covers_exactly_one_occluded_tick() {
        // Visible on tick t, occluded on t+1 and t+2: broadcast on t and
        // t+1, absent from t+2.
        let mut world = world_with_pair(Vec3::new(0.0, 2.0, 0.0), Vec3::new(20.0, 2.0, 0.0));
        let mut scratch = LosScratch::new(world.obstacles.len());
        let mut grace = HashMap::new();

        assert_eq!(run(&world, true, &mut grace, &mut scratch), vec![0]);

        world.add_obstacle_for_tests(Obstacle::new(
            Vec3::new(10.0, 5.0, 0.0),
            Vec3::new(4.0, 10.0, 4.0),
            ObstacleKind::HouseWall,
        ));
        let mut scratch = LosScratch::new(world.obstacles.len());
        assert_eq!(run(&world, true, &mut grace, &mut scratch), vec![0]);
        assert!(run(&world, true, &mut grace, &mut scratch).is_empty());
    }

    #[test]
    fn grace_drops_despawned_entities() {
        let mut world = world_with_pair(Vec3::new(0.0, 2.0, 0.0), Vec3::new(20.0, 2.0, 0.0));
        let mut scratch = LosScratch::new(world.obstacles.len());
        let mut grace = HashMap::new();
        assert_eq!(run(&world, true, &mut grace, &mut scratch), vec![0]);

        world.remove_entity(0);
        assert!(run(&world, true, &mut grace, &mut scratch).is_empty());
        assert!(grace.is_empty());
    }

    #[test]
    fn viewer_never_sees_itself() {
        let world = world_with_pair(Vec3::new(0.0, 2.0, 0.0), Vec3::new(5.0, 2.0, 0.0));
        let mut scratch = LosScratch::new(world.obstacles.len());
        let mut grace = HashMap::new();
        let out = run(&world, true, &mut grace, &mut scratch);
        assert!(!out.contains(&1000));
    }
}
