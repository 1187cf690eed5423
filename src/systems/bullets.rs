//! Bullet simulation: fire-rate gating, sub-stepped continuous collision
//! detection, binary-search hit refinement and kill/respawn handling.

use std::collections::HashMap;

use tracing::debug;

use crate::grid::SpatialGrid;
use crate::math::Vec3;
use crate::terrain;
use crate::tuning::{
    BULLET_DAMAGE, BULLET_LIFETIME_MS, BULLET_RADIUS, BULLET_SPEED, ENTITY_RADIUS, EYE_HEIGHT,
    FIRE_RATE, TERRAIN_SIZE,
};
use crate::utils::rng::XorShift64;
use crate::world::{Bullet, Entity, HitEvent, Obstacle, World};

/// Largest distance a bullet may cover in one CCD sub-step. Thinner than
/// any solid obstacle, so a bullet cannot tunnel.
const SUB_STEP: f32 = 0.1;

/// Vertical extent of the entity hit capsule above `entity.position.y`.
const HIT_CAPSULE_HEIGHT: f32 = 4.0;

const REFINE_ITERATIONS: u32 = 5;

/// Forward vector for an aim orientation. Shared convention with the
/// client: yaw 0 looks along -Z, positive pitch looks up.
pub fn aim_direction(yaw: f32, pitch: f32) -> Vec3 {
    let cp = pitch.cos();
    Vec3::new(-yaw.sin() * cp, pitch.sin(), -yaw.cos() * cp)
}

/// Fire-rate-gated bullet spawn for one shooter. Returns whether a bullet
/// left the muzzle; updates the shooter's last-shot time on success.
pub fn try_fire(
    world: &mut World,
    owner_id: u32,
    now_millis: u64,
    last_shot_millis: &mut u64,
) -> bool {
    let min_interval = (1000.0 / FIRE_RATE) as u64;
    if now_millis.saturating_sub(*last_shot_millis) < min_interval {
        return false;
    }
    let Some(shooter) = world.entities.get(&owner_id) else {
        return false;
    };
    let direction = aim_direction(shooter.yaw, shooter.pitch);
    let position = shooter.position + Vec3::new(0.0, EYE_HEIGHT, 0.0) + direction * 1.5;
    let id = world.alloc_bullet_id();
    world.bullets.push(Bullet {
        id,
        owner_id,
        position,
        direction,
        speed: BULLET_SPEED,
        damage: BULLET_DAMAGE,
        created_at_millis: now_millis,
    });
    *last_shot_millis = now_millis;
    true
}

/// Integrate all bullets by `dt`, resolving hits in priority order
/// (entities before obstacles before ground) and appending to the tick's
/// hit event list.
pub fn step(world: &mut World, now_millis: u64, dt: f32, rng: &mut XorShift64, scratch: &mut Vec<u32>) {
    let World {
        obstacles,
        grid,
        entities,
        bullets,
        hit_events,
        ..
    } = world;

    bullets.retain_mut(|bullet| {
        if now_millis.saturating_sub(bullet.created_at_millis) >= BULLET_LIFETIME_MS {
            return false;
        }
        integrate(bullet, dt, entities, grid, obstacles, hit_events, rng, scratch)
    });
}

/// Advance one bullet; false removes it.
#[allow(clippy::too_many_arguments)]
fn integrate(
    bullet: &mut Bullet,
    dt: f32,
    entities: &mut HashMap<u32, Entity>,
    grid: &mut SpatialGrid,
    obstacles: &[Obstacle],
    hit_events: &mut Vec<HitEvent>,
    rng: &mut XorShift64,
    scratch: &mut Vec<u32>,
) -> bool {
    let total = bullet.speed * dt;
    if total <= 0.0 {
        return true;
    }
    let steps = (total / SUB_STEP).ceil().max(1.0) as u32;
    let delta = bullet.direction * (total / steps as f32);
    let half_world = TERRAIN_SIZE / 2.0;

    for _ in 0..steps {
        let from = bullet.position;
        let to = from + delta;

        // Entities win over walls: a bullet skimming cover still connects
        // with the target standing in front of it.
        if let Some(victim_id) = entity_hit(to, bullet.owner_id, entities, grid, scratch) {
            let victim = &entities[&victim_id];
            let hit_point = refine(from, delta, |p| capsule_contains(victim, p));
            hit_events.push(HitEvent {
                position: hit_point,
                hit_entity: true,
                entity_id: Some(victim_id),
            });
            apply_damage(victim_id, bullet, entities, grid, rng);
            return false;
        }

        if let Some(index) = obstacle_hit(to, obstacles, grid) {
            let aabb = obstacles[index as usize].aabb;
            let hit_point = refine(from, delta, |p| aabb.contains(p));
            hit_events.push(HitEvent {
                position: hit_point,
                hit_entity: false,
                entity_id: None,
            });
            return false;
        }

        if to.y < terrain::ground_height(to.x, to.z) {
            let hit_point = refine(from, delta, |p| p.y < terrain::ground_height(p.x, p.z));
            hit_events.push(HitEvent {
                position: hit_point,
                hit_entity: false,
                entity_id: None,
            });
            return false;
        }

        if to.x.abs() > half_world || to.z.abs() > half_world {
            return false;
        }

        bullet.position = to;
    }
    true
}

/// Binary-search the sub-step for the surface of whatever `hit` detects:
/// start at the far end and walk the probe toward the last safe fraction.
fn refine(from: Vec3, delta: Vec3, mut hit: impl FnMut(Vec3) -> bool) -> Vec3 {
    let mut t = 1.0f32;
    let mut half = 0.5f32;
    for _ in 0..REFINE_ITERATIONS {
        let probe = from + delta * t;
        if hit(probe) {
            t -= half;
        } else {
            t += half;
        }
        half *= 0.5;
    }
    from + delta * t
}

fn capsule_contains(entity: &Entity, p: Vec3) -> bool {
    let dx = p.x - entity.position.x;
    let dz = p.z - entity.position.z;
    let radius = ENTITY_RADIUS + BULLET_RADIUS;
    dx * dx + dz * dz < radius * radius
        && p.y >= entity.position.y
        && p.y <= entity.position.y + HIT_CAPSULE_HEIGHT
}

fn entity_hit(
    p: Vec3,
    owner_id: u32,
    entities: &HashMap<u32, Entity>,
    grid: &SpatialGrid,
    scratch: &mut Vec<u32>,
) -> Option<u32> {
    grid.entities_near(p.x, p.z, scratch);
    for &id in scratch.iter() {
        if id == owner_id {
            continue;
        }
        if let Some(entity) = entities.get(&id) {
            if capsule_contains(entity, p) {
                return Some(id);
            }
        }
    }
    None
}

fn obstacle_hit(p: Vec3, obstacles: &[Obstacle], grid: &SpatialGrid) -> Option<u32> {
    for &index in grid.nearby_obstacles(p.x, p.z) {
        let obstacle = &obstacles[index as usize];
        if obstacle.kind.is_solid() && obstacle.aabb.contains(p) {
            return Some(index);
        }
    }
    None
}

/// Subtract damage; a kill resets the victim to full health at a fresh
/// random position (the shooter gets nothing, scoring is out of scope).
fn apply_damage(
    victim_id: u32,
    bullet: &Bullet,
    entities: &mut HashMap<u32, Entity>,
    grid: &mut SpatialGrid,
    rng: &mut XorShift64,
) {
    let Some(victim) = entities.get_mut(&victim_id) else {
        return;
    };
    victim.hp = victim.hp.saturating_sub(bullet.damage);
    if victim.hp == 0 {
        victim.hp = victim.max_hp;
        let half = (TERRAIN_SIZE - 200.0) / 2.0;
        victim.position = Vec3::new(rng.range_f32(-half, half), 0.0, rng.range_f32(-half, half));
        terrain::snap_to_ground(&mut victim.position);
        grid.move_entity(victim_id, victim.position);
        debug!(
            victim_id,
            shooter_id = bullet.owner_id,
            "entity killed and respawned"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::MAX_HP;
    use crate::world::ObstacleKind;

    fn empty_world() -> World {
        World::generate_empty_for_tests()
    }

    fn spawn_bullet(world: &mut World, position: Vec3, direction: Vec3, now: u64) {
        let id = world.alloc_bullet_id();
        world.bullets.push(Bullet {
            id,
            owner_id: 9999,
            position,
            direction: direction.normalized(),
            speed: BULLET_SPEED,
            damage: BULLET_DAMAGE,
            created_at_millis: now,
        });
    }

    #[test]
    fn fire_rate_admits_exactly_five_shots_per_second() {
        let mut world = empty_world();
        let mut rng = XorShift64::new(1);
        world.spawn_player(1000, &mut rng);
        let mut last_shot = 0u64;

        // Held trigger sampled at the tick rate over one second.
        let mut fired = 0;
        for tick in 1..=30u64 {
            let now = tick * 1000 / 30;
            if try_fire(&mut world, 1000, now, &mut last_shot) {
                fired += 1;
            }
        }
        assert_eq!(fired, 5);
    }

    #[test]
    fn thin_wall_stops_bullet_at_its_surface() {
        let mut world = empty_world();
        world.add_obstacle_for_tests(Obstacle::new(
            Vec3::new(10.0, 4.0, 0.0),
            Vec3::new(0.5, 4.0, 4.0),
            ObstacleKind::HouseWall,
        ));
        spawn_bullet(&mut world, Vec3::new(0.0, 4.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 0);

        let mut rng = XorShift64::new(3);
        let mut scratch = Vec::new();
        // A bullet covers 5 units per tick; the wall face is two ticks out.
        step(&mut world, 16, 1.0 / 30.0, &mut rng, &mut scratch);
        step(&mut world, 33, 1.0 / 30.0, &mut rng, &mut scratch);

        assert!(world.bullets.is_empty());
        assert_eq!(world.hit_events.len(), 1);
        let hit = world.hit_events[0];
        assert!(!hit.hit_entity);
        // The near face sits at x = 9.75; refinement must land on it.
        assert!((hit.position.x - 9.75).abs() < 0.05, "x = {}", hit.position.x);
    }

    #[test]
    fn kill_resets_hp_and_respawns_inside_the_spawn_area() {
        let mut world = empty_world();
        let mut pos = Vec3::new(5.0, 0.0, 0.0);
        terrain::snap_to_ground(&mut pos);
        let mut victim = Entity::spawn(0, pos, 0.0, false);
        victim.hp = BULLET_DAMAGE; // one shot from death
        world.grid.insert_entity(0, pos);
        world.entities.insert(0, victim);

        // Aimed straight through the victim's capsule.
        spawn_bullet(
            &mut world,
            Vec3::new(0.0, pos.y + 1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            0,
        );
        let mut rng = XorShift64::new(7);
        let mut scratch = Vec::new();
        step(&mut world, 16, 1.0 / 30.0, &mut rng, &mut scratch);

        assert_eq!(world.hit_events.len(), 1);
        assert!(world.hit_events[0].hit_entity);
        assert_eq!(world.hit_events[0].entity_id, Some(0));

        let victim = &world.entities[&0];
        assert_eq!(victim.hp, MAX_HP);
        let half = (TERRAIN_SIZE - 200.0) / 2.0;
        assert!(victim.position.x.abs() <= half);
        assert!(victim.position.z.abs() <= half);
        // The grid bin follows the teleport.
        assert_eq!(
            world.grid.entity_cell(0),
            Some(crate::grid::key_at(victim.position.x, victim.position.z))
        );
    }

    #[test]
    fn entity_in_front_of_wall_wins_over_the_wall() {
        let mut world = empty_world();
        world.add_obstacle_for_tests(Obstacle::new(
            Vec3::new(12.0, 4.0, 0.0),
            Vec3::new(1.0, 8.0, 8.0),
            ObstacleKind::HouseWall,
        ));
        let mut pos = Vec3::new(10.0, 0.0, 0.0);
        terrain::snap_to_ground(&mut pos);
        world.grid.insert_entity(0, pos);
        world.entities.insert(0, Entity::spawn(0, pos, 0.0, false));

        spawn_bullet(
            &mut world,
            Vec3::new(0.0, pos.y + 1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            0,
        );
        let mut rng = XorShift64::new(4);
        let mut scratch = Vec::new();
        step(&mut world, 16, 1.0 / 30.0, &mut rng, &mut scratch);
        step(&mut world, 33, 1.0 / 30.0, &mut rng, &mut scratch);

        assert_eq!(world.hit_events.len(), 1);
        assert!(world.hit_events[0].hit_entity);
    }

    #[test]
    fn bullet_spawned_at_surface_heading_away_does_not_self_hit() {
        let mut world = empty_world();
        world.add_obstacle_for_tests(Obstacle::new(
            Vec3::new(10.0, 4.0, 0.0),
            Vec3::new(4.0, 8.0, 4.0),
            ObstacleKind::Crate,
        ));
        // Muzzle exactly on the near face, flying back the way it came.
        spawn_bullet(&mut world, Vec3::new(8.0, 4.0, 0.0), Vec3::new(-1.0, 0.0, 0.0), 0);
        let mut rng = XorShift64::new(8);
        let mut scratch = Vec::new();
        step(&mut world, 16, 1.0 / 30.0, &mut rng, &mut scratch);

        assert!(world.hit_events.is_empty());
        assert_eq!(world.bullets.len(), 1);
    }

    #[test]
    fn bullets_expire_after_lifetime() {
        let mut world = empty_world();
        spawn_bullet(&mut world, Vec3::new(0.0, 50.0, 0.0), Vec3::new(0.0, 1.0, 0.0), 0);
        let mut rng = XorShift64::new(2);
        let mut scratch = Vec::new();
        step(&mut world, BULLET_LIFETIME_MS, 1.0 / 30.0, &mut rng, &mut scratch);
        assert!(world.bullets.is_empty());
        assert!(world.hit_events.is_empty());
    }

    #[test]
    fn out_of_bounds_removes_without_hit_event() {
        let mut world = empty_world();
        spawn_bullet(
            &mut world,
            Vec3::new(TERRAIN_SIZE / 2.0 - 1.0, 50.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            0,
        );
        let mut rng = XorShift64::new(2);
        let mut scratch = Vec::new();
        step(&mut world, 16, 1.0 / 30.0, &mut rng, &mut scratch);
        assert!(world.bullets.is_empty());
        assert!(world.hit_events.is_empty());
    }

    #[test]
    fn aim_direction_is_unit_length() {
        for (yaw, pitch) in [(0.0, 0.0), (1.3, 0.4), (-2.0, -1.0), (3.1, 1.5)] {
            let d = aim_direction(yaw, pitch);
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
    }
}
