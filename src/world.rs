//! World model: static obstacles, dynamic entities, bullets and the
//! per-tick hit event list. The tick orchestrator owns one [`World`];
//! systems borrow pieces of it for the duration of a tick.

use std::collections::HashMap;

use serde::Serialize;

use crate::grid::SpatialGrid;
use crate::math::{Aabb, Vec3};
use crate::systems::movement;
use crate::terrain;
use crate::tuning::{MAX_HP, PLAYER_RADIUS, TERRAIN_SIZE};
use crate::utils::rng::XorShift64;
use crate::worldgen;

/// Closed set of obstacle shapes. Solidity and opacity are pure functions
/// of the tag; the serialized name is what the client matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ObstacleKind {
    HouseWall,
    Ruins,
    Fence,
    Tower,
    Crate,
    Barricade,
    Rock,
    Shed,
    Boundary,
    Tree,
    TreeFoliage,
    Hill,
}

impl ObstacleKind {
    /// Whether entities and bullets collide with this kind. Foliage and
    /// hills are walk-through decoration; everything else is solid.
    pub fn is_solid(self) -> bool {
        !matches!(self, ObstacleKind::TreeFoliage | ObstacleKind::Hill)
    }
}

/// Static world geometry. Every kind blocks line of sight; the optional
/// decoration fields are forwarded to clients opaquely in CONFIG.
#[derive(Debug, Clone)]
pub struct Obstacle {
    pub aabb: Aabb,
    pub kind: ObstacleKind,
    pub trunk_radius: Option<f32>,
    pub foliage_radius: Option<f32>,
    pub foliage_color: Option<u32>,
}

impl Obstacle {
    pub fn new(center: Vec3, size: Vec3, kind: ObstacleKind) -> Self {
        Self {
            aabb: Aabb::from_center_size(center, size),
            kind,
            trunk_radius: None,
            foliage_radius: None,
            foliage_color: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: u32,
    pub position: Vec3,
    // Reserved for future physics; never read by the current systems.
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub is_player: bool,
    pub hp: u16,
    pub max_hp: u16,
}

impl Entity {
    pub fn spawn(id: u32, position: Vec3, yaw: f32, is_player: bool) -> Self {
        Self {
            id,
            position,
            velocity: Vec3::ZERO,
            yaw,
            pitch: 0.0,
            is_player,
            hp: MAX_HP,
            max_hp: MAX_HP,
        }
    }
}

/// Owned exclusively by the bullet system while it integrates.
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: u32,
    pub owner_id: u32,
    pub position: Vec3,
    /// Unit length.
    pub direction: Vec3,
    pub speed: f32,
    pub damage: u16,
    pub created_at_millis: u64,
}

/// Transient per-tick impact record; the list is cleared at tick start.
#[derive(Debug, Clone, Copy)]
pub struct HitEvent {
    pub position: Vec3,
    pub hit_entity: bool,
    pub entity_id: Option<u32>,
}

pub struct World {
    pub obstacles: Vec<Obstacle>,
    pub grid: SpatialGrid,
    pub entities: HashMap<u32, Entity>,
    pub bullets: Vec<Bullet>,
    pub hit_events: Vec<HitEvent>,
    /// Bots occupy ids `[0, bots_count)`.
    pub bots_count: u32,
    next_bullet_id: u32,
}

impl World {
    /// Build the full static world from a seed and populate it with bots.
    pub fn generate(seed: u64, bots_count: usize) -> Self {
        let obstacles = worldgen::generate(seed);
        let grid = SpatialGrid::new(&obstacles);
        let mut world = World {
            obstacles,
            grid,
            entities: HashMap::new(),
            bullets: Vec::new(),
            hit_events: Vec::new(),
            bots_count: bots_count as u32,
            next_bullet_id: 0,
        };

        let mut rng = XorShift64::new(seed ^ 0xB07_5EED);
        for id in 0..bots_count as u32 {
            let position = world.random_clear_spawn(&mut rng);
            let yaw = rng.range_f32(0.0, std::f32::consts::TAU);
            world.grid.insert_entity(id, position);
            world.entities.insert(id, Entity::spawn(id, position, yaw, false));
        }
        world
    }

    /// Uniform spawn inside the respawn area, skipping positions inside
    /// solid geometry so a fresh entity is never born stuck.
    pub fn random_clear_spawn(&self, rng: &mut XorShift64) -> Vec3 {
        let half = (TERRAIN_SIZE - 200.0) / 2.0;
        let mut position = Vec3::ZERO;
        for _ in 0..16 {
            position = Vec3::new(rng.range_f32(-half, half), 0.0, rng.range_f32(-half, half));
            terrain::snap_to_ground(&mut position);
            if !movement::collides_at(
                position.x,
                position.z,
                PLAYER_RADIUS,
                None,
                &self.obstacles,
                &self.grid,
            ) {
                break;
            }
        }
        position
    }

    pub fn spawn_player(&mut self, id: u32, rng: &mut XorShift64) -> Vec3 {
        let position = self.random_clear_spawn(rng);
        self.grid.insert_entity(id, position);
        self.entities.insert(id, Entity::spawn(id, position, 0.0, true));
        position
    }

    pub fn remove_entity(&mut self, id: u32) {
        self.entities.remove(&id);
        self.grid.remove_entity(id);
    }

    pub fn alloc_bullet_id(&mut self) -> u32 {
        let id = self.next_bullet_id;
        self.next_bullet_id = self.next_bullet_id.wrapping_add(1);
        id
    }
}

#[cfg(test)]
impl World {
    /// Bare world for unit tests: no obstacles, no bots.
    pub(crate) fn generate_empty_for_tests() -> Self {
        World {
            obstacles: Vec::new(),
            grid: SpatialGrid::new(&[]),
            entities: HashMap::new(),
            bullets: Vec::new(),
            hit_events: Vec::new(),
            bots_count: 0,
            next_bullet_id: 0,
        }
    }

    /// Append an obstacle and rebuild the grid around the new set.
    pub(crate) fn add_obstacle_for_tests(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
        let entities: Vec<(u32, crate::math::Vec3)> = self
            .entities
            .iter()
            .map(|(id, e)| (*id, e.position))
            .collect();
        self.grid = SpatialGrid::new(&self.obstacles);
        for (id, position) in entities {
            self.grid.insert_entity(id, position);
        }
    }
}
