//! Uniform spatial grid over the XZ plane.
//!
//! One structure serves three query shapes: point-radius collision lookups
//! (through a precomputed 3x3 nearby-obstacle cache), entity neighbourhood
//! queries for bullet hits, and cell traversal for LOS rays. Bins are
//! hash-keyed because obstacles cover a small fraction of the 400x400 cell
//! space.

use std::collections::HashMap;

use crate::math::Vec3;
use crate::tuning::{CELL_SIZE, TERRAIN_SIZE};
use crate::world::Obstacle;

/// Packed cell key: `cell_x * 10_000 + cell_z`. Integer keys keep entity
/// movement allocation-free when the entity stays inside its cell.
pub type CellKey = i64;

const KEY_STRIDE: i64 = 10_000;

pub fn locate(x: f32, z: f32) -> (i32, i32) {
    let half = TERRAIN_SIZE / 2.0;
    (
        ((x + half) / CELL_SIZE).floor() as i32,
        ((z + half) / CELL_SIZE).floor() as i32,
    )
}

pub fn cell_key(cell_x: i32, cell_z: i32) -> CellKey {
    cell_x as i64 * KEY_STRIDE + cell_z as i64
}

pub fn key_at(x: f32, z: f32) -> CellKey {
    let (cx, cz) = locate(x, z);
    cell_key(cx, cz)
}

pub struct SpatialGrid {
    /// Obstacle indices per cell, fixed at world load.
    obstacle_bins: HashMap<CellKey, Vec<u32>>,
    /// Coordinates of every cell with at least one obstacle. Kept alongside
    /// the packed keys so cache building never has to unpack one.
    occupied_cells: Vec<(i32, i32)>,
    /// Union of the 3x3 neighbourhood around each cell that exists or
    /// borders one; serves all in-radius collision queries in O(1).
    nearby_cache: HashMap<CellKey, Vec<u32>>,
    entity_bins: HashMap<CellKey, Vec<u32>>,
    entity_cells: HashMap<u32, CellKey>,
}

impl SpatialGrid {
    pub fn new(obstacles: &[Obstacle]) -> Self {
        let mut grid = Self {
            obstacle_bins: HashMap::new(),
            occupied_cells: Vec::new(),
            nearby_cache: HashMap::new(),
            entity_bins: HashMap::new(),
            entity_cells: HashMap::new(),
        };
        for (index, obstacle) in obstacles.iter().enumerate() {
            grid.insert_obstacle(index as u32, obstacle);
        }
        grid.build_nearby_cache();
        grid
    }

    /// Add the obstacle to every cell its XZ footprint overlaps.
    fn insert_obstacle(&mut self, index: u32, obstacle: &Obstacle) {
        let (min_x, min_z) = locate(obstacle.aabb.min.x, obstacle.aabb.min.z);
        let (max_x, max_z) = locate(obstacle.aabb.max.x, obstacle.aabb.max.z);
        for cx in min_x..=max_x {
            for cz in min_z..=max_z {
                self.obstacle_bins
                    .entry(cell_key(cx, cz))
                    .or_default()
                    .push(index);
                self.occupied_cells.push((cx, cz));
            }
        }
    }

    fn build_nearby_cache(&mut self) {
        self.occupied_cells.sort_unstable();
        self.occupied_cells.dedup();

        let mut targets: Vec<(i32, i32)> = Vec::new();
        for &(cx, cz) in &self.occupied_cells {
            for dx in -1..=1 {
                for dz in -1..=1 {
                    targets.push((cx + dx, cz + dz));
                }
            }
        }
        targets.sort_unstable();
        targets.dedup();

        for (cx, cz) in targets {
            let mut union: Vec<u32> = Vec::new();
            for dx in -1..=1 {
                for dz in -1..=1 {
                    if let Some(bin) = self.obstacle_bins.get(&cell_key(cx + dx, cz + dz)) {
                        union.extend_from_slice(bin);
                    }
                }
            }
            union.sort_unstable();
            union.dedup();
            self.nearby_cache.insert(cell_key(cx, cz), union);
        }
    }

    /// Precomputed 3x3 obstacle union for the containing cell. Empty when
    /// nothing solid is anywhere near.
    pub fn nearby_obstacles(&self, x: f32, z: f32) -> &[u32] {
        self.nearby_cache
            .get(&key_at(x, z))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn obstacles_in_cell(&self, key: CellKey) -> &[u32] {
        self.obstacle_bins
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn insert_entity(&mut self, id: u32, position: Vec3) {
        let key = key_at(position.x, position.z);
        self.entity_bins.entry(key).or_default().push(id);
        self.entity_cells.insert(id, key);
    }

    /// Re-bin the entity if its packed cell key changed; no-op otherwise.
    pub fn move_entity(&mut self, id: u32, position: Vec3) {
        let new_key = key_at(position.x, position.z);
        match self.entity_cells.get(&id) {
            Some(&old_key) if old_key == new_key => {}
            Some(&old_key) => {
                if let Some(bin) = self.entity_bins.get_mut(&old_key) {
                    bin.retain(|&e| e != id);
                }
                self.entity_bins.entry(new_key).or_default().push(id);
                self.entity_cells.insert(id, new_key);
            }
            None => self.insert_entity(id, position),
        }
    }

    pub fn remove_entity(&mut self, id: u32) {
        if let Some(key) = self.entity_cells.remove(&id) {
            if let Some(bin) = self.entity_bins.get_mut(&key) {
                bin.retain(|&e| e != id);
            }
        }
    }

    /// Cell the entity is currently binned into, if any.
    pub fn entity_cell(&self, id: u32) -> Option<CellKey> {
        self.entity_cells.get(&id).copied()
    }

    /// Collect entity ids binned in the 3x3 neighbourhood of a point.
    pub fn entities_near(&self, x: f32, z: f32, out: &mut Vec<u32>) {
        out.clear();
        let (cx, cz) = locate(x, z);
        for dx in -1..=1 {
            for dz in -1..=1 {
                if let Some(bin) = self.entity_bins.get(&cell_key(cx + dx, cz + dz)) {
                    out.extend_from_slice(bin);
                }
            }
        }
    }

    /// Every cell the 2D projection of `start..end` pierces, via
    /// Amanatides-Woo traversal. Exact: no pierced cell is omitted, and the
    /// step count is bounded by the Manhattan cell distance. Callers must
    /// deduplicate obstacles seen across cells.
    pub fn cells_along_ray(&self, start: Vec3, end: Vec3, out: &mut Vec<CellKey>) {
        out.clear();
        let half = TERRAIN_SIZE / 2.0;
        let ox = start.x + half;
        let oz = start.z + half;
        let dx = end.x - start.x;
        let dz = end.z - start.z;

        let (mut cx, mut cz) = locate(start.x, start.z);
        let (end_cx, end_cz) = locate(end.x, end.z);
        out.push(cell_key(cx, cz));

        let step_x: i32 = if dx > 0.0 { 1 } else { -1 };
        let step_z: i32 = if dz > 0.0 { 1 } else { -1 };

        // Parametric distance (t in [0, 1]) to the first boundary crossing
        // on each axis, and per-cell increments.
        let mut t_max_x = if dx == 0.0 {
            f32::INFINITY
        } else {
            let boundary = if dx > 0.0 { (cx + 1) as f32 } else { cx as f32 } * CELL_SIZE;
            (boundary - ox) / dx
        };
        let mut t_max_z = if dz == 0.0 {
            f32::INFINITY
        } else {
            let boundary = if dz > 0.0 { (cz + 1) as f32 } else { cz as f32 } * CELL_SIZE;
            (boundary - oz) / dz
        };
        let t_delta_x = if dx == 0.0 { f32::INFINITY } else { CELL_SIZE / dx.abs() };
        let t_delta_z = if dz == 0.0 { f32::INFINITY } else { CELL_SIZE / dz.abs() };

        let steps = (end_cx - cx).unsigned_abs() + (end_cz - cz).unsigned_abs();
        for _ in 0..steps {
            if t_max_x < t_max_z {
                cx += step_x;
                t_max_x += t_delta_x;
            } else {
                cz += step_z;
                t_max_z += t_delta_z;
            }
            out.push(cell_key(cx, cz));
        }
    }
}
