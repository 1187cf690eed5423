//! Deterministic obstacle placement.
//!
//! The layout is a pure function of the seed; clients receive the finished
//! obstacle list in CONFIG and never re-run generation. Placement sits each
//! box on the sampled ground so the footprint hugs the terrain.

use crate::math::Vec3;
use crate::terrain;
use crate::tuning::TERRAIN_SIZE;
use crate::utils::rng::XorShift64;
use crate::world::{Obstacle, ObstacleKind};

const HOUSES: usize = 30;
const RUIN_CLUSTERS: usize = 25;
const FENCE_ROWS: usize = 30;
const TOWERS: usize = 10;
const CRATES: usize = 60;
const BARRICADES: usize = 35;
const ROCKS: usize = 50;
const SHEDS: usize = 15;
const TREES: usize = 120;
const HILLS: usize = 12;

const WALL_THICKNESS: f32 = 0.8;

const FOLIAGE_COLORS: [u32; 4] = [0x2d5a27, 0x3a6b2f, 0x4a7c3b, 0x567d46];

pub fn generate(seed: u64) -> Vec<Obstacle> {
    let mut rng = XorShift64::new(seed);
    let mut obstacles = Vec::new();

    boundary_walls(&mut obstacles);
    for _ in 0..HOUSES {
        house(&mut obstacles, &mut rng);
    }
    for _ in 0..RUIN_CLUSTERS {
        ruins(&mut obstacles, &mut rng);
    }
    for _ in 0..FENCE_ROWS {
        fence_row(&mut obstacles, &mut rng);
    }
    for _ in 0..TOWERS {
        boxed(&mut obstacles, &mut rng, ObstacleKind::Tower, 5.0..7.0, 14.0..20.0);
    }
    for _ in 0..CRATES {
        boxed(&mut obstacles, &mut rng, ObstacleKind::Crate, 1.5..3.0, 1.5..3.0);
    }
    for _ in 0..BARRICADES {
        barricade(&mut obstacles, &mut rng);
    }
    for _ in 0..ROCKS {
        boxed(&mut obstacles, &mut rng, ObstacleKind::Rock, 2.0..5.0, 1.5..4.0);
    }
    for _ in 0..SHEDS {
        boxed(&mut obstacles, &mut rng, ObstacleKind::Shed, 6.0..9.0, 3.5..5.0);
    }
    for _ in 0..TREES {
        tree(&mut obstacles, &mut rng);
    }
    for _ in 0..HILLS {
        hill(&mut obstacles, &mut rng);
    }

    obstacles
}

/// Uniform position inside the buildable interior, away from the boundary.
fn site(rng: &mut XorShift64) -> (f32, f32) {
    let half = TERRAIN_SIZE / 2.0 - 100.0;
    (rng.range_f32(-half, half), rng.range_f32(-half, half))
}

/// Box of the given kind seated on the ground at a random site.
fn grounded(center_x: f32, center_z: f32, size: Vec3, kind: ObstacleKind) -> Obstacle {
    let ground = terrain::ground_height(center_x, center_z);
    Obstacle::new(
        Vec3::new(center_x, ground + size.y / 2.0, center_z),
        size,
        kind,
    )
}

fn boxed(
    out: &mut Vec<Obstacle>,
    rng: &mut XorShift64,
    kind: ObstacleKind,
    width: std::ops::Range<f32>,
    height: std::ops::Range<f32>,
) {
    let (x, z) = site(rng);
    let size = Vec3::new(
        rng.range_f32(width.start, width.end),
        rng.range_f32(height.start, height.end),
        rng.range_f32(width.start, width.end),
    );
    out.push(grounded(x, z, size, kind));
}

fn boundary_walls(out: &mut Vec<Obstacle>) {
    let half = TERRAIN_SIZE / 2.0;
    let long = Vec3::new(TERRAIN_SIZE, 20.0, 2.0);
    let tall = Vec3::new(2.0, 20.0, TERRAIN_SIZE);
    out.push(Obstacle::new(Vec3::new(0.0, 10.0, -half), long, ObstacleKind::Boundary));
    out.push(Obstacle::new(Vec3::new(0.0, 10.0, half), long, ObstacleKind::Boundary));
    out.push(Obstacle::new(Vec3::new(-half, 10.0, 0.0), tall, ObstacleKind::Boundary));
    out.push(Obstacle::new(Vec3::new(half, 10.0, 0.0), tall, ObstacleKind::Boundary));
}

/// Four walls around a rectangular floor plan, with a door gap split into
/// the south wall.
fn house(out: &mut Vec<Obstacle>, rng: &mut XorShift64) {
    let (x, z) = site(rng);
    let w = rng.range_f32(12.0, 20.0);
    let d = rng.range_f32(12.0, 20.0);
    let h = rng.range_f32(6.0, 9.0);
    let door = 3.0;

    // North wall, then east/west.
    out.push(grounded(x, z - d / 2.0, Vec3::new(w, h, WALL_THICKNESS), ObstacleKind::HouseWall));
    out.push(grounded(x - w / 2.0, z, Vec3::new(WALL_THICKNESS, h, d), ObstacleKind::HouseWall));
    out.push(grounded(x + w / 2.0, z, Vec3::new(WALL_THICKNESS, h, d), ObstacleKind::HouseWall));

    // South wall as two segments leaving a door-sized gap.
    let seg = (w - door) / 2.0;
    out.push(grounded(
        x - (door + seg) / 2.0,
        z + d / 2.0,
        Vec3::new(seg, h, WALL_THICKNESS),
        ObstacleKind::HouseWall,
    ));
    out.push(grounded(
        x + (door + seg) / 2.0,
        z + d / 2.0,
        Vec3::new(seg, h, WALL_THICKNESS),
        ObstacleKind::HouseWall,
    ));
}

/// A loose cluster of broken wall segments.
fn ruins(out: &mut Vec<Obstacle>, rng: &mut XorShift64) {
    let (x, z) = site(rng);
    let pieces = 2 + (rng.next_f32() * 3.0) as usize;
    for _ in 0..pieces {
        let px = x + rng.range_f32(-8.0, 8.0);
        let pz = z + rng.range_f32(-8.0, 8.0);
        let size = Vec3::new(
            rng.range_f32(2.0, 6.0),
            rng.range_f32(1.5, 4.5),
            rng.range_f32(0.8, 1.5),
        );
        out.push(grounded(px, pz, size, ObstacleKind::Ruins));
    }
}

/// Straight run of fence segments along one axis.
fn fence_row(out: &mut Vec<Obstacle>, rng: &mut XorShift64) {
    let (x, z) = site(rng);
    let segments = 3 + (rng.next_f32() * 4.0) as usize;
    let seg_len = 4.0;
    let along_x = rng.next_f32() < 0.5;
    for i in 0..segments {
        let offset = i as f32 * seg_len;
        let (px, pz) = if along_x { (x + offset, z) } else { (x, z + offset) };
        let size = if along_x {
            Vec3::new(seg_len, 1.8, 0.3)
        } else {
            Vec3::new(0.3, 1.8, seg_len)
        };
        out.push(grounded(px, pz, size, ObstacleKind::Fence));
    }
}

fn barricade(out: &mut Vec<Obstacle>, rng: &mut XorShift64) {
    let (x, z) = site(rng);
    let size = Vec3::new(rng.range_f32(4.0, 8.0), rng.range_f32(1.2, 2.0), 1.0);
    out.push(grounded(x, z, size, ObstacleKind::Barricade));
}

/// Solid trunk plus a walk-through foliage box; the decoration fields give
/// the client enough to draw a canopy without its own generator.
fn tree(out: &mut Vec<Obstacle>, rng: &mut XorShift64) {
    let (x, z) = site(rng);
    let trunk_h = rng.range_f32(5.0, 8.0);
    let foliage = rng.range_f32(3.5, 5.5);
    let ground = terrain::ground_height(x, z);

    let mut trunk = grounded(x, z, Vec3::new(0.8, trunk_h, 0.8), ObstacleKind::Tree);
    trunk.trunk_radius = Some(0.4);
    out.push(trunk);

    let mut canopy = Obstacle::new(
        Vec3::new(x, ground + trunk_h + foliage / 2.0 - 0.5, z),
        Vec3::new(foliage, foliage, foliage),
        ObstacleKind::TreeFoliage,
    );
    canopy.foliage_radius = Some(foliage / 2.0);
    canopy.foliage_color = Some(FOLIAGE_COLORS[(rng.next_u64() % 4) as usize]);
    out.push(canopy);
}

/// Wide, low mound. Not solid, but it blocks sight over its crest.
fn hill(out: &mut Vec<Obstacle>, rng: &mut XorShift64) {
    let (x, z) = site(rng);
    let size = Vec3::new(
        rng.range_f32(20.0, 40.0),
        rng.range_f32(3.0, 5.0),
        rng.range_f32(20.0, 40.0),
    );
    out.push(grounded(x, z, size, ObstacleKind::Hill));
}
