//! Gameplay constants shared with the client.
//!
//! Everything in this module must match the client byte-for-byte and
//! metre-for-metre: the heightmap lattice, the silhouette ray offsets and
//! the binary wire layout all depend on these exact values. Keep this the
//! single definition site so the two sides cannot drift.
//!
//! Runtime/server settings (ports, channel capacities) live in `config`
//! instead.

/// Side length of the square world in world units.
pub const TERRAIN_SIZE: f32 = 2000.0;

/// Number of grid cells per axis.
pub const GRID_SIZE: usize = 400;

/// Side length of one grid cell. Larger than the maximum per-tick movement
/// step, so an entity can cross at most one cell boundary per tick.
pub const CELL_SIZE: f32 = 5.0;

/// Radius of the per-client interest sphere.
pub const VIEW_DISTANCE: f32 = 200.0;

/// Default number of AI-driven entities. Overridable via `BOTS_COUNT`.
pub const DEFAULT_BOTS_COUNT: usize = 600;

/// Fixed simulation rate in ticks per second.
pub const TICK_RATE: u32 = 30;

/// Player movement speed in units per second.
pub const PLAYER_SPEED: f32 = 50.0;

/// Player collision radius against obstacle footprints.
pub const PLAYER_RADIUS: f32 = 1.5;

/// Bot movement speed in units per second.
pub const BOT_SPEED: f32 = 5.0;

/// Bot turn speed in radians per second.
pub const BOT_TURN_SPEED: f32 = 1.0;

/// Bot collision radius against obstacle footprints.
pub const BOT_RADIUS: f32 = 1.5;

/// Maximum shots per second per player.
pub const FIRE_RATE: f32 = 5.0;

/// Bullet speed in units per second.
pub const BULLET_SPEED: f32 = 150.0;

/// Damage applied per bullet hit.
pub const BULLET_DAMAGE: u16 = 20;

/// Bullet lifetime before despawn.
pub const BULLET_LIFETIME_MS: u64 = 3000;

/// Bullet collision radius; participates in the entity capsule test.
pub const BULLET_RADIUS: f32 = 0.3;

/// Entity silhouette half-width used by the LOS edge rays and bullet hits.
pub const ENTITY_RADIUS: f32 = 1.0;

/// Height of the entity silhouette's head-top rays above its position.
pub const ENTITY_HEIGHT: f32 = 3.6;

/// Viewer eye height above entity position; also the bullet muzzle height.
pub const EYE_HEIGHT: f32 = 3.0;

/// Ticks a previously-visible entity stays in the broadcast set after LOS
/// is lost. One tick (~33 ms) smooths brief occlusion without widening the
/// wallhack surface; larger values must be rejected.
pub const LOS_GRACE_TICKS: u8 = 1;

/// Heightmap lattice spacing in world units.
pub const TILE_SIZE: f32 = 10.0;

/// Heightmap vertical scale.
pub const HEIGHT_SCALE: f32 = 2.5;

/// Entity feet sit this far above the sampled ground height.
pub const FEET_OFFSET: f32 = 2.0;

/// Hit points every entity spawns and respawns with.
pub const MAX_HP: u16 = 100;

/// First id handed to a connecting player. Bots occupy `[0, BOTS_COUNT)`;
/// keeping the ranges disjoint makes the `is_player` flag a redundant
/// cross-check rather than the only distinction.
pub const FIRST_PLAYER_ID: u32 = 1000;
