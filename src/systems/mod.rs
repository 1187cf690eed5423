// Per-tick simulation systems. Free functions over borrowed world state,
// called in a fixed order by the game loop.

pub mod bots;
pub mod bullets;
pub mod movement;
pub mod visibility;
