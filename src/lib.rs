pub mod config;
pub mod game;
pub mod grid;
pub mod los;
pub mod math;
pub mod net;
pub mod perf;
pub mod protocol;
pub mod server;
pub mod state;
pub mod systems;
pub mod terrain;
pub mod tuning;
pub mod utils;
pub mod world;
pub mod worldgen;

pub use server::run;
