use std::{env, time::Duration};

use crate::tuning;

// Runtime/server settings (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("SIGHTLINE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3005)
}

pub fn world_seed() -> u64 {
    env::var("WORLD_SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0x5EED_1E55)
}

pub fn bots_count() -> usize {
    env::var("BOTS_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(tuning::DEFAULT_BOTS_COUNT)
}

pub fn perf_log_enabled() -> bool {
    matches!(env::var("PERF_LOG").as_deref(), Ok("1") | Ok("true"))
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;

// Per-client outbound frame queue. A client that stays this far behind the
// tick loop starts dropping frames rather than stalling the simulation.
pub const FRAME_CHANNEL_CAPACITY: usize = 64;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / tuning::TICK_RATE as u64);
