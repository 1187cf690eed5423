//! The game loop: a single task that owns the world and the session table.
//!
//! All client traffic funnels into one mpsc inbox and is drained at tick
//! start, so every tick sees a quiescent snapshot of session state. The
//! loop parks itself while nobody is connected and resumes on the next
//! Join without a runaway first deltaTime.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config;
use crate::los::LosScratch;
use crate::math::Vec3;
use crate::perf::PerfTracker;
use crate::protocol::{self, EntityRecord, HitRecord, UpdateFrame, UpdateStats};
use crate::systems::{bots, bullets, movement, visibility};
use crate::tuning::{TICK_RATE, VIEW_DISTANCE};
use crate::utils::rng::XorShift64;
use crate::world::World;

#[derive(Debug)]
pub enum GameEvent {
    Join {
        player_id: u32,
        frame_tx: mpsc::Sender<Bytes>,
    },
    Leave {
        player_id: u32,
    },
    Input {
        player_id: u32,
        input: PlayerInput,
    },
    Shoot {
        player_id: u32,
        shooting: bool,
    },
    ToggleMode {
        player_id: u32,
        los_mode: bool,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerInput {
    pub move_x: f32,
    pub move_z: f32,
    pub yaw: f32,
    pub pitch: f32,
}

struct ClientSession {
    frame_tx: mpsc::Sender<Bytes>,
    los_mode: bool,
    view_distance: f32,
    move_intent: (f32, f32),
    yaw: f32,
    pitch: f32,
    shooting: bool,
    last_shot_millis: u64,
    grace: HashMap<u32, u8>,
    frames_dropped: u64,
}

impl ClientSession {
    fn new(frame_tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            frame_tx,
            los_mode: true,
            view_distance: VIEW_DISTANCE,
            move_intent: (0.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            shooting: false,
            last_shot_millis: 0,
            grace: HashMap::new(),
            frames_dropped: 0,
        }
    }
}

/// Rolling one-second accounting of tick and LOS wallclock. The published
/// fields hold the last completed window.
struct StatsWindow {
    window_start: Instant,
    tick_accum_ms: f32,
    los_accum_ms: f32,
    ticks: u32,
    tick_avg: f32,
    tick_per_sec: f32,
    los_avg: f32,
    los_per_sec: f32,
}

impl StatsWindow {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            tick_accum_ms: 0.0,
            los_accum_ms: 0.0,
            ticks: 0,
            tick_avg: 0.0,
            tick_per_sec: 0.0,
            los_avg: 0.0,
            los_per_sec: 0.0,
        }
    }

    fn record(&mut self, tick_ms: f32, los_ms: f32) {
        self.tick_accum_ms += tick_ms;
        self.los_accum_ms += los_ms;
        self.ticks += 1;
        if self.window_start.elapsed() >= Duration::from_secs(1) {
            let n = self.ticks.max(1) as f32;
            self.tick_avg = self.tick_accum_ms / n;
            self.los_avg = self.los_accum_ms / n;
            self.tick_per_sec = self.tick_accum_ms;
            self.los_per_sec = self.los_accum_ms;
            self.tick_accum_ms = 0.0;
            self.los_accum_ms = 0.0;
            self.ticks = 0;
            self.window_start = Instant::now();
        }
    }
}

pub async fn world_task(
    mut world: World,
    mut input_rx: mpsc::Receiver<GameEvent>,
    config_frame: Bytes,
    mut perf: PerfTracker,
    seed: u64,
) {
    let mut sessions: HashMap<u32, ClientSession> = HashMap::new();
    let mut rng = XorShift64::new(seed ^ 0x7E11_57A7);
    let epoch = Instant::now();
    let mut interval = tokio::time::interval(config::TICK_INTERVAL);
    let mut last_time = Instant::now();
    let mut stats = StatsWindow::new();
    let mut los_scratch = LosScratch::new(world.obstacles.len());
    let mut entity_scratch: Vec<u32> = Vec::new();
    let mut visible: Vec<u32> = Vec::new();

    loop {
        if sessions.is_empty() {
            // Idle until someone connects; the channel closing means the
            // server itself is shutting down.
            match input_rx.recv().await {
                Some(event) => {
                    apply_event(event, &mut world, &mut sessions, &mut rng, &config_frame);
                    last_time = Instant::now();
                    interval.reset();
                    continue;
                }
                None => break,
            }
        }

        interval.tick().await;
        let tick_start = Instant::now();

        // Drain the inbox before stepping so session state is quiescent
        // for the whole tick.
        while let Ok(event) = input_rx.try_recv() {
            apply_event(event, &mut world, &mut sessions, &mut rng, &config_frame);
        }

        let dt = (tick_start - last_time).as_secs_f32();
        last_time = tick_start;

        world.hit_events.clear();

        perf.begin("tick");

        perf.begin("bots");
        bots::step(
            &mut world.entities,
            &mut world.grid,
            &world.obstacles,
            world.bots_count,
            dt,
            &mut rng,
        );
        perf.end();

        perf.begin("players");
        for (id, session) in sessions.iter_mut() {
            let Some(entity) = world.entities.get_mut(id) else {
                continue;
            };
            entity.yaw = session.yaw;
            entity.pitch = session.pitch;
            if movement::apply_player_intent(
                entity,
                session.move_intent,
                dt,
                &world.obstacles,
                &world.grid,
            ) {
                world.grid.move_entity(*id, entity.position);
            }
        }
        perf.end();

        perf.begin("bullets");
        let now_millis = epoch.elapsed().as_millis() as u64;
        for (id, session) in sessions.iter_mut() {
            if session.shooting {
                bullets::try_fire(&mut world, *id, now_millis, &mut session.last_shot_millis);
            }
        }
        bullets::step(&mut world, now_millis, dt, &mut rng, &mut entity_scratch);
        perf.end();

        perf.begin("broadcast");
        let connected_players = sessions.len() as u16;
        let bullet_positions: Vec<Vec3> = world.bullets.iter().map(|b| b.position).collect();
        let hits: Vec<HitRecord> = world
            .hit_events
            .iter()
            .map(|h| HitRecord {
                position: h.position,
                hit_entity: h.hit_entity,
            })
            .collect();

        let mut los_ms = 0.0f32;
        let mut closed: Vec<u32> = Vec::new();
        for (id, session) in sessions.iter_mut() {
            let Some(me) = world.entities.get(id) else {
                continue;
            };
            let my_pos = me.position;

            let los_start = Instant::now();
            visibility::visible_entities(
                *id,
                session.los_mode,
                session.view_distance,
                &mut session.grace,
                &world,
                &mut los_scratch,
                &mut visible,
            );
            los_ms += los_start.elapsed().as_secs_f32() * 1000.0;

            let entities: Vec<EntityRecord> = visible
                .iter()
                .filter_map(|entity_id| world.entities.get(entity_id))
                .map(|e| EntityRecord {
                    id: e.id,
                    position: e.position,
                    yaw: e.yaw,
                    pitch: e.pitch,
                    hp: e.hp,
                    max_hp: e.max_hp,
                    is_player: e.is_player,
                })
                .collect();

            let frame = UpdateFrame {
                my_pos,
                stats: UpdateStats {
                    total_entities: world.entities.len() as u32,
                    total_obstacles: world.obstacles.len() as u32,
                    connected_players,
                    tick_time_ms_per_sec: stats.tick_per_sec,
                    los_time_ms_per_sec: stats.los_per_sec,
                    tick_time_ms_avg: stats.tick_avg,
                    visible_entities: entities.len() as u16,
                    server_mode: session.los_mode as u8,
                    tick_rate: TICK_RATE as u8,
                },
                entities,
                bullets: bullet_positions.clone(),
                hits: hits.clone(),
            };

            match session.frame_tx.try_send(Bytes::from(protocol::encode_update(&frame))) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Slow client: drop the frame, the next one supersedes it.
                    session.frames_dropped += 1;
                    if session.frames_dropped % 128 == 1 {
                        warn!(
                            player_id = *id,
                            dropped = session.frames_dropped,
                            "client falling behind; dropping frames"
                        );
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for player_id in closed {
            sessions.remove(&player_id);
            world.remove_entity(player_id);
            info!(player_id, "frame channel closed; session removed");
        }
        perf.end();

        perf.end();
        stats.record(tick_start.elapsed().as_secs_f32() * 1000.0, los_ms);
        perf.maybe_flush();
    }

    info!("game loop exiting");
}

fn apply_event(
    event: GameEvent,
    world: &mut World,
    sessions: &mut HashMap<u32, ClientSession>,
    rng: &mut XorShift64,
    config_frame: &Bytes,
) {
    match event {
        GameEvent::Join { player_id, frame_tx } => {
            let position = world.spawn_player(player_id, rng);
            // The config envelope is the first frame every client sees.
            let _ = frame_tx.try_send(config_frame.clone());
            sessions.insert(player_id, ClientSession::new(frame_tx));
            info!(player_id, x = position.x, z = position.z, "player joined");
        }
        GameEvent::Leave { player_id } => {
            sessions.remove(&player_id);
            world.remove_entity(player_id);
            info!(player_id, "player left");
        }
        GameEvent::Input { player_id, input } => {
            let Some(session) = sessions.get_mut(&player_id) else {
                return;
            };
            // Non-finite values degrade to standing still with the
            // previous orientation.
            session.move_intent = if input.move_x.is_finite() && input.move_z.is_finite() {
                (input.move_x, input.move_z)
            } else {
                (0.0, 0.0)
            };
            if input.yaw.is_finite() && input.pitch.is_finite() {
                session.yaw = input.yaw;
                session.pitch = input.pitch;
            }
        }
        GameEvent::Shoot { player_id, shooting } => {
            if let Some(session) = sessions.get_mut(&player_id) {
                session.shooting = shooting;
            }
        }
        GameEvent::ToggleMode { player_id, los_mode } => {
            if let Some(session) = sessions.get_mut(&player_id) {
                session.los_mode = los_mode;
                // Grace credit belongs to the previous mode's history.
                session.grace.clear();
                info!(player_id, los_mode, "visibility mode toggled");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot_world(bots: usize) -> (mpsc::Sender<GameEvent>, tokio::task::JoinHandle<()>) {
        let world = World::generate(42, bots);
        let config_frame = protocol::encode_config(&world.obstacles);
        let (input_tx, input_rx) = mpsc::channel(config::INPUT_CHANNEL_CAPACITY);
        let handle = tokio::spawn(world_task(
            world,
            input_rx,
            config_frame,
            PerfTracker::new(false),
            42,
        ));
        (input_tx, handle)
    }

    #[tokio::test]
    async fn join_receives_config_then_updates() {
        let (input_tx, _handle) = boot_world(3);
        let (frame_tx, mut frame_rx) = mpsc::channel(config::FRAME_CHANNEL_CAPACITY);
        input_tx
            .send(GameEvent::Join {
                player_id: 1000,
                frame_tx,
            })
            .await
            .unwrap();

        let config = frame_rx.recv().await.expect("config frame");
        assert_eq!(config[0], protocol::MSG_CONFIG);

        let update = frame_rx.recv().await.expect("update frame");
        assert_eq!(update[0], protocol::MSG_UPDATE);
        let decoded = protocol::decode_update(&update).unwrap();
        assert_eq!(decoded.stats.tick_rate, TICK_RATE as u8);
        assert_eq!(decoded.stats.connected_players, 1);
        // Three bots plus the player.
        assert_eq!(decoded.stats.total_entities, 4);
        // LOS mode is the default.
        assert_eq!(decoded.stats.server_mode, 1);
    }

    #[tokio::test]
    async fn toggle_mode_is_reflected_in_the_stats_tail() {
        let (input_tx, _handle) = boot_world(2);
        let (frame_tx, mut frame_rx) = mpsc::channel(config::FRAME_CHANNEL_CAPACITY);
        input_tx
            .send(GameEvent::Join {
                player_id: 1001,
                frame_tx,
            })
            .await
            .unwrap();
        input_tx
            .send(GameEvent::ToggleMode {
                player_id: 1001,
                los_mode: false,
            })
            .await
            .unwrap();

        let _config = frame_rx.recv().await.expect("config frame");
        // The toggle lands no later than the next tick boundary; skip a
        // couple of frames to be past it.
        let mut server_mode = 1;
        for _ in 0..3 {
            let update = frame_rx.recv().await.expect("update frame");
            server_mode = protocol::decode_update(&update).unwrap().stats.server_mode;
        }
        assert_eq!(server_mode, 0);
    }

    #[tokio::test]
    async fn leave_removes_the_entity_from_the_world() {
        let (input_tx, _handle) = boot_world(1);
        let (frame_tx_a, mut frame_rx_a) = mpsc::channel(config::FRAME_CHANNEL_CAPACITY);
        let (frame_tx_b, mut frame_rx_b) = mpsc::channel(config::FRAME_CHANNEL_CAPACITY);
        input_tx
            .send(GameEvent::Join {
                player_id: 1002,
                frame_tx: frame_tx_a,
            })
            .await
            .unwrap();
        input_tx
            .send(GameEvent::Join {
                player_id: 1003,
                frame_tx: frame_tx_b,
            })
            .await
            .unwrap();
        let _ = frame_rx_b.recv().await;

        input_tx
            .send(GameEvent::Leave { player_id: 1003 })
            .await
            .unwrap();
        drop(frame_rx_b);

        let _config = frame_rx_a.recv().await.expect("config frame");
        let mut total = 0;
        for _ in 0..4 {
            let update = frame_rx_a.recv().await.expect("update frame");
            total = protocol::decode_update(&update).unwrap().stats.total_entities;
        }
        // One bot and one remaining player.
        assert_eq!(total, 2);
    }
}
