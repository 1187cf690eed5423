//! Runtime bootstrap: logging, world generation, the game loop task and
//! the HTTP/WS router.

use std::io::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use tokio::sync::mpsc;

use crate::config;
use crate::game::{world_task, GameEvent};
use crate::net::ws_handler;
use crate::perf::PerfTracker;
use crate::protocol;
use crate::state::{AppState, SharedState};
use crate::world::World;

fn init_runtime() {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn build_state() -> SharedState {
    let seed = config::world_seed();
    let bots_count = config::bots_count();

    // World construction is the only fatal phase; everything after runs
    // behind the isolation of the tick loop.
    let world = World::generate(seed, bots_count);
    let config_frame = protocol::encode_config(&world.obstacles);
    tracing::info!(
        seed,
        bots = bots_count,
        obstacles = world.obstacles.len(),
        config_bytes = config_frame.len(),
        "world generated"
    );

    let (input_tx, input_rx) = mpsc::channel::<GameEvent>(config::INPUT_CHANNEL_CAPACITY);
    tokio::spawn(world_task(
        world,
        input_rx,
        config_frame,
        PerfTracker::new(config::perf_log_enabled()),
        seed,
    ));

    Arc::new(AppState { input_tx })
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state();

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state);

    tracing::info!(%address, "listening");

    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([0, 0, 0, 0], config::http_port()));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}
