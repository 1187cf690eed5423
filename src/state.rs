use std::sync::Arc;

use tokio::sync::mpsc;

use crate::game::GameEvent;

/// Shared handle the HTTP/WS layer uses to reach the game loop.
#[derive(Clone)]
pub struct AppState {
    pub input_tx: mpsc::Sender<GameEvent>,
}

pub type SharedState = Arc<AppState>;
