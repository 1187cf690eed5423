//! WebSocket transport adapter.
//!
//! One task per connection. Inbound binary frames are decoded and
//! forwarded to the game loop; outbound frames arrive on a per-session
//! channel and are written to the socket. Malformed frames are dropped
//! with a throttled warning, the connection stays up.

use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::sink::SinkExt;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config;
use crate::game::{GameEvent, PlayerInput};
use crate::protocol::{self, ClientMessage};
use crate::state::SharedState;
use crate::utils::rng::next_player_id;

const LOG_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum NetError {
    // Connection lifecycle failures, categorized so the disconnect log can
    // say which side gave up.
    Ws(axum::Error),
    GameLoopClosed,
    FrameChannelClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

struct ConnCtx {
    player_id: u32,
    input_tx: mpsc::Sender<GameEvent>,
    frame_rx: mpsc::Receiver<Bytes>,

    msgs_in: u64,
    msgs_out: u64,
    bytes_out: u64,
    invalid_frames: u64,
    last_invalid_log: Instant,
}

async fn handle_socket(mut socket: WebSocket, state: SharedState) {
    // Ids are handed out here, before the world hears about the player, so
    // every log line of this connection carries one.
    let player_id = next_player_id();
    let span = info_span!("conn", player_id);

    async move {
        let (frame_tx, frame_rx) = mpsc::channel::<Bytes>(config::FRAME_CHANNEL_CAPACITY);
        if state
            .input_tx
            .send(GameEvent::Join { player_id, frame_tx })
            .await
            .is_err()
        {
            error!("game loop unavailable; dropping connection");
            let _ = socket.close().await;
            return;
        }
        info!("client connected");

        let mut ctx = ConnCtx {
            player_id,
            input_tx: state.input_tx.clone(),
            frame_rx,
            msgs_in: 0,
            msgs_out: 0,
            bytes_out: 0,
            invalid_frames: 0,
            last_invalid_log: Instant::now() - LOG_THROTTLE,
        };

        let result = run_client_loop(&mut socket, &mut ctx).await;

        // Teardown is unconditional: the entity must leave the world even
        // if the loop exited on an error path.
        let _ = ctx.input_tx.send(GameEvent::Leave { player_id }).await;
        match result {
            Ok(()) => info!(
                msgs_in = ctx.msgs_in,
                msgs_out = ctx.msgs_out,
                bytes_out = ctx.bytes_out,
                "client disconnected"
            ),
            Err(e) => warn!(
                error = ?e,
                msgs_in = ctx.msgs_in,
                msgs_out = ctx.msgs_out,
                bytes_out = ctx.bytes_out,
                "client loop exited with error"
            ),
        }
    }
    .instrument(span)
    .await
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    None => return Ok(()),
                    Some(Err(e)) => return Err(NetError::Ws(e)),
                    Some(Ok(Message::Binary(data))) => {
                        ctx.msgs_in += 1;
                        handle_frame(ctx, &data).await?;
                    }
                    Some(Ok(Message::Close(_))) => return Ok(()),
                    // Text frames and ping/pong are not part of the protocol.
                    Some(Ok(_)) => {}
                }
            }
            outbound = ctx.frame_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        ctx.msgs_out += 1;
                        ctx.bytes_out += frame.len() as u64;
                        socket.send(Message::Binary(frame)).await?;
                    }
                    // The game loop dropped us (session torn down).
                    None => return Err(NetError::FrameChannelClosed),
                }
            }
        }
    }
}

async fn handle_frame(ctx: &mut ConnCtx, data: &[u8]) -> Result<(), NetError> {
    let message = match protocol::decode_client_message(data) {
        Ok(message) => message,
        Err(e) => {
            ctx.invalid_frames += 1;
            if ctx.last_invalid_log.elapsed() >= LOG_THROTTLE {
                warn!(error = %e, invalid_frames = ctx.invalid_frames, "dropping malformed frame");
                ctx.last_invalid_log = Instant::now();
            }
            return Ok(());
        }
    };

    let event = match message {
        ClientMessage::Input {
            move_x,
            move_z,
            yaw,
            pitch,
        } => GameEvent::Input {
            player_id: ctx.player_id,
            input: PlayerInput {
                move_x,
                move_z,
                yaw,
                pitch,
            },
        },
        ClientMessage::Shoot { shooting } => GameEvent::Shoot {
            player_id: ctx.player_id,
            shooting,
        },
        ClientMessage::ToggleMode { los_mode } => GameEvent::ToggleMode {
            player_id: ctx.player_id,
            los_mode,
        },
    };
    ctx.input_tx
        .send(event)
        .await
        .map_err(|_| NetError::GameLoopClosed)
}
