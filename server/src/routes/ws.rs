//! WebSocket handler: room membership and event relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → throttle → parse as `ControlFrame` → join/leave
//! - Room events queued by `notify_room` → forward to client
//!
//! A throttled frame is held, not slept on: reads from the client pause
//! until its token is due, while room events keep flowing out.
//!
//! Clients never publish events over the socket; they only pick rooms.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register nothing until the first `join`
//! 2. `join`/`leave` frames update the room registry
//! 3. Invalid JSON, an unknown `type`, or a binary frame ends the connection
//! 4. Close → leave every room

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code};
use axum::response::Response;
use frames::ControlFrame;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::rate_limit::FrameLimiter;
use crate::services::rooms::ClientTx;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid control frame: {0}")]
    Codec(#[from] frames::CodecError),
    #[error("binary frames are not supported")]
    Binary,
}

// =============================================================================
// UPGRADE
// =============================================================================

/// `GET /api/v1/ws`: upgrade to the realtime relay.
pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let limits = state.config.ws;

    // Per-connection queue for room events.
    let (client_tx, mut client_rx) = mpsc::channel::<String>(limits.client_buffer);
    let mut limiter = FrameLimiter::new(limits);
    // A frame that arrived with the bucket empty. Reads pause until it is due.
    let mut held: Option<(Instant, Utf8Bytes)> = None;

    info!(%client_id, "ws: client connected");

    loop {
        let due = held.as_ref().map(|(at, _)| *at);
        tokio::select! {
            msg = socket.recv(), if held.is_none() => {
                let Some(Ok(msg)) = msg else { break };
                let result = match msg {
                    Message::Text(text) => {
                        let wait = limiter.reserve();
                        if wait.is_zero() {
                            process_inbound_text(&state, client_id, &client_tx, text.as_str()).await
                        } else {
                            debug!(%client_id, ?wait, "ws: throttling client");
                            held = Some((Instant::now() + wait, text));
                            Ok(())
                        }
                    }
                    Message::Binary(_) => Err(RelayError::Binary),
                    Message::Close(_) => break,
                    _ => Ok(()),
                };
                if let Err(e) = result {
                    close_invalid(&mut socket, client_id, &e).await;
                    break;
                }
            }
            () = sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {
                let Some((_, text)) = held.take() else { continue };
                if let Err(e) = process_inbound_text(&state, client_id, &client_tx, text.as_str()).await {
                    close_invalid(&mut socket, client_id, &e).await;
                    break;
                }
            }
            Some(text) = client_rx.recv() => {
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let left = state.rooms.leave_all(client_id).await;
    info!(%client_id, rooms = left, "ws: client disconnected");
}

async fn close_invalid(socket: &mut WebSocket, client_id: Uuid, error: &RelayError) {
    warn!(%client_id, %error, "ws: closing connection");
    let close = CloseFrame {
        code: close_code::POLICY,
        reason: Utf8Bytes::from_static("invalid frame"),
    };
    let _ = socket.send(Message::Close(Some(close))).await;
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and apply one inbound control frame.
async fn process_inbound_text(
    state: &AppState,
    client_id: Uuid,
    client_tx: &ClientTx,
    text: &str,
) -> Result<(), RelayError> {
    let frame = frames::decode_control(text)?;
    debug!(%client_id, ?frame, "ws: recv frame");

    match frame {
        ControlFrame::Join { room_id } => state.rooms.join(room_id, client_id, client_tx.clone()).await,
        ControlFrame::Leave { room_id } => {
            state.rooms.leave(room_id, client_id).await;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
