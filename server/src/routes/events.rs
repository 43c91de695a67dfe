//! Event publish route.
//!
//! Message and thread services post here after a create or delete; the relay
//! fans the event out to every socket in the room. Callers authenticate with
//! the shared `PUBLISH_TOKEN` in the `x-publish-token` header. Browsers never
//! call this route, so it is mounted outside the CORS layer.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{Json, Response};
use frames::{InboundEvent, RoomId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::AppState;

pub const PUBLISH_TOKEN_HEADER: &str = "x-publish-token";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishResponse {
    /// Sockets the event was queued for.
    pub delivered: usize,
}

/// `POST /api/v1/rooms/{room_id}/events`: broadcast one event to a room.
pub async fn publish_event(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(event): Json<InboundEvent>,
) -> Result<Json<PublishResponse>, StatusCode> {
    if event.room_id() != room_id {
        warn!(room_id, event_room = event.room_id(), kind = event.kind(), "publish: event scoped to another room");
        return Err(StatusCode::BAD_REQUEST);
    }

    let delivered = state.rooms.notify_room(room_id, &event).await;
    info!(room_id, kind = event.kind(), delivered, "publish: event relayed");
    Ok(Json(PublishResponse { delivered }))
}

/// Route layer for the publish route: checks the header before the body is read.
pub async fn require_publish_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(PUBLISH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if !authorized(state.config.publish_token.as_deref(), presented) {
        warn!(path = %request.uri().path(), "publish: rejected unauthenticated request");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}

/// No configured token means nobody is authorized.
fn authorized(expected: Option<&str>, presented: Option<&str>) -> bool {
    let (Some(expected), Some(presented)) = (expected, presented) else {
        return false;
    };
    // Compare every byte so timing does not reveal the matching prefix.
    expected.len() == presented.len()
        && expected
            .bytes()
            .zip(presented.bytes())
            .fold(0_u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
