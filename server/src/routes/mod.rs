//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay serves one websocket endpoint for room subscriptions, a
//! token-gated publish endpoint for the services that create and delete
//! messages, and a healthcheck. Everything lives under `/api/v1`.

pub mod events;
pub mod ws;

use axum::{Router, middleware};
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/api/v1/ws", get(ws::handle_ws))
        .route("/api/v1/healthcheck", get(healthcheck))
        .layer(cors);

    // Service-to-service only; no CORS.
    let internal = Router::new()
        .route("/api/v1/rooms/{room_id}/events", post(events::publish_event))
        .route_layer(middleware::from_fn_with_state(state.clone(), events::require_publish_token));

    public.merge(internal).layer(TraceLayer::new_for_http()).with_state(state)
}

/// `GET /api/v1/healthcheck`
async fn healthcheck(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "health": {
            "environment": state.config.env,
            "status": "available",
        }
    }))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
