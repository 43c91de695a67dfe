//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the room registry and the loaded configuration; both are cheap
//! to clone.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::services::rooms::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { rooms: RoomRegistry::new(), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
