//! Relay services.

pub mod rooms;
