//! # client
//!
//! Realtime client for globechat threads.
//!
//! A [`RealtimeChannel`] opens one websocket per room subscription, announces
//! the room with a `join` control frame, and routes inbound events to a
//! [`RoomHandler`]. Reconnection is not part of the channel; wrap it in a
//! [`Reconnector`] when a subscription should survive connection loss.
//! [`Session`] carries the signed-in user for callers that need it.

pub mod channel;
pub mod config;
pub mod error;
pub mod reconnect;
pub mod session;

pub use channel::{Callbacks, ChannelState, RealtimeChannel, RoomHandler, Subscription};
pub use config::ClientConfig;
pub use error::ClientError;
pub use frames::{InboundEvent, Message, RoomId};
pub use reconnect::{ReconnectHandle, ReconnectPolicy, Reconnector};
pub use session::{AuthStatus, Session, SessionSnapshot, UserData};
