//! Realtime room channel.
//!
//! DESIGN
//! ======
//! `join` spawns one task per subscription. The task owns the websocket:
//! it connects, sends a single `join` control frame once the socket is open,
//! then demultiplexes inbound text frames to the subscription's
//! [`RoomHandler`]. Frames for other rooms, unknown event types and
//! malformed payloads are dropped without ending the connection.
//!
//! LIFECYCLE
//! =========
//! `Connecting -> Open -> Closed`, or `Connecting -> Closed` when the connect
//! fails or the subscription is torn down first. Whatever ends the
//! connection (remote close, transport error, [`Subscription::close`], or
//! dropping the handle, a panicking handler callback), the task calls
//! `on_disconnect` exactly once on its way out. There is no reconnect here;
//! see [`crate::reconnect`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use frames::{ControlFrame, InboundEvent, Message, RoomId};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;

// =============================================================================
// HANDLERS
// =============================================================================

/// Receiver of one subscription's events.
///
/// Every method is required: a subscription always handles all four.
/// Methods run on the subscription task, one frame at a time.
pub trait RoomHandler: Send + 'static {
    fn on_new_message(&mut self, message: Message);
    fn on_delete_message(&mut self, message: Message);
    fn on_delete_thread(&mut self);
    fn on_disconnect(&mut self);
}

/// A [`RoomHandler`] assembled from four closures.
pub struct Callbacks<N, M, T, D> {
    on_new_message: N,
    on_delete_message: M,
    on_delete_thread: T,
    on_disconnect: D,
}

impl<N, M, T, D> Callbacks<N, M, T, D>
where
    N: FnMut(Message) + Send + 'static,
    M: FnMut(Message) + Send + 'static,
    T: FnMut() + Send + 'static,
    D: FnMut() + Send + 'static,
{
    #[must_use]
    pub fn new(on_new_message: N, on_delete_message: M, on_delete_thread: T, on_disconnect: D) -> Self {
        Self { on_new_message, on_delete_message, on_delete_thread, on_disconnect }
    }
}

impl<N, M, T, D> RoomHandler for Callbacks<N, M, T, D>
where
    N: FnMut(Message) + Send + 'static,
    M: FnMut(Message) + Send + 'static,
    T: FnMut() + Send + 'static,
    D: FnMut() + Send + 'static,
{
    fn on_new_message(&mut self, message: Message) {
        (self.on_new_message)(message);
    }

    fn on_delete_message(&mut self, message: Message) {
        (self.on_delete_message)(message);
    }

    fn on_delete_thread(&mut self) {
        (self.on_delete_thread)();
    }

    fn on_disconnect(&mut self) {
        (self.on_disconnect)();
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Connection state of a subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelState {
    #[default]
    Connecting,
    Open,
    Closed,
}

struct Shared {
    state: watch::Sender<ChannelState>,
    opened: AtomicBool,
}

impl Shared {
    fn set(&self, state: ChannelState) {
        if state == ChannelState::Open {
            self.opened.store(true, Ordering::Release);
        }
        self.state.send_replace(state);
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Teardown handle for one room subscription.
///
/// Dropping the handle tears the subscription down as if
/// [`Subscription::close`] had been called.
pub struct Subscription {
    room_id: RoomId,
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
}

impl Subscription {
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    /// Whether the socket ever reached `Open`.
    #[must_use]
    pub fn was_opened(&self) -> bool {
        self.shared.opened.load(Ordering::Acquire)
    }

    /// Observe state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Close the transport. Safe to call any number of times, in any state.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait until the subscription is `Closed` and `on_disconnect` has run.
    pub async fn closed(&self) {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|state| *state == ChannelState::Closed).await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("room_id", &self.room_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CHANNEL
// =============================================================================

/// Factory for room subscriptions against one realtime endpoint.
#[derive(Clone, Debug)]
pub struct RealtimeChannel {
    url: String,
}

impl RealtimeChannel {
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidOrigin`] if the configured origin is not http(s).
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self { url: config.ws_url()? })
    }

    /// Use an explicit `ws://` or `wss://` endpoint.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to `room_id`.
    ///
    /// Returns immediately; the connection is established in the background.
    /// Connection failures are reported only through `on_disconnect`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn join<H: RoomHandler>(&self, room_id: RoomId, handler: H) -> Subscription {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, _) = watch::channel(ChannelState::Connecting);
        let shared = Arc::new(Shared { state: state_tx, opened: AtomicBool::new(false) });

        tokio::spawn(run_subscription(
            self.url.clone(),
            room_id,
            handler,
            Arc::clone(&shared),
            shutdown_rx,
        ));

        Subscription { room_id, shared, shutdown: shutdown_tx }
    }
}

async fn run_subscription<H: RoomHandler>(
    url: String,
    room_id: RoomId,
    mut handler: H,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
) {
    match connect_and_run(&url, room_id, &mut handler, &shared, &mut shutdown).await {
        Ok(()) => info!(room_id, "realtime: disconnected"),
        Err(e) => warn!(room_id, error = %e, "realtime: connection lost"),
    }

    if panic::catch_unwind(AssertUnwindSafe(|| handler.on_disconnect())).is_err() {
        warn!(room_id, "realtime: on_disconnect panicked");
    }
    shared.set(ChannelState::Closed);
}

async fn connect_and_run<H: RoomHandler>(
    url: &str,
    room_id: RoomId,
    handler: &mut H,
    shared: &Shared,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), ClientError> {
    let (mut ws, _) = tokio::select! {
        result = connect_async(url) => result.map_err(|e| ClientError::Connect(Box::new(e)))?,
        () = shutdown_requested(shutdown) => {
            debug!(room_id, "realtime: closed while connecting");
            return Ok(());
        }
    };

    shared.set(ChannelState::Open);
    info!(room_id, %url, "realtime: connected");

    let join = frames::encode(&ControlFrame::Join { room_id });
    ws.send(WsMessage::Text(join.into()))
        .await
        .map_err(|e| ClientError::Send(Box::new(e)))?;

    loop {
        tokio::select! {
            () = shutdown_requested(shutdown) => {
                if let Err(e) = ws.close(None).await {
                    debug!(room_id, error = %e, "realtime: close handshake failed");
                }
                return Ok(());
            }
            msg = ws.next() => {
                let Some(msg) = msg else { return Ok(()) };
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        let dispatched =
                            panic::catch_unwind(AssertUnwindSafe(|| dispatch_text(room_id, text.as_str(), &mut *handler)));
                        if dispatched.is_err() {
                            if let Err(e) = ws.close(None).await {
                                debug!(room_id, error = %e, "realtime: close handshake failed");
                            }
                            return Err(ClientError::HandlerPanicked);
                        }
                    }
                    // Keep reading so tungstenite can answer the close handshake.
                    Ok(WsMessage::Close(frame)) => {
                        debug!(room_id, ?frame, "realtime: close frame received");
                    }
                    Ok(_) => {}
                    Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                        return Ok(());
                    }
                    Err(e) => return Err(ClientError::Receive(Box::new(e))),
                }
            }
        }
    }
}

/// Resolves once a close was requested or every handle is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Route one inbound text frame to `handler`.
///
/// Returns `true` if a callback was invoked.
pub(crate) fn dispatch_text<H: RoomHandler + ?Sized>(room_id: RoomId, text: &str, handler: &mut H) -> bool {
    let event = match frames::decode_event(text) {
        Ok(Some(event)) => event,
        Ok(None) => {
            debug!(room_id, "realtime: ignoring unknown event type");
            return false;
        }
        Err(e) => {
            warn!(room_id, error = %e, "realtime: dropping malformed frame");
            return false;
        }
    };

    if event.room_id() != room_id {
        debug!(room_id, event_room = event.room_id(), kind = event.kind(), "realtime: event for another room");
        return false;
    }

    match event {
        InboundEvent::NewMessage { data, .. } => handler.on_new_message(data),
        InboundEvent::DeleteMessage { data, .. } => handler.on_delete_message(data),
        InboundEvent::DeleteThread { .. } => handler.on_delete_thread(),
    }
    true
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;
