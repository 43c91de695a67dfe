//! Reconnecting wrapper around [`RealtimeChannel`].
//!
//! DESIGN
//! ======
//! The channel never reconnects by itself. A [`Reconnector`] runs a
//! supervisor task that calls [`RealtimeChannel::join`] again whenever a
//! subscription drops without being asked to, which also replays the `join`
//! control frame for the room. Message and delete callbacks are forwarded to
//! the caller's handler from whichever subscription is current.
//!
//! Backoff doubles from `initial` up to `max` for consecutive connections
//! that never opened, and resets after one that did. The caller's
//! `on_disconnect` fires once: when the handle is closed or when
//! `max_attempts` consecutive failures have been used up.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use frames::{Message, RoomId};
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

use crate::channel::{RealtimeChannel, RoomHandler};
use crate::config::{DEFAULT_RECONNECT_INITIAL_MS, DEFAULT_RECONNECT_MAX_MS};

// =============================================================================
// POLICY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// Consecutive failed connects before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Delay before reconnecting after `failures` consecutive failed connects.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.initial.saturating_mul(1_u32 << shift).min(self.max)
    }

    #[must_use]
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|limit| failures >= limit)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(DEFAULT_RECONNECT_INITIAL_MS),
            max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            max_attempts: None,
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Teardown handle for a reconnecting subscription. Dropping it closes.
pub struct ReconnectHandle {
    room_id: RoomId,
    shutdown: watch::Sender<bool>,
    finished: watch::Receiver<bool>,
    joins: Arc<AtomicU32>,
}

impl ReconnectHandle {
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Number of times the room has been joined so far.
    #[must_use]
    pub fn joins(&self) -> u32 {
        self.joins.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.finished.borrow()
    }

    /// Stop reconnecting and close the current connection. Idempotent.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait until the supervisor has exited and `on_disconnect` has run.
    pub async fn closed(&self) {
        let mut finished = self.finished.clone();
        let _ = finished.wait_for(|done| *done).await;
    }
}

impl Drop for ReconnectHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// RECONNECTOR
// =============================================================================

#[derive(Clone, Debug)]
pub struct Reconnector {
    channel: RealtimeChannel,
    policy: ReconnectPolicy,
}

impl Reconnector {
    #[must_use]
    pub fn new(channel: RealtimeChannel, policy: ReconnectPolicy) -> Self {
        Self { channel, policy }
    }

    #[must_use]
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Subscribe to `room_id`, rejoining after connection loss.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn join<H: RoomHandler>(&self, room_id: RoomId, handler: H) -> ReconnectHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);
        let joins = Arc::new(AtomicU32::new(0));

        tokio::spawn(supervise(
            self.clone(),
            room_id,
            Arc::new(Mutex::new(handler)),
            shutdown_rx,
            finished_tx,
            Arc::clone(&joins),
        ));

        ReconnectHandle { room_id, shutdown: shutdown_tx, finished: finished_rx, joins }
    }
}

async fn supervise<H: RoomHandler>(
    reconnector: Reconnector,
    room_id: RoomId,
    handler: Arc<Mutex<H>>,
    mut shutdown: watch::Receiver<bool>,
    finished: watch::Sender<bool>,
    joins: Arc<AtomicU32>,
) {
    let policy = reconnector.policy;
    let mut failures: u32 = 0;

    loop {
        let (lost_tx, lost_rx) = oneshot::channel();
        let forward = Forward { inner: Arc::clone(&handler), lost: Some(lost_tx) };
        let sub = reconnector.channel.join(room_id, forward);
        let attempt = joins.fetch_add(1, Ordering::AcqRel) + 1;

        let requested = tokio::select! {
            _ = lost_rx => false,
            () = wait_shutdown(&mut shutdown) => true,
        };
        if requested {
            sub.close();
            sub.closed().await;
            break;
        }

        if sub.was_opened() {
            failures = 0;
        } else {
            failures = failures.saturating_add(1);
            if policy.exhausted(failures) {
                warn!(room_id, failures, "realtime: giving up after repeated connect failures");
                break;
            }
        }

        let delay = policy.delay_for(failures);
        info!(room_id, attempt, failures, ?delay, "realtime: reconnecting");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = wait_shutdown(&mut shutdown) => break,
        }
    }

    let disconnect = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.lock().unwrap_or_else(PoisonError::into_inner).on_disconnect();
    }));
    if disconnect.is_err() {
        warn!(room_id, "realtime: on_disconnect panicked");
    }
    finished.send_replace(true);
}

async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

/// Per-connection handler: forwards events, turns disconnect into a signal.
struct Forward<H> {
    inner: Arc<Mutex<H>>,
    lost: Option<oneshot::Sender<()>>,
}

impl<H: RoomHandler> RoomHandler for Forward<H> {
    fn on_new_message(&mut self, message: Message) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).on_new_message(message);
    }

    fn on_delete_message(&mut self, message: Message) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).on_delete_message(message);
    }

    fn on_delete_thread(&mut self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).on_delete_thread();
    }

    fn on_disconnect(&mut self) {
        if let Some(lost) = self.lost.take() {
            let _ = lost.send(());
        }
    }
}

#[cfg(test)]
#[path = "reconnect_test.rs"]
mod tests;
