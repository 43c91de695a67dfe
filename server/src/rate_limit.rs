//! Inbound frame throttling for websocket connections.
//!
//! DESIGN
//! ======
//! Token bucket owned by one connection's read loop: `burst` frames may
//! arrive back to back, then one more is earned every `refill`. An empty
//! bucket does not drop anything: `reserve` tells the caller how long to
//! hold the frame, and the read loop stops reading from that client until
//! then while still forwarding room events to it.

use std::time::{Duration, Instant};

use crate::config::{MAX_WS_RATE_REFILL, WsLimits};

#[derive(Debug)]
pub struct FrameLimiter {
    capacity: u32,
    refill: Duration,
    tokens: u32,
    /// When the most recent token was earned (or pre-claimed).
    last_refill: Instant,
}

impl FrameLimiter {
    #[must_use]
    pub fn new(limits: WsLimits) -> Self {
        Self::new_at(limits, Instant::now())
    }

    fn new_at(limits: WsLimits, now: Instant) -> Self {
        let capacity = limits.rate_burst.max(1);
        let refill = limits.rate_refill.min(MAX_WS_RATE_REFILL);
        Self { capacity, refill, tokens: capacity, last_refill: now }
    }

    /// Take a token for one inbound frame. Returns how long the frame must
    /// be held before it is processed; zero means now.
    pub fn reserve(&mut self) -> Duration {
        self.reserve_at(Instant::now())
    }

    /// Take a token, returning how long the caller must wait for it.
    fn reserve_at(&mut self, now: Instant) -> Duration {
        self.refill_at(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            return Duration::ZERO;
        }

        // Claim the next token ahead of time so back-to-back waiters queue up.
        let ready = self.last_refill + self.refill;
        self.last_refill = ready;
        ready.saturating_duration_since(now)
    }

    fn refill_at(&mut self, now: Instant) {
        if self.refill.is_zero() {
            self.tokens = self.capacity;
            self.last_refill = now;
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = u32::try_from(elapsed.as_nanos() / self.refill.as_nanos())
            .unwrap_or(u32::MAX)
            .min(self.capacity);
        if earned == 0 {
            return;
        }

        if self.tokens + earned >= self.capacity {
            self.tokens = self.capacity;
            self.last_refill = now;
        } else {
            self.tokens += earned;
            self.last_refill += self.refill * earned;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
