// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The timer service collaborator: the Supervisor's killTimer (spec.md
//! section 4.5) is "lazily-created, one-shot, 1 second". Built generically
//! over `av_core::Clock` rather than as a real/fake pair — the same
//! implementation backed by `SystemClock` is the real timer and backed by
//! `FakeClock` is the deterministic test timer, since the only thing that
//! differs between them is the notion of "now" (teacher precedent:
//! `crates/core/src/clock.rs`'s own real/fake split is itself the thing
//! being reused, not duplicated).

use av_core::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub trait TimerService: Send + Sync {
    fn arm(&self, key: &str, duration: Duration);
    fn disarm(&self, key: &str);
    fn is_armed(&self, key: &str) -> bool;

    /// True once `duration` has elapsed since the most recent `arm` for
    /// `key` and the timer has not since been disarmed. Mirrors the
    /// killTimer's one-shot expiry check that the event loop polls
    /// (spec.md section 5, "delivered via the event loop").
    fn is_expired(&self, key: &str) -> bool;
}

pub struct ClockTimerService<C: Clock> {
    clock: C,
    armed: Mutex<HashMap<String, (Instant, Duration)>>,
}

impl<C: Clock> ClockTimerService<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, armed: Mutex::new(HashMap::new()) }
    }
}

impl<C: Clock> TimerService for ClockTimerService<C> {
    fn arm(&self, key: &str, duration: Duration) {
        self.armed.lock().insert(key.to_string(), (self.clock.now(), duration));
    }

    fn disarm(&self, key: &str) {
        self.armed.lock().remove(key);
    }

    fn is_armed(&self, key: &str) -> bool {
        self.armed.lock().contains_key(key)
    }

    fn is_expired(&self, key: &str) -> bool {
        match self.armed.lock().get(key) {
            Some((armed_at, duration)) => self.clock.now() >= *armed_at + *duration,
            None => false,
        }
    }
}

/// The real timer service, backed by the system clock.
pub type LinuxTimerService = ClockTimerService<av_core::SystemClock>;

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
