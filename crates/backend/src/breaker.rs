// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker around backend startup.
//!
//! Repeated startup failures open the circuit; while open, attempts are
//! refused immediately instead of burning the retry budget against a
//! service that is down. After a cooldown the breaker goes half-open and
//! admits one probe: success closes it, failure re-opens it. Every
//! transition is logged with the backend id.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Consecutive failures that open the circuit.
pub const OPEN_THRESHOLD: u32 = 3;

/// How long the circuit stays open before admitting a probe.
pub const OPEN_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

/// The circuit is open; the service is presumed down until cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitOpen {
    pub retry_in: Duration,
}

/// Per-service breaker. Cheap to share behind a mutex.
pub struct CircuitBreaker {
    service: String,
    threshold: u32,
    cooldown: Duration,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            threshold: OPEN_THRESHOLD,
            cooldown: OPEN_COOLDOWN,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    pub fn with_policy(mut self, threshold: u32, cooldown: Duration) -> Self {
        self.threshold = threshold;
        self.cooldown = cooldown;
        self
    }

    /// Current state name, for failure messages and logs.
    pub fn state_name(&self) -> &'static str {
        match *self.state.lock() {
            State::Closed { .. } => "closed",
            State::Open { .. } => "open",
            State::HalfOpen => "half_open",
        }
    }

    /// Admit or refuse an attempt.
    pub fn check(&self, now: Instant) -> Result<(), CircuitOpen> {
        let mut state = self.state.lock();
        match *state {
            State::Closed { .. } | State::HalfOpen => Ok(()),
            State::Open { since } => {
                let elapsed = now.saturating_duration_since(since);
                if elapsed >= self.cooldown {
                    *state = State::HalfOpen;
                    tracing::info!(service = %self.service, "circuit breaker half-open");
                    Ok(())
                } else {
                    Err(CircuitOpen { retry_in: self.cooldown - elapsed })
                }
            }
        }
    }

    /// A successful attempt closes the circuit.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if !matches!(*state, State::Closed { failures: 0 }) {
            tracing::info!(service = %self.service, "circuit breaker closed");
        }
        *state = State::Closed { failures: 0 };
    }

    /// A failed attempt; may open the circuit.
    pub fn record_failure(&self, now: Instant) {
        let mut state = self.state.lock();
        let next = match *state {
            State::Closed { failures } if failures + 1 >= self.threshold => {
                State::Open { since: now }
            }
            State::Closed { failures } => State::Closed { failures: failures + 1 },
            // A failed probe re-opens immediately.
            State::HalfOpen => State::Open { since: now },
            State::Open { since } => State::Open { since },
        };
        if matches!(next, State::Open { .. }) && !matches!(*state, State::Open { .. }) {
            tracing::warn!(service = %self.service, "circuit breaker open");
        }
        *state = next;
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
