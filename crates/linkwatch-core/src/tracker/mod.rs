//! Debounced status tracker
//!
//! The tracker holds the last-known value and last-logged timestamp for each
//! tracked signal and decides, on every observation, whether the observation
//! is worth a durable log record.
//!
//! ## Emission rule
//!
//! Given a new observation `v` at time `t` for a signal:
//!
//! - `changed`: `v` differs from the last committed value
//! - `stale`: nothing was ever logged for the signal, or the unconditional
//!   interval has elapsed since the last emission
//!
//! A record is emitted iff `changed || stale`. Change-only logging would go
//! silent during a long outage (indistinguishable from a dead process);
//! unconditional periodic logging would flood the file with identical
//! lines. The combination bounds both log volume and staleness.
//!
//! ## Observe / commit split
//!
//! [`StatusTracker::observe`] is pure: it inspects state and returns a
//! [`Decision`] without mutating anything. The caller appends the record
//! and then calls [`StatusTracker::commit`]. `last_logged_at` is therefore
//! set only when a record actually reached the log store — a failed append
//! leaves the signal due for emission on the next cycle.
//!
//! The tracker is an explicit value object, never global state: the engine
//! owns one behind a mutex, and tests run as many independent trackers as
//! they like in one process.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Identity of a tracked quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Overall network reachability (UP / DOWN)
    Network,
    /// Which access service is currently active (the fibre/cable/cellular trio)
    ConnectionService,
    /// The observed public IP address
    PublicIp,
}

/// Per-signal debounce state
#[derive(Debug, Clone, Default)]
struct SignalState {
    last_value: Option<String>,
    last_logged_at: Option<DateTime<Utc>>,
}

/// Outcome of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Append a record, then commit
    Emit,
    /// No I/O, no side effect
    Quiet,
}

impl Decision {
    /// Whether this decision asks for a record
    pub fn should_emit(&self) -> bool {
        matches!(self, Decision::Emit)
    }
}

/// Debounced per-signal state machine
#[derive(Debug)]
pub struct StatusTracker {
    signals: HashMap<Signal, SignalState>,
    unconditional_interval: Duration,
}

impl StatusTracker {
    /// Create a tracker with all signals unset
    ///
    /// `unconditional_interval` is the staleness bound: an unchanged signal
    /// is re-logged once this much time has passed since its last emission.
    pub fn new(unconditional_interval: Duration) -> Self {
        Self {
            signals: HashMap::new(),
            unconditional_interval,
        }
    }

    /// Decide whether an observation deserves a record
    ///
    /// Pure with respect to tracker state; pair with [`commit`](Self::commit)
    /// after the record has been appended.
    pub fn observe(&self, signal: Signal, value: &str, at: DateTime<Utc>) -> Decision {
        let state = self.signals.get(&signal);

        let changed = state.and_then(|s| s.last_value.as_deref()) != Some(value);
        let stale = match state.and_then(|s| s.last_logged_at) {
            None => true,
            Some(logged_at) => at.signed_duration_since(logged_at) >= self.unconditional_interval,
        };

        if changed || stale {
            Decision::Emit
        } else {
            Decision::Quiet
        }
    }

    /// Record that an emission for `signal` was durably appended at `at`
    pub fn commit(&mut self, signal: Signal, value: &str, at: DateTime<Utc>) {
        let state = self.signals.entry(signal).or_default();
        state.last_value = Some(value.to_string());
        state.last_logged_at = Some(at);
    }

    /// Last committed value for a signal, if any
    pub fn last_value(&self, signal: Signal) -> Option<&str> {
        self.signals
            .get(&signal)
            .and_then(|s| s.last_value.as_deref())
    }

    /// Timestamp of the last emission for a signal, if any
    pub fn last_logged_at(&self, signal: Signal) -> Option<DateTime<Utc>> {
        self.signals.get(&signal).and_then(|s| s.last_logged_at)
    }
}
