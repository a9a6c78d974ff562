//! Release decisions for queued sends
//!
//! # States
//!
//! ```text
//!            try_advance (rate limited)
//!   ┌──────┐ ─────────────────────────> ┌──────────────────────┐
//!   │ Open │                            │ Draining (unsettled) │
//!   └──────┘ <─────────┐                └──────────────────────┘
//!      ^               │ now >= started + interval     │ complete
//!      │               │                               v
//!      │ complete,     │                ┌──────────────────────┐
//!      │ interval over └─────────────── │ Draining (settled)   │
//!      └─────────────────────────────── └──────────────────────┘
//! ```
//!
//! Independently of the gate, releases stop while `in_flight` has reached the
//! concurrency cap.

use std::collections::VecDeque;

use tokio::time::Instant;

use crate::config::ThrottlePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Open,
    /// A rate-paced send began at `started`; `settled` once it has completed.
    Draining { started: Instant, settled: bool },
}

/// FIFO queue plus the state deciding when its head may be released.
#[derive(Debug)]
pub(crate) struct Throttle<T> {
    policy: ThrottlePolicy,
    queue: VecDeque<T>,
    gate: Gate,
    in_flight: usize,
}

impl<T> Throttle<T> {
    pub(crate) const fn new(policy: ThrottlePolicy) -> Self {
        Self {
            policy,
            queue: VecDeque::new(),
            gate: Gate::Open,
            in_flight: 0,
        }
    }

    pub(crate) fn enqueue(&mut self, item: T) {
        self.queue.push_back(item);
    }

    /// Pop the head of the queue if neither the rate gate nor the
    /// concurrency cap holds it back. The caller must report its completion
    /// through [`Throttle::complete`].
    pub(crate) fn try_advance(&mut self, now: Instant) -> Option<T> {
        if self.is_draining() || self.at_capacity() {
            return None;
        }

        let item = self.queue.pop_front()?;
        self.in_flight += 1;

        if self.policy.min_interval().is_some() {
            self.gate = Gate::Draining {
                started: now,
                settled: false,
            };
        }

        Some(item)
    }

    /// Record that a released item finished, successfully or not.
    ///
    /// Returns the instant the gate will open if the pacing interval has not
    /// yet elapsed.
    pub(crate) fn complete(&mut self, now: Instant) -> Option<Instant> {
        debug_assert!(self.in_flight > 0, "completion without a release");
        self.in_flight = self.in_flight.saturating_sub(1);

        if let Gate::Draining {
            started,
            settled: false,
        } = self.gate
        {
            self.gate = Gate::Draining {
                started,
                settled: true,
            };
        }

        self.poll_gate(now)
    }

    /// Re-check the elapsed time of a settled send and open the gate once the
    /// pacing interval is over. Returns the pending deadline otherwise.
    pub(crate) fn poll_gate(&mut self, now: Instant) -> Option<Instant> {
        let deadline = self.deadline()?;

        if now >= deadline {
            self.gate = Gate::Open;
            None
        } else {
            Some(deadline)
        }
    }

    /// When a settled send stops gating the queue.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        match self.gate {
            Gate::Draining {
                started,
                settled: true,
            } => Some(started + self.policy.min_interval().unwrap_or_default()),
            _ => None,
        }
    }

    pub(crate) const fn is_draining(&self) -> bool {
        matches!(self.gate, Gate::Draining { .. })
    }

    fn at_capacity(&self) -> bool {
        self.policy
            .max_concurrent()
            .is_some_and(|cap| self.in_flight >= cap.get())
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    pub(crate) const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Nothing queued and nothing awaiting completion.
    pub(crate) fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }
}
