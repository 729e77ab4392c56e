//! Sliding-window rate budget tracking.
//!
//! A [`RateBudgetTracker`] maintains a trailing window of consumed capacity
//! units and answers "can an operation of cost C proceed now, and if not,
//! how long until it can." It has no knowledge of what the units represent;
//! the scheduler composes one tracker per metered resource (token volume,
//! request count).
//!
//! The current time is always passed in by the caller rather than read
//! ambiently, which keeps the tracker a pure state machine and makes tests
//! deterministic under tokio's paused clock.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

// =============================================================================
// Admission Decision
// =============================================================================

/// Outcome of a single admission check. Produced once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub admitted: bool,

    /// When denied, the exact duration after which the request will fit.
    /// `None` on admission, and also when the cost exceeds the whole budget
    /// (no amount of waiting frees enough capacity).
    pub retry_after: Option<Duration>,
}

impl AdmissionDecision {
    const ADMITTED: Self = Self {
        admitted: true,
        retry_after: None,
    };

    const fn denied(retry_after: Option<Duration>) -> Self {
        Self {
            admitted: false,
            retry_after,
        }
    }
}

// =============================================================================
// Rate Budget Tracker
// =============================================================================

/// Trailing-window capacity tracker.
///
/// Invariant: after every admission, the sum of costs of entries younger
/// than the window duration never exceeds the budget. Entries at or past
/// the window boundary are purged before each check.
#[derive(Debug)]
pub struct RateBudgetTracker {
    /// Short resource label used in logs and errors ("tokens", "requests").
    label: &'static str,
    budget: u64,
    window: Duration,
    entries: VecDeque<(Instant, u64)>,
}

impl RateBudgetTracker {
    #[must_use]
    pub const fn new(label: &'static str, budget: u64, window: Duration) -> Self {
        Self {
            label,
            budget,
            window,
            entries: VecDeque::new(),
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    #[must_use]
    pub const fn budget(&self) -> u64 {
        self.budget
    }

    /// Capacity consumed within the window as of `now`.
    #[must_use]
    pub fn used(&mut self, now: Instant) -> u64 {
        self.purge(now);
        self.entries.iter().map(|(_, cost)| cost).sum()
    }

    /// Check admission and, if admitted, charge the window.
    ///
    /// Purges expired entries, sums the remainder, and either appends
    /// `(now, cost)` or computes the exact earliest time enough entries will
    /// have expired to make room. The retry computation walks entries
    /// oldest-first summing would-be-freed cost until the deficit is
    /// covered; it is exact by construction, never an approximation.
    pub fn try_admit(&mut self, cost: u64, now: Instant) -> AdmissionDecision {
        match self.check(cost, now) {
            Ok(()) => {
                self.commit(cost, now);
                AdmissionDecision::ADMITTED
            }
            Err(retry_after) => AdmissionDecision::denied(retry_after),
        }
    }

    /// Check admission without charging the window.
    ///
    /// The scheduler uses this to evaluate all of its trackers atomically
    /// before committing any of them.
    ///
    /// # Errors
    ///
    /// Returns the exact retry duration on denial, or `None` when the cost
    /// can never fit the budget.
    pub fn check(&mut self, cost: u64, now: Instant) -> Result<(), Option<Duration>> {
        self.purge(now);

        if cost > self.budget {
            return Err(None);
        }

        let used: u64 = self.entries.iter().map(|(_, c)| c).sum();
        if used + cost <= self.budget {
            return Ok(());
        }

        // Walk oldest-first, accumulating freed cost until the deficit is
        // covered. The covering entry's expiry is the earliest admit time.
        let mut freed = 0u64;
        for &(stamp, entry_cost) in &self.entries {
            freed += entry_cost;
            if used - freed + cost <= self.budget {
                let expiry = stamp + self.window;
                return Err(Some(expiry.saturating_duration_since(now)));
            }
        }

        // Unreachable while the window invariant holds (cost <= budget and
        // draining everything always makes room), kept as a safe fallback.
        Err(Some(self.window))
    }

    /// Charge the window. Only call after a successful [`Self::check`].
    pub fn commit(&mut self, cost: u64, now: Instant) {
        self.entries.push_back((now, cost));
    }

    /// Drop entries older than the window. Entries exactly at the boundary
    /// (`timestamp <= now - window`) are expired.
    fn purge(&mut self, now: Instant) {
        while let Some(&(stamp, _)) = self.entries.front() {
            if now.saturating_duration_since(stamp) >= self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}
