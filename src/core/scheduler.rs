//! Admission control for the metered vision service.
//!
//! One process-wide [`AdmissionScheduler`] serializes access to the shared
//! per-window budgets. It wraps N independent [`RateBudgetTracker`]s (token
//! volume, request count) that must ALL admit for a call to proceed, and
//! owns the fairness and wait/cancel semantics:
//!
//! - Admission is strictly FIFO by arrival. A later caller is never admitted
//!   ahead of an earlier one still waiting, even with a smaller cost; this
//!   prevents starvation of costly requests under bursty small-request load.
//! - The purge/sum/append cycle across all trackers is one atomic unit under
//!   a single mutex. The lock is never held across an await.
//! - A wait that would exceed the caller's deadline fails instead of
//!   waiting, and a failed or cancelled admission never charges the window.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::core::budget::RateBudgetTracker;
use crate::core::models::ImageDescriptor;

// =============================================================================
// Cost Estimation
// =============================================================================

/// Fixed token overhead of one vision call: system prompt, instructions,
/// and reply headroom.
pub const PROMPT_OVERHEAD_TOKENS: u64 = 1_600;

/// Conservative bytes-per-token ratio for encoded image payloads. Chosen
/// low so the linear model never under-reserves against observed usage.
pub const IMAGE_BYTES_PER_TOKEN: u64 = 512;

/// Estimate the token cost of identifying one image.
///
/// A pure, conservative linear model: payload size divided by a
/// deliberately low bytes-per-token ratio, rounded up, plus the fixed
/// per-call overhead. There is no upper cap: capping would under-reserve
/// for large images and let the shared budget be exceeded.
#[must_use]
pub fn estimate_vision_cost(image: &ImageDescriptor) -> u64 {
    PROMPT_OVERHEAD_TOKENS + (image.len() as u64).div_ceil(IMAGE_BYTES_PER_TOKEN)
}

// =============================================================================
// Admission Outcome
// =============================================================================

/// Proof of admission. The window was charged when this was issued; the
/// holder may invoke the metered call.
#[derive(Debug)]
pub struct AdmissionGrant {
    ticket: u64,
}

impl AdmissionGrant {
    /// Arrival-order ticket, for correlation in logs.
    #[must_use]
    pub const fn ticket(&self) -> u64 {
        self.ticket
    }
}

/// Why an admission attempt did not produce a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    /// Capacity will free up, but not within the caller's deadline. Carries
    /// the binding constraint: the maximum of the denying trackers'
    /// retry_after values.
    Denied { retry_after: Duration },

    /// The deadline expired while queued behind earlier arrivals.
    DeadlineExceeded { deadline: Duration },

    /// The cost can never fit the named tracker's whole budget.
    CostExceedsBudget {
        tracker: &'static str,
        cost: u64,
        budget: u64,
    },
}

// =============================================================================
// Admission Scheduler
// =============================================================================

#[derive(Debug)]
struct SchedulerState {
    trackers: Vec<RateBudgetTracker>,
    /// Tickets of callers waiting for admission, in arrival order. Only the
    /// front ticket may be admitted.
    queue: VecDeque<u64>,
}

/// FIFO admission gate over a set of rate budget trackers.
#[derive(Debug)]
pub struct AdmissionScheduler {
    state: Mutex<SchedulerState>,
    /// Wakes queued waiters after every admission or departure.
    notify: Notify,
    next_ticket: AtomicU64,
}

impl AdmissionScheduler {
    /// Build a scheduler over the given trackers. Callers must pass one
    /// cost per tracker, in the same order.
    #[must_use]
    pub fn new(trackers: Vec<RateBudgetTracker>) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                trackers,
                queue: VecDeque::new(),
            }),
            notify: Notify::new(),
            next_ticket: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn tracker_count(&self) -> usize {
        self.lock_state().trackers.len()
    }

    /// Capacity consumed per tracker as of now, for diagnostics.
    #[must_use]
    pub fn usage(&self) -> Vec<(&'static str, u64)> {
        let now = Instant::now();
        let mut state = self.lock_state();
        state
            .trackers
            .iter_mut()
            .map(|t| (t.label(), t.used(now)))
            .collect()
    }

    /// Wait for admission of `costs` (one entry per tracker), bounded by
    /// `deadline`.
    ///
    /// Callers are served strictly in arrival order. The head of the queue
    /// sleeps exactly the binding retry duration when denied; callers
    /// behind it park until woken. Dropping the returned future removes the
    /// caller from the queue without charging anything.
    ///
    /// # Errors
    ///
    /// - [`AdmitError::Denied`] when the required wait exceeds the remaining
    ///   deadline; carries the binding retry_after for the caller to act on.
    /// - [`AdmitError::DeadlineExceeded`] when the deadline expires while
    ///   queued.
    /// - [`AdmitError::CostExceedsBudget`] when a cost can never fit.
    pub async fn admit(
        &self,
        costs: &[u64],
        deadline: Duration,
    ) -> Result<AdmissionGrant, AdmitError> {
        let deadline_at = Instant::now() + deadline;

        // Oversized costs are permanently inadmissible; reject before
        // queueing so they cannot wedge the FIFO head.
        {
            let state = self.lock_state();
            assert_eq!(
                costs.len(),
                state.trackers.len(),
                "one cost entry required per tracker"
            );
            for (tracker, &cost) in state.trackers.iter().zip(costs) {
                if cost > tracker.budget() {
                    return Err(AdmitError::CostExceedsBudget {
                        tracker: tracker.label(),
                        cost,
                        budget: tracker.budget(),
                    });
                }
            }
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.lock_state().queue.push_back(ticket);
        let mut guard = QueueGuard {
            scheduler: self,
            ticket,
            armed: true,
        };
        trace!(ticket, ?costs, "queued for admission");

        enum Next {
            /// Head of queue, denied; sleep exactly this long.
            Retry(Duration),
            /// Not at the head; park until woken.
            Parked,
        }

        loop {
            // Register interest before inspecting state so a wakeup fired
            // between unlock and await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            let _ = notified.as_mut().enable();

            let next = {
                let mut state = self.lock_state();
                if state.queue.front() == Some(&ticket) {
                    let now = Instant::now();
                    match Self::check_all(&mut state.trackers, costs, now) {
                        Ok(()) => {
                            for (tracker, &cost) in state.trackers.iter_mut().zip(costs) {
                                tracker.commit(cost, now);
                            }
                            state.queue.pop_front();
                            guard.armed = false;
                            drop(state);
                            self.notify.notify_waiters();
                            debug!(ticket, ?costs, "admission granted");
                            return Ok(AdmissionGrant { ticket });
                        }
                        Err(retry_after) => {
                            if now + retry_after > deadline_at {
                                drop(state);
                                debug!(
                                    ticket,
                                    retry_secs = retry_after.as_secs(),
                                    "admission denied, wait exceeds deadline"
                                );
                                return Err(AdmitError::Denied { retry_after });
                            }
                            Next::Retry(retry_after)
                        }
                    }
                } else {
                    Next::Parked
                }
            };

            match next {
                Next::Retry(retry_after) => {
                    trace!(ticket, retry_secs = retry_after.as_secs(), "head waiting");
                    tokio::time::sleep(retry_after).await;
                }
                Next::Parked => {
                    tokio::select! {
                        () = &mut notified => {}
                        () = tokio::time::sleep_until(deadline_at) => {
                            return Err(AdmitError::DeadlineExceeded { deadline });
                        }
                    }
                }
            }
        }
    }

    /// Check every tracker without committing any. On denial, returns the
    /// maximum of the denying trackers' retry durations: the binding
    /// constraint.
    fn check_all(
        trackers: &mut [RateBudgetTracker],
        costs: &[u64],
        now: Instant,
    ) -> Result<(), Duration> {
        let mut binding: Option<Duration> = None;
        for (tracker, &cost) in trackers.iter_mut().zip(costs) {
            if let Err(retry) = tracker.check(cost, now) {
                // Oversized costs were rejected before queueing, so the
                // None case cannot occur here.
                let retry = retry.unwrap_or(Duration::ZERO);
                binding = Some(binding.map_or(retry, |b| b.max(retry)));
            }
        }
        match binding {
            None => Ok(()),
            Some(retry) => Err(retry),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a waiter's ticket when its admission future is dropped before a
/// grant was issued, so a cancelled caller cannot wedge the queue head.
struct QueueGuard<'a> {
    scheduler: &'a AdmissionScheduler,
    ticket: u64,
    armed: bool,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.scheduler.lock_state();
            if let Some(pos) = state.queue.iter().position(|&t| t == self.ticket) {
                state.queue.remove(pos);
            }
            drop(state);
            self.scheduler.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn scheduler(token_budget: u64, request_budget: u64) -> Arc<AdmissionScheduler> {
        Arc::new(AdmissionScheduler::new(vec![
            RateBudgetTracker::new("tokens", token_budget, Duration::from_secs(60)),
            RateBudgetTracker::new("requests", request_budget, Duration::from_secs(60)),
        ]))
    }

    #[tokio::test(start_paused = true)]
    async fn admits_immediately_when_capacity_available() {
        let sched = scheduler(1000, 10);
        let grant = sched
            .admit(&[400, 1], Duration::from_secs(5))
            .await
            .expect("should admit");
        assert_eq!(grant.ticket(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_expiry_then_admits() {
        let sched = scheduler(1000, 10);
        sched.admit(&[900, 1], Duration::from_secs(5)).await.unwrap();

        let started = Instant::now();
        sched.admit(&[900, 1], Duration::from_secs(120)).await.unwrap();
        // The head sleeps exactly until the first entry expires.
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn denies_when_wait_exceeds_deadline() {
        let sched = scheduler(1000, 10);
        sched.admit(&[900, 1], Duration::from_secs(5)).await.unwrap();

        let err = sched
            .admit(&[900, 1], Duration::from_secs(10))
            .await
            .expect_err("wait of ~60s cannot fit 10s deadline");
        match err {
            AdmitError::Denied { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(60));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The denial must not have charged the window.
        assert_eq!(sched.usage(), vec![("tokens", 900), ("requests", 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn fifo_small_request_never_overtakes_waiting_large_one() {
        let sched = scheduler(1000, 10);
        sched.admit(&[800, 1], Duration::from_secs(5)).await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));

        // A arrives first with a cost that must wait for expiry.
        let a = {
            let sched = Arc::clone(&sched);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                sched.admit(&[800, 1], Duration::from_secs(120)).await.unwrap();
                order.lock().unwrap().push("A");
            })
        };
        tokio::task::yield_now().await;

        // B arrives second; its 100 tokens would fit right now, but FIFO
        // forbids overtaking A.
        let b = {
            let sched = Arc::clone(&sched);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                sched.admit(&[100, 1], Duration::from_secs(120)).await.unwrap();
                order.lock().unwrap().push("B");
            })
        };

        a.await.unwrap();
        b.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_caller_times_out_cleanly() {
        let sched = scheduler(1000, 10);
        sched.admit(&[1000, 1], Duration::from_secs(5)).await.unwrap();

        // A blocks the head for ~60s; B behind it has a 5s deadline.
        let a = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.admit(&[500, 1], Duration::from_secs(120)).await })
        };
        tokio::task::yield_now().await;

        let err = sched
            .admit(&[100, 1], Duration::from_secs(5))
            .await
            .expect_err("deadline should expire while queued");
        assert!(matches!(err, AdmitError::DeadlineExceeded { .. }));

        // A is unaffected and still admitted at expiry.
        assert!(a.await.unwrap().is_ok());
        assert_eq!(sched.usage(), vec![("tokens", 500), ("requests", 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_does_not_wedge_the_queue() {
        let sched = scheduler(1000, 10);
        sched.admit(&[1000, 1], Duration::from_secs(5)).await.unwrap();

        let a = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.admit(&[500, 1], Duration::from_secs(120)).await })
        };
        tokio::task::yield_now().await;
        a.abort();
        let _ = a.await;

        // B arrives after the cancelled A and must still be served.
        let grant = sched.admit(&[500, 1], Duration::from_secs(120)).await;
        assert!(grant.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_cost_is_rejected_without_queueing() {
        let sched = scheduler(1000, 10);
        let err = sched
            .admit(&[1001, 1], Duration::from_secs(5))
            .await
            .expect_err("cost larger than the budget can never fit");
        assert_eq!(
            err,
            AdmitError::CostExceedsBudget {
                tracker: "tokens",
                cost: 1001,
                budget: 1000,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn denied_retry_after_is_the_binding_constraint() {
        let sched = scheduler(1000, 2);
        sched.admit(&[100, 1], Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        sched.admit(&[100, 1], Duration::from_secs(5)).await.unwrap();

        // Token budget has room; the request tracker is the constraint and
        // frees its oldest entry 50s from now.
        let err = sched
            .admit(&[100, 1], Duration::from_secs(1))
            .await
            .expect_err("request budget exhausted");
        match err {
            AdmitError::Denied { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(50));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn vision_cost_is_linear_and_never_capped() {
        let small = ImageDescriptor::new("image/jpeg", vec![0; 1024]);
        let large = ImageDescriptor::new("image/jpeg", vec![0; 8 * 1024 * 1024]);

        let small_cost = estimate_vision_cost(&small);
        let large_cost = estimate_vision_cost(&large);

        assert_eq!(small_cost, PROMPT_OVERHEAD_TOKENS + 2);
        assert_eq!(
            large_cost,
            PROMPT_OVERHEAD_TOKENS + 8 * 1024 * 1024 / IMAGE_BYTES_PER_TOKEN
        );
        assert!(large_cost > small_cost);
    }

    #[test]
    fn vision_cost_charges_overhead_for_empty_payload() {
        let empty = ImageDescriptor::new("image/jpeg", Vec::new());
        assert_eq!(estimate_vision_cost(&empty), PROMPT_OVERHEAD_TOKENS);
    }
}
