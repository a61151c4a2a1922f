// src/scheduler/budget.rs

//! Weighted admission control.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::trace;

/// Slack for floating-point accumulation of weights.
const WEIGHT_EPSILON: f64 = 1e-9;

/// How long an admission waiter sleeps before re-checking on its own.
pub const DEFAULT_ADMISSION_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct BudgetState {
    current: f64,
    peak: f64,
    waiting: VecDeque<u64>,
    next_ticket: u64,
}

/// The run's concurrency budget.
///
/// `current_weight` is the sum of weights of admitted jobs; it never exceeds
/// `max_weight`. Waiters are admitted strictly in the order they asked, so a
/// heavy job at the head is not overtaken by lighter ones behind it.
#[derive(Debug)]
pub struct WeightBudget {
    max: f64,
    state: Mutex<BudgetState>,
    changed: Notify,
    poll: Duration,
}

impl WeightBudget {
    pub fn new(max_weight: f64) -> Self {
        Self::with_poll(max_weight, DEFAULT_ADMISSION_POLL)
    }

    pub fn with_poll(max_weight: f64, poll: Duration) -> Self {
        Self {
            max: max_weight,
            state: Mutex::new(BudgetState::default()),
            changed: Notify::new(),
            poll,
        }
    }

    pub fn max_weight(&self) -> f64 {
        self.max
    }

    pub fn current_weight(&self) -> f64 {
        self.lock().current
    }

    /// Highest `current_weight` seen so far.
    pub fn peak_weight(&self) -> f64 {
        self.lock().peak
    }

    /// Number of callers waiting in `admit`.
    pub fn waiting(&self) -> usize {
        self.lock().waiting.len()
    }

    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the admission queue now; admission happens in
    /// [`AdmissionTicket::admit`].
    pub fn enqueue(self: &Arc<Self>) -> AdmissionTicket {
        let id = {
            let mut state = self.lock();
            let id = state.next_ticket;
            state.next_ticket += 1;
            state.waiting.push_back(id);
            id
        };
        AdmissionTicket {
            budget: Arc::clone(self),
            id,
            admitted: false,
        }
    }

    /// Shorthand for `enqueue().admit(weight)`.
    pub async fn admit(self: &Arc<Self>, weight: f64) -> AdmissionPermit {
        self.enqueue().admit(weight).await
    }

    fn try_admit(&self, ticket: u64, weight: f64) -> bool {
        let mut state = self.lock();
        if state.waiting.front() != Some(&ticket) {
            return false;
        }
        if state.current + weight > self.max + WEIGHT_EPSILON {
            trace!(current = state.current, weight, max = self.max, "budget full");
            return false;
        }
        state.waiting.pop_front();
        state.current += weight;
        state.peak = state.peak.max(state.current);
        true
    }

    fn release(&self, weight: f64) {
        {
            let mut state = self.lock();
            state.current = (state.current - weight).max(0.0);
            if state.current < WEIGHT_EPSILON {
                state.current = 0.0;
            }
        }
        self.changed.notify_waiters();
    }

    fn withdraw(&self, ticket: u64) {
        self.lock().waiting.retain(|t| *t != ticket);
        self.changed.notify_waiters();
    }
}

/// Place in the admission queue. Dropping it without being admitted gives
/// up the place.
#[derive(Debug)]
pub struct AdmissionTicket {
    budget: Arc<WeightBudget>,
    id: u64,
    admitted: bool,
}

impl AdmissionTicket {
    /// Wait until `weight` fits and every earlier ticket has been admitted,
    /// then charge it. The weight is released when the permit drops.
    ///
    /// A weight larger than `max_weight` is never admitted; callers must
    /// reject such jobs beforehand.
    pub async fn admit(mut self, weight: f64) -> AdmissionPermit {
        let budget = Arc::clone(&self.budget);
        loop {
            // Register before checking so a release in between is not missed.
            let changed = budget.changed.notified();
            if budget.try_admit(self.id, weight) {
                self.admitted = true;
                budget.changed.notify_waiters();
                return AdmissionPermit {
                    budget: Arc::clone(&budget),
                    weight,
                };
            }
            let _ = tokio::time::timeout(budget.poll, changed).await;
        }
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        if !self.admitted {
            self.budget.withdraw(self.id);
        }
    }
}

/// Weight held by an admitted job. Dropping it returns the weight, whether
/// the job succeeded, failed or panicked.
#[derive(Debug)]
pub struct AdmissionPermit {
    budget: Arc<WeightBudget>,
    weight: f64,
}

impl AdmissionPermit {
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.budget.release(self.weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(max: f64) -> Arc<WeightBudget> {
        Arc::new(WeightBudget::with_poll(max, Duration::from_millis(5)))
    }

    #[tokio::test]
    async fn permits_charge_and_release() {
        let b = budget(2.0);
        let p1 = b.admit(1.0).await;
        let p2 = b.admit(0.5).await;
        assert_eq!(b.current_weight(), 1.5);

        drop(p1);
        assert_eq!(b.current_weight(), 0.5);
        drop(p2);
        assert_eq!(b.current_weight(), 0.0);
        assert_eq!(b.peak_weight(), 1.5);
    }

    #[tokio::test]
    async fn waits_while_full() {
        let b = budget(1.5);
        let first = b.admit(1.0).await;

        let waiter = tokio::spawn({
            let b = Arc::clone(&b);
            async move {
                let _p = b.admit(1.0).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());
        assert_eq!(b.waiting(), 1);

        drop(first);
        waiter.await.unwrap();
        assert_eq!(b.peak_weight(), 1.0);
    }

    #[tokio::test]
    async fn head_of_queue_is_not_overtaken() {
        let b = budget(2.0);
        let running = b.admit(1.5).await;

        let heavy = tokio::spawn({
            let b = Arc::clone(&b);
            async move { b.admit(2.0).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let light = tokio::spawn({
            let b = Arc::clone(&b);
            async move { b.admit(0.5).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // 0.5 would fit, but the 2.0 request is ahead of it.
        assert!(!light.is_finished());

        drop(running);
        let heavy = heavy.await.unwrap();
        assert!(!light.is_finished());
        drop(heavy);
        light.await.unwrap();
    }

    #[tokio::test]
    async fn tickets_fix_the_admission_order() {
        let b = budget(1.0);
        let first = b.enqueue();
        let second = b.enqueue();

        // The later ticket cannot go first even though the budget is empty.
        let jumped = tokio::time::timeout(Duration::from_millis(20), second.admit(0.5)).await;
        assert!(jumped.is_err());
        assert_eq!(b.waiting(), 1);

        let p = first.admit(1.0).await;
        assert_eq!(b.current_weight(), 1.0);
        drop(p);
    }

    #[tokio::test]
    async fn abandoned_waiter_leaves_the_queue() {
        let b = budget(1.0);
        let held = b.admit(1.0).await;

        let gave_up = tokio::time::timeout(Duration::from_millis(20), b.admit(1.0)).await;
        assert!(gave_up.is_err());
        assert_eq!(b.waiting(), 0);

        drop(held);
        let _next = b.admit(1.0).await;
    }
}
