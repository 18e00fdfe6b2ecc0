use super::cancel::CancellationToken;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Longest a blocked acquirer sleeps before re-checking the cancellation token.
const CANCEL_CHECK_TICK: Duration = Duration::from_millis(10);

/// Counting limiter for items that are being transformed or sit in the
/// output buffer unconsumed.
///
/// Workers take a permit before claiming a source item; the consumer gives it
/// back when it pulls the finished item out of the buffer.
#[derive(Debug)]
pub(crate) struct InFlightBudget {
    state: Mutex<BudgetState>,
    available_changed: Condvar,
    capacity: usize,
}

#[derive(Debug)]
struct BudgetState {
    available: usize,
    closed: bool,
}

impl InFlightBudget {
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(BudgetState {
                available: permits,
                closed: false,
            }),
            available_changed: Condvar::new(),
            capacity: permits,
        }
    }

    /// Block until a permit is free. Returns `false` without taking a permit
    /// once the budget is closed or `cancel` fires.
    pub(crate) fn acquire(&self, cancel: &CancellationToken) -> bool {
        let mut state = self.lock();
        loop {
            if state.closed || cancel.is_cancelled() {
                return false;
            }
            if state.available > 0 {
                state.available -= 1;
                return true;
            }
            state = self
                .available_changed
                .wait_timeout(state, CANCEL_CHECK_TICK)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Return one permit. Extra releases past the initial capacity are ignored.
    pub(crate) fn release(&self) {
        let mut state = self.lock();
        if state.available < self.capacity {
            state.available += 1;
            drop(state);
            self.available_changed.notify_one();
        }
    }

    /// Refuse all further acquisitions and wake every waiter. Idempotent.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            drop(state);
            self.available_changed.notify_all();
        }
    }

    pub(crate) fn available(&self) -> usize {
        self.lock().available
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    // Holders never panic while locked, but a poisoned lock still carries a
    // consistent count.
    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
