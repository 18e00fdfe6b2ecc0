use super::budget::InFlightBudget;
use super::cancel::CancellationToken;
use super::error::{PreprocessError, panic_message};
use super::monitor::WorkerExit;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::{Mutex, PoisonError};

/// Shared position in the caller's source iterator.
///
/// The iterator is only advanced under the lock and is dropped as soon as it
/// reports exhaustion or panics, so later claims return immediately.
pub(crate) struct SourceCursor<I> {
    source: Mutex<Option<I>>,
}

pub(crate) enum Claim<T> {
    Item(T),
    Exhausted,
    Panicked(String),
}

impl<I: Iterator> SourceCursor<I> {
    pub(crate) fn new(source: I) -> Self {
        Self {
            source: Mutex::new(Some(source)),
        }
    }

    pub(crate) fn claim(&self) -> Claim<I::Item> {
        let mut guard = self.source.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(source) = guard.as_mut() else {
            return Claim::Exhausted;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| source.next())) {
            Ok(Some(item)) => Claim::Item(item),
            Ok(None) => {
                *guard = None;
                Claim::Exhausted
            }
            Err(payload) => {
                *guard = None;
                Claim::Panicked(panic_message(payload.as_ref()))
            }
        }
    }
}

/// Pipeline-wide signals shared by the workers and the consumer.
#[derive(Debug)]
pub(crate) struct Control {
    pub(crate) budget: InFlightBudget,
    pub(crate) cancel: CancellationToken,
    halted: AtomicBool,
    cancel_observed: AtomicBool,
}

impl Control {
    pub(crate) fn new(budget: usize, cancel: CancellationToken) -> Self {
        Self {
            budget: InFlightBudget::new(budget),
            cancel,
            halted: AtomicBool::new(false),
            cancel_observed: AtomicBool::new(false),
        }
    }

    /// Stop every worker at its next check point and wake permit waiters.
    pub(crate) fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        self.budget.close();
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_observed(&self) -> bool {
        self.cancel_observed.load(Ordering::SeqCst)
    }

    fn should_stop(&self) -> bool {
        if self.cancel.is_cancelled() {
            self.cancel_observed.store(true, Ordering::SeqCst);
            return true;
        }
        self.is_halted()
    }
}

/// Producer loop for one worker thread.
///
/// Each pass takes a permit, claims one item under the cursor lock, runs the
/// transform outside the lock and pushes the outcome. The permit travels with
/// the pushed message and is returned by the consumer.
pub(crate) fn run_worker<I, R, E, F>(
    worker: usize,
    cursor: &SourceCursor<I>,
    control: &Control,
    transform: &F,
    output: SyncSender<Result<R, PreprocessError<E>>>,
    _exit: WorkerExit,
) where
    I: Iterator,
    F: Fn(I::Item) -> Result<R, E>,
{
    loop {
        if control.should_stop() {
            break;
        }
        if !control.budget.acquire(&control.cancel) {
            // records whether cancellation or a halt closed the budget
            control.should_stop();
            break;
        }
        if control.should_stop() {
            control.budget.release();
            break;
        }

        let item = match cursor.claim() {
            Claim::Item(item) => item,
            Claim::Exhausted => {
                control.budget.release();
                break;
            }
            Claim::Panicked(message) => {
                control.halt();
                let _ = output.send(Err(PreprocessError::SourcePanicked { message }));
                break;
            }
        };

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| transform(item))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(PreprocessError::Transform(error)),
            Err(payload) => Err(PreprocessError::Panicked {
                worker,
                message: panic_message(payload.as_ref()),
            }),
        };

        let failed = outcome.is_err();
        if failed {
            control.halt();
        }
        if output.send(outcome).is_err() || failed {
            break;
        }
    }
}
