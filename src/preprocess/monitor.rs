//! Completion tracking for the worker set.
//!
//! Every worker holds a clone of the output sender, so the buffer reports
//! itself complete the moment the last worker returns. The monitor only has
//! to count live workers for state reporting and join them exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

/// Owns the worker handles and the live-worker counter.
#[derive(Debug)]
pub(crate) struct CompletionMonitor {
    workers: Vec<(usize, JoinHandle<()>)>,
    live: Arc<AtomicUsize>,
}

impl CompletionMonitor {
    pub(crate) fn new() -> Self {
        Self {
            workers: Vec::new(),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Count a worker as live until the returned guard drops.
    pub(crate) fn enter(&self) -> WorkerExit {
        self.live.fetch_add(1, Ordering::SeqCst);
        WorkerExit {
            live: Arc::clone(&self.live),
        }
    }

    pub(crate) fn track(&mut self, worker: usize, handle: JoinHandle<()>) {
        self.workers.push((worker, handle));
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Join every tracked worker. Later calls are no-ops.
    ///
    /// Returns the ids of workers whose thread ended in a panic that the
    /// worker loop did not catch.
    pub(crate) fn join_all(&mut self) -> Vec<usize> {
        let mut abnormal = Vec::new();
        for (worker, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                abnormal.push(worker);
            }
        }
        abnormal
    }
}

/// Decrements the live-worker count when a worker returns or unwinds.
#[derive(Debug)]
pub(crate) struct WorkerExit {
    live: Arc<AtomicUsize>,
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::CompletionMonitor;
    use std::thread;

    #[test]
    fn live_count_follows_guards() {
        let monitor = CompletionMonitor::new();
        let first = monitor.enter();
        let second = monitor.enter();
        assert_eq!(monitor.live(), 2);

        drop(first);
        assert_eq!(monitor.live(), 1);
        drop(second);
        assert_eq!(monitor.live(), 0);
    }

    #[test]
    fn join_all_reports_panicked_workers_once() {
        let mut monitor = CompletionMonitor::new();

        let exit = monitor.enter();
        monitor.track(0, thread::spawn(move || drop(exit)));

        let exit = monitor.enter();
        monitor.track(
            1,
            thread::spawn(move || {
                let _exit = exit;
                panic!("worker died");
            }),
        );

        assert_eq!(monitor.join_all(), vec![1]);
        assert_eq!(monitor.live(), 0);
        assert!(monitor.join_all().is_empty());
    }
}
