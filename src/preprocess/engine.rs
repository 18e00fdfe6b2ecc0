use super::config::PreprocessConfig;
use super::error::PreprocessError;
use super::monitor::CompletionMonitor;
use super::worker::{Control, SourceCursor, run_worker};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

/// Lifecycle of one preprocessing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Workers are still claiming or transforming items.
    Running,
    /// Every worker has exited; buffered results remain to be consumed.
    Draining,
    /// The source was exhausted and every result was consumed.
    Completed,
    /// Cancellation stopped the workers early; the sequence has ended.
    Cancelled,
    /// A transform or the source failed; the error has been yielded.
    Faulted,
}

/// Lazy, single-use sequence of transformed items.
///
/// Results arrive in completion order. With one worker that is source order.
/// Dropping the sequence early stops the workers and joins them; a transform
/// that is already running is allowed to finish first.
pub struct Preprocessor<R, E> {
    output: Receiver<Result<R, PreprocessError<E>>>,
    control: Arc<Control>,
    monitor: CompletionMonitor,
    // permit of the last yielded item, returned on the following pull
    holding_permit: bool,
    finished: bool,
    faulted: bool,
}

impl<R, E> Preprocessor<R, E>
where
    R: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn start<I, F>(
        source: I,
        transform: F,
        config: PreprocessConfig,
    ) -> Result<Self, PreprocessError<E>>
    where
        I: Iterator + Send + 'static,
        I::Item: Send + 'static,
        F: Fn(I::Item) -> Result<R, E> + Send + Sync + 'static,
    {
        let threads = config.effective_threads();
        let budget = config.effective_budget();
        let cancel = config.cancellation.unwrap_or_default();

        let control = Arc::new(Control::new(budget, cancel));
        let cursor = Arc::new(SourceCursor::new(source));
        let transform = Arc::new(transform);
        let mut monitor = CompletionMonitor::new();
        // one slot of slack beyond the budget keeps pushes from ever waiting
        let (output_tx, output_rx) = mpsc::sync_channel(budget + 1);

        for worker in 0..threads {
            let exit = monitor.enter();
            let cursor = Arc::clone(&cursor);
            let control_for_worker = Arc::clone(&control);
            let transform = Arc::clone(&transform);
            let worker_tx = output_tx.clone();

            let spawned = thread::Builder::new()
                .name(format!("prism-preprocess-{worker}"))
                .spawn(move || {
                    run_worker(
                        worker,
                        &cursor,
                        &control_for_worker,
                        transform.as_ref(),
                        worker_tx,
                        exit,
                    );
                });

            match spawned {
                Ok(handle) => monitor.track(worker, handle),
                Err(error) => {
                    control.halt();
                    monitor.join_all();
                    return Err(PreprocessError::Spawn(error));
                }
            }
        }
        drop(output_tx);

        Ok(Self {
            output: output_rx,
            control,
            monitor,
            holding_permit: false,
            finished: false,
            faulted: false,
        })
    }
}

impl<R, E> Preprocessor<R, E> {
    pub fn state(&self) -> PipelineState {
        if self.faulted {
            PipelineState::Faulted
        } else if self.finished {
            if self.control.cancel_observed() {
                PipelineState::Cancelled
            } else {
                PipelineState::Completed
            }
        } else if self.monitor.live() == 0 {
            PipelineState::Draining
        } else {
            PipelineState::Running
        }
    }

    /// Request cancellation through the run's token.
    ///
    /// When the token came from [`PreprocessConfig::with_cancellation`] the
    /// caller's clones observe it too. Results already buffered are still
    /// yielded. Workers waiting for a permit wake at once.
    pub fn cancel(&self) {
        self.control.cancel.cancel();
        self.control.budget.close();
    }

    /// Items being transformed, waiting in the buffer, or just yielded and
    /// not yet followed by another pull.
    pub fn in_flight(&self) -> usize {
        self.control.budget.capacity() - self.control.budget.available()
    }

    /// Number of worker threads that have not yet returned.
    pub fn live_workers(&self) -> usize {
        self.monitor.live()
    }

    fn finish(&mut self) -> Option<Result<R, PreprocessError<E>>> {
        self.finished = true;
        self.control.halt();
        let abnormal = self.monitor.join_all();
        let worker = abnormal.first().copied()?;
        self.faulted = true;
        Some(Err(PreprocessError::Panicked {
            worker,
            message: "worker thread terminated abnormally".to_owned(),
        }))
    }
}

impl<R, E> Iterator for Preprocessor<R, E> {
    type Item = Result<R, PreprocessError<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.holding_permit {
            self.control.budget.release();
            self.holding_permit = false;
        }

        match self.output.recv() {
            Ok(outcome) => {
                self.holding_permit = true;
                if outcome.is_err() {
                    self.faulted = true;
                    self.finished = true;
                    self.control.halt();
                }
                Some(outcome)
            }
            // every worker has returned and dropped its sender
            Err(_) => self.finish(),
        }
    }
}

impl<R, E> std::iter::FusedIterator for Preprocessor<R, E> {}

impl<R, E> Drop for Preprocessor<R, E> {
    fn drop(&mut self) {
        self.control.halt();
        self.monitor.join_all();
    }
}
