use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Cooperative cancellation signal shared between a caller and a pipeline.
///
/// Clones observe the same flag. Cancelling never interrupts a transform
/// that is already running; workers see the flag at their next claim or
/// permit wait.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel this token after `timeout` from a detached timer thread.
    ///
    /// The timer holds its own clone, so dropping the returned handle does
    /// not stop it.
    pub fn cancel_after(&self, timeout: Duration) -> std::io::Result<thread::JoinHandle<()>> {
        let token = self.clone();
        thread::Builder::new()
            .name("prism-cancel-timer".to_owned())
            .spawn(move || {
                thread::sleep(timeout);
                token.cancel();
            })
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationToken;
    use std::time::Duration;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());

        token.cancel();
        assert!(observer.is_cancelled());

        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn cancel_after_fires_from_timer_thread() {
        let token = CancellationToken::new();
        let timer = token
            .cancel_after(Duration::from_millis(5))
            .expect("spawn timer");
        timer.join().expect("timer thread");
        assert!(token.is_cancelled());
    }
}
