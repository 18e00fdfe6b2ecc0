use super::cancel::CancellationToken;
use std::num::NonZeroUsize;
use std::thread;

/// Parameters for one preprocessing run.
///
/// `max_threads == 0` is clamped to 1. `max_preprocessed == 0` falls back to
/// the effective thread count.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub max_threads: usize,
    pub max_preprocessed: usize,
    pub cancellation: Option<CancellationToken>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        let max_threads = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            max_threads,
            max_preprocessed: 0,
            cancellation: None,
        }
    }
}

impl PreprocessConfig {
    pub fn new(max_threads: usize, max_preprocessed: usize) -> Self {
        Self {
            max_threads,
            max_preprocessed,
            cancellation: None,
        }
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_max_preprocessed(mut self, max_preprocessed: usize) -> Self {
        self.max_preprocessed = max_preprocessed;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn effective_threads(&self) -> usize {
        self.max_threads.max(1)
    }

    pub fn effective_budget(&self) -> usize {
        if self.max_preprocessed == 0 {
            self.effective_threads()
        } else {
            self.max_preprocessed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PreprocessConfig;

    #[test]
    fn zero_threads_clamps_to_one() {
        let config = PreprocessConfig::new(0, 0);
        assert_eq!(config.effective_threads(), 1);
        assert_eq!(config.effective_budget(), 1);
    }

    #[test]
    fn zero_budget_defaults_to_thread_count() {
        let config = PreprocessConfig::new(6, 0);
        assert_eq!(config.effective_budget(), 6);
    }

    #[test]
    fn explicit_budget_is_kept_even_below_thread_count() {
        let config = PreprocessConfig::default()
            .with_max_threads(8)
            .with_max_preprocessed(2);
        assert_eq!(config.effective_threads(), 8);
        assert_eq!(config.effective_budget(), 2);
    }

    #[test]
    fn default_uses_at_least_one_thread() {
        let config = PreprocessConfig::default();
        assert!(config.effective_threads() >= 1);
        assert!(config.cancellation.is_none());
    }
}
