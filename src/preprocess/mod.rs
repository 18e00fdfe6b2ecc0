//! Bounded parallel preprocessing.
//!
//! A fixed pool of worker threads pulls items from one shared source
//! iterator, runs an expensive transform on each, and hands the results to a
//! single consumer through a lazy [`Preprocessor`] iterator. At most
//! `max_preprocessed` items are ever being transformed or waiting to be
//! consumed, so a slow consumer throttles the workers instead of letting
//! results pile up.
//!
//! ```
//! use prism::preprocess::{PreprocessConfig, preprocess};
//!
//! let squares = preprocess(1..=20_u64, |value| value * value, PreprocessConfig::new(4, 4))
//!     .expect("start workers");
//! let mut values: Vec<u64> = squares.map(|value| value.expect("square")).collect();
//! values.sort_unstable();
//! assert_eq!(values.len(), 20);
//! assert_eq!(values[19], 400);
//! ```

mod budget;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
mod monitor;
mod worker;

pub use cancel::CancellationToken;
pub use config::PreprocessConfig;
pub use engine::{PipelineState, Preprocessor};
pub use error::PreprocessError;

use std::convert::Infallible;

/// Run an infallible `transform` over `source` on `config.max_threads` workers.
///
/// Panics inside `transform` are caught and surface as
/// [`PreprocessError::Panicked`] from the returned iterator.
pub fn preprocess<S, R, F>(
    source: S,
    transform: F,
    config: PreprocessConfig,
) -> Result<Preprocessor<R, Infallible>, PreprocessError<Infallible>>
where
    S: IntoIterator,
    S::IntoIter: Send + 'static,
    S::Item: Send + 'static,
    R: Send + 'static,
    F: Fn(S::Item) -> R + Send + Sync + 'static,
{
    Preprocessor::start(source.into_iter(), move |item| Ok(transform(item)), config)
}

/// Run a fallible `transform` over `source`.
///
/// The first `Err` stops the workers and is yielded as
/// [`PreprocessError::Transform`] in place of the failed item.
pub fn try_preprocess<S, R, E, F>(
    source: S,
    transform: F,
    config: PreprocessConfig,
) -> Result<Preprocessor<R, E>, PreprocessError<E>>
where
    S: IntoIterator,
    S::IntoIter: Send + 'static,
    S::Item: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(S::Item) -> Result<R, E> + Send + Sync + 'static,
{
    Preprocessor::start(source.into_iter(), transform, config)
}

/// Method-call form of [`preprocess`] and [`try_preprocess`].
pub trait IteratorExt: Iterator + Send + Sized + 'static
where
    Self::Item: Send + 'static,
{
    fn preprocess<R, F>(
        self,
        transform: F,
        config: PreprocessConfig,
    ) -> Result<Preprocessor<R, Infallible>, PreprocessError<Infallible>>
    where
        R: Send + 'static,
        F: Fn(Self::Item) -> R + Send + Sync + 'static,
    {
        preprocess(self, transform, config)
    }

    fn try_preprocess<R, E, F>(
        self,
        transform: F,
        config: PreprocessConfig,
    ) -> Result<Preprocessor<R, E>, PreprocessError<E>>
    where
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(Self::Item) -> Result<R, E> + Send + Sync + 'static,
    {
        try_preprocess(self, transform, config)
    }
}

impl<I> IteratorExt for I
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
}

#[cfg(test)]
mod tests {
    use super::{IteratorExt, PreprocessConfig, PreprocessError};

    #[test]
    fn extension_trait_matches_free_function() {
        let mut doubled: Vec<i32> = (1..=6)
            .preprocess(|value| value * 2, PreprocessConfig::new(3, 0))
            .expect("start workers")
            .map(|value| value.expect("doubled"))
            .collect();
        doubled.sort_unstable();
        assert_eq!(doubled, vec![2, 4, 6, 8, 10, 12]);
    }

    #[test]
    fn panicking_transform_surfaces_as_error() {
        let outcomes: Vec<_> = (0..8)
            .preprocess(
                |value: i32| {
                    if value == 5 {
                        panic!("cannot square five");
                    }
                    value * value
                },
                PreprocessConfig::new(1, 1),
            )
            .expect("start workers")
            .collect();

        match outcomes.last() {
            Some(Err(PreprocessError::Panicked { worker, message })) => {
                assert_eq!(*worker, 0);
                assert_eq!(message, "cannot square five");
            }
            other => panic!("expected panic failure, got {other:?}"),
        }
        assert_eq!(outcomes.len(), 6);
    }
}
