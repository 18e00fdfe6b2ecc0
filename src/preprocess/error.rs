use std::any::Any;
use std::io;
use thiserror::Error;

/// Terminal failure surfaced through a [`Preprocessor`](super::Preprocessor).
///
/// Any of these ends the sequence: the iterator yields the error once and
/// then returns `None`.
#[derive(Debug, Error)]
pub enum PreprocessError<E> {
    /// The transform returned an error for one item.
    #[error("transform failed: {0}")]
    Transform(E),

    /// The transform panicked on worker `worker`.
    #[error("transform panicked on worker {worker}: {message}")]
    Panicked { worker: usize, message: String },

    /// The source iterator panicked while producing the next item.
    #[error("source iterator panicked: {message}")]
    SourcePanicked { message: String },

    /// A worker thread could not be started.
    #[error("failed to spawn preprocess worker: {0}")]
    Spawn(#[source] io::Error),
}

impl<E> PreprocessError<E> {
    /// Returns the transform error if this failure came from the caller's function.
    pub fn into_transform(self) -> Option<E> {
        match self {
            PreprocessError::Transform(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(
            self,
            PreprocessError::Panicked { .. } | PreprocessError::SourcePanicked { .. }
        )
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::{PreprocessError, panic_message};
    use std::any::Any;
    use std::panic::{self, UnwindSafe};

    fn payload_of(f: impl FnOnce() + UnwindSafe) -> Box<dyn Any + Send> {
        panic::catch_unwind(f).expect_err("closure panics")
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let static_payload = payload_of(|| panic!("static text"));
        assert_eq!(panic_message(static_payload.as_ref()), "static text");

        let owned_payload = payload_of(|| panic!("item {} failed", 7));
        assert_eq!(panic_message(owned_payload.as_ref()), "item 7 failed");

        let other_payload = payload_of(|| panic::panic_any(42_u32));
        assert_eq!(
            panic_message(other_payload.as_ref()),
            "non-string panic payload"
        );
    }

    #[test]
    fn display_names_the_failure_kind() {
        let transform: PreprocessError<String> = PreprocessError::Transform("bad row".to_owned());
        assert_eq!(transform.to_string(), "transform failed: bad row");

        let panicked: PreprocessError<String> = PreprocessError::Panicked {
            worker: 2,
            message: "boom".to_owned(),
        };
        assert_eq!(panicked.to_string(), "transform panicked on worker 2: boom");
        assert!(panicked.is_panic());
        assert!(panicked.into_transform().is_none());
    }

    #[test]
    fn into_transform_returns_the_caller_error() {
        let error: PreprocessError<&str> = PreprocessError::Transform("nope");
        assert_eq!(error.into_transform(), Some("nope"));
    }
}
