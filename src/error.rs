//! Error: failures delivered to the callers of a coalesced operation.

use std::any::Any;
use std::io;
use std::sync::Arc;

/// Failure delivered to callers of a coalesced operation.
///
/// Every caller attached to the same call receives a clone of the same value.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error<E> {
    /// The operation body returned this error.
    #[error("{0}")]
    Operation(E),
    /// The operation body panicked.
    #[error("coalesced operation panicked: {0}")]
    Panicked(Arc<str>),
    /// The thread that should have run an async leader could not be started.
    #[error("failed to spawn leader thread: {0}")]
    Spawn(Arc<io::Error>),
    /// The leader went away without delivering a result.
    #[error("coalesced operation finished without delivering a result")]
    Abandoned,
}

impl<E> Error<E> {
    /// Returns the body's own error, if that is what this is.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Error::Operation(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Error::Panicked(_))
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Arc<str> {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        Arc::from(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        Arc::from(s.as_str())
    } else {
        Arc::from("Box<dyn Any>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_common_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(&*panic_message(literal.as_ref()), "boom");

        let formatted: Box<dyn Any + Send> = Box::new(format!("code {}", 7));
        assert_eq!(&*panic_message(formatted.as_ref()), "code 7");

        let opaque: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(&*panic_message(opaque.as_ref()), "Box<dyn Any>");
    }

    #[test]
    fn operation_error_displays_verbatim() {
        let err: Error<String> = Error::Operation("backend down".to_string());
        assert_eq!(err.to_string(), "backend down");
        assert_eq!(err.into_operation().as_deref(), Some("backend down"));

        let panicked: Error<String> = Error::Panicked(Arc::from("oops"));
        assert!(panicked.is_panic());
        assert_eq!(panicked.to_string(), "coalesced operation panicked: oops");
        assert!(panicked.into_operation().is_none());
    }
}
