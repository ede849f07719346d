//! Results as seen by one caller, and the async receiving end.

use crate::Error;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use tokio::sync::oneshot;

/// What one caller gets back from a coalesced operation.
#[derive(Clone, Debug)]
pub struct Outcome<V, E> {
    pub result: Result<V, Error<E>>,
    /// `true` when at least one other caller was attached to the same call.
    pub shared: bool,
}

impl<V, E> Outcome<V, E> {
    pub fn into_result(self) -> Result<V, Error<E>> {
        self.result
    }

    pub fn into_parts(self) -> (Result<V, Error<E>>, bool) {
        (self.result, self.shared)
    }

    fn abandoned() -> Self {
        Self {
            result: Err(Error::Abandoned),
            shared: false,
        }
    }
}

/// Receiving end returned by [`Group::execute_async`](crate::Group::execute_async).
///
/// A handle yields exactly one [`Outcome`]: receiving consumes it, either by
/// awaiting it or through [`Handle::recv`]. Dropping a handle only stops this
/// caller from waiting; the operation and every other caller are unaffected.
#[must_use = "a handle does nothing unless received"]
#[derive(Debug)]
pub struct Handle<V, E> {
    rx: oneshot::Receiver<Outcome<V, E>>,
}

impl<V, E> Handle<V, E> {
    pub(crate) fn new(rx: oneshot::Receiver<Outcome<V, E>>) -> Self {
        Self { rx }
    }

    /// Blocks the current thread until the outcome arrives.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context;
    /// `.await` the handle there instead.
    pub fn recv(self) -> Outcome<V, E> {
        self.rx.blocking_recv().unwrap_or_else(|_| Outcome::abandoned())
    }
}

impl<V, E> Future for Handle<V, E> {
    type Output = Outcome<V, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or_else(|_| Outcome::abandoned()))
    }
}
