//! Call: one executing-or-completed operation shared by its attached callers.

use crate::{Error, Outcome};
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::sync::oneshot;

struct State<V, E> {
    // Attached callers, leader included.
    waiters: usize,
    done: bool,
    handles: Vec<oneshot::Sender<Outcome<V, E>>>,
}

/// Shared record of one in-flight operation.
///
/// The result slot is written once by the leader; after `done` is set it is
/// read without taking the state lock.
pub(crate) struct Call<V, E> {
    state: Mutex<State<V, E>>,
    finished: Condvar,
    result: OnceLock<Result<V, Error<E>>>,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V, E> Call<V, E> {
    /// A call with its leader attached.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                waiters: 1,
                done: false,
                handles: Vec::new(),
            }),
            finished: Condvar::new(),
            result: OnceLock::new(),
        }
    }

    /// Registers the leader's own async handle without counting a new waiter.
    pub fn subscribe(&self, tx: oneshot::Sender<Outcome<V, E>>) {
        lock(&self.state).handles.push(tx);
    }

    /// Attaches a follower. Async followers pass the sender their handle reads from.
    pub fn join(&self, tx: Option<oneshot::Sender<Outcome<V, E>>>) -> usize {
        let mut state = lock(&self.state);
        debug_assert!(!state.done, "joined a call that already completed");
        state.waiters += 1;
        if let Some(tx) = tx {
            state.handles.push(tx);
        }
        state.waiters
    }

    pub fn waiters(&self) -> usize {
        lock(&self.state).waiters
    }

    pub fn result(&self) -> Option<&Result<V, Error<E>>> {
        self.result.get()
    }
}

impl<V, E> Call<V, E>
where
    V: Clone,
    E: Clone,
{
    /// Publishes the result, wakes blocked followers and feeds every async
    /// handle. Returns the `shared` flag as of completion.
    ///
    /// Only the leader calls this, once.
    pub fn complete(&self, result: Result<V, Error<E>>) -> bool {
        if self.result.set(result).is_err() {
            debug_assert!(false, "call completed twice");
        }
        let (waiters, handles) = {
            let mut state = lock(&self.state);
            state.done = true;
            (state.waiters, std::mem::take(&mut state.handles))
        };
        self.finished.notify_all();

        let shared = waiters > 1;
        if let Some(result) = self.result.get() {
            for tx in handles {
                // A dropped handle means that caller stopped waiting.
                let _ = tx.send(Outcome {
                    result: result.clone(),
                    shared,
                });
            }
        }
        shared
    }

    /// Blocks until the leader completes, then returns a copy of the result.
    pub fn wait(&self) -> Result<V, Error<E>> {
        let state = lock(&self.state);
        drop(
            self.finished
                .wait_while(state, |s| !s.done)
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.result
            .get()
            .cloned()
            .unwrap_or(Err(Error::Abandoned))
    }
}
