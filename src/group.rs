//! Group: the keyed registry of in-flight calls and the public entry points.

use crate::call::{lock, Call};
use crate::error::panic_message;
use crate::registry::{CallId, Probe, Registry};
use crate::{Error, GroupConfig, Handle, Outcome};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::any::Any;
use std::collections::hash_map::RandomState;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

type Calls<K, V, E, S> = Registry<K, Arc<Call<V, E>>, S>;
type Panic = Box<dyn Any + Send + 'static>;

struct Inner<K, V, E, S> {
    calls: Mutex<Calls<K, V, E, S>>,
    config: GroupConfig,
}

enum Attach<V, E> {
    Leader(CallId, Arc<Call<V, E>>),
    Follower(Arc<Call<V, E>>),
}

/// Coalesces concurrent calls that share a key.
///
/// While a call for a key is running, further calls for the same key attach
/// to it instead of running their own operation, and all of them receive the
/// result of the single execution. Once the call finishes its key is free
/// again; the next call runs the operation anew.
///
/// `Group` is a cheap handle: clones share the same registry. Independent
/// groups never coalesce with each other.
///
/// Values and errors are cloned once per attached caller; wrap large or
/// non-`Clone` payloads in an `Arc`.
///
/// An operation must not call back into its own group with its own key: it
/// would attach to itself and wait forever.
pub struct Group<K, V, E, S = RandomState> {
    inner: Arc<Inner<K, V, E, S>>,
}

impl<K, V, E, S> Clone for Group<K, V, E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> Group<K, V, E>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_config(GroupConfig::default())
    }

    pub fn with_config(config: GroupConfig) -> Self {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V, E> Default for Group<K, V, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E, S> Group<K, V, E, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_config_and_hasher(GroupConfig::default(), hasher)
    }

    pub fn with_config_and_hasher(config: GroupConfig, hasher: S) -> Self {
        let calls = Registry::with_capacity_and_hasher(config.initial_capacity, hasher);
        Self {
            inner: Arc::new(Inner {
                calls: Mutex::new(calls),
                config,
            }),
        }
    }

    pub fn config(&self) -> &GroupConfig {
        &self.inner.config
    }

    /// Number of keys with a call currently registered.
    pub fn len(&self) -> usize {
        lock(&self.inner.calls).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner.calls).is_empty()
    }

    /// Whether a call is registered for `key`, i.e. whether a call made now
    /// would attach rather than lead.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        lock(&self.inner.calls).contains_key(key)
    }

    /// Drops the registered call for `key`, if any.
    ///
    /// The running operation is not cancelled and everyone already attached
    /// still gets its result; only calls made after this start a new
    /// execution.
    pub fn forget<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let forgotten = lock(&self.inner.calls).forget(key);
        if let Some((_, call)) = forgotten {
            debug!(waiters = call.waiters(), "forgot in-flight call");
        }
    }
}

impl<K, V, E, S> Group<K, V, E, S>
where
    K: Eq + Hash,
    V: Clone,
    E: Clone,
    S: BuildHasher,
{
    /// Runs `f` for `key` unless a call for `key` is already in flight, in
    /// which case this blocks until that call finishes and returns its result.
    ///
    /// The returned [`Outcome::shared`] is `false` only for a leader that no
    /// other caller attached to.
    ///
    /// If `f` panics, attached callers receive [`Error::Panicked`] and the
    /// panic then resumes on this thread.
    pub fn execute<F>(&self, key: K, f: F) -> Outcome<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let (id, call) = match self.inner.attach(key, None) {
            Attach::Follower(call) => {
                return Outcome {
                    result: call.wait(),
                    shared: true,
                }
            }
            Attach::Leader(id, call) => (id, call),
        };

        let (result, fault) = run_guarded(f);
        let shared = self.inner.finish(id, &call, result);
        if let Some(payload) = fault {
            panic::resume_unwind(payload);
        }
        Outcome {
            result: call.result().cloned().unwrap_or(Err(Error::Abandoned)),
            shared,
        }
    }
}

impl<K, V, E, S> Group<K, V, E, S>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    S: BuildHasher + Send + 'static,
{
    /// Like [`execute`](Self::execute), but returns immediately.
    ///
    /// When this call leads, `f` runs on a new thread configured by
    /// [`GroupConfig`]. Every caller gets its own [`Handle`]; all handles of
    /// one call receive the same result, with `shared` reflecting how many
    /// callers had attached by the time it completed.
    ///
    /// A panic in `f` is delivered to every handle as [`Error::Panicked`].
    ///
    /// Each key with an async call in flight holds one OS thread until its
    /// operation returns; there is no pool or upper bound. Callers issuing
    /// async calls for many distinct keys at once pay for that many threads.
    pub fn execute_async<F>(&self, key: K, f: F) -> Handle<V, E>
    where
        F: FnOnce() -> Result<V, E> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if let Attach::Leader(id, call) = self.inner.attach(key, Some(tx)) {
            self.spawn_leader(id, call, f);
        }
        Handle::new(rx)
    }

    fn spawn_leader<F>(&self, id: CallId, call: Arc<Call<V, E>>, f: F)
    where
        F: FnOnce() -> Result<V, E> + Send + 'static,
    {
        let config = &self.inner.config;
        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let inner = Arc::clone(&self.inner);
        let leader_call = Arc::clone(&call);
        let spawned = builder.spawn(move || {
            let (result, fault) = run_guarded(f);
            if let Some(payload) = fault {
                warn!(
                    panic = %panic_message(payload.as_ref()),
                    "async leader panicked; delivering the panic to its handles"
                );
            }
            inner.finish(id, &leader_call, result);
        });

        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn async leader");
            self.inner.finish(id, &call, Err(Error::Spawn(Arc::new(err))));
        }
    }
}

impl<K, V, E, S> Inner<K, V, E, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn attach(&self, key: K, tx: Option<oneshot::Sender<Outcome<V, E>>>) -> Attach<V, E> {
        let mut calls = lock(&self.calls);
        let probe = calls.find_or_insert_with(key, || Arc::new(Call::new()));
        match probe {
            Probe::Inserted(id, call) => {
                if let Some(tx) = tx {
                    call.subscribe(tx);
                }
                trace!(call = ?id, "leading new call");
                Attach::Leader(id, Arc::clone(call))
            }
            Probe::Found(id, call) => {
                let waiters = call.join(tx);
                trace!(call = ?id, waiters, "attached to in-flight call");
                Attach::Follower(Arc::clone(call))
            }
        }
    }
}

impl<K, V, E, S> Inner<K, V, E, S>
where
    K: Eq + Hash,
    V: Clone,
    E: Clone,
    S: BuildHasher,
{
    /// Unregisters the call (unless it was forgotten) and publishes its result.
    fn finish(&self, id: CallId, call: &Call<V, E>, result: Result<V, Error<E>>) -> bool {
        // Unlinking before publishing means no caller can attach to a call
        // whose result is already out.
        let removed = lock(&self.calls).remove(id);
        if removed.is_none() {
            debug!(call = ?id, "call was forgotten before it finished");
        }

        let shared = call.complete(result);
        trace!(call = ?id, shared, "call finished");
        shared
    }
}

fn run_guarded<V, E, F>(f: F) -> (Result<V, Error<E>>, Option<Panic>)
where
    F: FnOnce() -> Result<V, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => (result.map_err(Error::Operation), None),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            (Err(Error::Panicked(message)), Some(payload))
        }
    }
}
