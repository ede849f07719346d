//! coalescing-group: keyed call coalescing ("single flight").
//!
//! Among concurrent calls that share a key, at most one runs the supplied
//! operation; the others wait for it and receive a copy of its result.
//!
//! ```
//! use coalescing_group::Group;
//!
//! let group: Group<String, u64, String> = Group::new();
//! let outcome = group.execute("answer".to_string(), || Ok(42));
//! assert_eq!(outcome.result.ok(), Some(42));
//! assert!(!outcome.shared);
//! ```
//!
//! Internal Design:
//!
//! Summary
//! - Layers:
//!   - Registry<K, V, S>: structural map from key to entry, addressed by
//!     generational `CallId`s (slotmap storage, hashbrown index).
//!   - Call<V, E>: one in-flight operation: write-once result slot, waiter
//!     count, completion signal, async delivery channels.
//!   - Group<K, V, E, S>: public API. One mutex around the registry;
//!     `execute`, `execute_async`, `forget`.
//!
//! Protocol
//! - Attach: under the registry lock, a single probe either finds the
//!   key's call (follower: bump waiters, maybe register a handle) or inserts
//!   a fresh one (leader). The lock covers map work only, never the body.
//! - Run: the leader runs the body outside the lock under `catch_unwind`.
//! - Finish: the leader removes its entry by `CallId`, then publishes the
//!   result, wakes blocked followers and feeds every async handle.
//!
//! Forget
//! - `forget` removes the key's entry early. The leader's `CallId` is then
//!   stale; when it finishes, its removal is a no-op and cannot touch a newer
//!   call registered under the same key.
//!
//! Faults
//! - A panicking body becomes `Error::Panicked` for every other caller. A
//!   synchronous leader then resumes the original panic on its own stack. An
//!   async leader has no caller stack; its handle receives the error too.
//!
//! Locking
//! - Order is registry lock, then call state lock. Neither is held while
//!   user code runs, except `K: Hash/Eq` inside the registry. Poisoned
//!   locks are recovered since no guarded state is left half-updated.
//!
//! Notes and non-goals
//! - No cross-process coalescing, caching of results, timeouts or retries.
//!   Apply a timeout to a `Handle` from the outside (e.g.
//!   `tokio::time::timeout`); giving up does not cancel the operation.

mod call;
mod config;
mod error;
mod group;
mod handle;
mod registry;
mod registry_proptest;

// Public surface
pub use config::GroupConfig;
pub use error::Error;
pub use group::Group;
pub use handle::{Handle, Outcome};
