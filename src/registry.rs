//! Registry: keyed index of in-flight calls addressed by generational ids.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_table::Entry as TableEntry;
use hashbrown::HashTable;
use slotmap::{new_key_type, SlotMap};
use std::collections::hash_map::RandomState;

new_key_type! {
    /// Identifies one registered call. Ids are generational: once the entry
    /// is removed its id never resolves again, even if the slot is reused.
    pub struct CallId;
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Outcome of [`Registry::find_or_insert_with`].
pub(crate) enum Probe<'a, V> {
    /// An entry for the key already existed.
    Found(CallId, &'a V),
    /// No entry existed; the constructor ran and its value was stored.
    Inserted(CallId, &'a V),
}

pub(crate) struct Registry<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<CallId>,
    slots: SlotMap<CallId, Entry<K, V>>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash,
{
    #[cfg(test)]
    pub fn new() -> Self {
        Self::with_capacity_and_hasher(0, Default::default())
    }
}

impl<K, V, S> Registry<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::with_capacity(capacity),
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<CallId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&id| {
                self.slots
                    .get(id)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .copied()
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    #[cfg(test)]
    pub fn get(&self, id: CallId) -> Option<&V> {
        self.slots.get(id).map(|e| &e.value)
    }

    /// Single probe: returns the live entry for `key`, or stores `make()`
    /// under it. `make` only runs on a miss.
    pub fn find_or_insert_with<F>(&mut self, key: K, make: F) -> Probe<'_, V>
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        let (id, inserted) = match self.index.entry(
            hash,
            |&id| self.slots.get(id).map(|e| e.key == key).unwrap_or(false),
            |&id| self.slots.get(id).map(|e| e.hash).unwrap_or(0),
        ) {
            TableEntry::Occupied(o) => (*o.get(), false),
            TableEntry::Vacant(v) => {
                let value = make();
                let id = self.slots.insert(Entry { key, value, hash });
                let _ = v.insert(id);
                (id, true)
            }
        };
        // index and slots are updated together, so the id is live here
        let value = &self.slots[id].value;
        if inserted {
            Probe::Inserted(id, value)
        } else {
            Probe::Found(id, value)
        }
    }

    /// Removes the entry `id` refers to. Returns `None` when the id is stale,
    /// i.e. the entry was already removed (by its owner or by `forget`).
    pub fn remove(&mut self, id: CallId) -> Option<(K, V)> {
        let entry = self.slots.remove(id)?;
        if let Ok(occupied) = self.index.find_entry(entry.hash, |&other| other == id) {
            occupied.remove();
        }
        Some((entry.key, entry.value))
    }

    /// Removes whatever entry is currently registered under `q`.
    pub fn forget<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = self.find(q)?;
        self.remove(id)
    }
}
