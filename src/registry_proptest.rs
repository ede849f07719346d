#![cfg(test)]

// Property tests for Registry kept inside the crate since the registry is
// not part of the public surface.

use crate::registry::{CallId, Probe, Registry};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum OpI {
    Probe(usize, i32),
    Remove(usize),
    RemoveStale(usize),
    Forget(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=6).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Probe(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::RemoveStale),
            idx.clone().prop_map(OpI::Forget),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - A probe on a live key finds the existing entry and keeps its value.
// - `remove(id)` and `forget(key)` unlink the key; ids they retire stay dead.
// - Retired ids never remove a newer entry for the same key.
// - `len` and `contains_key` track the model after each op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_registry_matches_model((pool, ops) in arb_scenario()) {
        let mut sut: Registry<String, i32> = Registry::new();
        let mut model: HashMap<String, (CallId, i32)> = HashMap::new();
        let mut retired: HashMap<String, Vec<CallId>> = HashMap::new();

        for op in ops {
            match op {
                OpI::Probe(i, v) => {
                    let key = pool[i].clone();
                    let expected = model.get(&key).copied();
                    match (sut.find_or_insert_with(key.clone(), || v), expected) {
                        (Probe::Found(id, got), Some((mid, mv))) => {
                            prop_assert_eq!(id, mid);
                            prop_assert_eq!(*got, mv);
                        }
                        (Probe::Inserted(id, got), None) => {
                            prop_assert_eq!(*got, v);
                            model.insert(key, (id, v));
                        }
                        (Probe::Found(..), None) => prop_assert!(false, "found a dead key"),
                        (Probe::Inserted(..), Some(_)) => prop_assert!(false, "duplicated a live key"),
                    }
                }
                OpI::Remove(i) => {
                    let key = &pool[i];
                    if let Some((id, v)) = model.remove(key) {
                        prop_assert_eq!(sut.remove(id), Some((key.clone(), v)));
                        retired.entry(key.clone()).or_default().push(id);
                    }
                }
                OpI::RemoveStale(i) => {
                    let key = &pool[i];
                    for &id in retired.get(key).into_iter().flatten() {
                        prop_assert!(sut.remove(id).is_none());
                    }
                }
                OpI::Forget(i) => {
                    let key = &pool[i];
                    let forgotten = sut.forget(key.as_str());
                    match model.remove(key) {
                        Some((id, v)) => {
                            prop_assert_eq!(forgotten, Some((key.clone(), v)));
                            retired.entry(key.clone()).or_default().push(id);
                        }
                        None => prop_assert!(forgotten.is_none()),
                    }
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            for key in &pool {
                prop_assert_eq!(sut.contains_key(key.as_str()), model.contains_key(key));
            }
        }
    }
}
