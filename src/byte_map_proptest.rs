#![cfg(all(test, feature = "std"))]

// Model-based property tests for ByteMap, kept in their own module so the
// scenario machinery stays out of byte_map.rs.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::rc::Rc;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use crate::byte_map::ByteMap;

const VALUE_SIZE: usize = 4;

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys, pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Put(usize, u32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, u32),
    Iterate,
    Traverse,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,6}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<u32>()).prop_map(|(i, v)| OpI::Put(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Get),
            prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,6}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            (idx.clone(), any::<u32>()).prop_map(|(i, v)| OpI::Mutate(i, v)),
            Just(OpI::Iterate),
            Just(OpI::Traverse),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Runs one operation sequence against a ByteMap and a std HashMap model.
// Invariants exercised:
// - `put`/`get`/`get_mut`/`contains_key`/`remove` parity with the model.
// - `len`/`is_empty` parity after every op.
// - `keys()` yields each live key exactly once (set equality with the model);
//   with a single bucket the sequence additionally equals insertion order
//   among keys not removed since their last insertion.
// - The stateless `first`/`next` traversal visits the identical sequence as
//   the cursor iterator.
// - Cleanup accounting: the callback observes exactly one invocation per
//   removal and one per entry alive at drop, each with that entry's final
//   value bytes. Overwrites never appear.
fn check_scenario(bucket_hint: usize, pool: &[String], ops: &[OpI]) -> Result<(), TestCaseError> {
    let cleaned = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&cleaned);
    let mut sut = ByteMap::with_cleanup(
        VALUE_SIZE,
        bucket_hint,
        Box::new(move |value| sink.borrow_mut().push(value.to_vec())),
    );
    let single_bucket = sut.bucket_count() == 1;

    let mut model: HashMap<Vec<u8>, [u8; VALUE_SIZE]> = HashMap::new();
    let mut order: Vec<Vec<u8>> = Vec::new();
    let mut expected_cleanups: Vec<Vec<u8>> = Vec::new();

    for op in ops {
        match op {
            OpI::Put(i, v) => {
                let key = pool[*i].as_bytes().to_vec();
                let value = v.to_ne_bytes();
                sut.put(&key, &value);
                if model.insert(key.clone(), value).is_none() {
                    order.push(key);
                }
            }
            OpI::Remove(i) => {
                let key = pool[*i].as_bytes().to_vec();
                let removed = sut.remove(&key);
                match model.remove(&key) {
                    Some(value) => {
                        prop_assert!(removed, "present key must report removal");
                        expected_cleanups.push(value.to_vec());
                        order.retain(|k| *k != key);
                    }
                    None => prop_assert!(!removed, "absent key must be a no-op"),
                }
            }
            OpI::Get(i) => {
                let key = pool[*i].as_bytes();
                prop_assert_eq!(sut.get(key), model.get(key).map(|v| &v[..]));
            }
            OpI::Contains(s) => {
                prop_assert_eq!(
                    sut.contains_key(s.as_bytes()),
                    model.contains_key(s.as_bytes())
                );
            }
            OpI::Mutate(i, v) => {
                let key = pool[*i].as_bytes();
                let value = v.to_ne_bytes();
                match sut.get_mut(key) {
                    Some(slot) => {
                        slot.copy_from_slice(&value);
                        prop_assert!(model.insert(key.to_vec(), value).is_some());
                    }
                    None => prop_assert!(!model.contains_key(key)),
                }
            }
            OpI::Iterate => {
                let sut_keys: BTreeSet<Vec<u8>> = sut.keys().map(<[u8]>::to_vec).collect();
                let model_keys: BTreeSet<Vec<u8>> = model.keys().cloned().collect();
                prop_assert_eq!(sut_keys, model_keys);
                if single_bucket {
                    let sequence: Vec<Vec<u8>> = sut.keys().map(<[u8]>::to_vec).collect();
                    prop_assert_eq!(&sequence, &order);
                }
            }
            OpI::Traverse => {
                let mut protocol: Vec<Vec<u8>> = Vec::new();
                let mut key = sut.first().map(<[u8]>::to_vec);
                while let Some(current) = key {
                    protocol.push(current.clone());
                    key = sut.next(&current).map(<[u8]>::to_vec);
                }
                let cursor: Vec<Vec<u8>> = sut.keys().map(<[u8]>::to_vec).collect();
                prop_assert_eq!(protocol, cursor);
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }

    // Dropping the map destroys the survivors; by then the callback must
    // have observed every removal plus every survivor, nothing else.
    for value in model.values() {
        expected_cleanups.push(value.to_vec());
    }
    drop(sut);

    let mut observed = cleaned.borrow().clone();
    observed.sort();
    expected_cleanups.sort();
    prop_assert_eq!(observed, expected_cleanups);

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    // Small fixed bucket count: real collisions without degenerating into a
    // single chain.
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        check_scenario(17, &pool, &ops)?;
    }

    // Worst case: every key shares one chain, which stresses tail append,
    // interior unlinking, and the re-scan traversal, and makes the exact
    // visitation order checkable.
    #[test]
    fn prop_state_machine_single_bucket((pool, ops) in arb_scenario()) {
        check_scenario(1, &pool, &ops)?;
    }
}
