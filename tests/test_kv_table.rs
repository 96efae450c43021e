// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the shmkv concurrent hash table (kv::HashTable), §4.4 / §8.

use std::sync::Arc;
use std::thread;

use libipc::kv::{HashTable, ALPHA_MAX, ALPHA_MIN, MIN_CAPACITY};

// §8 end-to-end scenario 1: capacity 10, insert/get/delete/get.
#[test]
fn insert_get_delete_get_sequence() {
    let table = HashTable::new(10, false);

    assert!(table.insert("foo", "bar"));
    assert_eq!(table.get("foo"), Some("bar".to_string()));
    assert_eq!(table.remove("foo"), Some("bar".to_string()));
    assert_eq!(table.get("foo"), None);
}

// §8 end-to-end scenario 2: duplicate insert rejected, first value retained.
#[test]
fn duplicate_insert_is_rejected() {
    let table = HashTable::new(8, false);

    assert!(table.insert("k", "v1"));
    assert!(!table.insert("k", "v2"));
    assert_eq!(table.get("k"), Some("v1".to_string()));
}

#[test]
fn get_and_remove_on_absent_key_return_none() {
    let table = HashTable::new(4, false);
    assert_eq!(table.get("missing"), None);
    assert_eq!(table.remove("missing"), None);
}

#[test]
fn put_replaces_existing_key_value() {
    let table = HashTable::new(4, false);
    table.insert("k", "v1");
    table.put("k", "v2");
    assert_eq!(table.get("k"), Some("v2".to_string()));
    assert_eq!(table.len(), 1);
}

#[test]
fn put_on_fresh_key_is_a_plain_insert() {
    let table = HashTable::new(4, false);
    table.put("k", "v1");
    assert_eq!(table.get("k"), Some("v1".to_string()));
    assert_eq!(table.len(), 1);
}

// §8 end-to-end scenario 3: capacity 4 resizable, load factor 1.0 grows to 8.
#[test]
fn resizable_table_grows_past_alpha_max() {
    let table = HashTable::new(4, true);
    assert_eq!(table.capacity(), MIN_CAPACITY);

    for k in ["1", "2", "3", "4"] {
        assert!(table.insert(k, k));
    }

    assert!(table.capacity() > 4);
    for k in ["1", "2", "3", "4"] {
        assert_eq!(table.get(k), Some(k.to_string()));
    }
}

#[test]
fn non_resizable_table_never_changes_capacity() {
    let table = HashTable::new(4, false);
    for i in 0..20 {
        table.insert(&i.to_string(), &i.to_string());
    }
    assert_eq!(table.capacity(), 4);
}

#[test]
fn capacity_never_drops_below_minimum() {
    let table = HashTable::new(4, true);
    for i in 0..4 {
        table.insert(&i.to_string(), &i.to_string());
    }
    for i in 0..4 {
        table.remove(&i.to_string());
    }
    assert!(table.capacity() >= MIN_CAPACITY);
}

#[test]
fn get_bucket_returns_snapshot_and_none_out_of_range() {
    let table = HashTable::new(4, false);
    table.insert("a", "1");
    table.insert("b", "2");

    assert!(table.get_bucket(100).is_none());

    let mut all_pairs = Vec::new();
    for i in 0..table.capacity() {
        all_pairs.extend(table.get_bucket(i).unwrap());
    }
    all_pairs.sort();
    assert_eq!(
        all_pairs,
        vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
    );
}

#[test]
fn get_keys_and_get_values_match_inserted_pairs() {
    let table = HashTable::new(8, false);
    table.insert("a", "1");
    table.insert("b", "2");
    table.insert("c", "3");

    let mut keys = table.get_keys();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c"]);

    let mut values = table.get_values();
    values.sort();
    assert_eq!(values, vec!["1", "2", "3"]);
}

// §8: load-factor bounds invariant after every insert/remove.
#[test]
fn load_factor_bounds_hold_after_every_mutation() {
    let table = HashTable::new(4, true);
    for i in 0..64 {
        table.insert(&i.to_string(), &i.to_string());
        let l = table.len() as f64 / table.capacity() as f64;
        assert!(
            l <= ALPHA_MAX || table.capacity() == MIN_CAPACITY,
            "load factor {l} exceeds ALPHA_MAX at capacity {}",
            table.capacity()
        );
    }
    for i in 0..64 {
        table.remove(&i.to_string());
        let l = table.len() as f64 / table.capacity() as f64;
        assert!(
            l >= ALPHA_MIN || table.capacity() == MIN_CAPACITY,
            "load factor {l} below ALPHA_MIN at capacity {}",
            table.capacity()
        );
    }
}

// §8 concurrent stress (scaled down from the literal 12M-key scenario; the
// full-scale run is impractical for a fast test suite).
#[test]
fn concurrent_disjoint_key_ranges_leave_table_empty() {
    let table = Arc::new(HashTable::new(16, true));
    const PER_THREAD: usize = 2_000;

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let table = table.clone();
            thread::spawn(move || {
                let base = t * PER_THREAD;
                for i in base..base + PER_THREAD {
                    let k = i.to_string();
                    assert_eq!(table.get(&k), None);
                    assert!(table.insert(&k, &k));
                    assert_eq!(table.get(&k), Some(k.clone()));
                    assert_eq!(table.remove(&k), Some(k.clone()));
                    assert_eq!(table.get(&k), None);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(table.len(), 0);
}

#[test]
#[ignore]
fn concurrent_stress_full_scale_twelve_million_keys() {
    // Literal §8 scenario 4: 12 clients x 1,000,000 distinct keys, each
    // inserting its own range and then deleting it.
    let table = Arc::new(HashTable::new(16, true));
    const PER_THREAD: usize = 1_000_000;

    let handles: Vec<_> = (0..12)
        .map(|t| {
            let table = table.clone();
            thread::spawn(move || {
                let base = t * PER_THREAD;
                for i in base..base + PER_THREAD {
                    let k = i.to_string();
                    table.insert(&k, &k);
                }
                for i in base..base + PER_THREAD {
                    let k = i.to_string();
                    table.remove(&k);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(table.len(), 0);
    for t in 0..12 {
        for i in (t * PER_THREAD)..(t * PER_THREAD + 10) {
            assert_eq!(table.get(&i.to_string()), None);
        }
    }
}
