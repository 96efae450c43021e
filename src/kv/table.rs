// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Concurrent chained hash table with striped bucket locks and a global
// reader/writer lock gating resize (§4.4). Built on this crate's own
// `RwLock` (the same single-word atomic reader/writer lock `circ` and the
// broadcast channel already use for in-process coordination) rather than
// a `std::sync::RwLock` — this table lives only inside the server
// process, but the server's own worker pool contends on it exactly the
// way a cross-process caller would contend on a mapped `RwLock`, so the
// same primitive applies unmodified.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::shm_name::fnv1a_64;
use crate::RwLock;

/// Minimum bucket count — capacity never falls below this regardless of
/// load (§4.4).
pub const MIN_CAPACITY: usize = 4;
/// Grow when load factor reaches this threshold.
pub const ALPHA_MAX: f64 = 0.75;
/// Shrink when load factor falls to this threshold (and capacity > `MIN_CAPACITY`).
pub const ALPHA_MIN: f64 = 0.10;

struct Bucket {
    lock: RwLock,
    entries: UnsafeCell<Vec<(String, String)>>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            lock: RwLock::new(),
            entries: UnsafeCell::new(Vec::new()),
        }
    }

    /// # Safety: caller must hold `self.lock` (shared or exclusive, as
    /// appropriate for the access).
    #[allow(clippy::mut_from_ref)]
    unsafe fn entries_mut(&self) -> &mut Vec<(String, String)> {
        &mut *self.entries.get()
    }

    unsafe fn entries(&self) -> &Vec<(String, String)> {
        &*self.entries.get()
    }
}

/// A concurrent, chained hash map from `String` to `String`, striped by
/// bucket with a global RW lock coordinating resize (§4.4).
pub struct HashTable {
    global: RwLock,
    resizable: bool,
    buckets: UnsafeCell<Vec<Bucket>>,
    capacity: AtomicUsize,
    size: AtomicUsize,
}

// Safety: every access to `buckets` / `entries` goes through `global`
// and/or the owning bucket's `RwLock`.
unsafe impl Send for HashTable {}
unsafe impl Sync for HashTable {}

fn next_capacity(initial: usize) -> usize {
    initial.max(MIN_CAPACITY)
}

impl HashTable {
    /// Create a table with `initial_capacity` buckets (rounded up to
    /// `MIN_CAPACITY`). `resizable = false` pins the bucket count forever
    /// (matches the server CLI's non-zero capacity argument, §6).
    pub fn new(initial_capacity: usize, resizable: bool) -> Self {
        let capacity = next_capacity(initial_capacity);
        let buckets = (0..capacity).map(|_| Bucket::new()).collect();
        Self {
            global: RwLock::new(),
            resizable,
            buckets: UnsafeCell::new(buckets),
            capacity: AtomicUsize::new(capacity),
            size: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    fn bucket_index(&self, key: &str, capacity: usize) -> usize {
        (fnv1a_64(key.as_bytes()) % capacity as u64) as usize
    }

    /// # Safety: caller must hold `self.global` (shared or exclusive).
    unsafe fn buckets(&self) -> &Vec<Bucket> {
        &*self.buckets.get()
    }

    fn needs_grow(&self, delta: i64) -> bool {
        if !self.resizable {
            return false;
        }
        let size = self.size.load(Ordering::Acquire) as i64 + delta;
        let cap = self.capacity.load(Ordering::Acquire) as f64;
        (size.max(0) as f64) / cap >= ALPHA_MAX
    }

    fn needs_shrink(&self, delta: i64) -> bool {
        if !self.resizable {
            return false;
        }
        let cap = self.capacity.load(Ordering::Acquire);
        if cap <= MIN_CAPACITY {
            return false;
        }
        let size = self.size.load(Ordering::Acquire) as i64 + delta;
        (size.max(0) as f64) / (cap as f64) <= ALPHA_MIN
    }

    /// Grow or shrink the bucket array and rehash every entry. Acquires
    /// `global` exclusively; re-checks whether a resize is still needed
    /// (another thread may have already performed one) before doing the
    /// work, in case several writers raced into `resize` at once. `delta`
    /// must be the same projected change (`+1`/`-1`) the caller used to
    /// decide a resize was needed, so the re-check agrees with the
    /// trigger — otherwise a resize right at the `ALPHA_MAX`/`ALPHA_MIN`
    /// boundary re-checks against the un-projected size, finds nothing to
    /// do, and the caller's retry loop spins forever.
    fn resize(&self, delta: i64) {
        self.global.lock();
        let cap = self.capacity.load(Ordering::Acquire);
        let still_needs_grow = self.needs_grow(delta);
        let still_needs_shrink = self.needs_shrink(delta);

        if !still_needs_grow && !still_needs_shrink {
            self.global.unlock();
            return;
        }

        let new_cap = if still_needs_grow {
            cap * 2
        } else {
            ((cap + 1) / 2).max(MIN_CAPACITY)
        };

        let old_buckets = unsafe { &mut *self.buckets.get() };
        let mut new_buckets: Vec<Bucket> = (0..new_cap).map(|_| Bucket::new()).collect();
        for bucket in old_buckets.iter_mut() {
            let entries = unsafe { bucket.entries_mut() };
            for (k, v) in entries.drain(..) {
                let idx = (fnv1a_64(k.as_bytes()) % new_cap as u64) as usize;
                unsafe { new_buckets[idx].entries_mut() }.push((k, v));
            }
        }

        unsafe { *self.buckets.get() = new_buckets };
        self.capacity.store(new_cap, Ordering::Release);
        self.global.unlock();
    }

    /// Insert `(key, value)`. Returns `false` without mutating the table
    /// if `key` is already present.
    pub fn insert(&self, key: &str, value: &str) -> bool {
        loop {
            if self.resizable && self.needs_grow(1) {
                self.resize(1);
                continue;
            }
            self.global.lock_shared();
            let cap = self.capacity.load(Ordering::Acquire);
            let idx = self.bucket_index(key, cap);
            let bucket = &unsafe { self.buckets() }[idx];
            bucket.lock.lock();

            let entries = unsafe { bucket.entries_mut() };
            if entries.iter().any(|(k, _)| k == key) {
                bucket.lock.unlock();
                self.global.unlock_shared();
                return false;
            }
            entries.push((key.to_string(), value.to_string()));
            bucket.lock.unlock();
            self.global.unlock_shared();
            self.size.fetch_add(1, Ordering::AcqRel);
            return true;
        }
    }

    /// `remove(k); insert(k, v)` — NOT an in-place update (§4.4, §9). A
    /// fresh key is a plain insert; an existing key is removed first and
    /// then reinserted, exposed as `put` rather than an `IndexMut` impl
    /// (see the open-question note in DESIGN.md).
    pub fn put(&self, key: &str, value: &str) {
        self.remove(key);
        self.insert(key, value);
    }

    /// Current value for `key`, or `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.global.lock_shared();
        let cap = self.capacity.load(Ordering::Acquire);
        let idx = self.bucket_index(key, cap);
        let bucket = &unsafe { self.buckets() }[idx];
        bucket.lock.lock_shared();
        let result = unsafe { bucket.entries() }
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone());
        bucket.lock.unlock_shared();
        self.global.unlock_shared();
        result
    }

    /// Remove `key`, returning its previous value if present.
    pub fn remove(&self, key: &str) -> Option<String> {
        loop {
            if self.resizable && self.needs_shrink(-1) {
                self.resize(-1);
                continue;
            }
            self.global.lock_shared();
            let cap = self.capacity.load(Ordering::Acquire);
            let idx = self.bucket_index(key, cap);
            let bucket = &unsafe { self.buckets() }[idx];
            bucket.lock.lock();

            let entries = unsafe { bucket.entries_mut() };
            let pos = entries.iter().position(|(k, _)| k == key);
            let removed = pos.map(|i| entries.remove(i).1);
            bucket.lock.unlock();
            self.global.unlock_shared();
            if removed.is_some() {
                self.size.fetch_sub(1, Ordering::AcqRel);
            }
            return removed;
        }
    }

    /// Snapshot of all `(key, value)` pairs currently in bucket `i`, or
    /// `None` if `i` is out of range.
    pub fn get_bucket(&self, i: usize) -> Option<Vec<(String, String)>> {
        self.global.lock_shared();
        let cap = self.capacity.load(Ordering::Acquire);
        if i >= cap {
            self.global.unlock_shared();
            return None;
        }
        let bucket = &unsafe { self.buckets() }[i];
        bucket.lock.lock_shared();
        let snapshot = unsafe { bucket.entries() }.clone();
        bucket.lock.unlock_shared();
        self.global.unlock_shared();
        Some(snapshot)
    }

    /// Snapshot of every key currently in the table.
    pub fn get_keys(&self) -> Vec<String> {
        self.global.lock_shared();
        let mut out = Vec::new();
        for bucket in unsafe { self.buckets() } {
            bucket.lock.lock_shared();
            out.extend(unsafe { bucket.entries() }.iter().map(|(k, _)| k.clone()));
            bucket.lock.unlock_shared();
        }
        self.global.unlock_shared();
        out
    }

    /// Snapshot of every value currently in the table.
    pub fn get_values(&self) -> Vec<String> {
        self.global.lock_shared();
        let mut out = Vec::new();
        for bucket in unsafe { self.buckets() } {
            bucket.lock.lock_shared();
            out.extend(unsafe { bucket.entries() }.iter().map(|(_, v)| v.clone()));
            bucket.lock.unlock_shared();
        }
        self.global.unlock_shared();
        out
    }
}
