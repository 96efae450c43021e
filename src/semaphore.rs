// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of cpp-ipc/include/libipc/semaphore.h.
// Named, cross-process counting semaphore built from this crate's own
// mutex + condition variable + a counter held in shared memory, exactly
// as the C++ implementation falls back to on platforms without a native
// anonymous counting semaphore.

use std::io;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use crate::{IpcCondition, IpcMutex, ShmHandle, ShmOpenMode};

/// A named, inter-process counting semaphore.
///
/// `wait` decrements the counter, blocking if it would go negative.
/// `post` increments the counter and wakes waiters. Both accept an
/// optional millisecond timeout; `None` blocks indefinitely.
pub struct IpcSemaphore {
    mtx: IpcMutex,
    cond: IpcCondition,
    counter_shm: ShmHandle,
}

impl IpcSemaphore {
    /// Open (or create) a named counting semaphore, initialised to `initial`
    /// the first time any process opens this name.
    pub fn open(name: &str, initial: u32) -> io::Result<Self> {
        let mtx = IpcMutex::open(&format!("{name}_SEM_LOCK_"))?;
        let cond = IpcCondition::open(&format!("{name}_SEM_COND_"))?;
        let counter_shm = ShmHandle::acquire(
            &format!("{name}_SEM_CNT_"),
            std::mem::size_of::<AtomicI64>(),
            ShmOpenMode::CreateOrOpen,
        )?;
        // We were the first to map this segment iff the ref counter reads 1
        // right after our own increment during acquire().
        if counter_shm.ref_count() == 1 {
            let ctr = unsafe { &*(counter_shm.as_ptr() as *const AtomicI64) };
            ctr.store(initial as i64, Ordering::Relaxed);
        }
        Ok(Self {
            mtx,
            cond,
            counter_shm,
        })
    }

    fn counter(&self) -> &AtomicI64 {
        unsafe { &*(self.counter_shm.as_ptr() as *const AtomicI64) }
    }

    /// Decrement the counter, blocking while it is zero. Returns `Ok(false)`
    /// on timeout, `Ok(true)` once a unit was acquired.
    pub fn wait(&self, timeout_ms: Option<u64>) -> io::Result<bool> {
        self.mtx.lock()?;
        let mut remaining = timeout_ms;
        loop {
            if self.counter().load(Ordering::Acquire) > 0 {
                self.counter().fetch_sub(1, Ordering::AcqRel);
                self.mtx.unlock()?;
                return Ok(true);
            }
            let start = Instant::now();
            let woke = match self.cond.wait(&self.mtx, remaining) {
                Ok(v) => v,
                Err(e) => {
                    let _ = self.mtx.unlock();
                    return Err(e);
                }
            };
            if let Some(ms) = remaining {
                let elapsed = start.elapsed().as_millis() as u64;
                if !woke || elapsed >= ms {
                    self.mtx.unlock()?;
                    return Ok(false);
                }
                remaining = Some(ms - elapsed);
            } else if !woke {
                // Unreachable for an infinite wait, but guard against a
                // spurious `false` from the underlying primitive anyway.
                continue;
            }
        }
    }

    /// Increment the counter by `n` and wake waiters.
    pub fn post(&self, n: u32) -> io::Result<()> {
        self.mtx.lock()?;
        self.counter().fetch_add(n as i64, Ordering::AcqRel);
        self.mtx.unlock()?;
        // Broadcast rather than notify: correctness must not depend on
        // single-wakeup (see module docs on semaphore contract).
        self.cond.broadcast()
    }

    /// Advisory snapshot of the current counter value.
    pub fn current_value(&self) -> i64 {
        self.counter().load(Ordering::Relaxed)
    }

    /// Remove the backing storage for a named semaphore.
    pub fn clear_storage(name: &str) {
        IpcMutex::clear_storage(&format!("{name}_SEM_LOCK_"));
        IpcCondition::clear_storage(&format!("{name}_SEM_COND_"));
        ShmHandle::clear_storage(&format!("{name}_SEM_CNT_"));
    }
}
