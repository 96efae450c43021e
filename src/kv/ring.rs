// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bounded, blocking, multi-producer multi-consumer ring buffer over shared
// memory (§4.2). Many concurrent client processes push and many server
// workers pop the same ring, so it follows the classic {two counting
// semaphores + a short-held mutex} recipe: `free_slots.wait()` /
// `full_slots.wait()` provide the blocking wait, the mutex only ever
// guards the index arithmetic.

use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::{IpcSemaphore, ShmHandle, ShmOpenMode, SpinLock};

#[repr(C)]
struct RingHeader {
    head: AtomicUsize,
    tail: AtomicUsize,
    size: AtomicUsize,
    capacity: AtomicUsize,
    constructed: AtomicU32,
    lock: SpinLock,
}

/// A fixed-capacity FIFO of `T`, capacity set at construction, supporting
/// concurrent blocking producers/consumers from different processes.
///
/// `T` must be `Copy` (plain data, no atomics/pointers of its own) — slots
/// are moved in and out via raw byte copies rather than borrowed
/// references into the mapping.
pub struct RingBuffer<T: Copy + 'static> {
    shm: ShmHandle,
    free_slots: IpcSemaphore,
    full_slots: IpcSemaphore,
    capacity: usize,
    _marker: std::marker::PhantomData<T>,
}

/// Sentinel returned by `try_push`/`try_pop` when the ring is full/empty.
pub const NONE_IDX: usize = usize::MAX;

impl<T: Copy + 'static> RingBuffer<T> {
    fn layout_size(capacity: usize) -> usize {
        std::mem::size_of::<RingHeader>() + std::mem::size_of::<T>() * capacity
    }

    /// Open (or create) a ring buffer named `name` with room for `capacity`
    /// elements. The first process to create the backing segment also
    /// creates the `free_slots`/`full_slots` semaphores (`free_slots`
    /// starts at `capacity`, `full_slots` at zero) and zeroes the body.
    pub fn open(name: &str, capacity: usize) -> io::Result<Self> {
        if capacity == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ring capacity must be non-zero",
            ));
        }
        let shm = ShmHandle::acquire(
            &format!("{name}_BODY_"),
            Self::layout_size(capacity),
            ShmOpenMode::CreateOrOpen,
        )?;
        let hdr = unsafe { &*(shm.as_ptr() as *const RingHeader) };
        if shm.ref_count() == 1 {
            hdr.head.store(0, Ordering::Relaxed);
            hdr.tail.store(0, Ordering::Relaxed);
            hdr.size.store(0, Ordering::Relaxed);
            hdr.capacity.store(capacity, Ordering::Relaxed);
            unsafe {
                let body = shm.as_mut_ptr().add(std::mem::size_of::<RingHeader>());
                std::ptr::write_bytes(body, 0, std::mem::size_of::<T>() * capacity);
            }
            hdr.constructed.store(1, Ordering::Release);
        } else {
            while hdr.constructed.load(Ordering::Acquire) == 0 {
                std::thread::yield_now();
            }
        }
        let free_slots = IpcSemaphore::open(&format!("{name}_FREE_"), capacity as u32)?;
        let full_slots = IpcSemaphore::open(&format!("{name}_FULL_"), 0)?;
        Ok(Self {
            shm,
            free_slots,
            full_slots,
            capacity,
            _marker: std::marker::PhantomData,
        })
    }

    fn hdr(&self) -> &RingHeader {
        unsafe { &*(self.shm.as_ptr() as *const RingHeader) }
    }

    fn slot_ptr(&self, idx: usize) -> *mut T {
        unsafe {
            let body = self.shm.as_mut_ptr().add(std::mem::size_of::<RingHeader>());
            (body as *mut T).add(idx)
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current occupancy — advisory (may be stale the instant it's read).
    pub fn len(&self) -> usize {
        self.hdr().size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_at_tail(&self, elem: &T) -> usize {
        let hdr = self.hdr();
        hdr.lock.lock();
        let tail = hdr.tail.load(Ordering::Relaxed);
        unsafe { std::ptr::copy_nonoverlapping(elem as *const T, self.slot_ptr(tail), 1) };
        hdr.tail.store((tail + 1) % self.capacity, Ordering::Relaxed);
        hdr.size.fetch_add(1, Ordering::Relaxed);
        hdr.lock.unlock();
        tail
    }

    fn pop_at_head(&self) -> (T, usize) {
        let hdr = self.hdr();
        hdr.lock.lock();
        let head = hdr.head.load(Ordering::Relaxed);
        let elem = unsafe { std::ptr::read(self.slot_ptr(head)) };
        hdr.head.store((head + 1) % self.capacity, Ordering::Relaxed);
        hdr.size.fetch_sub(1, Ordering::Relaxed);
        hdr.lock.unlock();
        (elem, head)
    }

    /// Block until a free slot exists, write `elem` at the tail, and return
    /// the index it now occupies.
    pub fn push(&self, elem: &T) -> io::Result<usize> {
        self.free_slots.wait(None)?;
        let idx = self.push_at_tail(elem);
        self.full_slots.post(1)?;
        Ok(idx)
    }

    /// Non-blocking `push`. Returns `None` if the ring is full.
    pub fn try_push(&self, elem: &T) -> io::Result<Option<usize>> {
        if !self.free_slots.wait(Some(0))? {
            return Ok(None);
        }
        let idx = self.push_at_tail(elem);
        self.full_slots.post(1)?;
        Ok(Some(idx))
    }

    /// Block until the ring is non-empty, then pop the head element paired
    /// with the index it occupied.
    pub fn pop(&self) -> io::Result<(T, usize)> {
        self.full_slots.wait(None)?;
        let (elem, idx) = self.pop_at_head();
        self.free_slots.post(1)?;
        Ok((elem, idx))
    }

    /// Non-blocking `pop`. Returns `None` if the ring is empty.
    pub fn try_pop(&self) -> io::Result<Option<(T, usize)>> {
        if !self.full_slots.wait(Some(0))? {
            return Ok(None);
        }
        let (elem, idx) = self.pop_at_head();
        self.free_slots.post(1)?;
        Ok(Some((elem, idx)))
    }

    /// Non-blocking: the head element and its index, without mutating
    /// head/tail/size or touching the semaphores.
    pub fn peek(&self) -> Option<(T, usize)> {
        let hdr = self.hdr();
        hdr.lock.lock();
        let empty = hdr.size.load(Ordering::Relaxed) == 0;
        let result = if empty {
            None
        } else {
            let head = hdr.head.load(Ordering::Relaxed);
            Some((unsafe { std::ptr::read(self.slot_ptr(head)) }, head))
        };
        hdr.lock.unlock();
        result
    }

    /// Direct slot access by index, for a caller that already holds the
    /// slot "logically" (e.g. a server worker about to overwrite the
    /// request it just popped). Does not touch the free/full semaphores.
    pub fn at(&self, idx: usize) -> T {
        unsafe { std::ptr::read(self.slot_ptr(idx)) }
    }

    /// Direct slot write by index — the write half of [`at`].
    pub fn set_at(&self, idx: usize, elem: &T) {
        unsafe { std::ptr::copy_nonoverlapping(elem as *const T, self.slot_ptr(idx), 1) };
    }

    /// Remove the backing storage for a named ring (static helper, for
    /// tests and server shutdown).
    pub fn clear_storage(name: &str) {
        ShmHandle::clear_storage(&format!("{name}_BODY_"));
        IpcSemaphore::clear_storage(&format!("{name}_FREE_"));
        IpcSemaphore::clear_storage(&format!("{name}_FULL_"));
    }
}
