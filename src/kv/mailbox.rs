// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The shared-memory mailbox (§4.3): a request ring (§4.2, `RingBuffer`)
// plus N response cells, each guarded by its own named mutex/condvar for
// the slot-reuse handshake. Lives entirely in shared memory so that the
// server process and every client process address the same structure by
// name.

use std::io;

use crate::{IpcCondition, IpcMutex, ShmHandle, ShmOpenMode};

use super::record::{Kind, RecordData, RecordSlot, RECORD_SIZE};
use super::ring::RingBuffer;

/// Canonical ring capacity (§6: "the canonical build uses 12").
pub const DEFAULT_CAPACITY: usize = 12;

pub struct Mailbox {
    capacity: usize,
    ring: RingBuffer<RecordData>,
    cells_shm: ShmHandle,
    cell_mutexes: Vec<IpcMutex>,
    cell_conds: Vec<IpcCondition>,
}

impl Mailbox {
    /// Open (or create) the named mailbox. The first process to open it
    /// zeroes the response cells and leaves the request ring empty; later
    /// opens (client attaches) just map the existing structures.
    pub fn open(name: &str, capacity: usize) -> io::Result<Self> {
        let ring = RingBuffer::open(&format!("{name}_RING_"), capacity)?;

        let cells_shm = ShmHandle::acquire(
            &format!("{name}_CELLS_"),
            RECORD_SIZE * capacity,
            ShmOpenMode::CreateOrOpen,
        )?;
        if cells_shm.ref_count() == 1 {
            for i in 0..capacity {
                Self::cell_at(&cells_shm, i).zero();
            }
        }

        let mut cell_mutexes = Vec::with_capacity(capacity);
        let mut cell_conds = Vec::with_capacity(capacity);
        for i in 0..capacity {
            cell_mutexes.push(IpcMutex::open(&format!("{name}_CELL{i}_MTX_"))?);
            cell_conds.push(IpcCondition::open(&format!("{name}_CELL{i}_COND_"))?);
        }

        Ok(Self {
            capacity,
            ring,
            cells_shm,
            cell_mutexes,
            cell_conds,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn cell_at(shm: &ShmHandle, idx: usize) -> RecordSlot {
        unsafe { RecordSlot::at(shm.as_mut_ptr().add(idx * RECORD_SIZE)) }
    }

    fn cell(&self, idx: usize) -> RecordSlot {
        Self::cell_at(&self.cells_shm, idx)
    }

    // --- Request ring (client push / server pop) ---------------------------

    /// Enqueue a request, blocking until the ring has room. Returns the
    /// slot index the request now occupies.
    pub fn push_request(&self, req: &RecordData) -> io::Result<usize> {
        self.ring.push(req)
    }

    /// Non-blocking `push_request`.
    pub fn try_push_request(&self, req: &RecordData) -> io::Result<Option<usize>> {
        self.ring.try_push(req)
    }

    /// Dequeue the next request, blocking until one is available.
    pub fn pop_request(&self) -> io::Result<(RecordData, usize)> {
        self.ring.pop()
    }

    // --- Response cell handshake (§4.3) -------------------------------------

    /// Server-side handshake: publish `resp` into cell `idx` for
    /// `resp.client_id`, waiting first for any previous tenant to have
    /// been claimed.
    pub fn publish_response(&self, idx: usize, resp: &RecordData) -> io::Result<()> {
        let mtx = &self.cell_mutexes[idx];
        let cond = &self.cell_conds[idx];
        let cell = self.cell(idx);

        mtx.lock()?;
        while cell.ready() || cell.client_id() != 0 {
            cond.wait(mtx, None)?;
        }
        cell.write(resp);
        cell.set_ready(true);
        cond.broadcast()?;
        mtx.unlock()?;
        Ok(())
    }

    /// Client-side handshake: wait for cell `idx` to carry a ready response
    /// addressed to `client_id`, consume it, and mark the cell free again.
    pub fn receive_response(&self, idx: usize, client_id: u32) -> io::Result<RecordData> {
        let mtx = &self.cell_mutexes[idx];
        let cond = &self.cell_conds[idx];
        let cell = self.cell(idx);

        mtx.lock()?;
        while !(cell.ready() && cell.client_id() == client_id) {
            cond.wait(mtx, None)?;
        }
        let data = cell.read();
        cell.set_ready(false);
        cell.set_client_id(0);
        cond.broadcast()?;
        mtx.unlock()?;
        Ok(data)
    }

    /// Remove all backing storage for a named mailbox of the given
    /// capacity (server shutdown / test cleanup).
    pub fn clear_storage(name: &str, capacity: usize) {
        RingBuffer::<RecordData>::clear_storage(&format!("{name}_RING_"));
        ShmHandle::clear_storage(&format!("{name}_CELLS_"));
        for i in 0..capacity {
            IpcMutex::clear_storage(&format!("{name}_CELL{i}_MTX_"));
            IpcCondition::clear_storage(&format!("{name}_CELL{i}_COND_"));
        }
    }
}

/// Convenience: build an EXIT request addressed to nobody in particular
/// (EXIT carries no response, so `client_id` is unused by the server).
pub fn exit_request() -> RecordData {
    RecordData {
        kind: Kind::Exit,
        ..RecordData::empty()
    }
}
