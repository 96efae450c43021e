// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bulk-reply side channel for READ_BUCKET (§4.7). A whole bucket can hold
// more key/value pairs than fit in one mailbox response record, so the
// server instead writes the bucket's contents into a per-client named shm
// region as a sequence of fixed-width pairs terminated by a zeroed
// sentinel pair, and tells the client where to look via the ordinary
// mailbox response. The client reads the region directly (no further
// synchronization needed — the server finishes the write, including the
// sentinel, before publishing the response that points at it) and sends
// CLOSE_BULK once done so the server can unlink the region.

use std::io;

use crate::kv::record::{decode_str, encode_str, KEY_CAP, VALUE_CAP};
use crate::{ShmHandle, ShmOpenMode};

/// Byte size of one `(key, value)` wire pair in a bulk region.
pub const PAIR_SIZE: usize = KEY_CAP + VALUE_CAP;

/// A mapped bulk-reply region: a sequence of `(key, value)` pairs
/// followed by one zeroed sentinel pair.
pub struct BulkChannel {
    shm: ShmHandle,
    pair_count: usize,
}

fn bulk_name(mailbox_name: &str, client_id: u32) -> String {
    format!("{mailbox_name}_BULK{client_id}_")
}

impl BulkChannel {
    /// Server side: write `pairs` into a freshly created region named for
    /// `client_id`, followed by the sentinel. Fails if any key or value
    /// does not fit the fixed-width wire fields.
    pub fn create(
        mailbox_name: &str,
        client_id: u32,
        pairs: &[(String, String)],
    ) -> io::Result<Self> {
        let pair_count = pairs.len() + 1;
        let shm = ShmHandle::acquire(
            &bulk_name(mailbox_name, client_id),
            PAIR_SIZE * pair_count,
            ShmOpenMode::CreateOrOpen,
        )?;
        let base = shm.as_mut_ptr();
        for (i, (k, v)) in pairs.iter().enumerate() {
            let key_buf = unsafe { std::slice::from_raw_parts_mut(base.add(i * PAIR_SIZE), KEY_CAP) };
            let val_buf = unsafe {
                std::slice::from_raw_parts_mut(base.add(i * PAIR_SIZE + KEY_CAP), VALUE_CAP)
            };
            encode_str(key_buf, k)?;
            encode_str(val_buf, v)?;
        }
        // Sentinel: zeroed pair at the end.
        unsafe {
            std::ptr::write_bytes(base.add(pairs.len() * PAIR_SIZE), 0, PAIR_SIZE);
        }
        Ok(Self { shm, pair_count })
    }

    /// Client side: attach to an already-created region for `client_id`.
    /// `pair_count` is the number of slots the server sized the region
    /// for (pairs + sentinel); the client learns this out of band (it
    /// knows the bucket size it asked for, or simply scans until the
    /// mapping's end).
    pub fn open(mailbox_name: &str, client_id: u32, pair_count: usize) -> io::Result<Self> {
        let shm = ShmHandle::acquire(
            &bulk_name(mailbox_name, client_id),
            PAIR_SIZE * pair_count,
            ShmOpenMode::Open,
        )?;
        Ok(Self { shm, pair_count })
    }

    /// Client side: attach to a region sized by its byte length, as
    /// carried in the READ_BUCKET response's `value` field (§4.5/§4.7 —
    /// the wire contract is a byte length, not a pair count).
    pub fn open_by_len(mailbox_name: &str, client_id: u32, byte_len: usize) -> io::Result<Self> {
        Self::open(mailbox_name, client_id, byte_len / PAIR_SIZE)
    }

    /// Read every pair up to (not including) the sentinel.
    pub fn read_all(&self) -> Vec<(String, String)> {
        let base = self.shm.as_ptr();
        let mut out = Vec::new();
        for i in 0..self.pair_count {
            let key_buf =
                unsafe { std::slice::from_raw_parts(base.add(i * PAIR_SIZE), KEY_CAP) };
            if key_buf.iter().all(|&b| b == 0) {
                break;
            }
            let val_buf = unsafe {
                std::slice::from_raw_parts(base.add(i * PAIR_SIZE + KEY_CAP), VALUE_CAP)
            };
            out.push((decode_str(key_buf), decode_str(val_buf)));
        }
        out
    }

    /// Remove the backing storage for a client's bulk region (server-side,
    /// on receiving CLOSE_BULK).
    pub fn clear_storage(mailbox_name: &str, client_id: u32) {
        ShmHandle::clear_storage(&bulk_name(mailbox_name, client_id));
    }
}
