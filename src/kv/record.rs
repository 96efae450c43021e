// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Wire-format request/response record shared between the mailbox's request
// ring and its response cells. Identical layout on both sides of the wire
// (§3 of the design doc): `kind`, `success`, `ready`, `client_id`, `key`,
// `value`. A small `#[repr(C)]` header of atomics is placed directly in
// mapped memory, followed by the fixed-width byte payload, addressed
// through raw pointer arithmetic rather than a borrowed `&mut` into shared
// memory.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

/// Maximum key length (wire format constant, must match on every binary).
pub const KEY_CAP: usize = 128;
/// Maximum value length (wire format constant, must match on every binary).
pub const VALUE_CAP: usize = 1024;

/// Request/response discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Kind {
    None = 0,
    Get = 1,
    Insert = 2,
    ReadBucket = 3,
    Delete = 4,
    CloseBulk = 5,
    Response = 6,
    Exit = 7,
}

impl Kind {
    pub fn from_u32(v: u32) -> Kind {
        match v {
            1 => Kind::Get,
            2 => Kind::Insert,
            3 => Kind::ReadBucket,
            4 => Kind::Delete,
            5 => Kind::CloseBulk,
            6 => Kind::Response,
            7 => Kind::Exit,
            _ => Kind::None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// An owned, plain-data copy of a wire record. Used as the value type
/// passed to and returned from the ring and the mailbox handshake — never
/// itself mapped into shared memory (it has no atomics, so it is `Copy`).
#[derive(Clone, Copy)]
pub struct RecordData {
    pub kind: Kind,
    pub success: bool,
    pub client_id: u32,
    pub key: [u8; KEY_CAP],
    pub value: [u8; VALUE_CAP],
}

impl RecordData {
    pub fn empty() -> Self {
        Self {
            kind: Kind::None,
            success: false,
            client_id: 0,
            key: [0u8; KEY_CAP],
            value: [0u8; VALUE_CAP],
        }
    }

    pub fn request(kind: Kind, client_id: u32, key: &str, value: &str) -> io::Result<Self> {
        let mut rec = Self::empty();
        rec.kind = kind;
        rec.client_id = client_id;
        encode_str(&mut rec.key, key)?;
        encode_str(&mut rec.value, value)?;
        Ok(rec)
    }

    pub fn key_str(&self) -> String {
        decode_str(&self.key)
    }

    pub fn value_str(&self) -> String {
        decode_str(&self.value)
    }

    pub fn set_key(&mut self, s: &str) -> io::Result<()> {
        encode_str(&mut self.key, s)
    }

    pub fn set_value(&mut self, s: &str) -> io::Result<()> {
        encode_str(&mut self.value, s)
    }
}

/// Write `s` into a fixed-width field, zero-padded, leaving room for the
/// trailing zero terminator (§3: "a trailing zero byte terminates short
/// strings").
pub fn encode_str(dst: &mut [u8], s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() >= dst.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "value of {} bytes exceeds field capacity of {} bytes",
                bytes.len(),
                dst.len() - 1
            ),
        ));
    }
    dst.fill(0);
    dst[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// Read a zero-terminated string out of a fixed-width field.
pub fn decode_str(src: &[u8]) -> String {
    let len = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..len]).into_owned()
}

/// `#[repr(C)]` header of the atomic control fields of a record, placed at
/// the start of each slot in shared memory. The key/value byte payload
/// follows immediately after, addressed separately via raw pointer
/// arithmetic (see [`RecordSlot`]).
#[repr(C)]
pub struct RecordHeader {
    pub kind: AtomicU32,
    pub success: AtomicU32,
    pub ready: AtomicU32,
    pub client_id: AtomicU32,
}

/// Total byte size of one wire record slot (header + key + value).
pub const RECORD_SIZE: usize = std::mem::size_of::<RecordHeader>() + KEY_CAP + VALUE_CAP;

/// A view over one record slot living at a fixed offset inside a shared
/// memory mapping. Does not own the memory; the mapping must outlive every
/// `RecordSlot` built from it.
#[derive(Clone, Copy)]
pub struct RecordSlot {
    base: *mut u8,
}

unsafe impl Send for RecordSlot {}
unsafe impl Sync for RecordSlot {}

impl RecordSlot {
    /// # Safety
    /// `base` must point to at least `RECORD_SIZE` valid, mapped bytes for
    /// the lifetime of any use of the returned `RecordSlot`.
    pub unsafe fn at(base: *mut u8) -> Self {
        Self { base }
    }

    fn header(&self) -> &RecordHeader {
        unsafe { &*(self.base as *const RecordHeader) }
    }

    fn key_ptr(&self) -> *mut u8 {
        unsafe { self.base.add(std::mem::size_of::<RecordHeader>()) }
    }

    fn value_ptr(&self) -> *mut u8 {
        unsafe { self.key_ptr().add(KEY_CAP) }
    }

    /// Zero every byte of the slot (used when constructing a fresh mailbox).
    pub fn zero(&self) {
        unsafe { std::ptr::write_bytes(self.base, 0, RECORD_SIZE) };
    }

    pub fn kind(&self) -> Kind {
        Kind::from_u32(self.header().kind.load(Ordering::Acquire))
    }

    pub fn ready(&self) -> bool {
        self.header().ready.load(Ordering::Acquire) != 0
    }

    pub fn client_id(&self) -> u32 {
        self.header().client_id.load(Ordering::Acquire)
    }

    pub fn success(&self) -> bool {
        self.header().success.load(Ordering::Acquire) != 0
    }

    pub fn set_ready(&self, ready: bool) {
        self.header()
            .ready
            .store(if ready { 1 } else { 0 }, Ordering::Release);
    }

    pub fn set_client_id(&self, id: u32) {
        self.header().client_id.store(id, Ordering::Release);
    }

    /// Copy `data` into the slot. Does not itself touch `ready` ordering
    /// beyond a plain store — callers wanting the release-ordering
    /// guarantees of the mailbox handshake set `ready` last, separately.
    pub fn write(&self, data: &RecordData) {
        let hdr = self.header();
        hdr.kind.store(data.kind.as_u32(), Ordering::Relaxed);
        hdr.success
            .store(if data.success { 1 } else { 0 }, Ordering::Relaxed);
        hdr.client_id.store(data.client_id, Ordering::Relaxed);
        unsafe {
            std::ptr::copy_nonoverlapping(data.key.as_ptr(), self.key_ptr(), KEY_CAP);
            std::ptr::copy_nonoverlapping(data.value.as_ptr(), self.value_ptr(), VALUE_CAP);
        }
    }

    /// Copy the slot's contents out into an owned [`RecordData`].
    pub fn read(&self) -> RecordData {
        let hdr = self.header();
        let mut out = RecordData::empty();
        out.kind = Kind::from_u32(hdr.kind.load(Ordering::Relaxed));
        out.success = hdr.success.load(Ordering::Relaxed) != 0;
        out.client_id = hdr.client_id.load(Ordering::Relaxed);
        unsafe {
            std::ptr::copy_nonoverlapping(self.key_ptr(), out.key.as_mut_ptr(), KEY_CAP);
            std::ptr::copy_nonoverlapping(self.value_ptr(), out.value.as_mut_ptr(), VALUE_CAP);
        }
        out
    }
}
