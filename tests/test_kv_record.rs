// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the shmkv wire record format (kv::RecordData / RecordSlot), §3.

use libipc::kv::{decode_str, encode_str, Kind, RecordData, RecordSlot, RECORD_SIZE};

#[test]
fn kind_round_trips_through_u32() {
    for kind in [
        Kind::None,
        Kind::Get,
        Kind::Insert,
        Kind::ReadBucket,
        Kind::Delete,
        Kind::CloseBulk,
        Kind::Response,
        Kind::Exit,
    ] {
        assert_eq!(Kind::from_u32(kind.as_u32()), kind);
    }
}

#[test]
fn unknown_kind_value_decodes_to_none() {
    assert_eq!(Kind::from_u32(999), Kind::None);
}

#[test]
fn encode_then_decode_preserves_short_string() {
    let mut buf = [0u8; 16];
    encode_str(&mut buf, "hello").expect("encode");
    assert_eq!(decode_str(&buf), "hello");
}

#[test]
fn encode_rejects_string_without_room_for_terminator() {
    let mut buf = [0u8; 4];
    assert!(encode_str(&mut buf, "abcd").is_err());
    assert!(encode_str(&mut buf, "abc").is_ok());
}

#[test]
fn request_builder_populates_key_and_value() {
    let req = RecordData::request(Kind::Insert, 7, "mykey", "myvalue").expect("request");
    assert_eq!(req.kind, Kind::Insert);
    assert_eq!(req.client_id, 7);
    assert_eq!(req.key_str(), "mykey");
    assert_eq!(req.value_str(), "myvalue");
}

#[test]
fn record_slot_write_read_round_trips() {
    let mut backing = vec![0u8; RECORD_SIZE];
    let slot = unsafe { RecordSlot::at(backing.as_mut_ptr()) };
    slot.zero();

    let data = RecordData::request(Kind::Get, 3, "k", "v").unwrap();
    slot.write(&data);
    slot.set_ready(true);
    slot.set_client_id(3);

    assert!(slot.ready());
    assert_eq!(slot.client_id(), 3);
    let read_back = slot.read();
    assert_eq!(read_back.kind, Kind::Get);
    assert_eq!(read_back.key_str(), "k");
    assert_eq!(read_back.value_str(), "v");
}

#[test]
fn fresh_slot_is_not_ready_and_has_no_tenant() {
    let mut backing = vec![0u8; RECORD_SIZE];
    let slot = unsafe { RecordSlot::at(backing.as_mut_ptr()) };
    slot.zero();
    assert!(!slot.ready());
    assert_eq!(slot.client_id(), 0);
}
