// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the READ_BUCKET bulk-reply side channel (kv::BulkChannel), §4.7.

use std::sync::atomic::{AtomicUsize, Ordering};

use libipc::kv::BulkChannel;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_bulk_{n}")
}

// §8 end-to-end scenario 5: three keys, terminated by a zeroed sentinel.
#[test]
fn create_then_open_reads_all_pairs_up_to_sentinel() {
    let name = unique_name("three_keys");
    let client_id = 1234;
    BulkChannel::clear_storage(&name, client_id);

    let pairs = vec![
        ("a".to_string(), "1".to_string()),
        ("b".to_string(), "2".to_string()),
        ("c".to_string(), "3".to_string()),
    ];
    // The writer's handle must stay alive until the reader has its own —
    // dropping the sole handle unlinks the backing segment (§4.7's "the
    // client reads the region directly" assumes the server keeps its
    // handle open across the READ_BUCKET response and the client's
    // attach, exactly as the server's `BulkRegistry` does).
    let writer = BulkChannel::create(&name, client_id, &pairs).expect("create");
    let reader = BulkChannel::open(&name, client_id, pairs.len() + 1).expect("open");
    let read_back = reader.read_all();
    assert_eq!(read_back, pairs);
    drop(reader);
    drop(writer);

    BulkChannel::clear_storage(&name, client_id);
}

#[test]
fn empty_bucket_reads_back_as_empty() {
    let name = unique_name("empty_bucket");
    let client_id = 99;
    BulkChannel::clear_storage(&name, client_id);

    let writer = BulkChannel::create(&name, client_id, &[]).expect("create");
    let reader = BulkChannel::open(&name, client_id, 1).expect("open");
    assert!(reader.read_all().is_empty());
    drop(reader);
    drop(writer);

    BulkChannel::clear_storage(&name, client_id);
}
