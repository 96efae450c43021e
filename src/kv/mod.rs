// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared-memory key/value mailbox service: a request ring and response
// cells (`mailbox`) carrying fixed-width wire records (`record`) to a
// server-resident concurrent hash table (`table`), with a side channel
// (`side_channel`) for bulk bucket reads.

mod record;
pub use record::{decode_str, encode_str, Kind, RecordData, RecordHeader, RecordSlot, RECORD_SIZE};

mod ring;
pub use ring::RingBuffer;

mod mailbox;
pub use mailbox::{exit_request, Mailbox, DEFAULT_CAPACITY};

mod table;
pub use table::{HashTable, ALPHA_MAX, ALPHA_MIN, MIN_CAPACITY};

mod side_channel;
pub use side_channel::{BulkChannel, PAIR_SIZE};
