// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// shmkv server: owns the mailbox and the hash table, drains the request
// ring with a worker pool sized to the ring capacity, and dispatches
// GET/INSERT/DELETE/READ_BUCKET/CLOSE_BULK onto the table (§4.5).
//
// Usage: server <initial-capacity>
//   <initial-capacity> = 0 selects the default-capacity resizable table;
//   any other decimal value pins the table at that non-resizable capacity.

use std::collections::HashMap;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use libipc::kv::{BulkChannel, HashTable, Kind, Mailbox, RecordData, DEFAULT_CAPACITY, PAIR_SIZE};
use libipc::signal::ctrlc_or_sigterm;

const DEFAULT_TABLE_CAPACITY: usize = 16;

/// Open bulk side-channel regions awaiting their client's CLOSE_BULK,
/// keyed by client id. `BulkChannel`'s `ShmHandle` unlinks its backing
/// segment as soon as its last handle drops (§10.6: the crate's existing
/// ref-counted shm semantics, not something this service reimplements),
/// so the server must keep a handle alive from READ_BUCKET through
/// CLOSE_BULK rather than dropping it at the end of the match arm.
type BulkRegistry = Mutex<HashMap<u32, BulkChannel>>;

fn shm_name() -> String {
    std::env::var("SHMKV_SHM_NAME").unwrap_or_else(|_| "/shm_ipc".to_string())
}

fn worker_loop(
    mailbox: Arc<Mailbox>,
    table: Arc<HashTable>,
    name: Arc<String>,
    bulk: Arc<BulkRegistry>,
    id: usize,
) {
    loop {
        let (req, idx) = match mailbox.pop_request() {
            Ok(v) => v,
            Err(e) => {
                eprintln!("worker {id}: ring pop failed, exiting: {e}");
                return;
            }
        };

        match req.kind {
            Kind::Exit => {
                println!("worker {id}: exiting");
                return;
            }
            Kind::CloseBulk => {
                // req.client_id addresses the bulk region directly; the region
                // name the client echoes back in `key` is logged only.
                if bulk.lock().unwrap().remove(&req.client_id).is_some() {
                    BulkChannel::clear_storage(&name, req.client_id);
                } else {
                    eprintln!(
                        "worker {id}: CLOSE_BULK for client {} with no open region",
                        req.client_id
                    );
                }
                continue;
            }
            Kind::Response | Kind::None => {
                eprintln!("worker {id}: malformed request kind {:?}, discarding", req.kind);
                continue;
            }
            _ => {}
        }

        let mut resp = RecordData::empty();
        resp.kind = Kind::Response;
        resp.client_id = req.client_id;

        match req.kind {
            Kind::Get => match table.get(&req.key_str()) {
                Some(v) => {
                    resp.success = true;
                    if resp.set_value(&v).is_err() {
                        resp.success = false;
                    }
                }
                None => resp.success = false,
            },
            Kind::Insert => {
                resp.success = table.insert(&req.key_str(), &req.value_str());
            }
            Kind::Delete => match table.remove(&req.key_str()) {
                Some(v) => {
                    resp.success = true;
                    if resp.set_value(&v).is_err() {
                        resp.success = false;
                    }
                }
                None => resp.success = false,
            },
            Kind::ReadBucket => {
                let key = req.key_str();
                match key.trim().parse::<usize>() {
                    Err(_) => {
                        resp.success = false;
                        let _ = resp.set_value("invalid bucket index");
                    }
                    Ok(i) => match table.get_bucket(i) {
                        None => {
                            resp.success = false;
                            let _ = resp.set_value("bucket index out of range");
                        }
                        Some(pairs) => match BulkChannel::create(&name, req.client_id, &pairs) {
                            Ok(region) => {
                                // Keep the handle alive past this arm — the
                                // `ShmHandle` it wraps unlinks its backing
                                // segment as soon as its last reference
                                // drops, and the client hasn't opened it yet.
                                bulk.lock().unwrap().insert(req.client_id, region);
                                resp.success = true;
                                let region_name = format!("{name}_BULK{}_", req.client_id);
                                let _ = resp.set_key(&region_name);
                                // §4.5/§4.7: `value` carries the region's
                                // decimal byte length, not a pair count.
                                let byte_len = (pairs.len() + 1) * PAIR_SIZE;
                                let _ = resp.set_value(&byte_len.to_string());
                            }
                            Err(e) => {
                                resp.success = false;
                                let _ = resp.set_value(&format!("bulk channel failed: {e}"));
                            }
                        },
                    },
                }
            }
            _ => unreachable!("handled above"),
        }

        if let Err(e) = mailbox.publish_response(idx, &resp) {
            eprintln!("worker {id}: failed to publish response: {e}");
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("usage: {} <initial-capacity>  (0 = default, resizable)", args[0]);
        process::exit(1);
    }
    let arg_capacity: usize = match args[1].parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("invalid capacity {:?}: must be a non-negative integer", args[1]);
            process::exit(1);
        }
    };
    let (capacity, resizable) = if arg_capacity == 0 {
        (DEFAULT_TABLE_CAPACITY, true)
    } else {
        (arg_capacity, false)
    };

    let name = Arc::new(shm_name());
    let mailbox = match Mailbox::open(&name, DEFAULT_CAPACITY) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("failed to create mailbox {name}: {e}");
            process::exit(1);
        }
    };
    let table = Arc::new(HashTable::new(capacity, resizable));
    let bulk: Arc<BulkRegistry> = Arc::new(Mutex::new(HashMap::new()));

    println!(
        "shmkv server listening on {name} (ring capacity {}, table capacity {capacity}, resizable {resizable})",
        mailbox.capacity()
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc_or_sigterm(move || {
            running.store(false, Ordering::SeqCst);
        });
    }

    let mut workers = Vec::with_capacity(mailbox.capacity());
    for id in 0..mailbox.capacity() {
        let mailbox = mailbox.clone();
        let table = table.clone();
        let name = name.clone();
        let bulk = bulk.clone();
        workers.push(std::thread::spawn(move || worker_loop(mailbox, table, name, bulk, id)));
    }

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    println!("shmkv server shutting down, draining {} workers", workers.len());
    for _ in 0..workers.len() {
        if let Err(e) = mailbox.push_request(&libipc::kv::exit_request()) {
            eprintln!("failed to push EXIT request: {e}");
        }
    }
    for w in workers {
        let _ = w.join();
    }

    Mailbox::clear_storage(&name, DEFAULT_CAPACITY);
    println!("shmkv server exited cleanly");
}
