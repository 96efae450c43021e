// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// shmkv client: a REPL that attaches to the named mailbox, builds
// requests from typed commands, and performs the client-side handshake
// of §4.3/§4.6, including the READ_BUCKET bulk side-channel fetch.
//
// Usage: client
//   Reads GET/INSERT/DELETE/READ_BUCKET lines from stdin until EOF or
//   SIGINT. Configuration is via the SHMKV_SHM_NAME environment variable
//   (defaults to /shm_ipc), matching the server.

use std::io::{self, BufRead, Write};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use libipc::kv::{BulkChannel, Kind, Mailbox, RecordData, DEFAULT_CAPACITY, PAIR_SIZE};
use libipc::signal::ctrlc_or_sigterm;

fn shm_name() -> String {
    std::env::var("SHMKV_SHM_NAME").unwrap_or_else(|_| "/shm_ipc".to_string())
}

/// Push `req`, retrying on a full ring with a short sleep, then wait for
/// the response on the slot it was assigned (§4.6 step 2-4).
fn send(mailbox: &Mailbox, req: &RecordData, client_id: u32) -> io::Result<RecordData> {
    let idx = loop {
        if let Some(idx) = mailbox.try_push_request(req)? {
            break idx;
        }
        std::thread::sleep(Duration::from_millis(5));
    };
    mailbox.receive_response(idx, client_id)
}

/// Send `req` (EXIT/CLOSE_BULK), which produces no response cell update.
fn send_fire_and_forget(mailbox: &Mailbox, req: &RecordData) -> io::Result<()> {
    loop {
        if mailbox.try_push_request(req)?.is_some() {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn read_bucket(mailbox: &Mailbox, name: &str, client_id: u32, index: &str) -> io::Result<()> {
    let req = RecordData::request(Kind::ReadBucket, client_id, index, "")?;
    let resp = send(mailbox, &req, client_id)?;
    if !resp.success {
        println!("READ_BUCKET failed: {}", resp.value_str());
        return Ok(());
    }
    let region = resp.key_str();
    // §4.5/§4.7: `value` is the region's decimal byte length.
    let byte_len: usize = resp.value_str().parse().unwrap_or(PAIR_SIZE);

    let channel = BulkChannel::open_by_len(name, client_id, byte_len)?;
    let pairs = channel.read_all();
    for (k, v) in &pairs {
        println!("{k} = {v}");
    }
    println!("({} entr{})", pairs.len(), if pairs.len() == 1 { "y" } else { "ies" });

    let close = RecordData::request(Kind::CloseBulk, client_id, &region, "")?;
    send_fire_and_forget(mailbox, &close)?;
    Ok(())
}

fn dispatch(mailbox: &Mailbox, name: &str, client_id: u32, line: &str) -> io::Result<()> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let cmd = match parts.next() {
        Some(c) if !c.is_empty() => c.to_ascii_uppercase(),
        _ => return Ok(()),
    };
    let rest = parts.clone().collect::<Vec<_>>().join(" ");

    match cmd.as_str() {
        "GET" | "DELETE" => {
            let key = rest.trim();
            if key.is_empty() {
                println!("usage: {cmd} <key>");
                return Ok(());
            }
            let kind = if cmd == "GET" { Kind::Get } else { Kind::Delete };
            let req = RecordData::request(kind, client_id, key, "")?;
            let resp = send(mailbox, &req, client_id)?;
            if resp.success {
                println!("OK {}", resp.value_str());
            } else {
                println!("NOT FOUND");
            }
        }
        "INSERT" => {
            let mut it = rest.splitn(2, char::is_whitespace);
            let key = it.next().unwrap_or("").trim();
            let value = it.next().unwrap_or("").trim();
            if key.is_empty() || value.is_empty() {
                println!("usage: INSERT <key> <value>");
                return Ok(());
            }
            let req = RecordData::request(Kind::Insert, client_id, key, value)?;
            let resp = send(mailbox, &req, client_id)?;
            println!("{}", if resp.success { "OK" } else { "ALREADY EXISTS" });
        }
        "READ_BUCKET" => {
            let index = rest.trim();
            if index.is_empty() {
                println!("usage: READ_BUCKET <index>");
                return Ok(());
            }
            read_bucket(mailbox, name, client_id, index)?;
        }
        other => println!("unknown command: {other}"),
    }
    Ok(())
}

fn main() {
    let name = shm_name();
    let mailbox = match Mailbox::open(&name, DEFAULT_CAPACITY) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("failed to attach to mailbox {name}: {e}");
            process::exit(1);
        }
    };
    let client_id = process::id();

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc_or_sigterm(move || {
            running.store(false, Ordering::SeqCst);
        });
    }

    println!("shmkv client attached to {name} as client {client_id}");
    println!("commands: GET <key> | INSERT <key> <value> | DELETE <key> | READ_BUCKET <index>");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        print!("> ");
        let _ = io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(l)) => l,
            Some(Err(_)) | None => break,
        };
        if let Err(e) = dispatch(&mailbox, &name, client_id, &line) {
            eprintln!("request failed: {e}");
        }
    }
    println!("shmkv client exiting");
}
