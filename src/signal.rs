// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared SIGINT/SIGTERM/SIGHUP hook used by the demo binaries and the
// shmkv server/client. Extracted from demo_msg_que.rs / demo_send_recv.rs,
// which previously each carried their own copy.

/// Install `f` as the process's SIGINT/SIGTERM/SIGHUP handler.
///
/// `f` runs on the signal-handling thread; it must be limited to
/// async-signal-safe work such as storing an `AtomicBool` — no taking a
/// `std::sync::Mutex`, which can self-deadlock if the signal interrupts
/// a thread already holding it. The callback is stashed in a `OnceLock`
/// and read with a plain atomic load (`get`), never a lock, so the
/// handler itself does nothing but that load plus whatever `f` does. On
/// non-unix targets this is a no-op (the closure is simply dropped).
pub fn ctrlc_or_sigterm(f: impl Fn() + Send + Sync + 'static) {
    #[cfg(unix)]
    {
        static CB: std::sync::OnceLock<Box<dyn Fn() + Send + Sync>> = std::sync::OnceLock::new();
        CB.get_or_init(|| Box::new(f));
        extern "C" fn handler(_: libc::c_int) {
            if let Some(cb) = CB.get() {
                cb();
            }
        }
        unsafe {
            libc::signal(libc::SIGINT, handler as *const () as libc::sighandler_t);
            libc::signal(libc::SIGTERM, handler as *const () as libc::sighandler_t);
            libc::signal(libc::SIGHUP, handler as *const () as libc::sighandler_t);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = f;
    }
}
