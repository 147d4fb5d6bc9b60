//! Lock file management for single-instance enforcement.
//!
//! Only one geowake daemon runs per user session. The lock file lives in
//! the runtime directory and carries the daemon's PID so one-shot commands
//! (`dismiss`, `stop`, store mutations) can signal the running instance.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use crate::constants::EXIT_FAILURE;

/// Path of the daemon lock file.
pub fn lock_path() -> String {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    format!("{runtime_dir}/geowake.lock")
}

/// Acquire the single-instance lock.
///
/// # Returns
/// - `Ok((lock_file, lock_path))` when the lock was acquired
/// - `Err(_)` on I/O failure
/// - never returns when another live instance holds the lock (exits with a
///   hint instead)
pub fn acquire_lock() -> Result<(File, String)> {
    let path = lock_path();

    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("Failed to open lock file {path}"))?;

    if lock_file.try_lock_exclusive().is_err() {
        // Another holder: stale lock or a live instance
        handle_lock_conflict(&path);

        // Conflict resolved (stale lock removed), retry once
        lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to reopen lock file {path}"))?;
        if let Err(e) = lock_file.try_lock_exclusive() {
            log_error_exit!("Failed to acquire lock after cleanup attempt: {e}");
            log_end!();
            std::process::exit(EXIT_FAILURE);
        }
    }

    lock_file.set_len(0)?;
    lock_file.seek(SeekFrom::Start(0))?;
    writeln!(&lock_file, "{}", std::process::id())?;
    lock_file.flush()?;

    Ok((lock_file, path))
}

/// Resolve a lock conflict: remove stale locks, exit when a live instance
/// is running.
fn handle_lock_conflict(path: &str) {
    match read_lock_pid(path) {
        Some(pid) if is_process_running(pid) => {
            log_pipe!();
            log_error!("geowake is already running (PID: {pid})");
            log_block_start!("Did you mean to:");
            log_indented!("• Check state: geowake status");
            log_indented!("• Silence a ringing alarm: geowake dismiss");
            log_indented!("• Stop the daemon: geowake stop");
            log_end!();
            std::process::exit(EXIT_FAILURE);
        }
        Some(pid) => {
            log_warning!("Removing stale lock file (process {pid} no longer running)");
            let _ = std::fs::remove_file(path);
        }
        None => {
            log_warning!("Lock file unreadable or invalid, removing");
            let _ = std::fs::remove_file(path);
        }
    }
}

/// PID recorded in the lock file, if the file is well-formed.
fn read_lock_pid(path: &str) -> Option<u32> {
    let content = std::fs::read_to_string(path).ok()?;
    content.lines().next()?.trim().parse().ok()
}

/// PID of the running daemon, if there is one.
pub fn running_instance_pid() -> Option<u32> {
    let pid = read_lock_pid(&lock_path())?;
    is_process_running(pid).then_some(pid)
}

/// Whether a process with this PID is alive (signal 0 probe).
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Deliver a signal to the running daemon.
///
/// # Returns
/// - `Ok(pid)` when the signal was sent
/// - `Err(_)` when no instance is running or delivery failed
pub fn signal_running_instance(signal: nix::sys::signal::Signal) -> Result<u32> {
    let pid = running_instance_pid().context("geowake isn't running")?;

    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal)
        .with_context(|| format!("Failed to send {signal} to PID {pid}"))?;
    Ok(pid)
}
