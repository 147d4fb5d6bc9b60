//! Stop command: cleanly terminate the running daemon.

use anyhow::Result;
use std::time::Duration;

/// `geowake stop`: SIGTERM, then wait for the process to exit.
pub fn run(debug_enabled: bool) -> Result<()> {
    log_version!();

    let pid = match crate::io::lock::signal_running_instance(nix::sys::signal::Signal::SIGTERM) {
        Ok(pid) => pid,
        Err(_) => {
            log_error_exit!("geowake isn't running");
            log_end!();
            return Ok(());
        }
    };

    log_block_start!("Stopping geowake (PID: {pid})...");
    if debug_enabled {
        log_pipe!();
        log_debug!("SIGTERM sent to process {pid}");
    }

    // Confirm the process actually exits (100ms intervals, 3s budget)
    for _ in 0..30 {
        if !crate::io::lock::is_process_running(pid) {
            log_pipe!();
            log_info!("Process terminated successfully");
            log_end!();
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    log_pipe!();
    log_warning!("Process did not terminate within the expected time");
    log_indented!("The signal was sent; the daemon may still be shutting down");
    log_end!();
    Ok(())
}
