//! Dismiss command: silence the ringing alarm in the running daemon.

use anyhow::Result;

/// `geowake dismiss`: sends SIGUSR1 to the daemon. Dismissal is the only
/// way to silence a ringing alarm; the daemon deactivates it regardless of
/// proximity.
pub fn run(debug_enabled: bool) -> Result<()> {
    log_version!();

    match crate::io::lock::signal_running_instance(nix::sys::signal::Signal::SIGUSR1) {
        Ok(pid) => {
            log_block_start!("Dismiss sent to running daemon (PID: {pid})");
            if debug_enabled {
                log_indented!("If nothing was ringing, the daemon ignores it");
            }
        }
        Err(_) => {
            log_error_exit!("geowake isn't running");
        }
    }

    log_end!();
    Ok(())
}
