//! One-shot CLI command handlers.
//!
//! Commands are the presentation layer: they mutate the persisted alarm
//! store (or signal the running daemon) and exit. A running daemon picks
//! mutations up through its store watcher; a SIGUSR2 nudge is sent as well
//! so the reload is immediate even where file watching is unavailable.

pub mod alarm;
pub mod dismiss;
pub mod location;
pub mod simulate;
pub mod status;
pub mod stop;

use anyhow::Result;

use crate::store::Store;

/// Load the store for a one-shot mutation.
pub(crate) fn load_store() -> Result<Store> {
    Store::load()
}

/// Nudge the running daemon (if any) to reload after a store mutation.
pub(crate) fn nudge_daemon(debug_enabled: bool) {
    match crate::io::lock::signal_running_instance(nix::sys::signal::Signal::SIGUSR2) {
        Ok(pid) => {
            if debug_enabled {
                log_pipe!();
                log_debug!("Reload signal sent to running daemon (PID: {pid})");
            }
        }
        Err(_) => {
            // No daemon running; the change takes effect on next start
        }
    }
}

/// Resolve an alarm by id or unique prefix, exiting with a listing hint on
/// failure.
pub(crate) fn resolve_alarm_or_exit(store: &Store, query: &str) -> String {
    match store.resolve_alarm(query) {
        Some(alarm) => alarm.id.clone(),
        None => {
            log_error_exit!("No alarm matches {query:?}");
            log_indented!("Use `geowake status` to list alarm ids");
            log_end!();
            std::process::exit(crate::constants::EXIT_FAILURE);
        }
    }
}
