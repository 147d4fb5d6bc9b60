//! Location subcommands: add, here, remove.

use anyhow::{Context, Result};
use std::sync::mpsc;
use std::time::Duration;

use super::{load_store, nudge_daemon};
use crate::backend::{PositionBackend, create_backend, detect_backend};
use crate::constants::{EXIT_FAILURE, HERE_FIX_TIMEOUT_SECS};
use crate::core::EngineEvent;

/// `geowake location add <name> <lat> <lon>`
pub fn run_add(name: &str, lat: f64, lon: f64, debug_enabled: bool) -> Result<()> {
    log_version!();
    let mut store = load_store()?;

    let location = store.add_location(name, lat, lon)?;
    log_block_start!(
        "Saved {} at {:.4}, {:.4} (id {})",
        location.name,
        location.lat,
        location.lon,
        location.id
    );

    nudge_daemon(debug_enabled);
    log_end!();
    Ok(())
}

/// `geowake location here [name]`: capture the current position.
///
/// Reads one fix directly from the configured position backend with a
/// bounded wait, independent of any running daemon.
pub fn run_here(name: Option<&str>, debug_enabled: bool) -> Result<()> {
    log_version!();
    let mut store = load_store()?;

    let config = crate::config::Config::load()?;
    let kind = detect_backend(&config)?;
    let Some(mut backend) = create_backend(kind) else {
        log_error_exit!("No position source available to capture the current location");
        log_indented!("Add the location manually: geowake location add <name> <lat> <lon>");
        log_end!();
        std::process::exit(EXIT_FAILURE);
    };

    log_block_start!("Waiting for a position fix ({})...", backend.name());

    let (sender, receiver) = mpsc::channel();
    backend.start(sender)?;
    let fix = wait_for_fix(&receiver, Duration::from_secs(HERE_FIX_TIMEOUT_SECS));
    backend.stop();

    let position = fix.context("Timed out waiting for a position fix")?;

    let name = match name {
        Some(name) => name.to_string(),
        None => format!(
            "Current Location {}",
            crate::time::source::now().format("%H:%M")
        ),
    };

    let location = store.add_location(&name, position.lat, position.lon)?;
    log_block_start!(
        "Saved {} at {:.4}, {:.4} (id {})",
        location.name,
        location.lat,
        location.lon,
        location.id
    );

    nudge_daemon(debug_enabled);
    log_end!();
    Ok(())
}

fn wait_for_fix(
    receiver: &mpsc::Receiver<EngineEvent>,
    timeout: Duration,
) -> Option<crate::backend::Position> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.checked_duration_since(std::time::Instant::now())?;
        match receiver.recv_timeout(remaining) {
            Ok(EngineEvent::Position(position)) => return Some(position),
            Ok(EngineEvent::PositionError(e)) => {
                log_pipe!();
                log_warning!("{e}");
                if matches!(e, crate::backend::PositionError::PermissionDenied) {
                    return None;
                }
            }
            Ok(_) => {}
            Err(_) => return None,
        }
    }
}

/// `geowake location remove <name|id-prefix>`; cascades to alarms.
pub fn run_remove(query: &str, debug_enabled: bool) -> Result<()> {
    log_version!();
    let mut store = load_store()?;

    let id = match store.resolve_location(query) {
        Some(location) => location.id.clone(),
        None => {
            log_error_exit!("No location matches {query:?}");
            log_indented!("Use `geowake status` to list locations");
            log_end!();
            std::process::exit(EXIT_FAILURE);
        }
    };

    let affected: Vec<String> = store
        .alarms()
        .iter()
        .filter(|a| a.location_id == id)
        .map(|a| a.time.clone())
        .collect();

    let removed = store.remove_location(&id)?;
    log_block_start!("Removed {}", removed.name);
    for time in affected {
        log_indented!("Alarm {time} was rebound and disarmed");
    }

    nudge_daemon(debug_enabled);
    log_end!();
    Ok(())
}
