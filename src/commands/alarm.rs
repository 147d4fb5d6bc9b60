//! Alarm subcommands: add, remove, toggle.

use anyhow::{Context, Result};

use super::{load_store, nudge_daemon, resolve_alarm_or_exit};
use crate::constants::{DEFAULT_ALARM_TIME, EXIT_FAILURE};
use crate::store::AlarmSound;

/// `geowake alarm add [HH:MM] [--location <name|id>] [--sound <name>]`
pub fn run_add(
    time: Option<&str>,
    location: Option<&str>,
    sound: Option<&str>,
    debug_enabled: bool,
) -> Result<()> {
    log_version!();
    let mut store = load_store()?;

    let time = time.unwrap_or(DEFAULT_ALARM_TIME);

    let sound = match sound {
        Some(name) => match AlarmSound::parse(name) {
            Some(sound) => sound,
            None => {
                log_error_exit!("Unknown sound {name:?}");
                log_indented!("Available sounds: default, chime, radar, custom");
                log_end!();
                std::process::exit(EXIT_FAILURE);
            }
        },
        None => AlarmSound::Default,
    };

    // New alarms bind to the named location, or the first saved one
    let location_id = match location {
        Some(query) => match store.resolve_location(query) {
            Some(l) => l.id.clone(),
            None => {
                log_error_exit!("No location matches {query:?}");
                log_indented!("Use `geowake status` to list locations");
                log_end!();
                std::process::exit(EXIT_FAILURE);
            }
        },
        None => store
            .locations()
            .first()
            .map(|l| l.id.clone())
            .unwrap_or_default(),
    };

    let alarm = store.add_alarm(time, location_id, sound)?;

    log_block_start!("Added alarm {} (id {})", alarm.time, alarm.id);
    if alarm.location_id.is_empty() {
        log_indented!("No location bound yet; add one before arming");
    } else if let Some(l) = store.find_location(&alarm.location_id) {
        log_indented!("Bound to {}", l.name);
    }
    log_indented!("Arm it with: geowake alarm toggle {}", alarm.id);

    nudge_daemon(debug_enabled);
    log_end!();
    Ok(())
}

/// `geowake alarm remove <id-prefix>`
pub fn run_remove(query: &str, debug_enabled: bool) -> Result<()> {
    log_version!();
    let mut store = load_store()?;

    let id = resolve_alarm_or_exit(&store, query);
    let removed = store.remove_alarm(&id)?;
    log_block_start!("Removed alarm {} (id {})", removed.time, removed.id);

    nudge_daemon(debug_enabled);
    log_end!();
    Ok(())
}

/// `geowake alarm toggle <id-prefix>`: arm or disarm.
pub fn run_toggle(query: &str, debug_enabled: bool) -> Result<()> {
    log_version!();
    let mut store = load_store()?;

    let id = resolve_alarm_or_exit(&store, query);
    let alarm = store
        .find_alarm(&id)
        .context("Alarm disappeared while toggling")?
        .clone();
    let arming = !alarm.is_active;

    if arming && !store.is_ready(&alarm) {
        log_error_exit!("Alarm {} has no saved location and cannot be armed", alarm.time);
        log_indented!("Bind one first: geowake location add <name> <lat> <lon>");
        log_end!();
        std::process::exit(EXIT_FAILURE);
    }

    store.set_alarm_active(&id, arming)?;
    if arming {
        log_block_start!("Alarm {} armed", alarm.time);
        if let Some(l) = store.find_location(&alarm.location_id) {
            log_indented!("Stands down on arrival at {}", l.name);
        }
    } else {
        log_block_start!("Alarm {} disarmed", alarm.time);
    }

    nudge_daemon(debug_enabled);
    log_end!();
    Ok(())
}
