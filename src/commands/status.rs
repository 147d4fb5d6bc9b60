//! Status command: daemon state plus the stored alarms and locations.

use anyhow::Result;

use super::load_store;

/// `geowake status`
pub fn run(debug_enabled: bool) -> Result<()> {
    log_version!();

    match crate::io::lock::running_instance_pid() {
        Some(pid) => log_block_start!("Daemon running (PID: {pid})"),
        None => log_block_start!("Daemon not running"),
    }

    let store = load_store()?;

    log_block_start!("Locations ({})", store.locations().len());
    for location in store.locations() {
        log_indented!(
            "{}  {:.4}, {:.4}  (id {})",
            location.name,
            location.lat,
            location.lon,
            location.id
        );
    }
    if store.locations().is_empty() {
        log_indented!("none saved; try: geowake location add <name> <lat> <lon>");
    }

    log_block_start!("Alarms ({})", store.alarms().len());
    for alarm in store.alarms() {
        let state = if alarm.is_active { "armed" } else { "off" };
        let target = store
            .find_location(&alarm.location_id)
            .map(|l| l.name.as_str())
            .unwrap_or("no location");
        log_indented!(
            "{}  [{}]  → {}  sound {}  (id {})",
            alarm.time,
            state,
            target,
            alarm.sound,
            alarm.id
        );
    }
    if store.alarms().is_empty() {
        log_indented!("none; try: geowake alarm add HH:MM");
    }

    if debug_enabled {
        log_pipe!();
        log_debug!("Store: {}", crate::store::default_store_path()?.display());
        log_debug!("Config: {}", crate::config::config_path()?.display());
    }

    log_end!();
    Ok(())
}
