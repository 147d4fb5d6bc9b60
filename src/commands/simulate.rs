//! Simulate command: replay a position track under accelerated time.
//!
//! Runs the full engine (ticks, ring decisions, arrival stand-down)
//! against a recorded track and a compressed clock, so a morning's worth of
//! alarm behavior can be observed in seconds. The alarm store is copied
//! into memory first: a simulation never mutates the real store.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::backend::replay::ReplayBackend;
use crate::geowake::Geowake;
use crate::store::Store;
use crate::time::source::{SimulatedTimeSource, init_time_source, parse_datetime};

/// `geowake simulate <track.toml> <start> <end> [multiplier] [--log]`
pub fn run(
    track_path: &str,
    start: &str,
    end: &str,
    multiplier: Option<f64>,
    log_to_file: bool,
    debug_enabled: bool,
) -> Result<()> {
    let start_time = parse_datetime(start).map_err(|e| anyhow::anyhow!(e))?;
    let end_time = parse_datetime(end).map_err(|e| anyhow::anyhow!(e))?;
    if end_time <= start_time {
        anyhow::bail!("Simulation end must be after start");
    }
    let multiplier = multiplier.unwrap_or(60.0);

    // Install simulated time before anything reads the clock
    init_time_source(Arc::new(SimulatedTimeSource::new(
        start_time, end_time, multiplier,
    )));

    let _log_guard = if log_to_file {
        let path = format!("geowake-simulation-{}.log", start_time.format("%Y%m%d-%H%M%S"));
        println!("Logging simulation to {path}");
        Some(crate::logger::Log::start_file_logging(path)?)
    } else {
        None
    };

    log_version!();
    log_block_start!(
        "Simulating {} → {} at {}x",
        start_time.format("%Y-%m-%d %H:%M:%S"),
        end_time.format("%Y-%m-%d %H:%M:%S"),
        multiplier
    );

    let backend =
        ReplayBackend::from_file(std::path::Path::new(track_path)).context("Invalid track file")?;
    log_indented!("Track: {} with {} sample(s)", track_path, backend.len());

    // Copy the persisted store into memory; simulations leave it untouched
    let persisted = Store::load()?;
    let store = Store::in_memory(
        persisted.locations().to_vec(),
        persisted.alarms().to_vec(),
    );
    log_indented!(
        "Store snapshot: {} alarm(s), {} location(s)",
        store.alarms().len(),
        store.locations().len()
    );

    Geowake::new(debug_enabled)
        .without_lock()
        .without_headers()
        .with_backend(Box::new(backend))
        .with_store(store)
        .run()
}
