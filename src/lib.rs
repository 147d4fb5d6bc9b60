//! # geowake
//!
//! Internal library for the geowake binary: a geofence-aware alarm daemon.
//! An alarm set for a wall-clock time will not ring (or stands down the
//! moment you arrive) once you are within a radius of its saved location.
//!
//! ## Architecture
//!
//! - **Entry point**: the [`Geowake`] builder wires resources and runs the
//!   engine; `main.rs` only dispatches CLI actions
//! - **Core**: `core` owns the reconciliation engine (proximity snapshots,
//!   rising-edge arrival stand-down, ring decisions) and its event loop
//! - **Position sources**: `backend` with GeoClue2 (D-Bus) and track replay
//! - **Store**: `store` persists alarms and locations as JSON with a file
//!   watcher for external edits
//! - **Configuration**: `config` for TOML settings with SIGUSR2 reload
//! - **Infrastructure**: signals, single-instance locking, clock jump
//!   detection, desktop notifications, logging, simulated time

// Import macros from the logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod backend;
pub mod commands;
pub mod config;
pub mod constants;
pub mod core;
pub mod geo;
pub mod io;
pub mod store;
pub mod time;

mod geowake;

// Re-export for the binary
pub use geowake::Geowake;
