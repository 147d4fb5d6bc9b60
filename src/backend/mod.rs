//! Position source backends.
//!
//! A backend delivers position samples (or errors) into the engine's event
//! channel from its own thread. The engine enables a backend only while at
//! least one alarm is armed; disabling tears the delivery down and the
//! engine forgets its cached position. Samples have no fixed cadence: the
//! provider pushes them when it has something, possibly throttled, and the
//! engine tolerates silence by freezing proximity evaluation.
//!
//! Two implementations:
//! - `geoclue`: the GeoClue2 system service over D-Bus (the normal case)
//! - `replay`: plays a recorded track through the time source (simulation)

pub mod geoclue;
pub mod replay;

use anyhow::Result;
use serde::Deserialize;
use std::fmt;
use std::sync::mpsc::Sender;

use crate::config::Config;
use crate::core::EngineEvent;

/// Position source selection from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Resolve to GeoClue when the service is reachable, otherwise none.
    Auto,
    /// Require GeoClue2; fail loudly if it is unreachable.
    Geoclue,
    /// No position source. Proximity stays frozen; alarms still ring.
    None,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Auto => write!(f, "auto"),
            BackendKind::Geoclue => write!(f, "geoclue"),
            BackendKind::None => write!(f, "none"),
        }
    }
}

/// A single position sample in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// Non-fatal position source failures, reported through the event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionError {
    /// Location access denied; terminal until the source is re-enabled.
    PermissionDenied,
    /// Transient failure (service unreachable, timeout); the source keeps trying.
    Unavailable(String),
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::PermissionDenied => {
                write!(f, "location permission denied")
            }
            PositionError::Unavailable(reason) => {
                write!(f, "position unavailable: {reason}")
            }
        }
    }
}

/// Tri-state location permission, surfaced in logs and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    Granted,
    Denied,
    #[default]
    Unknown,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionState::Granted => write!(f, "granted"),
            PermissionState::Denied => write!(f, "denied"),
            PermissionState::Unknown => write!(f, "unknown"),
        }
    }
}

/// A restartable position sample source.
///
/// `start` spawns the delivery thread; `stop` requests teardown. After
/// `stop` returns, no further events from this subscription are delivered;
/// the delivery thread checks the shared enablement flag before every send
/// and cleans up its provider session on every exit path. A stopped backend
/// may be started again and re-subscribes from scratch.
pub trait PositionBackend: Send {
    fn name(&self) -> &'static str;

    fn start(&mut self, sender: Sender<EngineEvent>) -> Result<()>;

    fn stop(&mut self);
}

/// Resolve the configured backend kind, probing the system where needed.
pub fn detect_backend(config: &Config) -> Result<BackendKind> {
    match config.backend() {
        BackendKind::Auto => {
            if geoclue::service_available() {
                Ok(BackendKind::Geoclue)
            } else {
                log_pipe!();
                log_warning!("GeoClue2 service not reachable, running without a position source");
                log_indented!("Alarms will still ring on time; arrival stand-down is disabled");
                Ok(BackendKind::None)
            }
        }
        BackendKind::Geoclue => {
            if !geoclue::service_available() {
                anyhow::bail!(
                    "backend is set to \"geoclue\" but the GeoClue2 service is not reachable"
                );
            }
            Ok(BackendKind::Geoclue)
        }
        BackendKind::None => Ok(BackendKind::None),
    }
}

/// Create the backend for a resolved kind. `None` yields no backend.
pub fn create_backend(kind: BackendKind) -> Option<Box<dyn PositionBackend>> {
    match kind {
        BackendKind::Geoclue => Some(Box::new(geoclue::GeoClueBackend::new())),
        BackendKind::Auto | BackendKind::None => None,
    }
}
