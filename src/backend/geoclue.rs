//! GeoClue2 position backend.
//!
//! Uses zbus's blocking API against the GeoClue2 system service. A delivery
//! thread owns the D-Bus session: it requests a client, starts it, and polls
//! the client's `Location` property, forwarding deduplicated samples into
//! the engine channel. Property polling (rather than blocking on the
//! `LocationUpdated` signal stream) keeps teardown deterministic: the
//! thread notices the disable flag within one poll period and stops the
//! GeoClue client on every exit path, error paths included.
//!
//! `AccessDenied` from GeoClue maps to [`PositionError::PermissionDenied`]
//! and is terminal until the backend is restarted; everything else is
//! reported as transient and retried with a backoff.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;
use zbus::blocking::Connection;
use zbus::zvariant::OwnedObjectPath;

use super::{Position, PositionBackend, PositionError};
use crate::constants::{GEOCLUE_POLL_SECS, GEOCLUE_RETRY_SECS};
use crate::core::EngineEvent;

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Manager",
    default_service = "org.freedesktop.GeoClue2",
    default_path = "/org/freedesktop/GeoClue2/Manager"
)]
trait GeoClueManager {
    /// Obtain a client object for this application.
    fn get_client(&self) -> zbus::Result<OwnedObjectPath>;
}

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Client",
    default_service = "org.freedesktop.GeoClue2"
)]
trait GeoClueClient {
    fn start(&self) -> zbus::Result<()>;

    fn stop(&self) -> zbus::Result<()>;

    /// Object path of the current location, "/" until the first fix.
    #[zbus(property)]
    fn location(&self) -> zbus::Result<OwnedObjectPath>;

    #[zbus(property)]
    fn desktop_id(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn set_desktop_id(&self, value: &str) -> zbus::Result<()>;

    #[zbus(property)]
    fn distance_threshold(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn set_distance_threshold(&self, value: u32) -> zbus::Result<()>;
}

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Location",
    default_service = "org.freedesktop.GeoClue2"
)]
trait GeoClueLocation {
    #[zbus(property)]
    fn latitude(&self) -> zbus::Result<f64>;

    #[zbus(property)]
    fn longitude(&self) -> zbus::Result<f64>;
}

/// Probe whether the GeoClue2 service is reachable (running or activatable).
pub fn service_available() -> bool {
    let Ok(connection) = Connection::system() else {
        return false;
    };
    let Ok(dbus) = zbus::blocking::fdo::DBusProxy::new(&connection) else {
        return false;
    };

    let name = "org.freedesktop.GeoClue2";
    let running = dbus
        .name_has_owner(name.try_into().expect("well-formed bus name"))
        .unwrap_or(false);
    if running {
        return true;
    }
    dbus.list_activatable_names()
        .map(|names| names.iter().any(|n| n.as_str() == name))
        .unwrap_or(false)
}

/// How a delivery session ended.
enum SessionEnd {
    /// The enablement flag was cleared; clean teardown.
    Disabled,
    /// GeoClue refused location access; terminal until re-enabled.
    Denied,
}

pub struct GeoClueBackend {
    active: Arc<AtomicBool>,
}

impl GeoClueBackend {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for GeoClueBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionBackend for GeoClueBackend {
    fn name(&self) -> &'static str {
        "GeoClue"
    }

    fn start(&mut self, sender: Sender<EngineEvent>) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        let active = self.active.clone();

        thread::spawn(move || {
            // Errors are non-fatal: report, back off, resubscribe. Only a
            // permission denial or the disable flag ends the loop.
            while active.load(Ordering::SeqCst) {
                match run_session(&active, &sender) {
                    Ok(SessionEnd::Disabled) => break,
                    Ok(SessionEnd::Denied) => {
                        let _ = sender
                            .send(EngineEvent::PositionError(PositionError::PermissionDenied));
                        break;
                    }
                    Err(e) => {
                        let _ = sender.send(EngineEvent::PositionError(
                            PositionError::Unavailable(format!("{e:#}")),
                        ));
                        sleep_while_active(&active, Duration::from_secs(GEOCLUE_RETRY_SECS));
                    }
                }
            }
        });

        Ok(())
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// One full GeoClue session: client setup, start, poll loop, stop.
fn run_session(active: &Arc<AtomicBool>, sender: &Sender<EngineEvent>) -> Result<SessionEnd> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;

    let manager = GeoClueManagerProxyBlocking::new(&connection)
        .context("Failed to create GeoClue manager proxy")?;
    let client_path = manager
        .get_client()
        .context("Failed to obtain a GeoClue client")?;

    let client = GeoClueClientProxyBlocking::builder(&connection)
        .path(client_path)
        .context("Invalid GeoClue client path")?
        .build()
        .context("Failed to create GeoClue client proxy")?;

    // GeoClue requires a desktop id before Start and rejects unknown ones
    // with AccessDenied when an agent enforces authorization.
    client
        .set_desktop_id("geowake")
        .context("Failed to set GeoClue desktop id")?;
    // Let the engine apply the geofence radius itself; report all movement.
    client
        .set_distance_threshold(0)
        .context("Failed to set GeoClue distance threshold")?;

    if let Err(e) = client.start() {
        if is_access_denied(&e) {
            return Ok(SessionEnd::Denied);
        }
        return Err(e).context("Failed to start GeoClue client");
    }

    let end = poll_location(active, sender, &connection, &client);

    // Stop the client on every exit path so GeoClue drops the session.
    let _ = client.stop();

    end
}

/// Poll the client's location property until disabled or a D-Bus failure.
fn poll_location(
    active: &Arc<AtomicBool>,
    sender: &Sender<EngineEvent>,
    connection: &Connection,
    client: &GeoClueClientProxyBlocking<'_>,
) -> Result<SessionEnd> {
    let mut last_sent: Option<Position> = None;

    while active.load(Ordering::SeqCst) {
        let location_path = client
            .location()
            .context("Failed to read GeoClue location")?;

        // "/" means no fix yet
        if location_path.as_str() != "/" {
            let location = GeoClueLocationProxyBlocking::builder(connection)
                .path(location_path)
                .context("Invalid GeoClue location path")?
                .build()
                .context("Failed to create GeoClue location proxy")?;

            let sample = Position {
                lat: location.latitude().context("Failed to read latitude")?,
                lon: location.longitude().context("Failed to read longitude")?,
            };

            if last_sent != Some(sample) {
                // Re-check the flag right before sending: nothing may be
                // delivered after a disable.
                if !active.load(Ordering::SeqCst) {
                    break;
                }
                if sender.send(EngineEvent::Position(sample)).is_err() {
                    // Engine gone; treat as teardown
                    break;
                }
                last_sent = Some(sample);
            }
        }

        sleep_while_active(active, Duration::from_secs(GEOCLUE_POLL_SECS));
    }

    Ok(SessionEnd::Disabled)
}

/// Sleep in short slices so a disable is honored promptly.
fn sleep_while_active(active: &Arc<AtomicBool>, total: Duration) {
    let slice = Duration::from_millis(200);
    let mut remaining = total;
    while active.load(Ordering::SeqCst) && remaining > Duration::ZERO {
        let step = remaining.min(slice);
        thread::sleep(step);
        remaining -= step;
    }
}

fn is_access_denied(error: &zbus::Error) -> bool {
    matches!(
        error,
        zbus::Error::MethodError(name, _, _)
            if name.as_str() == "org.freedesktop.DBus.Error.AccessDenied"
    )
}
