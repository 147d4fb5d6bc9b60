//! Desktop notification for ringing alarms.
//!
//! Entering the ringing state posts a critical-urgency notification through
//! `org.freedesktop.Notifications` (zbus blocking API); dismissal closes
//! it. The engine talks to a [`RingNotifier`] trait so tests can observe
//! ring transitions without a session bus, and so an unavailable
//! notification service degrades to log-only ringing instead of failing
//! the daemon.

use anyhow::{Context, Result};
use std::collections::HashMap;
use zbus::blocking::Connection;
use zbus::zvariant::Value;

use crate::store::Alarm;

/// Sink for ring start/stop events.
#[cfg_attr(test, mockall::automock)]
pub trait RingNotifier: Send {
    /// An alarm entered the ringing state.
    fn ring_started(&mut self, alarm: &Alarm, location_name: Option<String>) -> Result<()>;

    /// The ringing alarm was dismissed (or the daemon is shutting down).
    fn ring_stopped(&mut self) -> Result<()>;
}

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: Vec<&str>,
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close_notification(&self, id: u32) -> zbus::Result<()>;
}

/// Notifier backed by the session notification service.
pub struct DesktopNotifier {
    connection: Connection,
    current_id: Option<u32>,
}

impl DesktopNotifier {
    /// Connect to the session bus. Fails when no notification service can
    /// be reached; callers fall back to [`LogNotifier`].
    pub fn new() -> Result<Self> {
        let connection =
            Connection::session().context("Failed to connect to session D-Bus")?;
        Ok(Self {
            connection,
            current_id: None,
        })
    }
}

impl RingNotifier for DesktopNotifier {
    fn ring_started(&mut self, alarm: &Alarm, location_name: Option<String>) -> Result<()> {
        let proxy = NotificationsProxyBlocking::new(&self.connection)
            .context("Failed to create notifications proxy")?;

        let body = match location_name {
            Some(name) => format!("Alarm for {}, arrive at {name} to stand it down", alarm.time),
            None => format!("Alarm for {}", alarm.time),
        };

        let mut hints: HashMap<&str, Value<'_>> = HashMap::new();
        hints.insert("urgency", Value::U8(2));
        hints.insert("sound-name", Value::from(alarm.sound.to_string()));
        // Keep the notification up until dismissed
        hints.insert("resident", Value::Bool(true));

        let id = proxy
            .notify(
                "geowake",
                0,
                "alarm-symbolic",
                "⏰ geowake",
                &body,
                Vec::new(),
                hints,
                0,
            )
            .context("Failed to post ring notification")?;
        self.current_id = Some(id);
        Ok(())
    }

    fn ring_stopped(&mut self) -> Result<()> {
        if let Some(id) = self.current_id.take() {
            let proxy = NotificationsProxyBlocking::new(&self.connection)
                .context("Failed to create notifications proxy")?;
            proxy
                .close_notification(id)
                .context("Failed to close ring notification")?;
        }
        Ok(())
    }
}

/// Fallback notifier when no notification service is available: the ring
/// transitions are already logged by the engine, so this is a no-op sink.
pub struct LogNotifier;

impl RingNotifier for LogNotifier {
    fn ring_started(&mut self, _alarm: &Alarm, _location_name: Option<String>) -> Result<()> {
        Ok(())
    }

    fn ring_stopped(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Build the best available notifier for this environment.
pub fn create_notifier(notify_enabled: bool, debug_enabled: bool) -> Box<dyn RingNotifier> {
    if !notify_enabled {
        return Box::new(LogNotifier);
    }

    match DesktopNotifier::new() {
        Ok(notifier) => Box::new(notifier),
        Err(e) => {
            log_pipe!();
            log_warning!("Desktop notifications unavailable: {e}");
            log_indented!("Ringing alarms will only be visible in the log output");
            if debug_enabled {
                log_indented!("This is normal outside a desktop session");
            }
            Box::new(LogNotifier)
        }
    }
}
