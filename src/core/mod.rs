//! Core engine state and the main event loop.
//!
//! The `Core` struct owns everything the reconciliation engine needs between
//! passes: the alarm store, the previous proximity snapshot, the single
//! ringing alarm id, the cached position, and the position source
//! enablement. The loop is single-threaded and cooperative: producer
//! threads (signal handler, position backend, store watcher, clock monitor)
//! only ever talk to it through one mpsc channel, so every pass runs to
//! completion against a consistent snapshot and all store mutation funnels
//! through one place.
//!
//! Scheduling: the loop parks in `recv_timeout` until the next aligned tick
//! boundary (seconds 0 and 30 by default). Events interleave freely between
//! ticks; a tick that fires during a trigger minute is never skipped while
//! the process is awake, and the clock monitor wakes the loop early when the
//! system time jumps.

pub mod reconcile;

use anyhow::{Context, Result};
use chrono::Timelike;
use std::fs::File;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use crate::{
    backend::{PermissionState, Position, PositionBackend, PositionError},
    config::Config,
    core::reconcile::{ProximityMap, Reconciliation, RingOutcome, evaluate_ring, reconcile},
    io::notification::RingNotifier,
    io::signals::SignalState,
    store::Store,
    store::watcher::SelfWriteHash,
};

/// Everything that can wake the engine loop.
#[derive(Debug)]
pub enum EngineEvent {
    /// A position sample from the active backend.
    Position(Position),
    /// A non-fatal position source failure.
    PositionError(PositionError),
    /// Dismiss the ringing alarm (SIGUSR1 / `geowake dismiss`).
    Dismiss,
    /// Reload configuration and the alarm store (SIGUSR2).
    Reload,
    /// The store file changed on disk (external edit).
    StoreChanged,
    /// The system clock jumped; re-evaluate immediately.
    TimeChange,
    /// Shutdown requested; the `running` flag is already cleared.
    Shutdown,
}

/// Dependencies bundled for [`Core::new`].
pub(crate) struct CoreParams {
    pub config: Config,
    pub store: Store,
    pub signal_state: SignalState,
    pub backend: Option<Box<dyn PositionBackend>>,
    pub notifier: Box<dyn RingNotifier>,
    pub self_write_hash: Option<SelfWriteHash>,
    pub lock_info: Option<(File, String)>,
    pub debug_enabled: bool,
}

/// The reconciliation engine.
pub(crate) struct Core {
    config: Config,
    store: Store,
    signal_state: SignalState,
    backend: Option<Box<dyn PositionBackend>>,
    notifier: Box<dyn RingNotifier>,
    self_write_hash: Option<SelfWriteHash>,
    lock_info: Option<(File, String)>,
    debug_enabled: bool,
    // Engine-owned evaluation state
    proximity: ProximityMap,
    ringing: Option<String>,
    position: Option<Position>,
    permission: PermissionState,
    source_enabled: bool,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        Self {
            config: params.config,
            store: params.store,
            signal_state: params.signal_state,
            backend: params.backend,
            notifier: params.notifier,
            self_write_hash: params.self_write_hash,
            lock_info: params.lock_info,
            debug_enabled: params.debug_enabled,
            proximity: ProximityMap::new(),
            ringing: None,
            position: None,
            permission: PermissionState::Unknown,
            source_enabled: false,
        }
    }

    /// Run the engine until shutdown (or until a simulation ends).
    pub fn execute(mut self) -> Result<()> {
        let active = self.store.alarms().iter().filter(|a| a.is_active).count();
        log_block_start!(
            "Watching {} alarm(s) ({} active), {} location(s)",
            self.store.alarms().len(),
            active,
            self.store.locations().len()
        );

        self.sync_position_source();

        self.main_loop()?;

        log_block_start!("Shutting down geowake...");
        if self.ringing.take().is_some()
            && let Err(e) = self.notifier.ring_stopped()
        {
            log_warning!("Failed to withdraw ring notification: {e}");
        }
        if let Some(backend) = &mut self.backend
            && self.source_enabled
        {
            backend.stop();
        }
        if let Some((lock_file, lock_path)) = self.lock_info.take() {
            drop(lock_file);
            let _ = std::fs::remove_file(&lock_path);
        }
        log_end!();

        Ok(())
    }

    fn main_loop(&mut self) -> Result<()> {
        use std::sync::atomic::Ordering;

        while self.signal_state.running.load(Ordering::SeqCst)
            && !crate::time::source::simulation_ended()
        {
            let timeout = crate::time::source::to_real_duration(self.time_until_next_tick())
                .max(Duration::from_millis(1));

            // The receiver cannot be borrowed while `self` methods run, so
            // pull the event out first.
            let event = match self.signal_state.receiver.recv_timeout(timeout) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            match event {
                Some(event) => self.handle_event(event)?,
                None => self.on_tick()?,
            }
        }

        Ok(())
    }

    /// Duration until the next aligned tick boundary (in simulated time).
    fn time_until_next_tick(&self) -> Duration {
        let align = self.config.tick_alignment();
        let now = crate::time::source::now();
        let sec = u64::from(now.second());
        // Leap-second representation can push this over 1e9; clamp it
        let nanos = u64::from(now.nanosecond()).min(999_999_999);

        let next = ((sec / align) + 1) * align; // may be 60 (minute boundary)
        let whole = Duration::from_secs(next - sec);
        whole - Duration::from_nanos(nanos)
    }

    fn handle_event(&mut self, event: EngineEvent) -> Result<()> {
        match event {
            EngineEvent::Position(sample) => {
                // A sample racing a teardown is stale; drop it
                if self.source_enabled {
                    self.permission = PermissionState::Granted;
                    self.position = Some(sample);
                    self.movement_pass()?;
                }
            }
            EngineEvent::PositionError(error) => self.handle_position_error(error),
            EngineEvent::Dismiss => self.dismiss_ringing()?,
            EngineEvent::Reload => {
                match Config::load() {
                    Ok(config) => {
                        log_block_start!("Configuration reloaded");
                        self.config = config;
                    }
                    Err(e) => {
                        log_pipe!();
                        log_error!("Failed to reload config: {e:#}");
                        log_indented!("Continuing with previous configuration");
                    }
                }
                self.reload_store()?;
            }
            EngineEvent::StoreChanged => self.reload_store()?,
            EngineEvent::TimeChange => self.on_tick()?,
            EngineEvent::Shutdown => {}
        }
        Ok(())
    }

    /// One ring evaluation pass, entered on every aligned tick.
    ///
    /// Suspended entirely while an alarm is ringing; dismissal is the only
    /// path out of the ringing state.
    fn on_tick(&mut self) -> Result<()> {
        if self.ringing.is_some() {
            return Ok(());
        }

        let now = crate::time::source::now();
        match evaluate_ring(now, self.store.alarms(), &self.proximity) {
            RingOutcome::Ring(id) => {
                let Some(alarm) = self.store.find_alarm(&id).cloned() else {
                    return Ok(());
                };
                let location_name = self
                    .store
                    .find_location(&alarm.location_id)
                    .map(|l| l.name.clone());

                log_block_start!("Alarm {} is ringing", alarm.time);
                match &location_name {
                    Some(name) => log_indented!("Arrive at {name} or dismiss to silence"),
                    None => log_indented!("Dismiss to silence"),
                }

                if let Err(e) = self.notifier.ring_started(&alarm, location_name) {
                    log_warning!("Failed to post ring notification: {e}");
                }
                self.ringing = Some(id);
            }
            RingOutcome::StandDown(id) => {
                // Arrived before the trigger time: deactivate, never ring
                log_block_start!("Alarm reached its time while arrived, standing down");
                self.apply_deactivations(&[id])?;
            }
            RingOutcome::Idle => {}
        }

        Ok(())
    }

    /// Coupled movement pass: proximity recompute + rising-edge stand-down,
    /// always against the previous snapshot.
    fn movement_pass(&mut self) -> Result<()> {
        let Reconciliation {
            proximity,
            deactivations,
        } = reconcile(
            &self.proximity,
            self.position,
            self.store.alarms(),
            self.store.locations(),
            self.ringing.as_deref(),
            self.config.deactivation_radius(),
        );
        self.proximity = proximity;

        if !deactivations.is_empty() {
            log_block_start!(
                "Arrived: standing down {} alarm(s)",
                deactivations.len()
            );
            self.apply_deactivations(&deactivations)?;
        }

        Ok(())
    }

    /// Apply a deactivation batch as one store update and re-sync the
    /// position source (the last active alarm standing down suspends it).
    fn apply_deactivations(&mut self, ids: &[String]) -> Result<()> {
        for id in ids {
            if let Some(alarm) = self.store.find_alarm(id) {
                log_indented!("Alarm {} deactivated", alarm.time);
            }
        }
        self.store
            .deactivate_batch(ids)
            .context("Failed to persist alarm deactivation")?;
        self.note_self_write();
        self.sync_position_source();
        Ok(())
    }

    fn dismiss_ringing(&mut self) -> Result<()> {
        let Some(id) = self.ringing.take() else {
            log_pipe!();
            log_info!("Dismiss requested but nothing is ringing");
            return Ok(());
        };

        // Unconditional: dismissal deactivates regardless of proximity
        if self.store.find_alarm(&id).is_some() {
            self.store
                .set_alarm_active(&id, false)
                .context("Failed to persist dismissal")?;
            self.note_self_write();
        }

        log_block_start!("Alarm dismissed");
        if let Err(e) = self.notifier.ring_stopped() {
            log_warning!("Failed to withdraw ring notification: {e}");
        }
        self.sync_position_source();
        Ok(())
    }

    fn handle_position_error(&mut self, error: PositionError) {
        match &error {
            PositionError::PermissionDenied => {
                self.permission = PermissionState::Denied;
                log_pipe!();
                log_warning!("Location permission denied");
                log_indented!("Alarms still ring on time; arrival stand-down is unavailable");
                log_indented!("Grant geowake location access and toggle an alarm to retry");
            }
            PositionError::Unavailable(reason) => {
                // Transient: proximity stays frozen on the last snapshot
                log_pipe!();
                log_warning!("Position update failed: {reason}");
                if self.debug_enabled {
                    log_indented!("Retrying; last known proximity remains in effect");
                }
            }
        }
    }

    /// Reload the store from disk, reconciling engine state with the new
    /// contents (the ringing alarm may have been deleted externally).
    fn reload_store(&mut self) -> Result<()> {
        self.store = Store::load().context("Failed to reload alarm store")?;
        let active = self.store.alarms().iter().filter(|a| a.is_active).count();
        log_block_start!(
            "Alarm store reloaded: {} alarm(s) ({} active), {} location(s)",
            self.store.alarms().len(),
            active,
            self.store.locations().len()
        );

        if let Some(id) = &self.ringing
            && self.store.find_alarm(id).is_none()
        {
            log_decorated!("Ringing alarm was deleted, silencing");
            self.ringing = None;
            if let Err(e) = self.notifier.ring_stopped() {
                log_warning!("Failed to withdraw ring notification: {e}");
            }
        }

        // Re-evaluate against the new alarm/location lists with the cached
        // position; edits alone may create or clear rising edges.
        self.movement_pass()?;
        self.sync_position_source();
        Ok(())
    }

    /// Enable the position source while any alarm is armed, suspend it
    /// otherwise. Disabling forgets the cached position; resuming
    /// re-subscribes from scratch.
    fn sync_position_source(&mut self) {
        let Some(backend) = &mut self.backend else {
            return;
        };
        let any_active = self.store.alarms().iter().any(|a| a.is_active);

        if any_active && !self.source_enabled {
            if self.permission == PermissionState::Denied {
                log_pipe!();
                log_warning!("Location permission is currently {}; retrying anyway", self.permission);
            }
            match backend.start(self.signal_state.sender.clone()) {
                Ok(()) => {
                    self.source_enabled = true;
                    log_block_start!("Position source started ({})", backend.name());
                }
                Err(e) => {
                    log_pipe!();
                    log_warning!("Failed to start position source: {e:#}");
                    log_indented!("Alarms still ring on time; arrival stand-down is unavailable");
                }
            }
        } else if !any_active && self.source_enabled {
            backend.stop();
            self.source_enabled = false;
            self.position = None;
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Position source suspended (no active alarms)");
            }
        }
    }

    /// Record the engine's own save so the store watcher does not bounce it
    /// back as an external change.
    fn note_self_write(&mut self) {
        if let Some(hash) = &self.self_write_hash
            && let Ok(serialized) = self.store.serialized()
        {
            *hash.lock().unwrap() = Some(sha256::digest(serialized));
        }
    }
}
