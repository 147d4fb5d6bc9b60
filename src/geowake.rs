//! Application coordinator managing the daemon lifecycle.
//!
//! Resource acquisition and wiring live here: configuration, the
//! single-instance lock, signal handling, the store watcher, the clock
//! monitor, backend selection, and the ring notifier. Control then passes
//! to [`Core`](crate::core). The builder supports the different startup
//! contexts:
//! - Normal daemon: `Geowake::new(debug).run()`
//! - Simulation: `Geowake::new(debug).without_lock().without_headers()
//!   .with_backend(replay).with_store(snapshot).run()`

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};

use crate::{
    backend::{PositionBackend, create_backend, detect_backend},
    config::Config,
    constants::EXIT_FAILURE,
    core::{Core, CoreParams},
    io::notification::create_notifier,
    io::signals::setup_signal_handler,
    store::Store,
    store::watcher::SelfWriteHash,
};

/// Builder for configuring and running the geowake daemon.
pub struct Geowake {
    debug_enabled: bool,
    create_lock: bool,
    show_headers: bool,
    backend_override: Option<Box<dyn PositionBackend>>,
    store_override: Option<Store>,
}

impl Geowake {
    /// Create a runner with defaults matching a normal daemon start.
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
            show_headers: true,
            backend_override: None,
            store_override: None,
        }
    }

    /// Skip lock file creation (simulation mode).
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Skip the version header (the caller already printed one).
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Use a specific position backend instead of detecting one.
    pub fn with_backend(mut self, backend: Box<dyn PositionBackend>) -> Self {
        self.backend_override = Some(backend);
        self
    }

    /// Use a pre-built store instead of loading from disk.
    pub fn with_store(mut self, store: Store) -> Self {
        self.store_override = Some(store);
        self
    }

    /// Execute the daemon with the configured settings.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
        }

        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_error_exit!("Configuration failed");
                eprintln!("{e:?}");
                std::process::exit(EXIT_FAILURE);
            }
        };

        // Lock before any monitors spawn: a second instance must fail fast
        let lock_info = if self.create_lock {
            let (lock_file, lock_path) = crate::io::lock::acquire_lock()?;
            log_block_start!("Lock acquired, starting geowake...");
            Some((lock_file, lock_path))
        } else {
            None
        };

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        // Clock jump monitoring (optional; graceful degradation)
        if let Err(e) = crate::io::clock::start_time_change_monitor(
            signal_state.sender.clone(),
            self.debug_enabled,
        ) {
            log_pipe!();
            log_warning!("Clock jump monitoring unavailable: {e}");
            log_indented!("Alarm checks continue on the normal tick cadence");
        }

        config.log_config();

        let (store, self_write_hash) = match self.store_override {
            Some(store) => (store, None),
            None => {
                let store = Store::load()?;

                // Watch the store file for external edits (optional)
                let hash: SelfWriteHash =
                    Arc::new(Mutex::new(store.serialized().ok().map(|s| sha256::digest(s))));
                match crate::store::default_store_path() {
                    Ok(path) => {
                        if let Err(e) = crate::store::watcher::start_store_watcher(
                            path,
                            signal_state.sender.clone(),
                            hash.clone(),
                            self.debug_enabled,
                        ) {
                            log_pipe!();
                            log_warning!("Store file watching unavailable: {e}");
                            log_indented!("External edits need a manual reload (SIGUSR2)");
                        }
                    }
                    Err(e) => {
                        log_pipe!();
                        log_warning!("Cannot determine store path for watching: {e}");
                    }
                }

                (store, Some(hash))
            }
        };

        let backend = match self.backend_override {
            Some(backend) => {
                log_block_start!("Position source: {}", backend.name());
                Some(backend)
            }
            None => {
                let kind = detect_backend(&config).context("Position backend detection failed")?;
                let backend = create_backend(kind);
                if let Some(b) = &backend {
                    log_block_start!("Position source: {}", b.name());
                }
                backend
            }
        };

        // Desktop notifications make no sense under compressed time
        let notify_enabled = config.notify() && !crate::time::source::is_simulated();
        let notifier = create_notifier(notify_enabled, self.debug_enabled);

        let core = Core::new(CoreParams {
            config,
            store,
            signal_state,
            backend,
            notifier,
            self_write_hash,
            lock_info,
            debug_enabled: self.debug_enabled,
        });

        core.execute()
    }
}
