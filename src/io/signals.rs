//! Signal handling for the geowake daemon.
//!
//! Signals are the external control surface of a running daemon:
//! - SIGUSR1: dismiss the ringing alarm (from `geowake dismiss`)
//! - SIGUSR2: reload configuration and the alarm store (from mutating
//!   subcommands, or manually after hand edits)
//! - SIGTERM / SIGINT / SIGHUP: graceful shutdown
//!
//! A dedicated thread turns raw signals into [`EngineEvent`]s on the
//! engine's channel; the shared `running` flag lets producers and the main
//! loop observe shutdown without racing the channel.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    sync::mpsc::{Receiver, Sender},
    thread,
};

use crate::core::EngineEvent;

/// Shared signal-handling state for one daemon run.
pub struct SignalState {
    /// Cleared when the application should shut down.
    pub running: Arc<AtomicBool>,
    /// Engine event receiver; the engine loop owns the consuming end.
    pub receiver: Receiver<EngineEvent>,
    /// Cloneable sender handed to the watcher, backend, and clock monitor.
    pub sender: Sender<EngineEvent>,
}

/// Install the signal handler thread and build the engine event channel.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (sender, receiver) = std::sync::mpsc::channel::<EngineEvent>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_clone = running.clone();
    let sender_clone = sender.clone();

    thread::spawn(move || {
        for signal in signals.forever() {
            match signal {
                SIGUSR1 => {
                    if debug_enabled {
                        log_pipe!();
                        log_debug!("SIGUSR1 received: dismiss");
                    }
                    if sender_clone.send(EngineEvent::Dismiss).is_err() {
                        break;
                    }
                }
                SIGUSR2 => {
                    if debug_enabled {
                        log_pipe!();
                        log_debug!("SIGUSR2 received: reload");
                    }
                    if sender_clone.send(EngineEvent::Reload).is_err() {
                        break;
                    }
                }
                SIGINT | SIGTERM | SIGHUP => {
                    running_clone.store(false, Ordering::SeqCst);
                    // Wake the main loop even if it is parked in recv_timeout
                    let _ = sender_clone.send(EngineEvent::Shutdown);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(SignalState {
        running,
        receiver,
        sender,
    })
}
