//! File watching for the alarm store.
//!
//! CLI subcommands run in a separate process and mutate `store.json`
//! directly; hand edits are also legal. The watcher notices those external
//! writes and nudges the engine to reload, while the daemon's own saves are
//! filtered out by content hash so a save does not bounce back as a reload.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::EngineEvent;

/// Debounce for file change events; editors write in multiple steps.
const DEBOUNCE_MS: u64 = 500;

/// Hash of the daemon's most recent own write, updated by the engine after
/// each save. Events whose content matches are self-writes and are ignored.
pub type SelfWriteHash = Arc<Mutex<Option<String>>>;

/// Start watching the store file for external changes.
///
/// Spawns a background thread that sends [`EngineEvent::StoreChanged`] when
/// the file is modified by anything other than the daemon itself. Failure to
/// start is non-fatal for the daemon (external edits then require SIGUSR2).
pub fn start_store_watcher(
    store_path: PathBuf,
    sender: Sender<EngineEvent>,
    self_hash: SelfWriteHash,
    debug_enabled: bool,
) -> Result<()> {
    let watch_dir = store_path
        .parent()
        .context("Store path has no parent directory")?
        .to_path_buf();
    std::fs::create_dir_all(&watch_dir)
        .with_context(|| format!("Failed to create {}", watch_dir.display()))?;

    let (tx, rx) = std::sync::mpsc::channel();

    // Watch the parent directory rather than the file: editors and the
    // daemon's own temp-then-rename saves replace the inode.
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                        let _ = tx.send(event);
                    }
                    _ => {}
                }
            }
        },
        NotifyConfig::default(),
    )
    .context("Failed to create file watcher")?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", watch_dir.display()))?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Watching alarm store: {}", store_path.display());
    }

    thread::spawn(move || {
        // Keep the watcher alive by moving it into the thread
        let _watcher = watcher;
        let mut last_reload = Instant::now() - Duration::from_millis(DEBOUNCE_MS);

        for event in rx {
            let affects_store = event.paths.iter().any(|p| p == &store_path);
            if !affects_store {
                continue;
            }

            if last_reload.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
                continue;
            }

            // Self-write suppression: compare content hash against the
            // engine's last save.
            if let Ok(content) = std::fs::read_to_string(&store_path) {
                let digest = sha256::digest(content);
                let own = self_hash.lock().unwrap().clone();
                if own.as_deref() == Some(digest.as_str()) {
                    continue;
                }
            }

            if debug_enabled {
                log_pipe!();
                log_debug!("Alarm store changed on disk, reloading");
            }

            if sender.send(EngineEvent::StoreChanged).is_err() {
                // Engine gone, nothing left to notify
                break;
            }
            last_reload = Instant::now();
        }
    });

    Ok(())
}
