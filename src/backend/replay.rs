//! Replay position backend for simulation runs.
//!
//! Plays a recorded track file through the global time source, so under an
//! accelerated clock a day's worth of movement is delivered in seconds. A
//! track is a TOML list of samples with wall-clock times:
//!
//! ```toml
//! [[sample]]
//! at = "07:58:00"
//! lat = 34.0004
//! lon = -118.0001
//! ```
//!
//! Samples are delivered in time order once the simulated clock passes each
//! `at`; samples already in the past when the replay starts are delivered
//! immediately, preserving order.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use super::{Position, PositionBackend};
use crate::core::EngineEvent;

#[derive(Debug, Deserialize)]
struct TrackFile {
    #[serde(default)]
    sample: Vec<TrackSample>,
}

#[derive(Debug, Deserialize)]
struct TrackSample {
    /// Wall-clock delivery time, "HH:MM:SS".
    at: String,
    lat: f64,
    lon: f64,
}

pub struct ReplayBackend {
    samples: Vec<(NaiveTime, Position)>,
    active: Arc<AtomicBool>,
}

impl ReplayBackend {
    /// Load and validate a track file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read track file {}", path.display()))?;
        let track: TrackFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse track file {}", path.display()))?;

        if track.sample.is_empty() {
            anyhow::bail!("Track file {} contains no samples", path.display());
        }

        let mut samples = Vec::with_capacity(track.sample.len());
        for sample in &track.sample {
            let at = NaiveTime::parse_from_str(&sample.at, "%H:%M:%S")
                .with_context(|| format!("Invalid sample time {:?}, expected HH:MM:SS", sample.at))?;
            if !crate::geo::valid_latitude(sample.lat) || !crate::geo::valid_longitude(sample.lon) {
                anyhow::bail!(
                    "Sample at {} has out-of-range coordinates ({}, {})",
                    sample.at,
                    sample.lat,
                    sample.lon
                );
            }
            samples.push((
                at,
                Position {
                    lat: sample.lat,
                    lon: sample.lon,
                },
            ));
        }
        samples.sort_by_key(|(at, _)| *at);

        Ok(Self {
            samples,
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl PositionBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "Replay"
    }

    fn start(&mut self, sender: Sender<EngineEvent>) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        let active = self.active.clone();
        let samples = self.samples.clone();

        thread::spawn(move || {
            for (at, position) in samples {
                // Wait for the simulated clock to reach this sample
                loop {
                    if !active.load(Ordering::SeqCst) || crate::time::source::simulation_ended() {
                        return;
                    }
                    if crate::time::source::now().time() >= at {
                        break;
                    }
                    crate::time::source::sleep(Duration::from_secs(1));
                }

                if !active.load(Ordering::SeqCst) {
                    return;
                }
                if sender.send(EngineEvent::Position(position)).is_err() {
                    return;
                }
            }
        });

        Ok(())
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sorts_a_track() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("track.toml");
        std::fs::write(
            &path,
            r#"
[[sample]]
at = "08:10:00"
lat = 34.0
lon = -118.0

[[sample]]
at = "07:58:00"
lat = 34.01
lon = -118.01
"#,
        )
        .unwrap();

        let backend = ReplayBackend::from_file(&path).unwrap();
        assert_eq!(backend.len(), 2);
        assert_eq!(
            backend.samples[0].0,
            NaiveTime::from_hms_opt(7, 58, 0).unwrap()
        );
    }

    #[test]
    fn rejects_bad_times_and_coordinates() {
        let dir = tempfile::TempDir::new().unwrap();

        let bad_time = dir.path().join("bad_time.toml");
        std::fs::write(&bad_time, "[[sample]]\nat = \"8:00\"\nlat = 0.0\nlon = 0.0\n").unwrap();
        assert!(ReplayBackend::from_file(&bad_time).is_err());

        let bad_coord = dir.path().join("bad_coord.toml");
        std::fs::write(
            &bad_coord,
            "[[sample]]\nat = \"08:00:00\"\nlat = 95.0\nlon = 0.0\n",
        )
        .unwrap();
        assert!(ReplayBackend::from_file(&bad_coord).is_err());
    }

    #[test]
    fn rejects_an_empty_track() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();
        assert!(ReplayBackend::from_file(&path).is_err());
    }
}
