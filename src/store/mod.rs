//! Persisted alarm and location store.
//!
//! The store is the single authoritative owner of alarms and saved locations.
//! It is loaded once at startup, saved after every mutation, and survives
//! process restarts as a JSON record list under the user's data directory.
//! A corrupt or unreadable file degrades to the seeded default set; existing
//! data is never the reason the daemon fails to start, and the corrupt file
//! is left in place until the next successful mutation overwrites it.
//!
//! ## Invariants
//!
//! - An alarm may only be armed (`is_active: false → true`) while its
//!   `location_id` resolves to an existing location ("ready" alarm).
//! - Deleting a location reassigns every alarm that referenced it to the
//!   first remaining location (or the empty id if none remain) and forces
//!   those alarms inactive. An active alarm never dangles.

pub mod watcher;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::SEED_ALARM_TIME;

/// Alarm times are local wall-clock "HH:MM" strings, 24-hour.
static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap());

/// A saved place an alarm can be bound to. Immutable once created except
/// for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Notification sound associated with an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmSound {
    #[default]
    Default,
    Chime,
    Radar,
    Custom,
}

impl AlarmSound {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "chime" => Some(Self::Chime),
            "radar" => Some(Self::Radar),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for AlarmSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Chime => write!(f, "chime"),
            Self::Radar => write!(f, "radar"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// A single alarm record.
///
/// `location_id` may be empty or dangle after external edits; the arming
/// invariant and the deletion cascade keep *active* alarms resolvable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    /// Local wall-clock trigger time, "HH:MM" 24-hour.
    pub time: String,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub sound: AlarmSound,
    #[serde(default)]
    pub is_active: bool,
}

impl Alarm {
    /// Parsed trigger time, if the stored string is well-formed.
    pub fn hour_minute(&self) -> Option<(u32, u32)> {
        let (h, m) = self.time.split_once(':')?;
        Some((h.parse().ok()?, m.parse().ok()?))
    }
}

/// Validate an "HH:MM" alarm time string.
pub fn valid_alarm_time(time: &str) -> bool {
    TIME_RE.is_match(time)
}

/// Mint an opaque record id. RFC 3339 UTC with millisecond precision,
/// matching the ids produced by earlier versions of the store format.
pub fn mint_id() -> String {
    crate::time::source::now()
        .with_timezone(&chrono::Utc)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// On-disk representation: a flat record list.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    locations: Vec<Location>,
    #[serde(default)]
    alarms: Vec<Alarm>,
}

/// The authoritative, persisted alarm/location set.
///
/// All mutation goes through the methods here; each mutating call persists
/// the new state before returning (a batch deactivation is one save).
pub struct Store {
    path: Option<PathBuf>,
    locations: Vec<Location>,
    alarms: Vec<Alarm>,
}

impl Store {
    /// Load the store from the default path, creating a seeded default set
    /// on first run.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&default_store_path()?)
    }

    /// Load the store from a specific path.
    ///
    /// A missing file yields the seeded defaults (persisted on the next
    /// mutation); a corrupt file logs a warning and degrades the same way
    /// without touching the file on disk.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let file = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read store from {}", path.display()))?;
            match serde_json::from_str::<StoreFile>(&content) {
                Ok(file) => Some(file),
                Err(e) => {
                    log_pipe!();
                    log_warning!("Alarm store is corrupt, starting from defaults: {e}");
                    log_indented!("The file is left untouched until the next successful change");
                    None
                }
            }
        } else {
            None
        };

        let (locations, alarms) = match file {
            Some(file) => (file.locations, file.alarms),
            None => seeded_defaults(),
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            locations,
            alarms,
        })
    }

    /// An unpersisted store, used by tests and the simulate command.
    pub fn in_memory(locations: Vec<Location>, alarms: Vec<Alarm>) -> Self {
        Self {
            path: None,
            locations,
            alarms,
        }
    }

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn find_alarm(&self, id: &str) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.id == id)
    }

    pub fn find_location(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Resolve a location by exact name, exact id, or unique id prefix.
    pub fn resolve_location(&self, query: &str) -> Option<&Location> {
        if let Some(l) = self.locations.iter().find(|l| l.name == query || l.id == query) {
            return Some(l);
        }
        let mut matches = self.locations.iter().filter(|l| l.id.starts_with(query));
        match (matches.next(), matches.next()) {
            (Some(l), None) => Some(l),
            _ => None,
        }
    }

    /// Resolve an alarm by exact id or unique id prefix.
    pub fn resolve_alarm(&self, query: &str) -> Option<&Alarm> {
        if let Some(a) = self.alarms.iter().find(|a| a.id == query) {
            return Some(a);
        }
        let mut matches = self.alarms.iter().filter(|a| a.id.starts_with(query));
        match (matches.next(), matches.next()) {
            (Some(a), None) => Some(a),
            _ => None,
        }
    }

    /// True when the alarm's location resolves, i.e. the alarm may be armed.
    pub fn is_ready(&self, alarm: &Alarm) -> bool {
        !alarm.location_id.is_empty() && self.find_location(&alarm.location_id).is_some()
    }

    /// Add a new location. Coordinates are validated here; the distance
    /// calculator itself never checks ranges.
    pub fn add_location(&mut self, name: &str, lat: f64, lon: f64) -> Result<Location> {
        if name.trim().is_empty() {
            anyhow::bail!("Location name must not be empty");
        }
        if !crate::geo::valid_latitude(lat) {
            anyhow::bail!("Latitude {lat} out of range (-90 to 90)");
        }
        if !crate::geo::valid_longitude(lon) {
            anyhow::bail!("Longitude {lon} out of range (-180 to 180)");
        }

        let location = Location {
            id: mint_id(),
            name: name.trim().to_string(),
            lat,
            lon,
        };
        self.locations.push(location.clone());
        self.save()?;
        Ok(location)
    }

    /// Remove a location, cascading to every alarm that referenced it:
    /// the alarm is reassigned to the first remaining location (or the empty
    /// id if none remain) and forced inactive.
    pub fn remove_location(&mut self, id: &str) -> Result<Location> {
        let idx = self
            .locations
            .iter()
            .position(|l| l.id == id)
            .with_context(|| format!("No location with id {id}"))?;
        let removed = self.locations.remove(idx);

        let fallback = self
            .locations
            .first()
            .map(|l| l.id.clone())
            .unwrap_or_default();
        for alarm in &mut self.alarms {
            if alarm.location_id == removed.id {
                alarm.location_id = fallback.clone();
                alarm.is_active = false;
            }
        }

        self.save()?;
        Ok(removed)
    }

    /// Add a new alarm, inactive, bound to `location_id` (possibly empty).
    pub fn add_alarm(&mut self, time: &str, location_id: String, sound: AlarmSound) -> Result<Alarm> {
        if !valid_alarm_time(time) {
            anyhow::bail!("Invalid alarm time {time:?}, expected HH:MM (24-hour)");
        }
        if !location_id.is_empty() && self.find_location(&location_id).is_none() {
            anyhow::bail!("No location with id {location_id}");
        }

        let alarm = Alarm {
            id: mint_id(),
            time: time.to_string(),
            location_id,
            sound,
            is_active: false,
        };
        self.alarms.push(alarm.clone());
        self.save()?;
        Ok(alarm)
    }

    pub fn remove_alarm(&mut self, id: &str) -> Result<Alarm> {
        let idx = self
            .alarms
            .iter()
            .position(|a| a.id == id)
            .with_context(|| format!("No alarm with id {id}"))?;
        let removed = self.alarms.remove(idx);
        self.save()?;
        Ok(removed)
    }

    /// Arm or disarm an alarm. Arming enforces the ready invariant; an alarm
    /// with an empty or dangling location reference is never armable.
    pub fn set_alarm_active(&mut self, id: &str, active: bool) -> Result<()> {
        let ready = self
            .find_alarm(id)
            .map(|a| self.is_ready(a))
            .with_context(|| format!("No alarm with id {id}"))?;
        if active && !ready {
            anyhow::bail!("Alarm {id} has no saved location and cannot be armed");
        }

        for alarm in &mut self.alarms {
            if alarm.id == id {
                alarm.is_active = active;
            }
        }
        self.save()
    }

    /// Deactivate a batch of alarms in one atomic store update (single save).
    /// Unknown ids are ignored.
    pub fn deactivate_batch(&mut self, ids: &[String]) -> Result<()> {
        let mut changed = false;
        for alarm in &mut self.alarms {
            if alarm.is_active && ids.contains(&alarm.id) {
                alarm.is_active = false;
                changed = true;
            }
        }
        if changed { self.save() } else { Ok(()) }
    }

    /// Persist the current state via temp-file-then-rename so readers never
    /// observe a half-written store.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = StoreFile {
            locations: self.locations.clone(),
            alarms: self.alarms.clone(),
        };
        let content =
            serde_json::to_string_pretty(&file).context("Failed to serialize alarm store")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Serialized form of the current state, for watcher self-write filtering.
    pub fn serialized(&self) -> Result<String> {
        let file = StoreFile {
            locations: self.locations.clone(),
            alarms: self.alarms.clone(),
        };
        serde_json::to_string_pretty(&file).context("Failed to serialize alarm store")
    }
}

/// First-run contents: no locations, one disarmed early-morning alarm the
/// user can edit instead of starting from a blank list.
fn seeded_defaults() -> (Vec<Location>, Vec<Alarm>) {
    let alarms = vec![Alarm {
        id: mint_id(),
        time: SEED_ALARM_TIME.to_string(),
        location_id: String::new(),
        sound: AlarmSound::Default,
        is_active: false,
    }];
    (Vec::new(), alarms)
}

/// Default store path: `<data_local_dir>/geowake/store.json`.
pub fn default_store_path() -> Result<PathBuf> {
    if let Some(dir) = crate::config::custom_config_dir() {
        // A custom config dir keeps everything, store included, in one place
        return Ok(dir.join("store.json"));
    }
    let data_dir = dirs::data_local_dir().context("Could not determine data directory")?;
    Ok(data_dir.join("geowake").join("store.json"))
}

#[cfg(test)]
mod tests;
