//! Configuration for geowake with validation and default generation.
//!
//! Settings live in `geowake.toml` under `XDG_CONFIG_HOME/geowake/` (or a
//! custom directory passed with `--config`). A default file is generated on
//! first run. All values are optional in the file and fall back to the
//! defaults in [`crate::constants`].
//!
//! ```toml
//! #[Position source]
//! backend = "auto"            # "auto", "geoclue", "none"
//!
//! #[Geofence]
//! deactivation_radius = 100.0 # meters within which an alarm stands down (10-10000)
//!
//! #[Ring checks]
//! tick_alignment = 30         # ring checks land on these second boundaries (divides 60)
//!
//! #[Notifications]
//! notify = true               # post a desktop notification while ringing
//! ```
//!
//! Invalid configurations produce errors naming the offending field; the
//! daemon refuses to start rather than guessing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::backend::BackendKind;
use crate::constants::*;

/// Custom configuration directory, set once at startup from `--config`.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for this process. May only be called once.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// The custom configuration directory, if one was given.
pub fn custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Application settings loaded from `geowake.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    /// Position source selection. `Auto` resolves to GeoClue when the service
    /// is reachable; `None` disables position entirely (alarms still ring).
    pub backend: Option<BackendKind>,
    /// Geofence radius in meters; arriving inside it stands an alarm down.
    pub deactivation_radius: Option<f64>,
    /// Ring checks land on wall-clock seconds that are multiples of this.
    pub tick_alignment: Option<u64>,
    /// Whether ringing posts a desktop notification.
    pub notify: Option<bool>,
}

impl Config {
    /// Load configuration, creating a default file if none exists.
    pub fn load() -> Result<Self> {
        let path = config_path()?;

        if !path.exists() {
            create_default_config(&path)
                .context("Failed to create default config during load")?;
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn backend(&self) -> BackendKind {
        self.backend.unwrap_or(BackendKind::Auto)
    }

    pub fn deactivation_radius(&self) -> f64 {
        self.deactivation_radius
            .unwrap_or(DEFAULT_DEACTIVATION_RADIUS)
    }

    pub fn tick_alignment(&self) -> u64 {
        self.tick_alignment.unwrap_or(DEFAULT_TICK_ALIGNMENT)
    }

    pub fn notify(&self) -> bool {
        self.notify.unwrap_or(DEFAULT_NOTIFY)
    }

    /// Validate field ranges. Called on every load, including reloads.
    pub fn validate(&self) -> Result<()> {
        if let Some(radius) = self.deactivation_radius {
            if !radius.is_finite()
                || !(MIN_DEACTIVATION_RADIUS..=MAX_DEACTIVATION_RADIUS).contains(&radius)
            {
                anyhow::bail!(
                    "deactivation_radius must be between {MIN_DEACTIVATION_RADIUS} and \
                     {MAX_DEACTIVATION_RADIUS} meters (got {radius})"
                );
            }
        }

        if let Some(alignment) = self.tick_alignment {
            // Any divisor of 60 guarantees a check lands inside every minute
            if alignment == 0 || alignment > 60 || 60 % alignment != 0 {
                anyhow::bail!(
                    "tick_alignment must divide 60 (got {alignment}); try 10, 15, 20, 30 or 60"
                );
            }
        }

        Ok(())
    }

    /// Log the loaded configuration as an indented block.
    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!("Position source: {}", self.backend());
        log_indented!("Deactivation radius: {} m", self.deactivation_radius());
        log_indented!("Ring check alignment: every {} s", self.tick_alignment());
        log_indented!(
            "Ring notification: {}",
            if self.notify() { "enabled" } else { "disabled" }
        );
    }

    /// Defaults used by tests that never touch the filesystem.
    #[cfg(any(test, feature = "testing-support"))]
    pub fn test_defaults() -> Self {
        Self::default()
    }
}

/// Path of `geowake.toml`, honoring a custom `--config` directory.
pub fn config_path() -> Result<PathBuf> {
    if let Some(custom) = custom_config_dir() {
        return Ok(custom.join("geowake.toml"));
    }
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("geowake").join("geowake.toml"))
}

/// Write a commented default configuration file.
fn create_default_config(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = format!(
        r#"#[Position source]
backend = "auto"            # "auto", "geoclue", "none"

#[Geofence]
deactivation_radius = {DEFAULT_DEACTIVATION_RADIUS:.1} # meters within which an alarm stands down (10-10000)

#[Ring checks]
tick_alignment = {DEFAULT_TICK_ALIGNMENT}          # ring checks land on these second boundaries (divides 60)

#[Notifications]
notify = {DEFAULT_NOTIFY}               # post a desktop notification while ringing
"#
    );

    fs::write(path, content)
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;

    log_block_start!("Created default configuration: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Config {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse("");
        assert_eq!(config.backend(), BackendKind::Auto);
        assert_eq!(config.deactivation_radius(), DEFAULT_DEACTIVATION_RADIUS);
        assert_eq!(config.tick_alignment(), DEFAULT_TICK_ALIGNMENT);
        assert!(config.notify());
        config.validate().unwrap();
    }

    #[test]
    fn full_config_parses() {
        let config = parse(
            r#"
backend = "geoclue"
deactivation_radius = 250.0
tick_alignment = 15
notify = false
"#,
        );
        assert_eq!(config.backend(), BackendKind::Geoclue);
        assert_eq!(config.deactivation_radius(), 250.0);
        assert_eq!(config.tick_alignment(), 15);
        assert!(!config.notify());
        config.validate().unwrap();
    }

    #[test]
    fn radius_bounds_are_enforced() {
        assert!(parse("deactivation_radius = 9.0").validate().is_err());
        assert!(parse("deactivation_radius = 10001.0").validate().is_err());
        assert!(parse("deactivation_radius = 10.0").validate().is_ok());
        assert!(parse("deactivation_radius = 10000.0").validate().is_ok());
    }

    #[test]
    fn tick_alignment_must_divide_sixty() {
        assert!(parse("tick_alignment = 0").validate().is_err());
        assert!(parse("tick_alignment = 7").validate().is_err());
        assert!(parse("tick_alignment = 90").validate().is_err());
        for ok in [10u64, 15, 20, 30, 60] {
            assert!(parse(&format!("tick_alignment = {ok}")).validate().is_ok());
        }
    }

    #[test]
    fn unknown_backend_is_rejected_at_parse() {
        assert!(toml::from_str::<Config>(r#"backend = "gps""#).is_err());
    }
}
