//! Shared constants used throughout geowake.

/// Mean Earth radius in meters, used by the haversine distance.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Default radius (meters) within which an alarm counts as "arrived".
pub const DEFAULT_DEACTIVATION_RADIUS: f64 = 100.0;

/// Validation bounds for the deactivation radius (meters).
pub const MIN_DEACTIVATION_RADIUS: f64 = 10.0;
pub const MAX_DEACTIVATION_RADIUS: f64 = 10_000.0;

/// Default ring-check alignment: checks land on wall-clock seconds that are
/// multiples of this value. Must divide 60 so no trigger minute is skipped.
pub const DEFAULT_TICK_ALIGNMENT: u64 = 30;

/// Whether ringing posts a desktop notification by default.
pub const DEFAULT_NOTIFY: bool = true;

/// Time given to a freshly added alarm before the user edits it.
pub const DEFAULT_ALARM_TIME: &str = "08:00";

/// Time on the single alarm seeded into an empty store.
pub const SEED_ALARM_TIME: &str = "07:30";

/// Seconds the `location here` command waits for a position fix.
pub const HERE_FIX_TIMEOUT_SECS: u64 = 20;

/// Polling cadence for the GeoClue location property (seconds).
pub const GEOCLUE_POLL_SECS: u64 = 2;

/// Backoff between GeoClue connection attempts after a transient failure.
pub const GEOCLUE_RETRY_SECS: u64 = 5;

/// Standard process exit code for failures.
pub const EXIT_FAILURE: i32 = 1;
