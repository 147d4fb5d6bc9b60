//! Time source abstraction supporting real and simulated time.
//!
//! The daemon normally runs against the system clock, but the `simulate`
//! subcommand replays a position track at accelerated speed. Everything that
//! asks "what time is it" or sleeps goes through the global source installed
//! here, so the whole engine, ring checks included, runs correctly under
//! compressed time.
//!
//! The simulated source derives the current simulated instant from real
//! elapsed time multiplied by the acceleration factor. That keeps `now()`
//! consistent across threads (the engine loop and the replay backend both
//! sleep through this source concurrently).

use chrono::{DateTime, Duration as ChronoDuration, Local};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

/// Global time source, defaults to [`RealTimeSource`].
static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

/// Trait for abstracting time operations.
pub trait TimeSource: Send + Sync {
    /// Current (possibly simulated) local time.
    fn now(&self) -> DateTime<Local>;

    /// Sleep for the given simulated duration.
    fn sleep(&self, duration: StdDuration);

    /// Convert a simulated duration into the real duration to wait for it.
    /// Identity for real time; scaled down under acceleration.
    fn to_real(&self, duration: StdDuration) -> StdDuration {
        duration
    }

    fn is_simulated(&self) -> bool;

    /// Whether a simulation has reached its end time (always false for real time).
    fn is_ended(&self) -> bool {
        false
    }
}

/// Real-time implementation backed by the system clock.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Accelerated time source for simulation runs.
///
/// Simulated time flows continuously at `multiplier` times real speed from
/// `start` and is capped at `end`.
pub struct SimulatedTimeSource {
    start: DateTime<Local>,
    end: DateTime<Local>,
    multiplier: f64,
    anchor: Instant,
}

impl SimulatedTimeSource {
    /// Create a simulated source covering `start..end` at `multiplier`x speed.
    /// Multipliers below 1.0 fall back to 60x (one simulated minute per second).
    pub fn new(start: DateTime<Local>, end: DateTime<Local>, multiplier: f64) -> Self {
        Self {
            start,
            end,
            multiplier: if multiplier >= 1.0 { multiplier } else { 60.0 },
            anchor: Instant::now(),
        }
    }

    fn current(&self) -> DateTime<Local> {
        let elapsed = self.anchor.elapsed().as_secs_f64() * self.multiplier;
        let simulated = self.start
            + ChronoDuration::seconds(elapsed as i64)
            + ChronoDuration::nanoseconds((elapsed.fract() * 1_000_000_000.0) as i64);
        simulated.min(self.end)
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Local> {
        self.current()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(self.to_real(duration));
    }

    fn to_real(&self, duration: StdDuration) -> StdDuration {
        StdDuration::from_secs_f64(duration.as_secs_f64() / self.multiplier)
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.current() >= self.end
    }
}

/// Install the global time source (call once at startup, before first use).
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    TIME_SOURCE.set(source).ok();
}

/// Whether a time source has been installed yet.
pub fn is_initialized() -> bool {
    TIME_SOURCE.get().is_some()
}

fn get() -> &'static Arc<dyn TimeSource> {
    TIME_SOURCE.get_or_init(|| Arc::new(RealTimeSource))
}

/// Current time from the global source.
pub fn now() -> DateTime<Local> {
    get().now()
}

/// Sleep for a simulated duration through the global source.
pub fn sleep(duration: StdDuration) {
    get().sleep(duration)
}

/// Real wait corresponding to a simulated duration (for `recv_timeout`).
pub fn to_real_duration(duration: StdDuration) -> StdDuration {
    get().to_real(duration)
}

/// Whether we are running under simulated time.
pub fn is_simulated() -> bool {
    get().is_simulated()
}

/// Whether the simulation has reached its end time.
pub fn simulation_ended() -> bool {
    get().is_ended()
}

/// Parse a datetime string in the format "YYYY-MM-DD HH:MM:SS" as local time.
pub fn parse_datetime(s: &str) -> Result<DateTime<Local>, String> {
    use chrono::{NaiveDateTime, TimeZone};

    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))
        .and_then(|naive| {
            Local
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| "Ambiguous or invalid local time".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn simulated_time_is_capped_at_end() {
        let start = Local.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap();
        let end = Local.with_ymd_and_hms(2025, 3, 1, 7, 0, 1).unwrap();
        // Huge multiplier: effectively instantly past the end
        let source = SimulatedTimeSource::new(start, end, 1_000_000.0);
        std::thread::sleep(StdDuration::from_millis(10));
        assert_eq!(source.now(), end);
        assert!(source.is_ended());
    }

    #[test]
    fn simulated_durations_scale_down() {
        let start = Local.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap();
        let end = Local.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let source = SimulatedTimeSource::new(start, end, 60.0);
        let real = source.to_real(StdDuration::from_secs(30));
        assert_eq!(real, StdDuration::from_millis(500));
    }

    #[test]
    fn parse_datetime_rejects_garbage() {
        assert!(parse_datetime("not a date").is_err());
        assert!(parse_datetime("2025-03-01 07:00:00").is_ok());
    }
}
