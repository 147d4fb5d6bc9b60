//! Tests for the global simulated time source.
//!
//! The time source is a process-wide singleton (set once), so this suite
//! lives in its own test binary: the first test to run installs one
//! accelerated source covering a fixed window and every test reads from it.
//! `#[serial]` keeps the install-then-observe ordering deterministic.

use chrono::{DateTime, Local, TimeZone};
use geowake::time::source;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

fn window() -> (DateTime<Local>, DateTime<Local>) {
    let start = Local.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap();
    let end = Local.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
    (start, end)
}

/// Install the shared source (idempotent; only the first call wins).
fn install() {
    let (start, end) = window();
    // 3600x: the one-hour window lasts one real second
    source::init_time_source(Arc::new(source::SimulatedTimeSource::new(start, end, 3600.0)));
}

#[test]
#[serial]
fn simulated_source_reports_itself() {
    install();
    assert!(source::is_initialized());
    assert!(source::is_simulated());
}

#[test]
#[serial]
fn now_stays_within_the_window() {
    install();
    let (start, end) = window();
    let now = source::now();
    assert!(now >= start, "simulated now {now} before window start");
    assert!(now <= end, "simulated now {now} past window end");
}

#[test]
#[serial]
fn durations_scale_down_for_real_waits() {
    install();
    // 30 simulated seconds at 3600x come out to ~8.3 real milliseconds
    let real = source::to_real_duration(Duration::from_secs(30));
    assert!(real < Duration::from_millis(10), "got {real:?}");
    assert!(real > Duration::from_millis(7), "got {real:?}");
}

#[test]
#[serial]
fn simulation_reaches_its_end() {
    install();
    // The whole window lasts one real second from install time
    std::thread::sleep(Duration::from_millis(1200));
    assert!(source::simulation_ended());
    assert_eq!(source::now(), window().1, "now() caps at the window end");
}
