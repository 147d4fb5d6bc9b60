//! Discontinuous system-time-change detection.
//!
//! Ring evaluation is driven by the wall clock, so a clock jump (manual
//! adjustment, NTP step, resume with a corrected RTC) must force an
//! immediate re-evaluation or a trigger minute could be skipped. The
//! kernel's timerfd with `TFD_TIMER_CANCEL_ON_SET` reports exactly these
//! discontinuities: a blocking wait on an armed CLOCK_REALTIME timer fails
//! with ECANCELED when the clock is set.
//!
//! Gradual NTP slewing and DST transitions do not change the underlying
//! system time and are intentionally not reported.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::sync::mpsc::Sender;
use std::thread;

use crate::core::EngineEvent;

struct TimeChangeDetector {
    timer: TimerFd,
}

impl TimeChangeDetector {
    fn new() -> nix::Result<Self> {
        let timer = TimerFd::new(ClockId::CLOCK_REALTIME, TimerFlags::empty())?;
        let mut detector = TimeChangeDetector { timer };
        detector.arm_timer()?;
        Ok(detector)
    }

    fn arm_timer(&mut self) -> nix::Result<()> {
        let flags =
            TimerSetTimeFlags::TFD_TIMER_ABSTIME | TimerSetTimeFlags::TFD_TIMER_CANCEL_ON_SET;

        // Expiration far enough out that only cancellation ever fires
        let far_future = TimeSpec::new(i64::MAX / 1000, 0);
        self.timer.set(Expiration::OneShot(far_future), flags)?;
        Ok(())
    }

    /// Block until the system clock jumps. Returns after re-arming.
    fn wait_for_time_change(&mut self) -> Result<()> {
        match self.timer.wait() {
            Err(Errno::ECANCELED) => {
                self.arm_timer()
                    .context("Failed to re-arm timer after time change")?;
                Ok(())
            }
            Ok(_) => {
                // Normal expiration only happens when time is set far
                // forward past the guard value; treat it the same way.
                self.arm_timer()
                    .context("Failed to re-arm timer after expiration")?;
                Ok(())
            }
            Err(other) => Err(anyhow::anyhow!("Timer wait error: {other}")),
        }
    }
}

/// Start the time-change monitor thread.
///
/// Unavailability (exotic kernels, seccomp) is non-fatal: the daemon keeps
/// running, it just will not notice clock jumps until the next tick.
pub fn start_time_change_monitor(sender: Sender<EngineEvent>, debug_enabled: bool) -> Result<()> {
    let mut detector =
        TimeChangeDetector::new().context("Failed to create time change detector")?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Started timerfd-based clock jump monitoring");
    }

    thread::spawn(move || {
        loop {
            match detector.wait_for_time_change() {
                Ok(()) => {
                    log_pipe!();
                    log_info!("System time changed, re-evaluating alarms");
                    if sender.send(EngineEvent::TimeChange).is_err() {
                        // Engine gone
                        break;
                    }
                }
                Err(e) => {
                    log_pipe!();
                    log_warning!("Clock jump monitor stopped: {e}");
                    log_indented!("Alarm checks continue on the normal tick cadence");
                    break;
                }
            }
        }
    });

    Ok(())
}
