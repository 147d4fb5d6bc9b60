//! Pure reconciliation logic: proximity, arrival stand-down, ring decisions.
//!
//! Everything here is a pure function of its inputs so the transition rules
//! can be tested without a clock, a store file, or a position backend. The
//! engine loop in [`super`] owns the state (previous proximity snapshot,
//! ringing alarm id, cached position) and feeds it through these functions
//! on every relevant change.
//!
//! ## The coupled movement pass
//!
//! [`reconcile`] performs the proximity recompute and the rising-edge check
//! as one unit, always against the *previous* snapshot, never a snapshot
//! already overwritten by the same pass. Deactivation is edge-triggered
//! (crossing into the radius), not level-triggered (sitting inside it): an
//! alarm the user arms while already inside the geofence stays armed until
//! the next departure-then-return crossing.

use chrono::{DateTime, Local, Timelike};
use std::collections::HashMap;

use crate::backend::Position;
use crate::store::{Alarm, Location};

/// Derived per-alarm nearness, keyed by alarm id. Ephemeral, never persisted.
/// Alarms without a resolvable location are absent and read as "not near".
pub type ProximityMap = HashMap<String, bool>;

/// Result of one movement pass: the next proximity snapshot plus the alarms
/// that crossed into their geofence and must be deactivated as one batch.
#[derive(Debug, Default, PartialEq)]
pub struct Reconciliation {
    pub proximity: ProximityMap,
    pub deactivations: Vec<String>,
}

/// Default-false lookup into a proximity snapshot.
pub fn is_near(proximity: &ProximityMap, alarm_id: &str) -> bool {
    proximity.get(alarm_id).copied().unwrap_or(false)
}

/// One movement pass: recompute proximity, then detect rising edges.
///
/// Without a current position the recompute is skipped entirely and the
/// previous snapshot is carried forward untouched; absence of position
/// freezes evaluation, it never disarms anything. The ringing alarm (if any)
/// is excluded from deactivation; its arrival is handled by dismissal.
pub fn reconcile(
    prev: &ProximityMap,
    position: Option<Position>,
    alarms: &[Alarm],
    locations: &[Location],
    ringing: Option<&str>,
    radius: f64,
) -> Reconciliation {
    let Some(position) = position else {
        return Reconciliation {
            proximity: prev.clone(),
            deactivations: Vec::new(),
        };
    };

    let mut proximity = ProximityMap::with_capacity(alarms.len());
    for alarm in alarms {
        if alarm.location_id.is_empty() {
            continue;
        }
        let Some(target) = locations.iter().find(|l| l.id == alarm.location_id) else {
            continue;
        };
        let distance =
            crate::geo::distance_meters(position.lat, position.lon, target.lat, target.lon);
        proximity.insert(alarm.id.clone(), distance < radius);
    }

    // Rising edge: near now, not near on the previous snapshot.
    let deactivations = alarms
        .iter()
        .filter(|alarm| {
            alarm.is_active
                && ringing != Some(alarm.id.as_str())
                && is_near(&proximity, &alarm.id)
                && !is_near(prev, &alarm.id)
        })
        .map(|alarm| alarm.id.clone())
        .collect();

    Reconciliation {
        proximity,
        deactivations,
    }
}

/// Outcome of a ring evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingOutcome {
    /// This alarm becomes the single ringing alarm; `is_active` stays true.
    Ring(String),
    /// The alarm's trigger time arrived while already inside the geofence:
    /// deactivate it directly, never entering the ringing state.
    StandDown(String),
    /// No active alarm matches the current minute.
    Idle,
}

/// Ring evaluation for one tick. Callers invoke this only while nothing is
/// ringing; a ringing alarm suspends all ring checks until dismissal.
///
/// Scans active alarms in store order for one whose trigger time matches the
/// current local hour:minute. When several alarms share the minute only the
/// first found is acted on this pass; the rest stay pending and ring on
/// later ticks, one pass apart.
pub fn evaluate_ring(
    now: DateTime<Local>,
    alarms: &[Alarm],
    proximity: &ProximityMap,
) -> RingOutcome {
    let (hour, minute) = (now.hour(), now.minute());

    let Some(alarm) = alarms
        .iter()
        .filter(|a| a.is_active)
        .find(|a| a.hour_minute() == Some((hour, minute)))
    else {
        return RingOutcome::Idle;
    };

    if is_near(proximity, &alarm.id) {
        RingOutcome::StandDown(alarm.id.clone())
    } else {
        RingOutcome::Ring(alarm.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AlarmSound;
    use chrono::TimeZone;

    fn location(id: &str, lat: f64, lon: f64) -> Location {
        Location {
            id: id.to_string(),
            name: id.to_string(),
            lat,
            lon,
        }
    }

    fn alarm(id: &str, time: &str, location_id: &str, active: bool) -> Alarm {
        Alarm {
            id: id.to_string(),
            time: time.to_string(),
            location_id: location_id.to_string(),
            sound: AlarmSound::Default,
            is_active: active,
        }
    }

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 1, hour, minute, second).unwrap()
    }

    const RADIUS: f64 = 100.0;

    // ~500 m east of the target at this latitude
    const FAR: Position = Position {
        lat: 34.0,
        lon: -118.0054,
    };
    // ~50 m east of the target
    const NEAR: Position = Position {
        lat: 34.0,
        lon: -118.00054,
    };
    const TARGET: Position = Position {
        lat: 34.0,
        lon: -118.0,
    };

    #[test]
    fn proximity_tracks_the_radius() {
        let locations = vec![location("L", TARGET.lat, TARGET.lon)];
        let alarms = vec![alarm("A", "08:00", "L", true)];

        let rec = reconcile(&ProximityMap::new(), Some(FAR), &alarms, &locations, None, RADIUS);
        assert_eq!(rec.proximity.get("A"), Some(&false));

        let rec = reconcile(&rec.proximity, Some(NEAR), &alarms, &locations, None, RADIUS);
        assert_eq!(rec.proximity.get("A"), Some(&true));
    }

    #[test]
    fn unresolvable_alarms_are_absent_and_read_not_near() {
        let locations = vec![location("L", TARGET.lat, TARGET.lon)];
        let alarms = vec![
            alarm("A", "08:00", "", true),
            alarm("B", "08:00", "deleted", true),
        ];

        let rec = reconcile(&ProximityMap::new(), Some(NEAR), &alarms, &locations, None, RADIUS);
        assert!(!rec.proximity.contains_key("A"));
        assert!(!rec.proximity.contains_key("B"));
        assert!(!is_near(&rec.proximity, "A"));
        assert!(rec.deactivations.is_empty());
    }

    #[test]
    fn missing_position_freezes_the_snapshot() {
        let mut prev = ProximityMap::new();
        prev.insert("A".to_string(), true);

        let locations = vec![location("L", TARGET.lat, TARGET.lon)];
        let alarms = vec![alarm("A", "08:00", "L", true)];

        let rec = reconcile(&prev, None, &alarms, &locations, None, RADIUS);
        assert_eq!(rec.proximity, prev, "snapshot must be left untouched");
        assert!(rec.deactivations.is_empty());
    }

    #[test]
    fn arrival_is_a_rising_edge() {
        let locations = vec![location("L", TARGET.lat, TARGET.lon)];
        let alarms = vec![alarm("A", "08:00", "L", true)];

        // Far, then near: exactly one deactivation on the crossing pass
        let first = reconcile(&ProximityMap::new(), Some(FAR), &alarms, &locations, None, RADIUS);
        assert!(first.deactivations.is_empty());

        let second = reconcile(&first.proximity, Some(NEAR), &alarms, &locations, None, RADIUS);
        assert_eq!(second.deactivations, vec!["A".to_string()]);

        // Still near on the following pass: no second deactivation
        let third = reconcile(&second.proximity, Some(NEAR), &alarms, &locations, None, RADIUS);
        assert!(third.deactivations.is_empty());
    }

    #[test]
    fn arming_inside_the_radius_does_not_stand_down() {
        let locations = vec![location("L", TARGET.lat, TARGET.lon)];

        // Pass 1: alarm inactive, position already inside the radius
        let inactive = vec![alarm("A", "08:00", "L", false)];
        let first =
            reconcile(&ProximityMap::new(), Some(NEAR), &inactive, &locations, None, RADIUS);
        assert_eq!(first.proximity.get("A"), Some(&true));

        // Pass 2: user armed the alarm, still inside. Level, not edge: stays armed.
        let active = vec![alarm("A", "08:00", "L", true)];
        let second = reconcile(&first.proximity, Some(NEAR), &active, &locations, None, RADIUS);
        assert!(second.deactivations.is_empty());

        // Departure then return: now it stands down
        let third = reconcile(&second.proximity, Some(FAR), &active, &locations, None, RADIUS);
        assert!(third.deactivations.is_empty());
        let fourth = reconcile(&third.proximity, Some(NEAR), &active, &locations, None, RADIUS);
        assert_eq!(fourth.deactivations, vec!["A".to_string()]);
    }

    #[test]
    fn ringing_alarm_is_exempt_from_arrival_stand_down() {
        let locations = vec![location("L", TARGET.lat, TARGET.lon)];
        let alarms = vec![alarm("A", "08:00", "L", true)];

        let first = reconcile(&ProximityMap::new(), Some(FAR), &alarms, &locations, None, RADIUS);
        let second =
            reconcile(&first.proximity, Some(NEAR), &alarms, &locations, Some("A"), RADIUS);
        assert!(second.deactivations.is_empty());
    }

    #[test]
    fn inactive_alarms_never_deactivate() {
        let locations = vec![location("L", TARGET.lat, TARGET.lon)];
        let alarms = vec![alarm("A", "08:00", "L", false)];

        let first = reconcile(&ProximityMap::new(), Some(FAR), &alarms, &locations, None, RADIUS);
        let second = reconcile(&first.proximity, Some(NEAR), &alarms, &locations, None, RADIUS);
        assert!(second.deactivations.is_empty());
    }

    #[test]
    fn ring_matches_the_exact_minute() {
        let alarms = vec![alarm("A", "08:00", "L", true)];
        let proximity = ProximityMap::new();

        assert_eq!(
            evaluate_ring(at(8, 0, 0), &alarms, &proximity),
            RingOutcome::Ring("A".to_string())
        );
        // Anywhere inside the minute still matches (truncated to hour:minute)
        assert_eq!(
            evaluate_ring(at(8, 0, 30), &alarms, &proximity),
            RingOutcome::Ring("A".to_string())
        );
        assert_eq!(evaluate_ring(at(7, 59, 59), &alarms, &proximity), RingOutcome::Idle);
        assert_eq!(evaluate_ring(at(8, 1, 0), &alarms, &proximity), RingOutcome::Idle);
    }

    #[test]
    fn inactive_alarms_do_not_ring() {
        let alarms = vec![alarm("A", "08:00", "L", false)];
        assert_eq!(
            evaluate_ring(at(8, 0, 0), &alarms, &ProximityMap::new()),
            RingOutcome::Idle
        );
    }

    #[test]
    fn trigger_while_near_stands_down_instead_of_ringing() {
        let alarms = vec![alarm("A", "08:00", "L", true)];
        let mut proximity = ProximityMap::new();
        proximity.insert("A".to_string(), true);

        assert_eq!(
            evaluate_ring(at(8, 0, 0), &alarms, &proximity),
            RingOutcome::StandDown("A".to_string())
        );
    }

    #[test]
    fn same_minute_tie_break_is_first_found() {
        let alarms = vec![
            alarm("A", "08:00", "L", true),
            alarm("B", "08:00", "L", true),
        ];
        // Only the first match is acted on this pass; B waits for a later tick
        assert_eq!(
            evaluate_ring(at(8, 0, 0), &alarms, &ProximityMap::new()),
            RingOutcome::Ring("A".to_string())
        );
    }

    #[test]
    fn malformed_time_never_matches() {
        let alarms = vec![alarm("A", "8 o'clock", "L", true)];
        assert_eq!(
            evaluate_ring(at(8, 0, 0), &alarms, &ProximityMap::new()),
            RingOutcome::Idle
        );
    }
}
