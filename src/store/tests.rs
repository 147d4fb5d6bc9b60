use super::*;
use tempfile::TempDir;

fn location(id: &str, name: &str, lat: f64, lon: f64) -> Location {
    Location {
        id: id.to_string(),
        name: name.to_string(),
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

#[test]
fn alarm_time_validation() {
    assert!(valid_alarm_time("00:00"));
    assert!(valid_alarm_time("23:59"));
    assert!(valid_alarm_time("08:30"));
    assert!(!valid_alarm_time("24:00"));
    assert!(!valid_alarm_time("8:30"));
    assert!(!valid_alarm_time("08:60"));
    assert!(!valid_alarm_time("08:30:00"));
    assert!(!valid_alarm_time(""));
}

#[test]
fn arming_requires_resolvable_location() {
    let mut store = Store::in_memory(
        vec![location("loc-1", "Office", 34.0, -118.0)],
        vec![
            alarm("a-1", "08:00", "loc-1", false),
            alarm("a-2", "09:00", "", false),
            alarm("a-3", "10:00", "gone", false),
        ],
    );

    store.set_alarm_active("a-1", true).unwrap();
    assert!(store.find_alarm("a-1").unwrap().is_active);

    // Empty reference: never armable
    assert!(store.set_alarm_active("a-2", true).is_err());
    // Dangling reference: never armable
    assert!(store.set_alarm_active("a-3", true).is_err());

    // Disarming is always allowed
    store.set_alarm_active("a-1", false).unwrap();
    assert!(!store.find_alarm("a-1").unwrap().is_active);
}

#[test]
fn location_deletion_cascades_to_first_remaining() {
    let mut store = Store::in_memory(
        vec![
            location("loc-1", "Office", 34.0, -118.0),
            location("loc-2", "Gym", 34.1, -118.1),
        ],
        vec![alarm("a-1", "08:00", "loc-2", true)],
    );

    store.remove_location("loc-2").unwrap();

    let a = store.find_alarm("a-1").unwrap();
    assert_eq!(a.location_id, "loc-1");
    assert!(!a.is_active, "cascade must force the alarm inactive");
}

#[test]
fn location_deletion_cascades_to_empty_when_none_remain() {
    let mut store = Store::in_memory(
        vec![location("loc-1", "Office", 34.0, -118.0)],
        vec![alarm("a-1", "08:00", "loc-1", true)],
    );

    store.remove_location("loc-1").unwrap();

    let a = store.find_alarm("a-1").unwrap();
    assert_eq!(a.location_id, "");
    assert!(!a.is_active);
    // And the now-dangling alarm cannot be re-armed
    assert!(store.set_alarm_active("a-1", true).is_err());
}

#[test]
fn deletion_does_not_touch_unrelated_alarms() {
    let mut store = Store::in_memory(
        vec![
            location("loc-1", "Office", 34.0, -118.0),
            location("loc-2", "Gym", 34.1, -118.1),
        ],
        vec![
            alarm("a-1", "08:00", "loc-1", true),
            alarm("a-2", "09:00", "loc-2", true),
        ],
    );

    store.remove_location("loc-2").unwrap();

    let a1 = store.find_alarm("a-1").unwrap();
    assert_eq!(a1.location_id, "loc-1");
    assert!(a1.is_active, "unrelated alarm must keep its state");
}

#[test]
fn batch_deactivation_only_touches_listed_active_alarms() {
    let mut store = Store::in_memory(
        vec![location("loc-1", "Office", 34.0, -118.0)],
        vec![
            alarm("a-1", "08:00", "loc-1", true),
            alarm("a-2", "09:00", "loc-1", true),
            alarm("a-3", "10:00", "loc-1", false),
        ],
    );

    store
        .deactivate_batch(&["a-1".to_string(), "a-3".to_string(), "nope".to_string()])
        .unwrap();

    assert!(!store.find_alarm("a-1").unwrap().is_active);
    assert!(store.find_alarm("a-2").unwrap().is_active);
    assert!(!store.find_alarm("a-3").unwrap().is_active);
}

#[test]
fn add_alarm_validates_time_and_reference() {
    let mut store = Store::in_memory(vec![location("loc-1", "Office", 34.0, -118.0)], vec![]);

    assert!(store.add_alarm("25:00", String::new(), AlarmSound::Default).is_err());
    assert!(store
        .add_alarm("08:00", "missing".to_string(), AlarmSound::Default)
        .is_err());

    let a = store
        .add_alarm("08:00", "loc-1".to_string(), AlarmSound::Chime)
        .unwrap();
    assert!(!a.is_active, "new alarms start disarmed");
    assert_eq!(a.sound, AlarmSound::Chime);
}

#[test]
fn add_location_validates_coordinates() {
    let mut store = Store::in_memory(vec![], vec![]);
    assert!(store.add_location("Office", 91.0, 0.0).is_err());
    assert!(store.add_location("Office", 0.0, -181.0).is_err());
    assert!(store.add_location("  ", 0.0, 0.0).is_err());
    assert!(store.add_location("Office", 34.0, -118.0).is_ok());
}

#[test]
fn resolve_by_name_and_id_prefix() {
    let store = Store::in_memory(
        vec![
            location("2025-01-01T07:00:00.000Z", "Office", 34.0, -118.0),
            location("2025-02-01T07:00:00.000Z", "Gym", 34.1, -118.1),
        ],
        vec![alarm("2025-03-01T07:00:00.000Z", "08:00", "", false)],
    );

    assert_eq!(store.resolve_location("Gym").unwrap().name, "Gym");
    assert_eq!(store.resolve_location("2025-01").unwrap().name, "Office");
    // Ambiguous prefix resolves to nothing
    assert!(store.resolve_location("2025-0").is_none());
    assert!(store.resolve_alarm("2025-03").is_some());
}

#[test]
fn missing_file_seeds_one_disarmed_alarm() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");

    let store = Store::load_from_path(&path).unwrap();
    assert_eq!(store.alarms().len(), 1);
    let seeded = &store.alarms()[0];
    assert_eq!(seeded.time, SEED_ALARM_TIME);
    assert!(!seeded.is_active);
    assert!(seeded.location_id.is_empty());
    assert!(store.locations().is_empty());
}

#[test]
fn corrupt_file_degrades_to_defaults_without_overwriting() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, "{ not json ]").unwrap();

    let store = Store::load_from_path(&path).unwrap();
    assert_eq!(store.alarms().len(), 1);

    // The corrupt file must survive a plain load
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json ]");
}

#[test]
fn round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");

    let mut store = Store::load_from_path(&path).unwrap();
    let loc = store.add_location("Office", 34.0, -118.0).unwrap();
    store
        .add_alarm("06:45", loc.id.clone(), AlarmSound::Radar)
        .unwrap();

    let reloaded = Store::load_from_path(&path).unwrap();
    assert_eq!(reloaded.locations().len(), 1);
    // The seeded alarm plus the added one
    assert_eq!(reloaded.alarms().len(), 2);
    assert_eq!(reloaded.alarms()[1].time, "06:45");
    assert_eq!(reloaded.alarms()[1].sound, AlarmSound::Radar);
}
