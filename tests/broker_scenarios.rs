//! End-to-end scenarios driving a `Broker` through the fake transport
//! (SPEC_FULL.md §2 item 12: "integration tests in `tests/` driving the
//! fusion engine end-to-end through a fake transport").

use std::collections::HashMap;

use perception_broker::broker::{Broker, CycleOutcome};
use perception_broker::scene::{CategoricalScene, ConfigDocument, ParkingScene, Position, SceneConfig};
use perception_broker::settings::BrokerSettings;
use perception_broker::test_support::RecordingPublisher;

const TOPIC_VERDICT: &str = "verdict";
const TOPIC_FINISHED: &str = "finished";
const TOPIC_CONFIG: &str = "config";

fn categorical_config() -> ConfigDocument {
    let scene = SceneConfig::Categorical(CategoricalScene {
        object_locations: HashMap::from([
            ("front".to_string(), Position { x: 0.0, y: 0.0 }),
            ("rear".to_string(), Position { x: 10.0, y: 0.0 }),
        ]),
        vehicle_locations: serde_json::Value::Null,
    });
    ConfigDocument {
        raw: r#"{"object_locations":{"front":{"x":0.0,"y":0.0},"rear":{"x":10.0,"y":0.0}}}"#.to_string(),
        scene,
    }
}

fn parking_config(max_decision_history: usize) -> ConfigDocument {
    let scene = SceneConfig::Parking(ParkingScene {
        empty_parking_spot_locations: vec![Position { x: 5.0, y: 5.0 }],
        occupied_parking_spot_locations: vec![Position { x: 0.0, y: 0.0 }, Position { x: 1.0, y: 1.0 }],
        true_parking_occupants: vec!["ABC123".to_string(), "XYZ789".to_string()],
        max_decision_history,
        vehicle_locations: serde_json::Value::Null,
    });
    ConfigDocument { raw: "{}".to_string(), scene }
}

fn fast_settings() -> BrokerSettings {
    let mut s = BrokerSettings::default();
    s.verdict_min_refresh_time = 0.0;
    s
}

/// Scenario 1 (spec §8): a single live client reporting one detection
/// wins every slot it reports on; slots nobody reports on fall back to
/// the "None" sentinel.
#[test]
fn single_client_categorical_wins_reported_slots_and_defaults_the_rest() {
    let broker = Broker::new(fast_settings(), categorical_config(), RecordingPublisher::new(), 0.0);
    broker.handle_message("new_client", br#"{"source":"v1"}"#, 0.0);
    broker.handle_message(
        "data_V2B",
        br#"{"source":"v1","object_list":{"front":["pedestrian",0.95,4.0]}}"#,
        0.0,
    );

    let verdicts = broker.publisher().json_messages(TOPIC_VERDICT);
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0]["message"]["front"], "pedestrian");
    assert_eq!(verdicts[0]["message"]["rear"], "None");
    assert_eq!(broker.publisher().raw_messages(TOPIC_CONFIG).len(), 1);
}

/// Scenario 6 (spec §8): registering the same client twice is logged
/// and harmless — the registry, reputation, and verdict stream are all
/// unaffected by the second attempt.
#[test]
fn duplicate_register_is_idempotent_from_the_bus_perspective() {
    let broker = Broker::new(fast_settings(), categorical_config(), RecordingPublisher::new(), 0.0);
    broker.handle_message("new_client", br#"{"source":"v1"}"#, 0.0);
    broker.handle_message("new_client", br#"{"source":"v1"}"#, 0.0);

    let snapshot = broker.metrics();
    assert_eq!(snapshot.registered, 1);
    assert_eq!(snapshot.duplicate_registrations, 1);
    // Both registration attempts republish config, as each is a
    // distinct bus message the broker must react to.
    assert_eq!(broker.publisher().raw_messages(TOPIC_CONFIG).len(), 2);
}

/// A higher-reputation client's vote should outweigh a lower-reputation
/// one reporting a conflicting label on the same slot.
#[test]
fn reputation_weighting_favors_the_more_trusted_client_over_many_cycles() {
    let broker = Broker::new(fast_settings(), categorical_config(), RecordingPublisher::new(), 0.0);
    broker.handle_message("new_client", br#"{"source":"trusted"}"#, 0.0);
    broker.handle_message("new_client", br#"{"source":"noisy"}"#, 0.0);

    // Build up "trusted"'s reputation over several agreeing cycles
    // against a third, neutral client, before introducing "noisy".
    broker.handle_message("new_client", br#"{"source":"neutral"}"#, 0.0);
    for t in 0..20 {
        let now = t as f64;
        broker.handle_message(
            "data_V2B",
            br#"{"source":"trusted","object_list":{"front":["car",0.9,4.0]}}"#,
            now,
        );
        broker.handle_message(
            "data_V2B",
            br#"{"source":"neutral","object_list":{"front":["car",0.9,4.0]}}"#,
            now,
        );
    }

    broker.handle_message(
        "data_V2B",
        br#"{"source":"trusted","object_list":{"front":["car",0.9,4.0]}}"#,
        20.0,
    );
    broker.handle_message(
        "data_V2B",
        br#"{"source":"noisy","object_list":{"front":["truck",0.9,4.0]}}"#,
        20.0,
    );

    let verdicts = broker.publisher().json_messages(TOPIC_VERDICT);
    assert_eq!(verdicts.last().unwrap()["message"]["front"], "car");
}

/// Scenario 4 (spec §8): a QR plate closer to an occupied spot than its
/// current occupant displaces that occupant, which is re-homed onto its
/// own next-best spot via the stack-based assignment.
#[test]
fn parking_displacement_reassigns_the_bumped_occupant() {
    let broker = Broker::new(fast_settings(), parking_config(5), RecordingPublisher::new(), 0.0);
    broker.handle_message("new_client", br#"{"source":"p1"}"#, 0.0);
    broker.handle_message(
        "data_V2B",
        br#"{"source":"p1","object_list":[
            {"text":"ABC123","position":{"x":0.1,"y":0.1},"distance":1.0},
            {"text":"XYZ789","position":{"x":0.2,"y":0.2},"distance":1.0}
        ]}"#,
        0.0,
    );

    let verdicts = broker.publisher().json_messages(TOPIC_VERDICT);
    let message = &verdicts.last().unwrap()["message"];
    let assigned: Vec<&str> = ["0", "1"]
        .iter()
        .map(|slot| message[slot].as_str().unwrap())
        .collect();
    assert!(assigned.contains(&"ABC123"));
    assert!(assigned.contains(&"XYZ789"));
    assert_ne!(assigned[0], assigned[1]);
}

/// Scenario (spec §4.8): the parking run controller terminates the
/// process after its bounded number of verdicts and publishes
/// `finished` exactly once.
#[test]
fn parking_run_controller_stops_the_bounded_experiment() {
    let broker = Broker::new(fast_settings(), parking_config(2), RecordingPublisher::new(), 0.0);
    broker.handle_message("new_client", br#"{"source":"p1"}"#, 0.0);

    let mut outcome = CycleOutcome::default();
    for t in 0..12 {
        outcome = broker.handle_message(
            "data_V2B",
            br#"{"source":"p1","object_list":[{"text":"ABC123","position":{"x":0.0,"y":0.0},"distance":1.0}]}"#,
            t as f64,
        );
        if outcome.should_exit {
            break;
        }
    }

    assert!(outcome.should_exit);
    assert_eq!(broker.publisher().json_messages(TOPIC_FINISHED).len(), 1);
}

/// P2 (spec §8): a verdict cycle run with zero fresh observations
/// degrades to "None" on every slot rather than panicking or stalling.
#[test]
fn empty_registry_verdict_is_all_none() {
    let broker = Broker::new(fast_settings(), categorical_config(), RecordingPublisher::new(), 0.0);
    broker.handle_message("request_config", b"{}", 0.0);
    assert_eq!(broker.publisher().raw_messages(TOPIC_CONFIG).len(), 1);
    assert!(broker.publisher().json_messages(TOPIC_VERDICT).is_empty());
}
