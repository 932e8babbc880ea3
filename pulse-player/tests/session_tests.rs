//! Integration tests for session orchestration
//!
//! These run the real runner with synthetic sources and assert on the
//! observable lifecycle signals. No audio hardware is required: the sound
//! bank degrades to a logging sink when no output device exists.

use pulse_common::config::{PulseConfig, TransportConfig};
use pulse_common::events::PulseEvent;
use pulse_player::{PulseRunner, SessionState};
use std::io::Write;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const SCRIPT: &str = r#"#{ sample: "kick", pitch: 1.0, volume: 0.5 }"#;

fn random_config(resource_id: i64) -> PulseConfig {
    PulseConfig {
        resource_id,
        name: format!("session-{resource_id}"),
        transport: TransportConfig::Random {
            delay_min_ms: 5,
            delay_span_ms: 5,
        },
        event_sounds: vec!["kick".to_string()],
        acoustic_style: "percussion".to_string(),
        script: SCRIPT.to_string(),
        sounds_dir: None,
    }
}

async fn next_event(rx: &mut broadcast::Receiver<PulseEvent>) -> PulseEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a session signal")
        .expect("event bus closed")
}

async fn assert_bus_quiet(rx: &mut broadcast::Receiver<PulseEvent>) {
    let extra = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(extra.is_err(), "unexpected extra signal: {extra:?}");
}

#[tokio::test]
async fn test_session_lifecycle_signals() {
    let styles = tempfile::tempdir().unwrap();
    let runner = PulseRunner::new(styles.path());
    let mut events = runner.subscribe();

    runner.start(random_config(1)).await.unwrap();
    assert_eq!(runner.state(), SessionState::Running);
    assert_eq!(runner.active_resource(), Some(1));

    let started = next_event(&mut events).await;
    assert_eq!(started.event_type(), "SessionStarted");
    assert_eq!(started.resource_id(), 1);

    // Let the ingestion loop produce a handful of events before stopping
    tokio::time::sleep(Duration::from_millis(50)).await;
    runner.stop().await;

    let stopped = next_event(&mut events).await;
    assert_eq!(stopped.event_type(), "SessionStopped");
    assert_eq!(stopped.resource_id(), 1);
    assert_eq!(runner.state(), SessionState::Stopped);
    assert!(runner.active_resource().is_none());

    // Exactly one stopped per session
    assert_bus_quiet(&mut events).await;
}

#[tokio::test]
async fn test_starting_a_second_session_stops_the_first_one_first() {
    let styles = tempfile::tempdir().unwrap();
    let runner = PulseRunner::new(styles.path());
    let mut events = runner.subscribe();

    runner.start(random_config(1)).await.unwrap();
    assert_eq!(next_event(&mut events).await.event_type(), "SessionStarted");

    runner.start(random_config(2)).await.unwrap();

    // The old session's stopped must arrive strictly before the new started
    let stopped = next_event(&mut events).await;
    assert_eq!(stopped.event_type(), "SessionStopped");
    assert_eq!(stopped.resource_id(), 1);

    let started = next_event(&mut events).await;
    assert_eq!(started.event_type(), "SessionStarted");
    assert_eq!(started.resource_id(), 2);

    assert_eq!(runner.active_resource(), Some(2));

    runner.stop().await;
    let stopped = next_event(&mut events).await;
    assert_eq!(stopped.event_type(), "SessionStopped");
    assert_eq!(stopped.resource_id(), 2);
    assert_bus_quiet(&mut events).await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let styles = tempfile::tempdir().unwrap();
    let runner = PulseRunner::new(styles.path());
    let mut events = runner.subscribe();

    // Stopping with no session is a no-op
    runner.stop().await;

    runner.start(random_config(3)).await.unwrap();
    assert_eq!(next_event(&mut events).await.event_type(), "SessionStarted");

    runner.stop().await;
    runner.stop().await;

    let stopped = next_event(&mut events).await;
    assert_eq!(stopped.event_type(), "SessionStopped");
    assert_bus_quiet(&mut events).await;
}

#[tokio::test]
async fn test_invalid_config_fails_without_side_effects() {
    let styles = tempfile::tempdir().unwrap();
    let runner = PulseRunner::new(styles.path());
    let mut events = runner.subscribe();

    let mut config = random_config(4);
    config.script = String::new();
    assert!(runner.start(config).await.is_err());

    assert_eq!(runner.state(), SessionState::Stopped);
    assert!(runner.active_resource().is_none());
    assert_bus_quiet(&mut events).await;
}

#[tokio::test]
async fn test_file_replay_session_stops_by_itself() {
    let styles = tempfile::tempdir().unwrap();
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"[{{"ts":10,"type":"TICK"}},{{"ts":40,"type":"TICK"}},{{"ts":60,"type":"TICK"}}]"#
    )
    .unwrap();

    let config = PulseConfig {
        resource_id: 5,
        name: "replay".to_string(),
        transport: TransportConfig::FileReplay {
            path: file.path().to_path_buf(),
            format: None,
            timestamp_field: Some("ts".to_string()),
        },
        event_sounds: vec!["kick".to_string()],
        acoustic_style: "percussion".to_string(),
        script: SCRIPT.to_string(),
        sounds_dir: None,
    };

    let runner = PulseRunner::new(styles.path());
    let mut events = runner.subscribe();
    runner.start(config).await.unwrap();

    assert_eq!(next_event(&mut events).await.event_type(), "SessionStarted");
    let stopped = next_event(&mut events).await;
    assert_eq!(stopped.event_type(), "SessionStopped");
    assert_eq!(stopped.resource_id(), 5);
    assert!(runner.active_resource().is_none());
    assert_bus_quiet(&mut events).await;

    // A stop after self-termination is still safe
    runner.stop().await;
    assert_bus_quiet(&mut events).await;
}

#[tokio::test]
async fn test_missing_event_file_reports_transport_error_then_stops() {
    let styles = tempfile::tempdir().unwrap();
    let config = PulseConfig {
        resource_id: 6,
        name: "broken replay".to_string(),
        transport: TransportConfig::FileReplay {
            path: "/definitely/not/here.json".into(),
            format: None,
            timestamp_field: None,
        },
        event_sounds: vec![],
        acoustic_style: "percussion".to_string(),
        script: SCRIPT.to_string(),
        sounds_dir: None,
    };

    let runner = PulseRunner::new(styles.path());
    let mut events = runner.subscribe();
    runner.start(config).await.unwrap();

    assert_eq!(next_event(&mut events).await.event_type(), "SessionStarted");
    let error = next_event(&mut events).await;
    assert_eq!(error.event_type(), "TransportError");
    assert_eq!(error.resource_id(), 6);
    let stopped = next_event(&mut events).await;
    assert_eq!(stopped.event_type(), "SessionStopped");
    assert_bus_quiet(&mut events).await;
}
