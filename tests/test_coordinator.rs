mod common;
use common::*;

use chrono::Utc;
use std::collections::HashMap;

use trannergy_bridge::coordinator::{Availability, ChannelData};
use trannergy_bridge::prelude::*;
use trannergy_bridge::trannergy::client::{PollOutcome, Sample, Status};

fn sample(actualpower: f64, energytoday: f64) -> Sample {
    let mut values: HashMap<&'static str, f64> = HashMap::new();
    values.insert("actualpower", actualpower);
    values.insert("energytoday", energytoday);
    values.insert("energytotal", 1234.5);
    Sample {
        timestamp: Utc::now(),
        values,
        inverter_sn: Some("TRN5500XT012345".to_string()),
        status: Status::Online,
    }
}

fn coordinator_with_threshold(threshold: u32) -> (Coordinator, Channels) {
    let mut inverter = Factory::inverter();
    inverter.offline_threshold = threshold;
    let config = Factory::config_wrapper(inverter.clone());
    let channels = Channels::new();
    (
        Coordinator::new(config, &inverter, channels.clone()),
        channels,
    )
}

fn transient() -> PollOutcome {
    PollOutcome::TransientFailure(TransientError::ReadTimeout(10))
}

#[test]
fn starts_unknown_with_no_sample() {
    common_setup();
    let (coordinator, _channels) = coordinator_with_threshold(3);
    assert_eq!(coordinator.availability(), Availability::Unknown);
    assert_eq!(coordinator.current_sample(), None);
}

#[test]
fn success_goes_online_and_notifies() {
    common_setup();
    let (coordinator, channels) = coordinator_with_threshold(3);
    let mut rx = channels.from_coordinator.subscribe();

    coordinator.apply(PollOutcome::Success(sample(1530.0, 12.4)));

    assert_eq!(coordinator.availability(), Availability::Online);
    let stored = coordinator.current_sample().unwrap();
    assert_close(stored.values["actualpower"], 1530.0);
    assert_close(stored.values["energytoday"], 12.4);

    match rx.try_recv().unwrap() {
        ChannelData::Sample(name, sample) => {
            assert_eq!(name, "roof");
            assert_close(sample.values["actualpower"], 1530.0);
            assert_close(sample.values["energytoday"], 12.4);
            assert_eq!(sample.status, Status::Online);
        }
        other => panic!("expected Sample, got {:?}", other),
    }
    assert_eq!(
        rx.try_recv().unwrap(),
        ChannelData::Availability("roof".to_string(), Availability::Online)
    );
}

#[test]
fn offline_preserves_last_known_good() {
    common_setup();
    let (coordinator, channels) = coordinator_with_threshold(3);

    coordinator.apply(PollOutcome::Success(sample(1530.0, 12.4)));
    let mut rx = channels.from_coordinator.subscribe();

    // Nighttime: the connect attempt times out.
    coordinator.apply(PollOutcome::DeviceOffline);

    assert_eq!(coordinator.availability(), Availability::Offline);
    let stored = coordinator.current_sample().unwrap();
    assert_eq!(stored.status, Status::Offline);
    // Yesterday's figures are still retrievable, unchanged.
    assert_close(stored.values["energytotal"], 1234.5);
    assert_close(stored.values["actualpower"], 1530.0);

    assert_eq!(
        rx.try_recv().unwrap(),
        ChannelData::Availability("roof".to_string(), Availability::Offline)
    );
}

#[test]
fn single_transient_failure_does_not_flap() {
    common_setup();
    let (coordinator, channels) = coordinator_with_threshold(3);

    coordinator.apply(PollOutcome::Success(sample(1530.0, 12.4)));
    let mut rx = channels.from_coordinator.subscribe();

    coordinator.apply(transient());

    // Below threshold: visible state untouched, nobody notified.
    assert_eq!(coordinator.availability(), Availability::Online);
    assert_eq!(coordinator.current_sample().unwrap().status, Status::Online);
    assert!(rx.try_recv().is_err());

    coordinator.apply(PollOutcome::Success(sample(1600.0, 12.5)));
    assert_eq!(coordinator.availability(), Availability::Online);
}

#[test]
fn consecutive_transient_failures_escalate_to_offline() {
    common_setup();
    let (coordinator, channels) = coordinator_with_threshold(3);

    coordinator.apply(PollOutcome::Success(sample(1530.0, 12.4)));
    let mut rx = channels.from_coordinator.subscribe();

    coordinator.apply(transient());
    coordinator.apply(transient());
    assert_eq!(coordinator.availability(), Availability::Online);
    assert!(rx.try_recv().is_err());

    coordinator.apply(transient());
    assert_eq!(coordinator.availability(), Availability::Offline);
    assert_eq!(
        rx.try_recv().unwrap(),
        ChannelData::Availability("roof".to_string(), Availability::Offline)
    );
}

#[test]
fn success_resets_transient_counter() {
    common_setup();
    let (coordinator, _channels) = coordinator_with_threshold(2);

    coordinator.apply(transient());
    coordinator.apply(PollOutcome::Success(sample(100.0, 1.0)));
    coordinator.apply(transient());

    // The counter restarted after the success; one failure is not enough.
    assert_eq!(coordinator.availability(), Availability::Online);
}

#[test]
fn first_poll_offline_notifies_from_unknown() {
    common_setup();
    let (coordinator, channels) = coordinator_with_threshold(3);
    let mut rx = channels.from_coordinator.subscribe();

    coordinator.apply(PollOutcome::DeviceOffline);

    assert_eq!(coordinator.availability(), Availability::Offline);
    assert_eq!(coordinator.current_sample(), None);
    assert_eq!(
        rx.try_recv().unwrap(),
        ChannelData::Availability("roof".to_string(), Availability::Offline)
    );
}

#[test]
fn repeated_offline_does_not_renotify() {
    common_setup();
    let (coordinator, channels) = coordinator_with_threshold(3);

    coordinator.apply(PollOutcome::DeviceOffline);
    let mut rx = channels.from_coordinator.subscribe();
    coordinator.apply(PollOutcome::DeviceOffline);

    // Stable availability signal: still Offline, no fresh notification.
    assert_eq!(coordinator.availability(), Availability::Offline);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn shutdown_stops_loop_and_aborts_poll() {
    common_setup();

    // Nothing listens on this port, so the in-flight poll resolves (or is
    // cancelled) quickly either way.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut inverter = Factory::inverter();
    inverter.port = port;
    inverter.timeout = 1;
    let config = Factory::config_wrapper(inverter.clone());
    let channels = Channels::new();
    let coordinator = Coordinator::new(config, &inverter, channels.clone());

    let runner = coordinator.clone();
    let handle = tokio::spawn(async move { runner.start().await });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    coordinator.stop();

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("coordinator did not stop after shutdown");
    result.unwrap().unwrap();
}

#[test]
fn runtime_scan_interval_update() {
    common_setup();
    let inverter = Factory::inverter();
    let config = Factory::config_wrapper(inverter);

    config.set_scan_interval("roof", 60).unwrap();
    assert_eq!(config.inverter_with_name("roof").unwrap().scan_interval(), 60);

    // The floor still applies at runtime.
    assert!(config.set_scan_interval("roof", 2).is_err());
    assert!(config.set_scan_interval("missing", 60).is_err());
}
