#![allow(missing_docs)]
#![cfg(feature = "host")]
//! Host-level tests for the connection supervisor.

use core::net::Ipv4Addr;

use duty_station::Error;
use duty_station::station::{
    ConnectWait, ConnectionState, MAX_RETRIES_DEFAULT, Station, StationAction, StationConfig,
    StationEvent, StationOutcome, StationStatic,
};
use embassy_futures::block_on;
use embassy_time::Duration;

const IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 42);
const CONFIG: StationConfig = StationConfig::new("workshop", "correct-horse");

#[test]
fn config_defaults() {
    assert_eq!(CONFIG.max_retries(), MAX_RETRIES_DEFAULT);
    assert_eq!(CONFIG.max_retries(), 10);
    assert_eq!(CONFIG.connect_wait(), ConnectWait::Forever);
    assert_eq!(CONFIG.ssid(), "workshop");
    assert_eq!(CONFIG.password(), "correct-horse");
}

#[test]
fn connects_after_five_drops() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let (station, mut supervisor) = Station::new(&STATION_STATIC, CONFIG)?;
    assert_eq!(supervisor.state(), ConnectionState::Idle);

    supervisor.start()?;
    assert_eq!(supervisor.state(), ConnectionState::Connecting);
    assert_eq!(
        supervisor.handle_event(StationEvent::Started),
        StationAction::Connect
    );
    for retry in 1..=5 {
        assert_eq!(
            supervisor.handle_event(StationEvent::Disconnected),
            StationAction::Connect
        );
        assert_eq!(supervisor.state(), ConnectionState::Retrying);
        assert_eq!(supervisor.retry_count(), retry);
    }
    assert_eq!(
        supervisor.handle_event(StationEvent::GotAddress(IP)),
        StationAction::Wait
    );

    assert_eq!(supervisor.connect_attempts(), 6);
    assert_eq!(supervisor.retry_count(), 0);
    assert_eq!(supervisor.state(), ConnectionState::Connected);
    assert_eq!(supervisor.address(), Some(IP));
    assert_eq!(block_on(station.await_outcome())?, StationOutcome::Connected(IP));
    Ok(())
}

#[test]
fn fails_once_retries_are_used_up() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let (station, mut supervisor) =
        Station::new(&STATION_STATIC, CONFIG.with_max_retries(3))?;
    supervisor.start()?;
    assert_eq!(
        supervisor.handle_event(StationEvent::Started),
        StationAction::Connect
    );
    for _ in 0..3 {
        assert_eq!(
            supervisor.handle_event(StationEvent::Disconnected),
            StationAction::Connect
        );
    }
    assert_eq!(supervisor.retry_count(), 3);

    assert_eq!(
        supervisor.handle_event(StationEvent::Disconnected),
        StationAction::Wait
    );
    assert_eq!(supervisor.state(), ConnectionState::Failed);
    assert_eq!(supervisor.connect_attempts(), 4);

    // No connect attempt is ever issued again
    for event in [
        StationEvent::Started,
        StationEvent::Disconnected,
        StationEvent::GotAddress(IP),
    ] {
        assert_eq!(supervisor.handle_event(event), StationAction::Wait);
    }
    assert_eq!(supervisor.state(), ConnectionState::Failed);
    assert_eq!(supervisor.connect_attempts(), 4);
    assert!(supervisor.retry_count() <= supervisor.config().max_retries());

    assert_eq!(block_on(station.await_outcome())?, StationOutcome::Failed);
    Ok(())
}

#[test]
fn zero_retries_fails_on_first_drop() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let (station, mut supervisor) =
        Station::new(&STATION_STATIC, CONFIG.with_max_retries(0))?;
    supervisor.start()?;
    assert_eq!(
        supervisor.handle_event(StationEvent::Started),
        StationAction::Connect
    );
    assert_eq!(
        supervisor.handle_event(StationEvent::Disconnected),
        StationAction::Wait
    );
    assert_eq!(supervisor.state(), ConnectionState::Failed);
    assert_eq!(block_on(station.await_outcome())?, StationOutcome::Failed);
    Ok(())
}

#[test]
fn address_resets_retry_count_and_first_outcome_sticks() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let (station, mut supervisor) =
        Station::new(&STATION_STATIC, CONFIG.with_max_retries(2))?;
    supervisor.start()?;
    supervisor.handle_event(StationEvent::Started);
    supervisor.handle_event(StationEvent::Disconnected);
    supervisor.handle_event(StationEvent::Disconnected);
    assert_eq!(supervisor.retry_count(), 2);

    supervisor.handle_event(StationEvent::GotAddress(IP));
    assert_eq!(supervisor.retry_count(), 0);

    // The outcome has not been awaited yet, so events are still handled
    assert_eq!(
        supervisor.handle_event(StationEvent::Disconnected),
        StationAction::Connect
    );
    assert_eq!(supervisor.retry_count(), 1);
    supervisor.handle_event(StationEvent::Disconnected);
    supervisor.handle_event(StationEvent::Disconnected);
    assert_eq!(supervisor.state(), ConnectionState::Failed);

    assert_eq!(block_on(station.await_outcome())?, StationOutcome::Connected(IP));
    Ok(())
}

#[test]
fn second_start_is_rejected() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let (_station, mut supervisor) = Station::new(&STATION_STATIC, CONFIG)?;
    supervisor.start()?;
    assert_eq!(supervisor.start(), Err(Error::AlreadyStarted));
    supervisor.handle_event(StationEvent::Started);
    assert_eq!(supervisor.start(), Err(Error::AlreadyStarted));
    assert_eq!(supervisor.state(), ConnectionState::Connecting);
    Ok(())
}

#[test]
fn unusable_credentials_fail_initialization() -> duty_station::Result<()> {
    for config in [
        StationConfig::new("", "correct-horse"),
        StationConfig::new("a-network-name-that-is-33-bytes!!", "correct-horse"),
        StationConfig::new("workshop", "short"),
        StationConfig::new(
            "workshop",
            "a-pre-shared-key-that-is-far-too-long-to-be-accepted-by-wpa2-xxxx",
        ),
    ] {
        let station_static: &'static StationStatic = Box::leak(Box::new(Station::new_static()));
        let (_station, mut supervisor) = Station::new(station_static, config)?;
        assert!(matches!(
            supervisor.start(),
            Err(Error::InitializationFailure(_))
        ));
        assert_eq!(supervisor.state(), ConnectionState::Idle);
    }
    Ok(())
}

#[test]
fn open_network_is_accepted_and_joins_without_a_key() -> duty_station::Result<()> {
    let open = StationConfig::new("guest", "");
    assert!(open.is_open());
    assert!(!CONFIG.is_open());

    static STATION_STATIC: StationStatic = Station::new_static();
    let (_station, mut supervisor) = Station::new(&STATION_STATIC, open)?;
    supervisor.start()?;
    assert!(supervisor.config().is_open());
    Ok(())
}

#[test]
fn a_station_static_is_split_once() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let (station, mut supervisor) = Station::new(&STATION_STATIC, CONFIG)?;
    supervisor.start()?;
    supervisor.handle_event(StationEvent::Started);
    supervisor.handle_event(StationEvent::GotAddress(IP));
    block_on(station.await_outcome())?;
    assert!(!supervisor.is_subscribed());

    // A second split fails and leaves the released subscription released
    assert!(matches!(
        Station::new(&STATION_STATIC, CONFIG),
        Err(Error::AlreadyStarted)
    ));
    assert!(!supervisor.is_subscribed());
    assert_eq!(
        supervisor.handle_event(StationEvent::Disconnected),
        StationAction::Wait
    );
    Ok(())
}

#[test]
fn events_before_start_are_ignored() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let (_station, mut supervisor) = Station::new(&STATION_STATIC, CONFIG)?;
    assert_eq!(
        supervisor.handle_event(StationEvent::Started),
        StationAction::Wait
    );
    assert_eq!(
        supervisor.handle_event(StationEvent::GotAddress(IP)),
        StationAction::Wait
    );
    assert_eq!(supervisor.state(), ConnectionState::Idle);
    assert_eq!(supervisor.connect_attempts(), 0);
    assert_eq!(supervisor.address(), None);
    Ok(())
}

#[test]
fn events_after_outcome_is_observed_are_ignored() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let (station, mut supervisor) = Station::new(&STATION_STATIC, CONFIG)?;
    supervisor.start()?;
    supervisor.handle_event(StationEvent::Started);
    supervisor.handle_event(StationEvent::GotAddress(IP));
    assert!(supervisor.is_subscribed());

    block_on(station.await_outcome())?;
    assert!(!supervisor.is_subscribed());
    assert_eq!(
        supervisor.handle_event(StationEvent::Disconnected),
        StationAction::Wait
    );
    assert_eq!(supervisor.state(), ConnectionState::Connected);
    assert_eq!(supervisor.connect_attempts(), 1);
    Ok(())
}

#[test]
fn dropping_the_station_releases_the_subscription() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let (station, mut supervisor) = Station::new(&STATION_STATIC, CONFIG)?;
    supervisor.start()?;
    drop(station);
    assert!(!supervisor.is_subscribed());
    assert_eq!(
        supervisor.handle_event(StationEvent::Started),
        StationAction::Wait
    );
    Ok(())
}

#[test]
fn bounded_wait_times_out() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let config = CONFIG.with_connect_wait(ConnectWait::Within(Duration::from_millis(20)));
    let (station, mut supervisor) = Station::new(&STATION_STATIC, config)?;
    supervisor.start()?;
    assert_eq!(
        supervisor.handle_event(StationEvent::Started),
        StationAction::Connect
    );

    assert_eq!(block_on(station.await_outcome()), Err(Error::ConnectTimeout));
    assert!(!supervisor.is_subscribed());
    assert_eq!(
        supervisor.handle_event(StationEvent::GotAddress(IP)),
        StationAction::Wait
    );
    Ok(())
}

#[test]
fn bounded_wait_returns_outcome_already_reported() -> duty_station::Result<()> {
    static STATION_STATIC: StationStatic = Station::new_static();
    let config = CONFIG.with_connect_wait(ConnectWait::Within(Duration::from_secs(5)));
    let (station, mut supervisor) = Station::new(&STATION_STATIC, config)?;
    supervisor.start()?;
    supervisor.handle_event(StationEvent::Started);
    supervisor.handle_event(StationEvent::GotAddress(IP));
    assert_eq!(block_on(station.await_outcome())?, StationOutcome::Connected(IP));
    Ok(())
}
