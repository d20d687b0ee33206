//! A retry-bounded state machine that keeps one Wi-Fi station associated with one
//! access point.
//!
//! The supervisor is split in two halves that share a [`StationStatic`]:
//!
//! - [`StationSupervisor`] lives in the event-handling context. The radio driver feeds
//!   it [`StationEvent`]s through [`StationSupervisor::handle_event`] and carries out
//!   the [`StationAction`] it returns. It is the only writer of the connection state.
//! - [`Station`] lives in the boot sequence. [`Station::await_outcome`] suspends until
//!   the supervisor reports [`StationOutcome::Connected`] or [`StationOutcome::Failed`].
//!
//! Only the existence of an outcome crosses between the halves, through a one-shot
//! [`Signal`], never a queue of events.
//!
//! # Example
//!
//! ```rust
//! use core::net::Ipv4Addr;
//! use duty_station::station::{
//!     Station, StationAction, StationConfig, StationEvent, StationOutcome, StationStatic,
//! };
//!
//! static STATION_STATIC: StationStatic = Station::new_static();
//! let config = StationConfig::new("my-network", "my-password").with_max_retries(3);
//! let (station, mut supervisor) = Station::new(&STATION_STATIC, config)?;
//!
//! supervisor.start()?;
//! assert_eq!(supervisor.handle_event(StationEvent::Started), StationAction::Connect);
//! assert_eq!(supervisor.handle_event(StationEvent::Disconnected), StationAction::Connect);
//! let ip = Ipv4Addr::new(192, 168, 1, 42);
//! assert_eq!(supervisor.handle_event(StationEvent::GotAddress(ip)), StationAction::Wait);
//!
//! let outcome = embassy_futures::block_on(station.await_outcome())?;
//! assert_eq!(outcome, StationOutcome::Connected(ip));
//!
//! // The subscription is released once the outcome has been observed.
//! assert_eq!(supervisor.handle_event(StationEvent::Disconnected), StationAction::Wait);
//! # Ok::<(), duty_station::Error>(())
//! ```

use core::net::Ipv4Addr;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, with_timeout};
use portable_atomic::{AtomicBool, Ordering};

use crate::{Error, Result};

/// Default bound on consecutive reconnect attempts.
pub const MAX_RETRIES_DEFAULT: u8 = 10;

const SSID_MAX_LEN: usize = 32;
const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 64;

/// Notifications delivered by the network stack, in the order it emits them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StationEvent {
    /// The radio finished starting in station mode.
    Started,
    /// The association was lost, or a connect attempt failed.
    Disconnected,
    /// DHCP assigned this address.
    GotAddress(Ipv4Addr),
}

/// Connection lifecycle, owned by the [`StationSupervisor`].
///
/// `Idle → Connecting → {Connected, Retrying → Connecting, Failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum ConnectionState {
    /// Not started yet.
    Idle,
    /// A first connect attempt is pending or in flight.
    Connecting,
    /// A reconnect attempt is in flight after a disconnection.
    Retrying,
    /// An address was assigned.
    Connected,
    /// All retries were used up. No more connect attempts until restart.
    Failed,
}

/// The single result reported to whoever awaits the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StationOutcome {
    /// Associated and addressed.
    Connected(Ipv4Addr),
    /// Gave up after the configured number of retries.
    Failed,
}

/// What the radio driver must do after an event was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum StationAction {
    /// Issue one connect attempt now, with no delay.
    Connect,
    /// Nothing to do; wait for the next event.
    Wait,
}

/// How long [`Station::await_outcome`] may wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum ConnectWait {
    /// No timeout. Blocks indefinitely if the radio stops reporting events.
    Forever,
    /// Give up with [`Error::ConnectTimeout`] after this long.
    Within(Duration),
}

/// Compile-time connection settings consumed by [`StationSupervisor::start`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct StationConfig {
    ssid: &'static str,
    password: &'static str,
    max_retries: u8,
    connect_wait: ConnectWait,
}

impl StationConfig {
    /// Settings for a WPA2 network, with [`MAX_RETRIES_DEFAULT`] retries and no timeout.
    #[must_use]
    pub const fn new(ssid: &'static str, password: &'static str) -> Self {
        Self {
            ssid,
            password,
            max_retries: MAX_RETRIES_DEFAULT,
            connect_wait: ConnectWait::Forever,
        }
    }

    /// Bound the number of reconnect attempts after the first one.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Choose how long the boot sequence waits for an outcome.
    #[must_use]
    pub const fn with_connect_wait(mut self, connect_wait: ConnectWait) -> Self {
        self.connect_wait = connect_wait;
        self
    }

    /// Access point name.
    #[must_use]
    pub const fn ssid(&self) -> &'static str {
        self.ssid
    }

    /// Pre-shared key. Empty for an open network.
    #[must_use]
    pub const fn password(&self) -> &'static str {
        self.password
    }

    /// Whether the access point is joined without authentication (empty password).
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Bound on consecutive reconnect attempts.
    #[must_use]
    pub const fn max_retries(&self) -> u8 {
        self.max_retries
    }

    /// Wait policy for [`Station::await_outcome`].
    #[must_use]
    pub const fn connect_wait(&self) -> ConnectWait {
        self.connect_wait
    }

    fn validate(&self) -> Result<()> {
        if self.ssid.is_empty() || self.ssid.len() > SSID_MAX_LEN {
            return Err(Error::InitializationFailure(
                "SSID must be 1 to 32 bytes",
            ));
        }
        let password_len = self.password.len();
        if password_len != 0 && !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password_len) {
            return Err(Error::InitializationFailure(
                "password must be empty or 8 to 64 bytes",
            ));
        }
        Ok(())
    }
}

type OutcomeSignal = Signal<CriticalSectionRawMutex, StationOutcome>;

/// Shared storage for [`Station`] and [`StationSupervisor`]. See [`Station`] for usage.
pub struct StationStatic {
    outcome: OutcomeSignal,
    claimed: AtomicBool,
    released: AtomicBool,
}

impl StationStatic {
    #[must_use]
    const fn new() -> Self {
        Self {
            outcome: Signal::new(),
            claimed: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }
}

/// The boot sequence's half: waits once for the connection outcome.
///
/// See the [module-level example](self) for usage.
pub struct Station<'a> {
    station_static: &'a StationStatic,
    connect_wait: ConnectWait,
}

impl<'a> Station<'a> {
    /// Create [`Station`] resources.
    #[must_use]
    pub const fn new_static() -> StationStatic {
        StationStatic::new()
    }

    /// Split shared resources into the awaiting half and the event-handling half.
    ///
    /// Each `station_static` can be split once. A released subscription stays
    /// released.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] if `station_static` was split before. Nothing
    /// shared is touched in that case.
    pub fn new(
        station_static: &'a StationStatic,
        config: StationConfig,
    ) -> Result<(Self, StationSupervisor<'a>)> {
        if station_static.claimed.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted);
        }
        let station = Self {
            station_static,
            connect_wait: config.connect_wait,
        };
        let supervisor = StationSupervisor {
            station_static,
            config,
            state: ConnectionState::Idle,
            retry_count: 0,
            connect_attempts: 0,
            address: None,
            outcome_reported: false,
        };
        Ok((station, supervisor))
    }

    /// Suspend until the supervisor reports [`StationOutcome::Connected`] or
    /// [`StationOutcome::Failed`].
    ///
    /// With [`ConnectWait::Forever`] this may never return if the radio stops sending
    /// events. Dropping the returned future cancels the wait.
    ///
    /// Once this returns (or its future is dropped) the supervisor's event
    /// subscription is released: later events are ignored, so a later loss of
    /// connectivity goes unnoticed.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectTimeout`] if a [`ConnectWait::Within`] limit passed first.
    pub async fn await_outcome(self) -> Result<StationOutcome> {
        match self.connect_wait {
            ConnectWait::Forever => Ok(self.station_static.outcome.wait().await),
            ConnectWait::Within(timeout) => with_timeout(timeout, self.station_static.outcome.wait())
                .await
                .map_err(|_| Error::ConnectTimeout),
        }
    }
}

impl Drop for Station<'_> {
    fn drop(&mut self) {
        self.station_static.released.store(true, Ordering::Release);
    }
}

/// The event-handling half: the sole writer of [`ConnectionState`] and the retry count.
///
/// See the [module-level example](self) for usage.
pub struct StationSupervisor<'a> {
    station_static: &'a StationStatic,
    config: StationConfig,
    state: ConnectionState,
    retry_count: u8,
    connect_attempts: u32,
    address: Option<Ipv4Addr>,
    outcome_reported: bool,
}

impl StationSupervisor<'_> {
    /// Begin association with the configured access point (`Idle → Connecting`).
    ///
    /// The radio driver should start the radio afterwards and report
    /// [`StationEvent::Started`].
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] on any call after the first.
    /// - [`Error::InitializationFailure`] if the SSID or password can't be used.
    pub fn start(&mut self) -> Result<()> {
        if self.state != ConnectionState::Idle {
            return Err(Error::AlreadyStarted);
        }
        self.config.validate()?;
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Advance the state machine by one event and say what the radio must do next.
    ///
    /// Never blocks. Events before [`start`](Self::start), after
    /// [`ConnectionState::Failed`], or after the subscription was released are ignored.
    pub fn handle_event(&mut self, event: StationEvent) -> StationAction {
        if !self.is_subscribed() {
            return StationAction::Wait;
        }
        match (self.state, event) {
            (ConnectionState::Idle | ConnectionState::Failed, _) => StationAction::Wait,
            (_, StationEvent::Started) => {
                self.state = ConnectionState::Connecting;
                self.issue_connect()
            }
            (_, StationEvent::Disconnected) => {
                if self.retry_count < self.config.max_retries {
                    self.retry_count = self.retry_count.saturating_add(1);
                    self.state = ConnectionState::Retrying;
                    self.issue_connect()
                } else {
                    self.state = ConnectionState::Failed;
                    self.report(StationOutcome::Failed);
                    StationAction::Wait
                }
            }
            (_, StationEvent::GotAddress(address)) => {
                self.retry_count = 0;
                self.address = Some(address);
                self.state = ConnectionState::Connected;
                self.report(StationOutcome::Connected(address));
                StationAction::Wait
            }
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts made since the last successful connection.
    #[must_use]
    pub const fn retry_count(&self) -> u8 {
        self.retry_count
    }

    /// Connect attempts issued in total, the first one included.
    #[must_use]
    pub const fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    /// Address recorded by the last [`StationEvent::GotAddress`].
    #[must_use]
    pub const fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }

    /// Settings this supervisor was built with.
    #[must_use]
    pub const fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Whether events are still being processed.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        !self.station_static.released.load(Ordering::Acquire)
    }

    fn issue_connect(&mut self) -> StationAction {
        self.connect_attempts = self.connect_attempts.saturating_add(1);
        StationAction::Connect
    }

    // Only the first outcome is reported.
    fn report(&mut self, outcome: StationOutcome) {
        if !self.outcome_reported {
            self.outcome_reported = true;
            self.station_static.outcome.signal(outcome);
        }
    }
}

#[cfg(not(feature = "host"))]
impl defmt::Format for StationEvent {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            Self::Started => defmt::write!(f, "Started"),
            Self::Disconnected => defmt::write!(f, "Disconnected"),
            Self::GotAddress(address) => {
                let [a, b, c, d] = address.octets();
                defmt::write!(f, "GotAddress({}.{}.{}.{})", a, b, c, d);
            }
        }
    }
}

#[cfg(not(feature = "host"))]
impl defmt::Format for StationOutcome {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            Self::Connected(address) => {
                let [a, b, c, d] = address.octets();
                defmt::write!(f, "Connected({}.{}.{}.{})", a, b, c, d);
            }
            Self::Failed => defmt::write!(f, "Failed"),
        }
    }
}
