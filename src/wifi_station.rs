//! A device abstraction that brings up the Pico W's CYW43 radio in station mode and
//! lets a [`StationSupervisor`] decide when to join.
//!
//! See [`WifiStation`] for usage.
#![allow(clippy::future_not_send, reason = "single-threaded")]

use cyw43::JoinOptions;
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_net::{Config, Stack, StackResources};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIN_23, PIN_24, PIN_25, PIN_29, PIO0};
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_rp::{Peri, bind_interrupts};
use static_cell::StaticCell;

use crate::station::{
    Station, StationAction, StationConfig, StationEvent, StationStatic, StationSupervisor,
};
use crate::{Error, Result};

const SOCKET_COUNT: usize = 4;
const NET_SEED: u64 = 0x5d2a_91c4_e07b_3f68;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

/// Static for [`WifiStation`]. See [`WifiStation`] for usage.
pub struct WifiStationStatic {
    station: StationStatic,
    cyw43_state: StaticCell<cyw43::State>,
    resources: StaticCell<StackResources<SOCKET_COUNT>>,
}

/// A device abstraction for the CYW43 radio as a Wi-Fi station.
///
/// [`WifiStation::start`] powers the radio, spawns its runner tasks, starts the
/// supervisor, and spawns the task that turns join results into [`StationEvent`]s.
/// It returns at once with the [`Station`] to await and the network stack.
///
/// # Example
/// ```rust,no_run
/// # #![no_std]
/// # #![no_main]
/// # use panic_probe as _;
/// use duty_station::Result;
/// use duty_station::station::{ConnectWait, StationConfig, StationOutcome};
/// use duty_station::wifi_station::{WifiStation, WifiStationStatic};
/// use embassy_time::Duration;
///
/// async fn example(spawner: embassy_executor::Spawner) -> Result<()> {
///     let p = embassy_rp::init(Default::default());
///
///     static WIFI_STATION_STATIC: WifiStationStatic = WifiStation::new_static();
///     let config = StationConfig::new("my-network", "my-password")
///         .with_connect_wait(ConnectWait::Within(Duration::from_secs(60)));
///     let (station, stack) = WifiStation::start(
///         &WIFI_STATION_STATIC,
///         config,
///         p.PIN_23,  // CYW43 power
///         p.PIN_25,  // CYW43 chip select
///         p.PIO0,    // CYW43 PIO
///         p.PIN_24,  // CYW43 clock
///         p.PIN_29,  // CYW43 data
///         p.DMA_CH0, // CYW43 DMA
///         spawner,
///     )
///     .await?;
///
///     match station.await_outcome().await? {
///         StationOutcome::Connected(address) => defmt::info!("up at {}", address.octets()),
///         StationOutcome::Failed => defmt::info!("gave up; running offline"),
///     }
///     let _ = stack;
///     Ok(())
/// }
/// ```
pub struct WifiStation;

impl WifiStation {
    /// Create [`WifiStation`] resources.
    #[must_use]
    pub const fn new_static() -> WifiStationStatic {
        WifiStationStatic {
            station: Station::new_static(),
            cyw43_state: StaticCell::new(),
            resources: StaticCell::new(),
        }
    }

    /// Power the radio, start the supervisor, and begin joining in the background.
    ///
    /// Call once per `wifi_station_static`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if this was already called with `wifi_station_static`.
    ///   The running station is left alone.
    /// - [`Error::InitializationFailure`] if the credentials are unusable or a task can't
    ///   be spawned.
    ///
    /// The caller should treat either as fatal.
    #[expect(clippy::too_many_arguments, reason = "one argument per radio pin")]
    pub async fn start(
        wifi_station_static: &'static WifiStationStatic,
        config: StationConfig,
        pin_23: Peri<'static, PIN_23>,
        pin_25: Peri<'static, PIN_25>,
        pio0: Peri<'static, PIO0>,
        pin_24: Peri<'static, PIN_24>,
        pin_29: Peri<'static, PIN_29>,
        dma_ch0: Peri<'static, DMA_CH0>,
        spawner: Spawner,
    ) -> Result<(Station<'static>, Stack<'static>)> {
        let (station, mut supervisor) = Station::new(&wifi_station_static.station, config)?;
        supervisor.start()?;
        let cyw43_state = wifi_station_static
            .cyw43_state
            .try_init(cyw43::State::new())
            .ok_or(Error::AlreadyStarted)?;
        let resources = wifi_station_static
            .resources
            .try_init(StackResources::new())
            .ok_or(Error::AlreadyStarted)?;

        info!("WifiStation: powering radio");
        let fw = cyw43_firmware::CYW43_43439A0;
        let clm = cyw43_firmware::CYW43_43439A0_CLM;
        let pwr = Output::new(pin_23, Level::Low);
        let cs = Output::new(pin_25, Level::High);
        let mut pio = Pio::new(pio0, Irqs);
        let spi = PioSpi::new(
            &mut pio.common,
            pio.sm0,
            DEFAULT_CLOCK_DIVIDER,
            pio.irq0,
            cs,
            pin_24,
            pin_29,
            dma_ch0,
        );
        let (net_device, mut control, runner) = cyw43::new(cyw43_state, pwr, spi, fw).await;
        spawner.spawn(wifi_task(runner)).map_err(spawn_failure)?;

        control.init(clm).await;
        control
            .set_power_management(cyw43::PowerManagementMode::PowerSave)
            .await;

        let (stack, net_runner) = embassy_net::new(
            net_device,
            Config::dhcpv4(Default::default()),
            resources,
            NET_SEED,
        );
        spawner.spawn(net_task(net_runner)).map_err(spawn_failure)?;
        spawner.spawn(station_task(control, stack, supervisor)).map_err(spawn_failure)?;
        Ok((station, stack))
    }
}

fn spawn_failure(err: embassy_executor::SpawnError) -> Error {
    warn!("WifiStation: {}", Error::TaskSpawn(err));
    Error::InitializationFailure("WifiStation task spawn failed")
}

#[embassy_executor::task]
async fn wifi_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

// Runs the supervisor's directives until it has nothing more to ask of the radio.
#[embassy_executor::task]
async fn station_task(
    mut control: cyw43::Control<'static>,
    stack: Stack<'static>,
    mut supervisor: StationSupervisor<'static>,
) {
    let config = *supervisor.config();
    let ssid = config.ssid();
    let mut action = supervisor.handle_event(StationEvent::Started);
    while action == StationAction::Connect {
        info!(
            "WifiStation: joining {} (attempt {}, retry {})",
            ssid,
            supervisor.connect_attempts(),
            supervisor.retry_count()
        );
        let options = if config.is_open() {
            JoinOptions::new_open()
        } else {
            JoinOptions::new(config.password().as_bytes())
        };
        let event = match control.join(ssid, options).await {
            Ok(()) => {
                stack.wait_config_up().await;
                match stack.config_v4() {
                    Some(ipv4) => StationEvent::GotAddress(ipv4.address.address()),
                    None => StationEvent::Disconnected,
                }
            }
            Err(err) => {
                warn!("WifiStation: join failed, status {}", err.status);
                StationEvent::Disconnected
            }
        };
        info!("WifiStation: {}", event);
        action = supervisor.handle_event(event);
    }
    info!("WifiStation: supervisor done in state {}", supervisor.state());
}
