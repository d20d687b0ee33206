#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]
#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::{convert::Infallible, panic};
use duty_station::{
    Error, Result,
    front_end::FrontEnd,
    pwm_output::{CHANNEL_BINDINGS, PwmOutput},
    station::{StationConfig, StationOutcome},
    wifi_station::{WifiStation, WifiStationStatic},
};
use embassy_executor::Spawner;
use embassy_rp::pwm::{Config, Pwm};
use {
    defmt::{error, info, warn},
    defmt_rtt as _, panic_probe as _,
};

// Set at build time: SSID=... PASSWORD=... cargo run --bin pwm_station --features wifi
const SSID: &str = env!("SSID");
const PASSWORD: &str = env!("PASSWORD");

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    error!("pwm_station: fatal: {}", err);
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    let [binding0, binding1] = CHANNEL_BINDINGS;
    let outputs = [
        PwmOutput::new(
            Pwm::new_output_a(p.PWM_SLICE0, p.PIN_16, Config::default()),
            binding0,
        ),
        PwmOutput::new(
            Pwm::new_output_a(p.PWM_SLICE1, p.PIN_18, Config::default()),
            binding1,
        ),
    ];

    static WIFI_STATION_STATIC: WifiStationStatic = WifiStation::new_static();
    let (station, stack) = WifiStation::start(
        &WIFI_STATION_STATIC,
        StationConfig::new(SSID, PASSWORD),
        p.PIN_23,  // CYW43 power
        p.PIN_25,  // CYW43 chip select
        p.PIO0,    // CYW43 PIO
        p.PIN_24,  // CYW43 clock
        p.PIN_29,  // CYW43 data
        p.DMA_CH0, // CYW43 DMA
        spawner,
    )
    .await?;

    let outcome = match station.await_outcome().await {
        Ok(outcome) => outcome,
        Err(Error::ConnectTimeout) => StationOutcome::Failed,
        Err(err) => return Err(err),
    };
    match outcome {
        StationOutcome::Connected(address) => {
            let [a, b, c, d] = address.octets();
            info!("pwm_station: open http://{}.{}.{}.{}/", a, b, c, d);
        }
        StationOutcome::Failed => {
            warn!("pwm_station: could not join {}; outputs stay off", SSID);
        }
    }

    let mut front_end = FrontEnd::new(outputs, SSID, outcome);
    front_end.serve(stack).await
}
