#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

use core::{convert::Infallible, panic};
use duty_station::{
    Result,
    pwm_output::{CHANNEL_BINDINGS, PwmOutput},
    pwm_resolve::resolve,
};
use embassy_executor::Spawner;
use embassy_rp::pwm::{Config, Pwm};
use embassy_time::Timer;
use {defmt::info, defmt_rtt as _, panic_probe as _};

const FREQUENCY_HZ: u32 = 1_000;

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(_spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    // GPIO 16 (slice 0, output A), e.g. an LED through a resistor
    let mut output = PwmOutput::new(
        Pwm::new_output_a(p.PWM_SLICE0, p.PIN_16, Config::default()),
        CHANNEL_BINDINGS[0],
    );
    info!("pwm_sweep: timer clock {} Hz", output.timer_clock_hz());

    // Ramp duty 0..=100 % in 10 % steps, then back off.
    for duty_percent in (0..=100_u8).step_by(10).cycle() {
        let resolution = resolve(FREQUENCY_HZ, duty_percent, output.timer_clock_hz())?;
        output.apply(FREQUENCY_HZ, resolution)?;
        Timer::after_millis(500).await;
        if duty_percent == 100 {
            output.disable();
            Timer::after_millis(1_000).await;
        }
    }

    core::future::pending().await
}
