//! A device abstraction that drives the two PWM outputs from resolved parameters.
//!
//! [`SlicePlan`] turns a [`PwmResolution`] into RP2040/RP2350 slice register values
//! (`top`, `compare`, and the 8.4 fixed-point clock divider). [`PwmOutput`] writes
//! a plan to one slice output. The logical outputs are fixed at compile time in
//! [`CHANNEL_BINDINGS`].
//!
//! Each output's registers have a single writer: the request front end applies one
//! form submission at a time.

#[cfg(not(feature = "host"))]
use defmt::info;
#[cfg(not(feature = "host"))]
use embassy_rp::clocks::clk_sys_freq;
#[cfg(not(feature = "host"))]
use embassy_rp::pwm::{Config, Pwm};
use fixed::FixedU16;
use fixed::types::extra::U4;

use crate::pwm_resolve::PwmResolution;
use crate::{Error, Result};

/// Number of logical PWM outputs served by the front end.
pub const CHANNEL_COUNT: usize = 2;

/// Compile-time wiring of the logical outputs. Index with the logical channel number.
pub const CHANNEL_BINDINGS: [ChannelBinding; CHANNEL_COUNT] = [
    ChannelBinding {
        slice: 0,
        gpio: 16,
        output: SliceOutput::A,
        clock_source: ClockSource::SysClk,
    },
    ChannelBinding {
        slice: 1,
        gpio: 18,
        output: SliceOutput::A,
        clock_source: ClockSource::SysClk,
    },
];

const COUNTER_STEPS: u64 = 1 << 16;
const DIVIDER_ONE: u64 = 16; // 1.0 in 8.4 fixed point
const DIVIDER_LIMIT: u64 = 256 * 16; // first value that does not fit 8.4

/// Which of a slice's two outputs a channel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum SliceOutput {
    /// Even GPIO of the pair, compare register A.
    A,
    /// Odd GPIO of the pair, compare register B.
    B,
}

/// Clock feeding a slice's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum ClockSource {
    /// The system clock (`clk_sys`), 125 MHz on a stock Pico 1 and 150 MHz on a Pico 2.
    SysClk,
}

/// Where one logical PWM channel lives in hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct ChannelBinding {
    /// PWM slice (the timer).
    pub slice: u8,
    /// GPIO number driven by the slice output.
    pub gpio: u8,
    /// Slice output A or B.
    pub output: SliceOutput,
    /// Counter clock.
    pub clock_source: ClockSource,
}

/// Register values that realize one resolved PWM request on a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct SlicePlan {
    top: u16,
    compare: u16,
    divider_sixteenths: u16,
}

impl SlicePlan {
    /// Plan registers for `frequency_hz` with the duty fraction in `resolution`.
    ///
    /// The divider is the smallest 8.4 value (at least 1) that fits one period in the
    /// 16-bit counter. The duty count is rescaled from `2^resolution_bits` steps to
    /// the `top + 1` steps the counter actually has, so both the frequency and the
    /// duty fraction survive even when the resolution is wider than the counter.
    /// A 100 % duty on a full 65 536-step period saturates at `u16::MAX`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `frequency_hz` or `timer_clock_hz` is zero.
    /// - [`Error::FrequencyUnreachable`] if the period needs a divider of 256 or more,
    ///   or has fewer than two counter steps.
    pub fn new(frequency_hz: u32, resolution: PwmResolution, timer_clock_hz: u32) -> Result<Self> {
        if frequency_hz == 0 {
            return Err(Error::InvalidParameter("frequency_hz must be greater than zero"));
        }
        if timer_clock_hz == 0 {
            return Err(Error::InvalidParameter(
                "timer_clock_hz must be greater than zero",
            ));
        }
        let frequency = u64::from(frequency_hz);
        let clock_sixteenths = u64::from(timer_clock_hz).saturating_mul(DIVIDER_ONE);

        let divider_sixteenths = clock_sixteenths
            .div_ceil(frequency.saturating_mul(COUNTER_STEPS))
            .max(DIVIDER_ONE);
        if divider_sixteenths >= DIVIDER_LIMIT {
            return Err(Error::FrequencyUnreachable(frequency_hz));
        }

        let ticks_per_divided_period = frequency.saturating_mul(divider_sixteenths);
        let steps = clock_sixteenths
            .saturating_add(ticks_per_divided_period / 2)
            / ticks_per_divided_period;
        let steps = steps.min(COUNTER_STEPS);
        if steps < 2 {
            return Err(Error::FrequencyUnreachable(frequency_hz));
        }

        let period_counts = resolution.period_counts();
        let compare = resolution
            .duty_count()
            .saturating_mul(steps)
            .saturating_add(period_counts / 2)
            / period_counts;

        Ok(Self {
            top: u16::try_from(steps.saturating_sub(1)).unwrap_or(u16::MAX),
            compare: u16::try_from(compare).unwrap_or(u16::MAX),
            divider_sixteenths: u16::try_from(divider_sixteenths).unwrap_or(u16::MAX),
        })
    }

    /// Counter wrap value; the period is `top + 1` divided clock ticks.
    #[must_use]
    pub const fn top(&self) -> u16 {
        self.top
    }

    /// Output stays high while the counter is below this value.
    #[must_use]
    pub const fn compare(&self) -> u16 {
        self.compare
    }

    /// Clock divider in 8.4 fixed point.
    #[must_use]
    pub const fn divider(&self) -> FixedU16<U4> {
        FixedU16::from_bits(self.divider_sixteenths)
    }
}

/// A device abstraction for one PWM output bound by a [`ChannelBinding`].
///
/// # Example
/// ```rust,ignore
/// use duty_station::pwm_output::{CHANNEL_BINDINGS, PwmOutput};
/// use duty_station::pwm_resolve::resolve;
/// use embassy_rp::pwm::{Config, Pwm};
///
/// async fn example(p: embassy_rp::Peripherals) -> duty_station::Result<()> {
///     let pwm = Pwm::new_output_a(p.PWM_SLICE0, p.PIN_16, Config::default());
///     let mut output = PwmOutput::new(pwm, CHANNEL_BINDINGS[0]);
///
///     let resolution = resolve(1_000, 25, output.timer_clock_hz())?;
///     output.apply(1_000, resolution)?; // 1 kHz, 25 % duty
///     output.disable();                 // hold the pin low
///     Ok(())
/// }
/// ```
#[cfg(not(feature = "host"))]
pub struct PwmOutput<'d> {
    pwm: Pwm<'d>,
    cfg: Config, // Keep the config so later writes don't reset the divider
    binding: ChannelBinding,
}

#[cfg(not(feature = "host"))]
impl<'d> PwmOutput<'d> {
    /// Wrap a slice output created with `Pwm::new_output_a` or `Pwm::new_output_b`.
    ///
    /// The output starts disabled.
    #[must_use]
    pub fn new(mut pwm: Pwm<'d>, binding: ChannelBinding) -> Self {
        let mut cfg = Config::default();
        cfg.phase_correct = false;
        cfg.enable = false;
        pwm.set_config(&cfg);
        Self { pwm, cfg, binding }
    }

    /// Frequency of the clock feeding this slice's counter, for [`crate::pwm_resolve::resolve`].
    #[must_use]
    pub fn timer_clock_hz(&self) -> u32 {
        match self.binding.clock_source {
            ClockSource::SysClk => clk_sys_freq(),
        }
    }

    /// Program frequency and duty, then enable the output.
    ///
    /// Nothing is written if the plan can't be built.
    ///
    /// # Errors
    ///
    /// See [`SlicePlan::new`].
    pub fn apply(&mut self, frequency_hz: u32, resolution: PwmResolution) -> Result<SlicePlan> {
        let plan = SlicePlan::new(frequency_hz, resolution, self.timer_clock_hz())?;
        self.cfg.top = plan.top();
        self.cfg.divider = plan.divider();
        match self.binding.output {
            SliceOutput::A => self.cfg.compare_a = plan.compare(),
            SliceOutput::B => self.cfg.compare_b = plan.compare(),
        }
        self.cfg.enable = true;
        self.pwm.set_config(&self.cfg);
        info!(
            "PwmOutput gpio={} slice={}: {}Hz bits={} count={} -> {}",
            self.binding.gpio,
            self.binding.slice,
            frequency_hz,
            resolution.resolution_bits(),
            resolution.duty_count(),
            plan
        );
        Ok(plan)
    }

    /// Stop the slice. The pin stays low until the next [`apply`](Self::apply).
    pub fn disable(&mut self) {
        self.cfg.enable = false;
        self.pwm.set_config(&self.cfg);
    }

    /// Hardware wiring of this output.
    #[must_use]
    pub const fn binding(&self) -> ChannelBinding {
        self.binding
    }
}
