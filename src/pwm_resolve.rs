//! Converts a requested PWM frequency and duty percentage into timer resolution bits
//! and a duty count.
//!
//! The conversion is a pure function with no shared state, so any number of request
//! handlers may call [`resolve`] at once. See [`resolve`] for the formula and the
//! inputs it rejects.
//!
//! # Example
//!
//! ```rust
//! use duty_station::pwm_resolve::{PwmChannelRequest, resolve};
//!
//! // 1 kHz at 25 % on an 80 MHz timer clock.
//! let resolution = resolve(1_000, 25, 80_000_000)?;
//! assert_eq!(resolution.resolution_bits(), 16);
//! assert_eq!(resolution.duty_count(), 16_384);
//!
//! // The same thing, starting from a request value.
//! let request = PwmChannelRequest::new(1_000, 25, 80_000_000);
//! assert_eq!(request.resolve()?, resolution);
//! # Ok::<(), duty_station::Error>(())
//! ```

use crate::{Error, Result};

/// Largest accepted duty percentage.
pub const MAX_DUTY_PERCENT: u8 = 100;

const PERCENT_SCALE: u64 = 100;

/// One request to drive a PWM channel, as produced by a form submission.
///
/// A request is a plain value: it has no identity and owns no hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct PwmChannelRequest {
    /// Output frequency in hertz. Must be greater than zero.
    pub frequency_hz: u32,
    /// High-time fraction of each period, `0..=100`.
    pub duty_percent: u8,
    /// Frequency of the clock feeding the PWM counter, in hertz. Must be greater than zero.
    pub timer_clock_hz: u32,
}

impl PwmChannelRequest {
    /// Bundle the three resolver inputs.
    #[must_use]
    pub const fn new(frequency_hz: u32, duty_percent: u8, timer_clock_hz: u32) -> Self {
        Self {
            frequency_hz,
            duty_percent,
            timer_clock_hz,
        }
    }

    /// Resolve this request. See [`resolve`].
    ///
    /// # Errors
    ///
    /// Same as [`resolve`].
    pub fn resolve(&self) -> Result<PwmResolution> {
        resolve(self.frequency_hz, self.duty_percent, self.timer_clock_hz)
    }
}

/// Timer parameters derived from a [`PwmChannelRequest`].
///
/// Always satisfies `duty_count <= 2^resolution_bits`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct PwmResolution {
    resolution_bits: u32,
    duty_count: u64,
}

impl PwmResolution {
    /// Number of counter steps per period, as a power of two.
    #[must_use]
    pub const fn resolution_bits(&self) -> u32 {
        self.resolution_bits
    }

    /// Compare value, in units of `1/2^resolution_bits` of a period.
    #[must_use]
    pub const fn duty_count(&self) -> u64 {
        self.duty_count
    }

    /// Counter steps in one full period (`2^resolution_bits`).
    #[must_use]
    pub const fn period_counts(&self) -> u64 {
        1_u64 << self.resolution_bits
    }
}

/// Convert `(frequency_hz, duty_percent, timer_clock_hz)` into a [`PwmResolution`].
///
/// 1. `ratio = frequency_hz / timer_clock_hz`
/// 2. `resolution_bits = trunc(|log2(ratio)|)`, truncated toward zero
/// 3. `duty_count = floor(2^resolution_bits * duty_percent / 100)`
///
/// Because of the absolute value, a frequency far below the timer clock (the usual
/// case) gives `floor(log2(timer_clock_hz / frequency_hz))` bits, so `2^bits` never
/// exceeds the timer ticks in one output period. A frequency equal to the timer clock
/// gives zero bits.
///
/// # Errors
///
/// - [`Error::InvalidParameter`] if `frequency_hz` or `timer_clock_hz` is zero.
/// - [`Error::DutyOutOfRange`] if `duty_percent` is above 100. Out-of-range duty is
///   rejected, never clamped, so an invalid count can't reach the hardware.
pub fn resolve(frequency_hz: u32, duty_percent: u8, timer_clock_hz: u32) -> Result<PwmResolution> {
    if frequency_hz == 0 {
        return Err(Error::InvalidParameter("frequency_hz must be greater than zero"));
    }
    if timer_clock_hz == 0 {
        return Err(Error::InvalidParameter(
            "timer_clock_hz must be greater than zero",
        ));
    }
    if duty_percent > MAX_DUTY_PERCENT {
        return Err(Error::DutyOutOfRange(duty_percent));
    }

    let ratio = f64::from(frequency_hz) / f64::from(timer_clock_hz);
    // Both inputs are nonzero u32 values, so |log2(ratio)| <= 32 and the cast is exact.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is a truncated magnitude in 0.0..=32.0"
    )]
    let resolution_bits = libm::trunc(libm::fabs(libm::log2(ratio))) as u32;

    let period_counts = 1_u64 << resolution_bits;
    let duty_count = period_counts.saturating_mul(u64::from(duty_percent)) / PERCENT_SCALE;

    Ok(PwmResolution {
        resolution_bits,
        duty_count,
    })
}
