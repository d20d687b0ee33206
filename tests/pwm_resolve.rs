#![allow(missing_docs)]
#![cfg(feature = "host")]
//! Host-level tests for PWM parameter resolution and slice register planning.

use duty_station::Error;
use duty_station::pwm_output::{CHANNEL_BINDINGS, CHANNEL_COUNT, SliceOutput, SlicePlan};
use duty_station::pwm_resolve::{MAX_DUTY_PERCENT, PwmChannelRequest, resolve};

const CLOCK_80_MHZ: u32 = 80_000_000;
const CLOCK_125_MHZ: u32 = 125_000_000;

#[test]
fn one_khz_quarter_duty_on_80_mhz() -> duty_station::Result<()> {
    let resolution = resolve(1_000, 25, CLOCK_80_MHZ)?;
    assert_eq!(resolution.resolution_bits(), 16);
    assert_eq!(resolution.duty_count(), 16_384);
    assert_eq!(resolution.period_counts(), 65_536);
    Ok(())
}

#[test]
fn one_khz_quarter_duty_on_125_mhz() -> duty_station::Result<()> {
    // log2(125_000) is about 16.93, truncated to 16
    let resolution = resolve(1_000, 25, CLOCK_125_MHZ)?;
    assert_eq!(resolution.resolution_bits(), 16);
    assert_eq!(resolution.duty_count(), 16_384);
    Ok(())
}

#[test]
fn fractional_bits_truncate_toward_zero() -> duty_station::Result<()> {
    // log2(80_000_000 / 700) is about 16.80
    let resolution = resolve(700, 50, CLOCK_80_MHZ)?;
    assert_eq!(resolution.resolution_bits(), 16);
    assert_eq!(resolution.duty_count(), 32_768);
    // log2(80_000_000 / 3_000) is about 14.70
    assert_eq!(resolve(3_000, 50, CLOCK_80_MHZ)?.resolution_bits(), 14);
    // log2(6_000_000 / 1_000_000) is about 2.58 on the other side of the clock
    assert_eq!(resolve(6_000_000, 50, 1_000_000)?.resolution_bits(), 2);
    Ok(())
}

#[test]
fn frequency_equal_to_clock_gives_zero_bits() -> duty_station::Result<()> {
    assert_eq!(resolve(CLOCK_80_MHZ, 100, CLOCK_80_MHZ)?.resolution_bits(), 0);
    assert_eq!(resolve(CLOCK_80_MHZ, 100, CLOCK_80_MHZ)?.duty_count(), 1);
    assert_eq!(resolve(CLOCK_80_MHZ, 50, CLOCK_80_MHZ)?.duty_count(), 0);
    Ok(())
}

#[test]
fn frequency_above_clock_uses_magnitude_of_log() -> duty_station::Result<()> {
    let resolution = resolve(4_000_000, 50, 1_000_000)?;
    assert_eq!(resolution.resolution_bits(), 2);
    assert_eq!(resolution.duty_count(), 2);
    Ok(())
}

#[test]
fn duty_count_floors() -> duty_station::Result<()> {
    // 2^16 * 33 / 100 = 21626.88
    assert_eq!(resolve(1_000, 33, CLOCK_80_MHZ)?.duty_count(), 21_626);
    Ok(())
}

#[test]
fn zero_frequency_is_invalid() {
    assert!(matches!(
        resolve(0, 50, CLOCK_80_MHZ),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn zero_timer_clock_is_invalid() {
    assert!(matches!(
        resolve(1_000, 50, 0),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn duty_above_100_is_rejected_not_clamped() {
    assert_eq!(resolve(1_000, 101, CLOCK_80_MHZ), Err(Error::DutyOutOfRange(101)));
    assert_eq!(resolve(1_000, u8::MAX, CLOCK_80_MHZ), Err(Error::DutyOutOfRange(255)));
}

#[test]
fn duty_count_never_exceeds_period() -> duty_station::Result<()> {
    let frequencies = [1, 7, 50, 1_000, 20_000, 1_000_000, CLOCK_125_MHZ, u32::MAX];
    let clocks = [1, 32_768, CLOCK_80_MHZ, CLOCK_125_MHZ, u32::MAX];
    for frequency_hz in frequencies {
        for timer_clock_hz in clocks {
            for duty_percent in 0..=MAX_DUTY_PERCENT {
                let resolution = resolve(frequency_hz, duty_percent, timer_clock_hz)?;
                assert!(resolution.resolution_bits() <= 32);
                assert!(
                    resolution.duty_count() <= resolution.period_counts(),
                    "{frequency_hz} Hz, {duty_percent} %, {timer_clock_hz} Hz clock"
                );
            }
            let full = resolve(frequency_hz, 100, timer_clock_hz)?;
            assert_eq!(full.duty_count(), full.period_counts());
            assert_eq!(resolve(frequency_hz, 0, timer_clock_hz)?.duty_count(), 0);
        }
    }
    Ok(())
}

#[test]
fn resolve_is_deterministic() -> duty_station::Result<()> {
    let request = PwmChannelRequest::new(2_500, 40, CLOCK_125_MHZ);
    let first = request.resolve()?;
    for _ in 0..100 {
        assert_eq!(request.resolve()?, first);
    }
    assert_eq!(resolve(2_500, 40, CLOCK_125_MHZ)?, first);
    Ok(())
}

#[test]
fn channel_bindings_are_fixed() {
    assert_eq!(CHANNEL_BINDINGS.len(), CHANNEL_COUNT);
    let gpios: Vec<u8> = CHANNEL_BINDINGS.iter().map(|binding| binding.gpio).collect();
    assert_eq!(gpios, [16, 18]);
    assert!(CHANNEL_BINDINGS
        .iter()
        .all(|binding| binding.output == SliceOutput::A && binding.slice == binding.gpio / 2 % 8));
}

#[test]
fn slice_plan_on_125_mhz() -> duty_station::Result<()> {
    let resolution = resolve(1_000, 25, CLOCK_125_MHZ)?;
    let plan = SlicePlan::new(1_000, resolution, CLOCK_125_MHZ)?;
    // divider 31/16 = 1.9375, 64516 steps per period, duty count 16384 of 2^16
    assert_eq!(plan.divider().to_bits(), 31);
    assert_eq!(plan.top(), 64_515);
    assert_eq!(plan.compare(), 16_129);
    Ok(())
}

#[test]
fn slice_plan_on_80_mhz() -> duty_station::Result<()> {
    let resolution = resolve(1_000, 25, CLOCK_80_MHZ)?;
    let plan = SlicePlan::new(1_000, resolution, CLOCK_80_MHZ)?;
    assert_eq!(plan.divider().to_bits(), 20);
    assert_eq!(plan.top(), 63_999);
    assert_eq!(plan.compare(), 16_000);
    Ok(())
}

#[test]
fn slice_plan_full_duty_on_full_counter_saturates() -> duty_station::Result<()> {
    let clock = 65_536_000;
    let resolution = resolve(1_000, 100, clock)?;
    assert_eq!(resolution.resolution_bits(), 16);
    let plan = SlicePlan::new(1_000, resolution, clock)?;
    assert_eq!(plan.divider().to_bits(), 16);
    assert_eq!(plan.top(), u16::MAX);
    assert_eq!(plan.compare(), u16::MAX);
    Ok(())
}

#[test]
fn slice_plan_zero_duty_stays_low() -> duty_station::Result<()> {
    let resolution = resolve(20_000, 0, CLOCK_125_MHZ)?;
    assert_eq!(SlicePlan::new(20_000, resolution, CLOCK_125_MHZ)?.compare(), 0);
    Ok(())
}

#[test]
fn slice_plan_rejects_too_low_frequency() -> duty_station::Result<()> {
    let resolution = resolve(7, 50, CLOCK_125_MHZ)?;
    assert_eq!(
        SlicePlan::new(7, resolution, CLOCK_125_MHZ),
        Err(Error::FrequencyUnreachable(7))
    );
    let resolution = resolve(8, 50, CLOCK_125_MHZ)?;
    assert!(SlicePlan::new(8, resolution, CLOCK_125_MHZ).is_ok());
    Ok(())
}

#[test]
fn slice_plan_rejects_too_high_frequency() -> duty_station::Result<()> {
    let resolution = resolve(CLOCK_125_MHZ, 50, CLOCK_125_MHZ)?;
    assert_eq!(
        SlicePlan::new(CLOCK_125_MHZ, resolution, CLOCK_125_MHZ),
        Err(Error::FrequencyUnreachable(CLOCK_125_MHZ))
    );
    let half = CLOCK_125_MHZ / 2;
    let resolution = resolve(half, 50, CLOCK_125_MHZ)?;
    assert_eq!(SlicePlan::new(half, resolution, CLOCK_125_MHZ)?.top(), 1);
    Ok(())
}

#[test]
fn slice_plan_rejects_zero_inputs() -> duty_station::Result<()> {
    let resolution = resolve(1_000, 50, CLOCK_80_MHZ)?;
    assert!(matches!(
        SlicePlan::new(0, resolution, CLOCK_80_MHZ),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        SlicePlan::new(1_000, resolution, 0),
        Err(Error::InvalidParameter(_))
    ));
    Ok(())
}
