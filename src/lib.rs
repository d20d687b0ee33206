//! Firmware building blocks for a Pico W that keeps one Wi-Fi station association
//! and drives two PWM outputs from a small web form.
//!
//! # Glossary
//!
//! - **Station**: the Pico's role as a Wi-Fi client joining an access point (AP).
//! - **PWM ([Pulse Width Modulation](https://en.wikipedia.org/wiki/Pulse-width_modulation)) Slices:** Both Pico 1 and 2 have 8 or more slices
//!   (each with an A and B output). These "slices" are unrelated to Rust slices.
//! - **Resolution bits**: the number of counter steps, as a power of two, in one PWM period.
//! - **Duty count**: the compare value, in units of `1/2^resolution_bits` of a period.
//!
//! The pure pieces ([`pwm_resolve`], [`station`], the register planning in [`pwm_output`],
//! and the parsing/rendering half of [`front_end`]) build and test on the host with
//! `--no-default-features --features host`.
#![cfg_attr(not(feature = "host"), no_std)]
#![cfg_attr(not(feature = "host"), no_main)]

// Compile-time checks: exactly one board must be selected (unless testing with host feature)
#[cfg(all(not(any(feature = "pico1", feature = "pico2")), not(feature = "host")))]
compile_error!("Must enable exactly one board feature: 'pico1' or 'pico2'");

#[cfg(all(feature = "pico1", feature = "pico2"))]
compile_error!("Cannot enable both 'pico1' and 'pico2' features simultaneously");

// Compile-time check: the firmware only targets the ARM cores
#[cfg(all(not(feature = "arm"), not(feature = "host")))]
compile_error!("Must enable the 'arm' architecture feature");

#[cfg(all(feature = "host", any(feature = "pico1", feature = "pico2")))]
compile_error!("The 'host' feature needs --no-default-features (no board feature)");

mod error;
pub mod front_end;
pub mod pwm_output;
pub mod pwm_resolve;
pub mod station;
// This module requires embassy_rp and cyw43 and is excluded when testing on host
#[cfg(all(feature = "wifi", not(feature = "host")))]
pub mod wifi_station;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};

/// Boot ROM image definition, required by the RP2350.
#[cfg(all(feature = "pico2", not(feature = "host")))]
#[expect(unsafe_code, reason = "the boot ROM reads this block at a fixed section")]
#[unsafe(link_section = ".start_block")]
#[used]
pub static IMAGE_DEF: embassy_rp::block::ImageDef = embassy_rp::block::ImageDef::secure_exe();
