#![cfg_attr(not(test), no_std)]
#![allow(
    async_fn_in_trait,
    reason = "collaborators run on a single-core executor; Send bounds are not needed"
)]

//! Hardware-independent bring-up logic for the radio tester firmware.
//!
//! Everything that talks to the radio, the serial port or the watchdog goes
//! through a trait defined here, so the whole start-up sequence can be driven
//! from host tests with scripted collaborators.

pub mod boot;
pub mod bringup;
pub mod commands;
pub mod console;
pub mod net;
pub mod watchdog;
