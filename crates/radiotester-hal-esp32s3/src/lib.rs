#![no_std]

//! ESP32-S3 implementations of the radio tester's hardware traits.

pub mod network;
pub mod ticker;
pub mod watchdog;
