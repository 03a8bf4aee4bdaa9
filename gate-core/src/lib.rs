#![no_std]

// Shared logic for the gate controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware, clocks, and persistent storage are reached
// only through the traits in `io`, `time`, and `storage`.

pub mod config;
pub mod controller;
pub mod indicator;
pub mod io;
pub mod learner;
pub mod machine;
pub mod position;
pub mod storage;
pub mod telemetry;
pub mod time;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;
