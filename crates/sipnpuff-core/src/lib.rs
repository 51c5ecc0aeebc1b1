//! Hardware-independent core of the sipnpuff breath-switch input.
//!
//! A user sips or puffs into a tube connected to a BMP280 pressure sensor.
//! This crate turns the sensor's absolute readings into one of eight
//! discrete gestures:
//!
//! - [`sensors`]: bus transports and the BMP280 protocol driver,
//! - [`input`]: ambient pressure tracking, the gesture state machine and
//!   the events it emits,
//! - [`config`]: the tunables of all of the above.
//!
//! It is `#![no_std]` and allocation free so it runs on the device as well
//! as on desktop hosts (for the simulator and tests).

#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod input;
pub mod pressure_bar;
pub mod sensors;
pub mod time;

pub use config::{ConfigError, InputConfig};
