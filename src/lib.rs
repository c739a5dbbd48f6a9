//! Solar charge controller firmware library.
//!
//! Exposes the DC/DC control core, the safety path and the port adapters
//! for integration testing and simulation. All ESP-IDF-specific code is
//! guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod dcdc;
pub mod error;
pub mod port;
pub mod safety;

pub mod adapters;
pub mod drivers;
pub mod pins;
