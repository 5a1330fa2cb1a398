//! Real-time actuation core for a microcontroller robot arm / rover.
//!
//! Bytes from a transport are framed, queued, decoded into commands and
//! applied to per-actuator state; a fixed tick turns that state into DC motor
//! duty cycles and rate-limited servo pulses. See `rac-app/mock-mcu` for a
//! host run of the whole pipeline.
#![no_std]

#[cfg(test)]
use critical_section as _;

pub mod utils;
