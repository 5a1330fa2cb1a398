//! Math utilities for the actuation core.
//!
//! - `pwm`: duty cycle / pulse width / degree to PWM level mapping.
//! - `cadence`: speed band tables that pace servo steps.

pub mod cadence;
pub mod pwm;

pub use cadence::{CadenceTable, SpeedBand};
