//! Actuation core of the robot arm / rover controller.
//!
//! - `connection`: frame decoding and the interrupt-to-consumer command queue
//! - `controllers`: command dispatch, actuator state, motion engine and outputs
//! - `math`: PWM mapping and servo speed cadence
//! - `config`: machine description (servo geometry, channel wiring, tick)
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod connection;
pub mod controllers;
pub mod math;

pub use config::ControllerConfig;
pub use controllers::{ActuationController, Dispatcher};

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// Expands to a function-local `static_cell::StaticCell<$t>`, so each call
/// site can run once; returns `&'static mut $t`.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
