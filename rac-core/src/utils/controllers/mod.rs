//! Actuation control.
//!
//! - `command`: wire format of commands and framed payloads
//! - `actuators`: per-actuator runtime state behind a critical-section mutex
//! - `dispatcher`: applies commands to the actuator table
//! - `engine`: per-tick failsafe, DC duty and servo stepping
//! - `outputs`: PWM back-ends and DC motor direction pins
//!
//! [`ActuationController`] ties the table to the hardware and runs the tick.

pub mod actuators;
pub mod command;
pub mod dispatcher;
pub mod engine;
pub mod outputs;

use embassy_time::{Duration, Ticker};
use embedded_hal::digital::OutputPin;

pub use actuators::{shared, ActuatorTable, SharedActuators};
pub use command::{Command, RawCommand};
pub use dispatcher::Dispatcher;
pub use engine::TickOutputs;
pub use outputs::{ActuatorOutputs, OutputError, PulseOutput};

/// Runs the motion engine against real outputs at a fixed tick.
pub struct ActuationController<'a, F, B, P> {
    actuators: &'a SharedActuators,
    outputs: ActuatorOutputs<F, B, P>,
    tick_ms: u16,
}

impl<'a, F, B, P> ActuationController<'a, F, B, P>
where
    F: OutputPin,
    B: OutputPin,
    P: PulseOutput,
{
    pub fn new(
        actuators: &'a SharedActuators,
        outputs: ActuatorOutputs<F, B, P>,
    ) -> Self {
        let tick_ms = actuators.lock(|table| table.borrow().config().tick_ms);
        ActuationController {
            actuators,
            outputs,
            tick_ms,
        }
    }

    pub fn tick_ms(&self) -> u16 {
        self.tick_ms
    }

    pub fn outputs(&mut self) -> &mut ActuatorOutputs<F, B, P> {
        &mut self.outputs
    }

    /// Centre every servo. Call once before the first tick.
    pub fn start(&mut self) -> Result<(), OutputError<P::Error>> {
        let initial = self
            .actuators
            .lock(|table| table.borrow().initial_outputs());
        self.outputs.apply_servos(&initial)?;
        tracing::info!(tick_ms = self.tick_ms, "actuators centred");
        Ok(())
    }

    /// Advance the engine by one tick and write the result. The table is
    /// locked only while computing, not while logging or talking to
    /// hardware.
    ///
    /// Every output is written even if an earlier one fails; the first
    /// error is returned.
    pub fn tick(&mut self) -> Result<TickOutputs, OutputError<P::Error>> {
        let outputs = self.actuators.lock(|table| table.borrow_mut().tick());
        for actuator in outputs.timed_out() {
            tracing::debug!(?actuator, "command timed out");
        }
        self.outputs.apply(&outputs)?;
        Ok(outputs)
    }

    /// Run `ticks` ticks on a drift-corrected period.
    pub async fn run_for(
        &mut self,
        ticks: u32,
    ) {
        let mut ticker = Ticker::every(Duration::from_millis(self.tick_ms as u64));
        for _ in 0..ticks {
            ticker.next().await;
            self.step();
        }
    }

    /// Tick forever.
    pub async fn run(&mut self) -> ! {
        let mut ticker = Ticker::every(Duration::from_millis(self.tick_ms as u64));
        loop {
            ticker.next().await;
            self.step();
        }
    }

    fn step(&mut self) {
        if let Err(e) = self.tick() {
            tracing::error!(?e, "failed to write actuator outputs");
        }
    }
}
