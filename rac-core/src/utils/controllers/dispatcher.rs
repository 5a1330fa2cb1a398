//! Command dispatch.
//!
//! Turns decoded commands into actuator state changes. Every write happens
//! inside the actuator table's critical section, so the tick handler sees
//! either the old command or the new one, never a mix.

use crate::utils::{
    connection::{framing::Frame, queue::Consumer},
    controllers::{
        actuators::{ActuatorId, DriveMotor, ServoIndexError, SharedActuators},
        command::{decode_frame, Command, DirectionSpeed, RawCommand},
    },
};

/// Writes commands into a shared actuator table.
pub struct Dispatcher<'a> {
    actuators: &'a SharedActuators,
}

impl<'a> Dispatcher<'a> {
    pub fn new(actuators: &'a SharedActuators) -> Self {
        Self { actuators }
    }

    /// Decode and apply one 8-byte record. Invalid tags and tags for
    /// actuators this build does not have are ignored; returns whether the
    /// record did anything.
    pub fn dispatch(
        &self,
        raw: &RawCommand,
    ) -> bool {
        match Command::decode(raw) {
            Some(command) => {
                self.apply(&command);
                true
            }
            None => {
                tracing::trace!(tag = raw.tag, "ignored command");
                false
            }
        }
    }

    /// Apply a decoded command.
    pub fn apply(
        &self,
        command: &Command,
    ) {
        tracing::debug!(?command, "dispatch");
        self.actuators
            .lock(|table| table.borrow_mut().apply(command));
    }

    /// Expand a framed payload and apply every command in it, in order.
    /// Returns the number of commands applied.
    pub fn process_frame(
        &self,
        frame: &Frame,
    ) -> usize {
        match decode_frame(frame.payload()) {
            Ok(commands) => {
                for command in commands.iter() {
                    self.apply(command);
                }
                commands.len()
            }
            Err(e) => {
                tracing::warn!(?e, len = frame.len(), "frame dropped");
                0
            }
        }
    }

    /// Replace both wheel commands together.
    pub fn set_drive_motors(
        &self,
        left: &DirectionSpeed,
        right: &DirectionSpeed,
    ) {
        tracing::debug!(?left, ?right, "set drive motors");
        self.actuators.lock(|table| {
            let mut table = table.borrow_mut();
            table.set_motion(ActuatorId::Drive(DriveMotor::Left), left);
            table.set_motion(ActuatorId::Drive(DriveMotor::Right), right);
        });
    }

    /// Put servo `index` at an absolute angle on the next tick.
    pub fn set_servo_position(
        &self,
        index: usize,
        degrees: i16,
    ) -> Result<(), ServoIndexError> {
        self.actuators
            .lock(|table| table.borrow_mut().set_servo_position(index, degrees))
            .inspect_err(|e| tracing::warn!(?e, "servo position rejected"))
    }

    /// Drain both queues: first the pre-framed records, then whole frames.
    /// Returns the number of commands applied.
    pub fn poll<const N: usize, const M: usize>(
        &self,
        records: &mut Consumer<'_, RawCommand, N>,
        frames: &mut Consumer<'_, Frame, M>,
    ) -> usize {
        let mut applied = 0;
        while let Some(raw) = records.pop() {
            if self.dispatch(&raw) {
                applied += 1;
            }
        }
        while let Some(frame) = frames.pop() {
            applied += self.process_frame(&frame);
        }
        applied
    }
}
