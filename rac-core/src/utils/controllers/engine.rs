//! Per-tick motion control.
//!
//! Called once per tick for every actuator, from the timer context, with the
//! actuator table locked. Nothing here touches hardware: each step returns the
//! output the actuator should have, and the caller applies it after releasing
//! the lock.
//!
//! - DC motors follow the command immediately: direction enables from the
//!   sign, duty cycle from the speed.
//! - Servos move one degree at a time, paced by the joint's cadence table.
//!
//! Either kind stops on its own once its command times out. Timeouts are
//! reported in the outputs rather than logged here, so the caller can log
//! them once the lock is released.

use crate::utils::{
    config::{ServoConfig, DC_MOTOR_COUNT, SERVO_COUNT},
    controllers::{
        actuators::{ActuatorId, DriveMotor, MotionState, ServoJoint, ServoState},
        command::Direction,
    },
    math::pwm,
};

/// What a DC motor should be doing this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcOutput {
    pub channel: u8,
    pub direction: Direction,
    /// Duty cycle, already clamped to `[0, 100]`.
    pub duty_percent: f32,
    /// A running command expired on this tick.
    pub timed_out: bool,
}

impl DcOutput {
    pub fn stopped(channel: u8) -> Self {
        Self {
            channel,
            direction: Direction::Stop,
            duty_percent: 0.0,
            timed_out: false,
        }
    }

    /// Compare level for a channel whose counter tops out at `max_level`.
    pub fn level(
        &self,
        max_level: u16,
    ) -> u16 {
        pwm::duty_to_level(self.duty_percent, max_level)
    }
}

/// New position for a servo joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoOutput {
    pub channel: u8,
    pub degrees: i16,
    pub pulse_us: u16,
}

impl ServoOutput {
    pub fn new(
        servo: &ServoConfig,
        degrees: i16,
    ) -> Self {
        Self {
            channel: servo.pwm_channel,
            degrees,
            pulse_us: pwm::degrees_to_pulse_us(servo, degrees),
        }
    }

    pub fn level(
        &self,
        max_level: u16,
    ) -> u16 {
        pwm::width_to_level(self.pulse_us as u32, max_level)
    }
}

/// One tick of a servo joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoTick {
    /// New position, if the joint moved.
    pub output: Option<ServoOutput>,
    /// A running command expired on this tick; the joint holds its angle.
    pub timed_out: bool,
}

/// Everything one tick wants written to hardware. Servos that did not move
/// are `None` and keep their last pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutputs {
    pub motors: [DcOutput; DC_MOTOR_COUNT],
    pub servos: [Option<ServoOutput>; SERVO_COUNT],
    pub servos_timed_out: [bool; SERVO_COUNT],
}

impl TickOutputs {
    /// Actuators whose command expired on this tick.
    pub fn timed_out(&self) -> impl Iterator<Item = ActuatorId> + '_ {
        let motors = DriveMotor::ALL
            .into_iter()
            .zip(self.motors.iter())
            .filter(|(_, out)| out.timed_out)
            .map(|(motor, _)| ActuatorId::Drive(motor));
        let servos = ServoJoint::ALL
            .into_iter()
            .zip(self.servos_timed_out.iter())
            .filter(|&(_, &timed_out)| timed_out)
            .map(|(joint, _)| ActuatorId::Servo(joint));
        motors.chain(servos)
    }
}

/// One tick of a DC motor.
pub fn process_dc_motor(
    state: &mut MotionState,
    channel: u8,
    tick_ms: u16,
) -> DcOutput {
    let was_moving = state.is_moving();
    if state.countdown(tick_ms) {
        return DcOutput {
            timed_out: was_moving,
            ..DcOutput::stopped(channel)
        };
    }

    DcOutput {
        channel,
        direction: state.direction,
        duty_percent: pwm::clamp_percent(state.speed_percent as f32),
        timed_out: false,
    }
}

/// One tick of a servo joint.
pub fn process_servo(
    state: &mut ServoState,
    servo: &ServoConfig,
    tick_ms: u16,
) -> ServoTick {
    let mut moved = false;
    if let Some(degrees) = state.pending_position.take() {
        state.current_degrees = servo.clamp_degrees(degrees);
        moved = true;
    }

    let was_moving = state.motion.is_moving();
    if state.motion.countdown(tick_ms) {
        return ServoTick {
            output: moved.then(|| ServoOutput::new(servo, state.current_degrees)),
            timed_out: was_moving,
        };
    }

    state.elapsed_since_last_step_ms = state.elapsed_since_last_step_ms.saturating_add(tick_ms);

    let speed = pwm::clamp_percent(state.motion.speed_percent as f32) as u8;
    if servo
        .cadence
        .is_due(speed, state.elapsed_since_last_step_ms)
    {
        let step = step_for(state.motion.direction, servo.is_inverted);
        state.current_degrees = servo.clamp_degrees(state.current_degrees.saturating_add(step));
        state.elapsed_since_last_step_ms = 0;
        moved = true;
    }

    ServoTick {
        output: moved.then(|| ServoOutput::new(servo, state.current_degrees)),
        timed_out: false,
    }
}

/// Degree delta for one step.
fn step_for(
    direction: Direction,
    is_inverted: bool,
) -> i16 {
    match (direction, is_inverted) {
        (Direction::Forward, false) | (Direction::Reverse, true) => 1,
        (Direction::Reverse, false) | (Direction::Forward, true) => -1,
        (Direction::Stop, _) => 0,
    }
}
