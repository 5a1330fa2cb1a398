//! Actuator runtime state.
//!
//! One [`ActuatorTable`] owns the command state of every drive motor and servo
//! joint. The dispatcher writes it when a command arrives, the tick handler
//! advances it every period. Both sides go through [`SharedActuators`], a
//! critical-section mutex, so a tick never sees a half-replaced command.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::utils::{
    config::{ControllerConfig, ServoConfig, DC_MOTOR_COUNT, SERVO_COUNT},
    controllers::{
        command::{Command, Direction, DirectionSpeed},
        engine::{self, ServoOutput, ServoTick, TickOutputs},
    },
};

/// Actuator table shared between the dispatcher and the tick handler.
pub type SharedActuators = Mutex<CriticalSectionRawMutex, RefCell<ActuatorTable>>;

/// Wrap a table for sharing.
pub const fn shared(table: ActuatorTable) -> SharedActuators {
    Mutex::new(RefCell::new(table))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMotor {
    Left = 0,
    Right = 1,
}

impl DriveMotor {
    pub const ALL: [DriveMotor; DC_MOTOR_COUNT] = [DriveMotor::Left, DriveMotor::Right];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoJoint {
    Base = 0,
    Shoulder = 1,
    Elbow = 2,
    Arm = 3,
    Wrist = 4,
    Gripper = 5,
}

impl ServoJoint {
    pub const ALL: [ServoJoint; SERVO_COUNT] = [
        ServoJoint::Base,
        ServoJoint::Shoulder,
        ServoJoint::Elbow,
        ServoJoint::Arm,
        ServoJoint::Wrist,
        ServoJoint::Gripper,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Any actuator a command can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorId {
    Drive(DriveMotor),
    Servo(ServoJoint),
}

/// Direction, speed and remaining lifetime of the last command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionState {
    pub direction: Direction,
    pub speed_percent: u8,
    pub timeout_remaining_ms: i32,
}

impl MotionState {
    /// Stopped, no pending timeout.
    pub const NEUTRAL: Self = Self {
        direction: Direction::Stop,
        speed_percent: 0,
        timeout_remaining_ms: 0,
    };

    pub fn from_command(motion: &DirectionSpeed) -> Self {
        Self {
            direction: motion.direction,
            speed_percent: motion.speed_percent,
            timeout_remaining_ms: motion.timeout_ms as i32,
        }
    }

    /// Count the timeout down by one tick. Returns `true` and resets to
    /// neutral once it runs out.
    pub fn countdown(
        &mut self,
        tick_ms: u16,
    ) -> bool {
        self.timeout_remaining_ms -= tick_ms as i32;
        if self.timeout_remaining_ms <= 0 {
            *self = Self::NEUTRAL;
            return true;
        }
        false
    }

    pub fn is_moving(&self) -> bool {
        self.direction != Direction::Stop && self.speed_percent > 0
    }
}

/// Runtime state of a servo joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoState {
    pub motion: MotionState,
    /// Time since the last one-degree step (ms).
    pub elapsed_since_last_step_ms: u16,
    pub current_degrees: i16,
    /// Absolute angle to apply on the next tick.
    pub pending_position: Option<i16>,
}

impl ServoState {
    pub fn new(current_degrees: i16) -> Self {
        Self {
            motion: MotionState::NEUTRAL,
            elapsed_since_last_step_ms: 0,
            current_degrees,
            pending_position: None,
        }
    }
}

/// Rejected direct positioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoIndexError(pub usize);

/// Command state of every actuator, plus the configuration it runs against.
#[derive(Debug, Clone)]
pub struct ActuatorTable {
    config: ControllerConfig,
    motors: [MotionState; DC_MOTOR_COUNT],
    servos: [ServoState; SERVO_COUNT],
}

impl ActuatorTable {
    /// Every actuator neutral, every servo at the middle of its travel.
    pub fn new(config: ControllerConfig) -> Self {
        let servos = core::array::from_fn(|i| ServoState::new(config.servos[i].center_degrees()));
        Self {
            config,
            motors: [MotionState::NEUTRAL; DC_MOTOR_COUNT],
            servos,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn servo_config(
        &self,
        joint: ServoJoint,
    ) -> &ServoConfig {
        &self.config.servos[joint.index()]
    }

    pub fn motor(
        &self,
        motor: DriveMotor,
    ) -> &MotionState {
        &self.motors[motor.index()]
    }

    pub fn servo(
        &self,
        joint: ServoJoint,
    ) -> &ServoState {
        &self.servos[joint.index()]
    }

    /// Replace the command state of `target`.
    pub fn set_motion(
        &mut self,
        target: ActuatorId,
        motion: &DirectionSpeed,
    ) {
        let state = MotionState::from_command(motion);
        match target {
            ActuatorId::Drive(motor) => self.motors[motor.index()] = state,
            ActuatorId::Servo(joint) => {
                let servo = &mut self.servos[joint.index()];
                servo.motion = state;
                servo.elapsed_since_last_step_ms = 0;
            }
        }
    }

    /// Queue an absolute angle for servo `index`, applied on the next tick.
    pub fn set_servo_position(
        &mut self,
        index: usize,
        degrees: i16,
    ) -> Result<(), ServoIndexError> {
        let servo = self
            .servos
            .get_mut(index)
            .ok_or(ServoIndexError(index))?;
        servo.pending_position = Some(degrees);
        Ok(())
    }

    /// Every actuator back to neutral. Servos hold their angle.
    pub fn stop_all(&mut self) {
        self.motors = [MotionState::NEUTRAL; DC_MOTOR_COUNT];
        for servo in self.servos.iter_mut() {
            servo.motion = MotionState::NEUTRAL;
            servo.elapsed_since_last_step_ms = 0;
        }
    }

    /// Apply a decoded command.
    pub fn apply(
        &mut self,
        command: &Command,
    ) {
        match command {
            Command::Move { target, motion } => self.set_motion(*target, motion),
            Command::Position { joint, position } => {
                self.servos[joint.index()].pending_position = Some(position.degrees);
            }
            Command::StopAll => self.stop_all(),
        }
    }

    /// Pulses that put every servo at its current angle, for start-up.
    pub fn initial_outputs(&self) -> [ServoOutput; SERVO_COUNT] {
        core::array::from_fn(|i| {
            ServoOutput::new(&self.config.servos[i], self.servos[i].current_degrees)
        })
    }

    /// Advance every actuator by one tick and return the outputs to drive.
    pub fn tick(&mut self) -> TickOutputs {
        let tick_ms = self.config.tick_ms;
        let motors = core::array::from_fn(|i| {
            engine::process_dc_motor(&mut self.motors[i], self.config.dc_pwm_channels[i], tick_ms)
        });
        let steps: [ServoTick; SERVO_COUNT] = core::array::from_fn(|i| {
            engine::process_servo(&mut self.servos[i], &self.config.servos[i], tick_ms)
        });
        TickOutputs {
            motors,
            servos: steps.map(|step| step.output),
            servos_timed_out: steps.map(|step| step.timed_out),
        }
    }
}
