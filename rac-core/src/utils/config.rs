//! Static configuration of the actuators.
//!
//! Wire-level constants live next to the code that uses them; this module
//! holds what describes the machine: how many actuators there are, which PWM
//! channel drives what, and the geometry of each servo.

use crate::utils::math::CadenceTable;

/// Number of DC drive motors (left, right).
pub const DC_MOTOR_COUNT: usize = 2;
/// Number of servo joints (base, shoulder, elbow, arm, wrist, gripper).
pub const SERVO_COUNT: usize = 6;
/// Default control tick (ms).
pub const TICK_MS: u16 = 10;

/// Geometry and wiring of one servo joint.
#[derive(Debug, Clone, Copy)]
pub struct ServoConfig {
    /// Total travel the servo supports, e.g. 180 or 270 degrees.
    pub degrees_max: i16,
    /// Pulse width at 0 degrees (µs).
    pub left_us: f32,
    /// Pulse width at the middle of travel (µs).
    pub center_us: f32,
    /// Pulse width at `degrees_max` (µs).
    pub right_us: f32,
    pub pwm_channel: u8,
    /// Positive commands move toward lower angles.
    pub is_inverted: bool,
    /// Optional software limits `(bottom, top)` inside `[0, degrees_max]`.
    pub soft_limits: Option<(i16, i16)>,
    pub cadence: CadenceTable,
}

/// 180 degree hobby servo, 500–2500 µs.
pub const SERVO_180: ServoConfig = ServoConfig::new(180, 500.0, 1500.0, 2500.0);

/// 270 degree hobby servo, 500–2500 µs.
pub const SERVO_270: ServoConfig = ServoConfig::new(270, 500.0, 1500.0, 2500.0);

/// Reasons a servo description cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoConfigError {
    /// `degrees_max` must be at least one degree.
    NoTravel(i16),
    /// Pulse widths must be finite and ordered `left < center < right`.
    PulseOrder,
    /// Soft limits with `bottom > top`.
    SoftLimits(i16, i16),
}

/// Reasons a controller configuration cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The control tick must be at least 1 ms.
    ZeroTick,
    /// Servo joint at this index is invalid.
    Servo(usize, ServoConfigError),
}

impl ServoConfig {
    /// Unchecked constructor for presets; see [`ServoConfig::try_new`].
    pub const fn new(
        degrees_max: i16,
        left_us: f32,
        center_us: f32,
        right_us: f32,
    ) -> Self {
        Self {
            degrees_max,
            left_us,
            center_us,
            right_us,
            pwm_channel: 0,
            is_inverted: false,
            soft_limits: None,
            cadence: CadenceTable::REFERENCE,
        }
    }

    /// Validated constructor.
    pub fn try_new(
        degrees_max: i16,
        left_us: f32,
        center_us: f32,
        right_us: f32,
    ) -> Result<Self, ServoConfigError> {
        let servo = Self::new(degrees_max, left_us, center_us, right_us);
        servo.validate()?;
        Ok(servo)
    }

    /// Check the geometry. Methods on an invalid config do not panic, but
    /// the angles and pulses they produce are meaningless.
    pub fn validate(&self) -> Result<(), ServoConfigError> {
        if self.degrees_max < 1 {
            return Err(ServoConfigError::NoTravel(self.degrees_max));
        }
        let pulses = [self.left_us, self.center_us, self.right_us];
        if !pulses.iter().all(|us| us.is_finite())
            || self.left_us >= self.center_us
            || self.center_us >= self.right_us
        {
            return Err(ServoConfigError::PulseOrder);
        }
        if let Some((bottom, top)) = self.soft_limits {
            if bottom > top {
                return Err(ServoConfigError::SoftLimits(bottom, top));
            }
        }
        Ok(())
    }

    pub const fn with_channel(
        mut self,
        pwm_channel: u8,
    ) -> Self {
        self.pwm_channel = pwm_channel;
        self
    }

    pub const fn inverted(mut self) -> Self {
        self.is_inverted = true;
        self
    }

    /// Restrict travel to `[bottom, top]`. The range is intersected with
    /// `[0, degrees_max]` when applied.
    pub const fn with_soft_limits(
        mut self,
        bottom: i16,
        top: i16,
    ) -> Self {
        self.soft_limits = Some((bottom, top));
        self
    }

    pub const fn with_cadence(
        mut self,
        cadence: CadenceTable,
    ) -> Self {
        self.cadence = cadence;
        self
    }

    /// Effective `(bottom, top)` travel limits in degrees. Always
    /// `0 <= bottom <= top`.
    pub fn limits(&self) -> (i16, i16) {
        let travel = self.degrees_max.max(0);
        match self.soft_limits {
            Some((bottom, top)) => {
                let bottom = bottom.clamp(0, travel);
                let top = top.clamp(bottom, travel);
                (bottom, top)
            }
            None => (0, travel),
        }
    }

    /// Clamp `degrees` into the travel limits.
    #[inline]
    pub fn clamp_degrees(
        &self,
        degrees: i16,
    ) -> i16 {
        let (bottom, top) = self.limits();
        degrees.clamp(bottom, top)
    }

    /// Start-up position, the middle of the full travel.
    pub fn center_degrees(&self) -> i16 {
        self.clamp_degrees(self.degrees_max / 2)
    }
}

/// Everything the actuation core needs to know about the machine.
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Control tick (ms).
    pub tick_ms: u16,
    /// PWM channels of the left and right drive motors.
    pub dc_pwm_channels: [u8; DC_MOTOR_COUNT],
    /// Servo joints in [`ServoJoint`](crate::utils::controllers::actuators::ServoJoint) order.
    pub servos: [ServoConfig; SERVO_COUNT],
}

impl Default for ControllerConfig {
    /// Reference arm: six 270 degree joints on channels 0–4 and 6, drive
    /// motors on channels 8 and 9.
    fn default() -> Self {
        Self {
            tick_ms: TICK_MS,
            dc_pwm_channels: [8, 9],
            servos: [
                SERVO_270.with_channel(0),
                SERVO_270.with_channel(1),
                SERVO_270.with_channel(2),
                SERVO_270.with_channel(3),
                SERVO_270.with_channel(4),
                SERVO_270.with_channel(6),
            ],
        }
    }
}

impl ControllerConfig {
    /// Default configuration with optional overrides for the tick and servos.
    /// Overrides are taken as given; see [`ControllerConfig::validate`].
    pub fn new(
        tick_ms: Option<u16>,
        servos: Option<[ServoConfig; SERVO_COUNT]>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            tick_ms: tick_ms.unwrap_or(defaults.tick_ms),
            servos: servos.unwrap_or(defaults.servos),
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        for (i, servo) in self.servos.iter().enumerate() {
            servo
                .validate()
                .map_err(|e| ConfigError::Servo(i, e))?;
        }
        Ok(())
    }
}
