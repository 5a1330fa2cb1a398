//! Command wire format.
//!
//! Every transport ends up producing 8-byte records `{type, data[7]}`. For
//! motion commands the first four data bytes are:
//!
//! | byte | meaning |
//! | ---- | ------- |
//! | 0 | direction, signed (-1, 0, +1) |
//! | 1 | speed in percent (0–100) |
//! | 2–3 | timeout in ms, big-endian `i16` |
//!
//! Position commands carry a big-endian `i16` angle in bytes 0–1 and a speed
//! byte in byte 2.
//!
//! Framed UART payloads are either a run of such records or a JSON object with
//! one `{d, s, t}` entry per motor (see [`AllMotorsCommand`]).

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::utils::controllers::actuators::{ActuatorId, DriveMotor, ServoJoint};

/// Size of one command record on the wire.
pub const COMMAND_SIZE: usize = 8;

/// Largest number of commands a single frame can expand into.
pub const MAX_FRAME_COMMANDS: usize = 64;

/// Type tag of a command record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Invalid = 0,
    BaseMotor = 1,
    ShoulderMotor = 2,
    ElbowMotor = 3,
    ArmMotor = 4,
    WristMotor = 5,
    Wrist2Motor = 6,
    GripperMotor = 7,
    LeftMotor = 8,
    RightMotor = 9,
    LeftRearMotor = 10,
    RightRearMotor = 11,
    StopAllMotors = 12,
    BasePosition = 13,
    ShoulderPosition = 14,
    ElbowPosition = 15,
    ArmPosition = 16,
    WristPosition = 17,
    GripperPosition = 18,
}

impl From<u8> for CommandType {
    /// Unknown tags decode as [`CommandType::Invalid`].
    fn from(tag: u8) -> Self {
        match tag {
            1 => Self::BaseMotor,
            2 => Self::ShoulderMotor,
            3 => Self::ElbowMotor,
            4 => Self::ArmMotor,
            5 => Self::WristMotor,
            6 => Self::Wrist2Motor,
            7 => Self::GripperMotor,
            8 => Self::LeftMotor,
            9 => Self::RightMotor,
            10 => Self::LeftRearMotor,
            11 => Self::RightRearMotor,
            12 => Self::StopAllMotors,
            13 => Self::BasePosition,
            14 => Self::ShoulderPosition,
            15 => Self::ElbowPosition,
            16 => Self::ArmPosition,
            17 => Self::WristPosition,
            18 => Self::GripperPosition,
            _ => Self::Invalid,
        }
    }
}

impl CommandType {
    /// Actuator driven by a direction/speed command of this type. `None` for
    /// non-motion tags and for actuators this build does not have.
    pub fn motion_target(self) -> Option<ActuatorId> {
        match self {
            Self::BaseMotor => Some(ActuatorId::Servo(ServoJoint::Base)),
            Self::ShoulderMotor => Some(ActuatorId::Servo(ServoJoint::Shoulder)),
            Self::ElbowMotor => Some(ActuatorId::Servo(ServoJoint::Elbow)),
            Self::ArmMotor => Some(ActuatorId::Servo(ServoJoint::Arm)),
            Self::WristMotor => Some(ActuatorId::Servo(ServoJoint::Wrist)),
            Self::GripperMotor => Some(ActuatorId::Servo(ServoJoint::Gripper)),
            Self::LeftMotor => Some(ActuatorId::Drive(DriveMotor::Left)),
            Self::RightMotor => Some(ActuatorId::Drive(DriveMotor::Right)),
            _ => None,
        }
    }

    /// Joint targeted by an absolute position command of this type.
    pub fn position_target(self) -> Option<ServoJoint> {
        match self {
            Self::BasePosition => Some(ServoJoint::Base),
            Self::ShoulderPosition => Some(ServoJoint::Shoulder),
            Self::ElbowPosition => Some(ServoJoint::Elbow),
            Self::ArmPosition => Some(ServoJoint::Arm),
            Self::WristPosition => Some(ServoJoint::Wrist),
            Self::GripperPosition => Some(ServoJoint::Gripper),
            _ => None,
        }
    }
}

/// One undecoded 8-byte command record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawCommand {
    pub tag: u8,
    pub data: [u8; 7],
}

impl RawCommand {
    pub fn new(
        kind: CommandType,
        data: [u8; 7],
    ) -> Self {
        Self {
            tag: kind as u8,
            data,
        }
    }

    pub fn from_bytes(bytes: &[u8; COMMAND_SIZE]) -> Self {
        let mut data = [0; 7];
        data.copy_from_slice(&bytes[1..]);
        Self {
            tag: bytes[0],
            data,
        }
    }

    pub fn to_bytes(&self) -> [u8; COMMAND_SIZE] {
        let mut bytes = [0; COMMAND_SIZE];
        bytes[0] = self.tag;
        bytes[1..].copy_from_slice(&self.data);
        bytes
    }

    pub fn kind(&self) -> CommandType {
        CommandType::from(self.tag)
    }

    /// Build a motion record for `kind`.
    pub fn motion(
        kind: CommandType,
        motion: DirectionSpeed,
    ) -> Self {
        Self::new(kind, motion.encode())
    }
}

/// Sign of a motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Reverse,
    #[default]
    Stop,
    Forward,
}

impl From<i8> for Direction {
    fn from(value: i8) -> Self {
        match value.signum() {
            1 => Self::Forward,
            -1 => Self::Reverse,
            _ => Self::Stop,
        }
    }
}

impl From<Direction> for i8 {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Reverse => -1,
            Direction::Stop => 0,
            Direction::Forward => 1,
        }
    }
}

/// Direction + speed + timeout, the payload of every motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionSpeed {
    pub direction: Direction,
    /// Speed in percent as sent. Values past 100 are clamped downstream.
    pub speed_percent: u8,
    /// How long the command stays valid (ms).
    pub timeout_ms: i16,
}

impl DirectionSpeed {
    pub fn new(
        direction: Direction,
        speed_percent: u8,
        timeout_ms: i16,
    ) -> Self {
        Self {
            direction,
            speed_percent,
            timeout_ms,
        }
    }

    pub fn decode(data: &[u8; 7]) -> Self {
        Self {
            direction: Direction::from(data[0] as i8),
            speed_percent: data[1],
            timeout_ms: i16::from_be_bytes([data[2], data[3]]),
        }
    }

    pub fn encode(&self) -> [u8; 7] {
        let timeout = self.timeout_ms.to_be_bytes();
        [
            i8::from(self.direction) as u8,
            self.speed_percent,
            timeout[0],
            timeout[1],
            0,
            0,
            0,
        ]
    }
}

/// Absolute angle for a servo joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoPosition {
    pub degrees: i16,
    /// Sent by the host alongside the angle; the joint jumps regardless.
    pub speed_percent: u8,
}

impl ServoPosition {
    pub fn decode(data: &[u8; 7]) -> Self {
        Self {
            degrees: i16::from_be_bytes([data[0], data[1]]),
            speed_percent: data[2],
        }
    }
}

/// A decoded command, ready for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Replace an actuator's direction/speed/timeout.
    Move {
        target: ActuatorId,
        motion: DirectionSpeed,
    },
    /// Put a servo joint at an absolute angle.
    Position {
        joint: ServoJoint,
        position: ServoPosition,
    },
    /// Bring every actuator to neutral.
    StopAll,
}

impl Command {
    /// Decode a raw record. Invalid tags and tags for missing actuators give
    /// `None`.
    pub fn decode(raw: &RawCommand) -> Option<Self> {
        let kind = raw.kind();
        if kind == CommandType::StopAllMotors {
            return Some(Self::StopAll);
        }
        if let Some(target) = kind.motion_target() {
            return Some(Self::Move {
                target,
                motion: DirectionSpeed::decode(&raw.data),
            });
        }
        kind.position_target().map(|joint| Self::Position {
            joint,
            position: ServoPosition::decode(&raw.data),
        })
    }
}

/// One motor entry of the JSON form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MotorCommand {
    /// Direction, sign only.
    pub d: i32,
    /// Speed in percent.
    pub s: i32,
    /// Timeout in ms.
    pub t: i32,
}

impl From<MotorCommand> for DirectionSpeed {
    fn from(cmd: MotorCommand) -> Self {
        Self {
            direction: Direction::from(cmd.d.signum() as i8),
            speed_percent: cmd.s.clamp(0, u8::MAX as i32) as u8,
            timeout_ms: cmd.t.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
        }
    }
}

/// Direction/speed for every motor at once, as sent by the network
/// controller. Missing keys leave that motor untouched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllMotorsCommand {
    /// Left wheel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lw: Option<MotorCommand>,
    /// Right wheel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rw: Option<MotorCommand>,
    /// Base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smb: Option<MotorCommand>,
    /// Shoulder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms: Option<MotorCommand>,
    /// Elbow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sme: Option<MotorCommand>,
    /// Arm (wrist angle).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sma: Option<MotorCommand>,
    /// Wrist rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smw: Option<MotorCommand>,
    /// Gripper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smg: Option<MotorCommand>,
}

impl AllMotorsCommand {
    /// Per-actuator move commands, wheels first.
    pub fn commands(&self) -> impl Iterator<Item = Command> {
        [
            (ActuatorId::Drive(DriveMotor::Left), self.lw),
            (ActuatorId::Drive(DriveMotor::Right), self.rw),
            (ActuatorId::Servo(ServoJoint::Base), self.smb),
            (ActuatorId::Servo(ServoJoint::Shoulder), self.sms),
            (ActuatorId::Servo(ServoJoint::Elbow), self.sme),
            (ActuatorId::Servo(ServoJoint::Arm), self.sma),
            (ActuatorId::Servo(ServoJoint::Wrist), self.smw),
            (ActuatorId::Servo(ServoJoint::Gripper), self.smg),
        ]
        .into_iter()
        .filter_map(|(target, cmd)| {
            cmd.map(|cmd| Command::Move {
                target,
                motion: cmd.into(),
            })
        })
    }
}

/// Errors decoding a framed payload.
#[derive(Debug)]
pub enum FrameDecodeError {
    /// Payload looked like JSON but did not parse.
    Json(serde_json::Error),
    /// Binary payload is not a whole number of records.
    Misaligned(usize),
    /// More records than [`MAX_FRAME_COMMANDS`].
    TooManyCommands,
}

/// Expand a framed payload into commands. Records with invalid tags are
/// skipped.
pub fn decode_frame(payload: &[u8]) -> Result<Vec<Command, MAX_FRAME_COMMANDS>, FrameDecodeError> {
    let mut commands = Vec::new();

    if payload.first() == Some(&b'{') {
        let all: AllMotorsCommand =
            serde_json::from_slice(payload).map_err(FrameDecodeError::Json)?;
        for cmd in all.commands() {
            commands
                .push(cmd)
                .map_err(|_| FrameDecodeError::TooManyCommands)?;
        }
        return Ok(commands);
    }

    if payload.len() % COMMAND_SIZE != 0 {
        return Err(FrameDecodeError::Misaligned(payload.len()));
    }
    for chunk in payload.chunks_exact(COMMAND_SIZE) {
        let mut record = [0; COMMAND_SIZE];
        record.copy_from_slice(chunk);
        if let Some(cmd) = Command::decode(&RawCommand::from_bytes(&record)) {
            commands
                .push(cmd)
                .map_err(|_| FrameDecodeError::TooManyCommands)?;
        }
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_direction_speed() {
        let motion = DirectionSpeed::decode(&[0xFF, 55, 0x00, 0x32, 0, 0, 0]);
        assert_eq!(motion.direction, Direction::Reverse);
        assert_eq!(motion.speed_percent, 55);
        assert_eq!(motion.timeout_ms, 50);
    }

    #[test]
    fn test_timeout_is_signed_big_endian() {
        let motion = DirectionSpeed::decode(&[1, 10, 0x01, 0x2C, 0, 0, 0]);
        assert_eq!(motion.timeout_ms, 300);
        let motion = DirectionSpeed::decode(&[1, 10, 0xFF, 0xF6, 0, 0, 0]);
        assert_eq!(motion.timeout_ms, -10);
    }

    #[test]
    fn test_direction_reduced_to_sign() {
        assert_eq!(Direction::from(5), Direction::Forward);
        assert_eq!(Direction::from(-128), Direction::Reverse);
        assert_eq!(Direction::from(0), Direction::Stop);
    }

    #[test]
    fn test_encode_matches_decode() {
        let motion = DirectionSpeed::new(Direction::Forward, 70, 1000);
        assert_eq!(DirectionSpeed::decode(&motion.encode()), motion);
    }

    #[test]
    fn test_tag_mapping() {
        let raw = RawCommand::motion(CommandType::LeftMotor, DirectionSpeed::default());
        assert!(matches!(
            Command::decode(&raw),
            Some(Command::Move {
                target: ActuatorId::Drive(DriveMotor::Left),
                ..
            })
        ));
        let raw = RawCommand::new(CommandType::GripperMotor, [0; 7]);
        assert!(matches!(
            Command::decode(&raw),
            Some(Command::Move {
                target: ActuatorId::Servo(ServoJoint::Gripper),
                ..
            })
        ));
        assert_eq!(
            Command::decode(&RawCommand::new(CommandType::StopAllMotors, [0; 7])),
            Some(Command::StopAll)
        );
    }

    #[test]
    fn test_invalid_and_unfitted_tags_decode_to_none() {
        for tag in [0u8, 6, 10, 11, 19, 0xFF] {
            let raw = RawCommand {
                tag,
                data: [1, 50, 0, 100, 0, 0, 0],
            };
            assert_eq!(Command::decode(&raw), None, "tag {}", tag);
        }
    }

    #[test]
    fn test_position_command() {
        let raw = RawCommand::new(CommandType::ElbowPosition, [0x00, 0x5A, 40, 0, 0, 0, 0]);
        assert_eq!(
            Command::decode(&raw),
            Some(Command::Position {
                joint: ServoJoint::Elbow,
                position: ServoPosition {
                    degrees: 90,
                    speed_percent: 40
                },
            })
        );
    }

    #[test]
    fn test_decode_binary_frame() {
        let mut payload = [0u8; 24];
        payload[..8].copy_from_slice(
            &RawCommand::motion(
                CommandType::RightMotor,
                DirectionSpeed::new(Direction::Forward, 80, 200),
            )
            .to_bytes(),
        );
        // bytes 8..16 stay zero: an invalid record
        payload[16..].copy_from_slice(&RawCommand::new(CommandType::StopAllMotors, [0; 7]).to_bytes());

        let commands = decode_frame(&payload).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1], Command::StopAll);
    }

    #[test]
    fn test_decode_misaligned_frame() {
        assert!(matches!(
            decode_frame(&[1, 2, 3]),
            Err(FrameDecodeError::Misaligned(3))
        ));
    }

    #[test]
    fn test_decode_json_frame() {
        let payload = br#"{"lw":{"d":1,"s":60,"t":300},"smg":{"d":-1,"s":250,"t":100000}}"#;
        let commands = decode_frame(payload).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0],
            Command::Move {
                target: ActuatorId::Drive(DriveMotor::Left),
                motion: DirectionSpeed::new(Direction::Forward, 60, 300),
            }
        );
        assert_eq!(
            commands[1],
            Command::Move {
                target: ActuatorId::Servo(ServoJoint::Gripper),
                motion: DirectionSpeed::new(Direction::Reverse, 250, i16::MAX),
            }
        );
    }

    #[test]
    fn test_decode_bad_json() {
        assert!(matches!(
            decode_frame(b"{\"lw\":"),
            Err(FrameDecodeError::Json(_))
        ));
    }
}
