//! Hardware side of the actuation core.
//!
//! [`ActuatorTable::tick`](super::actuators::ActuatorTable::tick) decides
//! what every actuator should do; this module writes it out. DC motors get
//! two direction enables and a duty channel, servos a pulse-width channel.
//!
//! Two PWM back-ends implement [`PulseOutput`]:
//! - a PCA9685 on a shared I2C bus (`pwm-pca9685`), 12-bit levels at 50 Hz
//! - an array of native PWM slices (`embedded_hal::pwm::SetDutyCycle`)

use core::cell::RefCell;

use embedded_hal::{
    digital::{Error as _, ErrorKind, OutputPin},
    i2c::I2c,
    pwm::SetDutyCycle,
};
use embedded_hal_bus::i2c::RefCellDevice;
use pwm_pca9685::{Address as PwmAddress, Channel, Error as PwmError, Pca9685};

use crate::utils::{
    config::{DC_MOTOR_COUNT, SERVO_COUNT},
    controllers::{
        command::Direction,
        engine::{DcOutput, ServoOutput, TickOutputs},
    },
    math::pwm,
};

/// Default I2C address of the servo driver board.
pub const PCA9685_ADDRESS: u8 = 0x40;

/// Prescale for a 50 Hz output from the 25 MHz internal oscillator:
/// `25 MHz / (4096 * 50) - 1`.
pub const PCA9685_PRESCALE_50HZ: u8 = 121;

/// Highest compare level of a PCA9685 channel.
pub const PCA9685_MAX_LEVEL: u16 = 4095;

const PCA9685_CHANNELS: [Channel; 16] = [
    Channel::C0,
    Channel::C1,
    Channel::C2,
    Channel::C3,
    Channel::C4,
    Channel::C5,
    Channel::C6,
    Channel::C7,
    Channel::C8,
    Channel::C9,
    Channel::C10,
    Channel::C11,
    Channel::C12,
    Channel::C13,
    Channel::C14,
    Channel::C15,
];

/// Errors writing actuator outputs.
#[derive(Debug)]
pub enum OutputError<E: core::fmt::Debug> {
    /// PWM peripheral or bus error.
    Hardware(E),
    /// Direction pin error.
    Pin(ErrorKind),
    /// No PWM channel with this index.
    ChannelOutOfRange(u8),
}

/// Something that can drive PWM channels by pulse width.
pub trait PulseOutput {
    type Error: core::fmt::Debug;

    /// Drive `channel` with a pulse of `width_us` every 20 ms period.
    fn set_pulse_width_us(
        &mut self,
        channel: u8,
        width_us: u32,
    ) -> Result<(), OutputError<Self::Error>>;

    /// Drive `channel` at a duty cycle in percent, clamped to `[0, 100]`.
    fn set_duty_percent(
        &mut self,
        channel: u8,
        percent: f32,
    ) -> Result<(), OutputError<Self::Error>> {
        self.set_pulse_width_us(channel, pwm::duty_to_width_us(percent))
    }
}

impl<I2C, E> PulseOutput for Pca9685<I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    type Error = PwmError<E>;

    fn set_pulse_width_us(
        &mut self,
        channel: u8,
        width_us: u32,
    ) -> Result<(), OutputError<Self::Error>> {
        let ch = *PCA9685_CHANNELS
            .get(channel as usize)
            .ok_or(OutputError::ChannelOutOfRange(channel))?;
        let level = pwm::width_to_level(width_us, PCA9685_MAX_LEVEL);
        self.set_channel_on_off(ch, 0, level)
            .map_err(OutputError::Hardware)
    }
}

/// Open the PCA9685 at `address` on a shared bus and set it up for servos.
pub fn init_pca9685<'a, I2C, E>(
    i2c_bus: &'a RefCell<I2C>,
    address: u8,
) -> Result<Pca9685<RefCellDevice<'a, I2C>>, PwmError<E>>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    let mut pca = Pca9685::new(RefCellDevice::new(i2c_bus), PwmAddress::from(address))?;
    configure_servo_pwm(&mut pca)?;
    Ok(pca)
}

/// Wake the chip and set a 50 Hz period.
pub fn configure_servo_pwm<I2C, E>(pca: &mut Pca9685<I2C>) -> Result<(), PwmError<E>>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    pca.enable()?;
    pca.set_prescale(PCA9685_PRESCALE_50HZ)?;
    tracing::info!(prescale = PCA9685_PRESCALE_50HZ, "PCA9685 configured for 50 Hz");
    Ok(())
}

/// Native PWM slices, indexed by channel number. Each slice must already run
/// at 50 Hz.
pub struct PwmChannels<P, const N: usize> {
    channels: [P; N],
}

impl<P: SetDutyCycle, const N: usize> PwmChannels<P, N> {
    pub fn new(channels: [P; N]) -> Self {
        Self { channels }
    }

    pub fn channel(
        &self,
        channel: u8,
    ) -> Option<&P> {
        self.channels.get(channel as usize)
    }
}

impl<P: SetDutyCycle, const N: usize> PulseOutput for PwmChannels<P, N> {
    type Error = P::Error;

    fn set_pulse_width_us(
        &mut self,
        channel: u8,
        width_us: u32,
    ) -> Result<(), OutputError<Self::Error>> {
        let pin = self
            .channels
            .get_mut(channel as usize)
            .ok_or(OutputError::ChannelOutOfRange(channel))?;
        let level = pwm::width_to_level(width_us, pin.max_duty_cycle());
        pin.set_duty_cycle(level).map_err(OutputError::Hardware)
    }
}

/// Direction enables of one DC motor driver (e.g. an H-bridge IN1/IN2 pair).
pub struct DcMotorPins<F, B> {
    forward: F,
    backward: B,
}

impl<F: OutputPin, B: OutputPin> DcMotorPins<F, B> {
    pub fn new(
        forward: F,
        backward: B,
    ) -> Self {
        Self { forward, backward }
    }

    /// Raise the enable matching `direction`, lower the other. `Stop` lowers
    /// both.
    ///
    /// Both lowering writes are attempted even if one fails; nothing is
    /// raised unless they both succeed.
    pub fn set_direction(
        &mut self,
        direction: Direction,
    ) -> Result<(), ErrorKind> {
        let (forward, backward) = match direction {
            Direction::Forward => (true, false),
            Direction::Reverse => (false, true),
            Direction::Stop => (false, false),
        };
        // Lower before raising so both enables are never high together.
        let mut lowered = Ok(());
        if !forward {
            lowered = lowered.and(self.forward.set_low().map_err(|e| e.kind()));
        }
        if !backward {
            lowered = lowered.and(self.backward.set_low().map_err(|e| e.kind()));
        }
        lowered?;
        if forward {
            self.forward
                .set_high()
                .map_err(|e| e.kind())?;
        }
        if backward {
            self.backward
                .set_high()
                .map_err(|e| e.kind())?;
        }
        Ok(())
    }

    pub fn release(self) -> (F, B) {
        (self.forward, self.backward)
    }
}

/// Every physical output of the machine.
pub struct ActuatorOutputs<F, B, P> {
    motors: [DcMotorPins<F, B>; DC_MOTOR_COUNT],
    pwm: P,
    /// Servo pulses whose last write failed, retried on the next apply.
    unsynced: [Option<ServoOutput>; SERVO_COUNT],
}

impl<F, B, P> ActuatorOutputs<F, B, P>
where
    F: OutputPin,
    B: OutputPin,
    P: PulseOutput,
{
    pub fn new(
        motors: [DcMotorPins<F, B>; DC_MOTOR_COUNT],
        pwm: P,
    ) -> Self {
        Self {
            motors,
            pwm,
            unsynced: [None; SERVO_COUNT],
        }
    }

    pub fn pwm(&mut self) -> &mut P {
        &mut self.pwm
    }

    /// Servo pulses still waiting for a successful write, by joint.
    pub fn unsynced(&self) -> &[Option<ServoOutput>; SERVO_COUNT] {
        &self.unsynced
    }

    /// Write one tick's outputs. Servos without a new position are left
    /// alone unless an earlier write to them failed.
    ///
    /// A failing output does not stop the others from being written; the
    /// first error is returned once everything has been tried.
    pub fn apply(
        &mut self,
        outputs: &TickOutputs,
    ) -> Result<(), OutputError<P::Error>> {
        let mut result = Ok(());
        for (pins, motor) in self.motors.iter_mut().zip(outputs.motors.iter()) {
            result = result.and(Self::apply_motor(pins, &mut self.pwm, motor));
        }
        result.and(self.write_servos(&outputs.servos))
    }

    /// Write a pulse to every servo, e.g. the start-up centring pulses.
    pub fn apply_servos(
        &mut self,
        servos: &[ServoOutput; SERVO_COUNT],
    ) -> Result<(), OutputError<P::Error>> {
        self.write_servos(&servos.map(Some))
    }

    fn write_servos(
        &mut self,
        servos: &[Option<ServoOutput>; SERVO_COUNT],
    ) -> Result<(), OutputError<P::Error>> {
        let mut result = Ok(());
        for (servo, unsynced) in servos.iter().zip(self.unsynced.iter_mut()) {
            let Some(servo) = servo.or(*unsynced) else {
                continue;
            };
            match self
                .pwm
                .set_pulse_width_us(servo.channel, servo.pulse_us as u32)
            {
                Ok(()) => *unsynced = None,
                Err(e) => {
                    *unsynced = Some(servo);
                    result = result.and(Err(e));
                }
            }
        }
        result
    }

    /// Direction first, then duty. The duty is written even when the
    /// enables fail; a motor whose enables could not be set gets zero duty.
    fn apply_motor(
        pins: &mut DcMotorPins<F, B>,
        pwm: &mut P,
        motor: &DcOutput,
    ) -> Result<(), OutputError<P::Error>> {
        let direction = pins.set_direction(motor.direction);
        let duty = if direction.is_ok() {
            motor.duty_percent
        } else {
            0.0
        };
        let duty = pwm.set_duty_percent(motor.channel, duty);
        direction.map_err(OutputError::Pin).and(duty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::SERVO_180;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    /// Direction enable that can be told to fail.
    struct FlakyPin {
        broken: bool,
    }

    impl ErrorType for FlakyPin {
        type Error = ErrorKind;
    }

    impl OutputPin for FlakyPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            if self.broken {
                return Err(ErrorKind::Other);
            }
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.set_low()
        }
    }

    /// Pulse widths by channel, with a channel that rejects writes.
    struct FlakyPwm {
        widths_us: [Option<u32>; 16],
        broken_channel: Option<u8>,
    }

    impl PulseOutput for FlakyPwm {
        type Error = Infallible;

        fn set_pulse_width_us(
            &mut self,
            channel: u8,
            width_us: u32,
        ) -> Result<(), OutputError<Self::Error>> {
            if self.broken_channel == Some(channel) {
                return Err(OutputError::ChannelOutOfRange(channel));
            }
            self.widths_us[channel as usize] = Some(width_us);
            Ok(())
        }
    }

    fn outputs(
        left_broken: bool,
        broken_channel: Option<u8>,
    ) -> ActuatorOutputs<FlakyPin, FlakyPin, FlakyPwm> {
        ActuatorOutputs::new(
            [
                DcMotorPins::new(
                    FlakyPin {
                        broken: left_broken,
                    },
                    FlakyPin {
                        broken: left_broken,
                    },
                ),
                DcMotorPins::new(FlakyPin { broken: false }, FlakyPin { broken: false }),
            ],
            FlakyPwm {
                widths_us: [None; 16],
                broken_channel,
            },
        )
    }

    fn tick(
        left: DcOutput,
        right: DcOutput,
        servos: [Option<ServoOutput>; SERVO_COUNT],
    ) -> TickOutputs {
        TickOutputs {
            motors: [left, right],
            servos,
            servos_timed_out: [false; SERVO_COUNT],
        }
    }

    fn running(
        channel: u8,
        duty_percent: f32,
    ) -> DcOutput {
        DcOutput {
            channel,
            direction: Direction::Forward,
            duty_percent,
            timed_out: false,
        }
    }

    #[test]
    fn test_broken_pins_do_not_block_other_outputs() {
        let mut hw = outputs(true, None);
        let elbow = ServoOutput::new(&SERVO_180.with_channel(2), 45);
        let mut servos = [None; SERVO_COUNT];
        servos[2] = Some(elbow);

        let result = hw.apply(&tick(running(8, 60.0), running(9, 80.0), servos));
        assert!(matches!(result, Err(OutputError::Pin(ErrorKind::Other))));
        let widths = hw.pwm().widths_us;
        // the left motor's duty is forced to zero, the rest goes out as asked
        assert_eq!(widths[8], Some(0));
        assert_eq!(widths[9], Some(16_000));
        assert_eq!(widths[2], Some(elbow.pulse_us as u32));
    }

    #[test]
    fn test_failed_servo_write_is_retried() {
        let mut hw = outputs(false, Some(2));
        let elbow = ServoOutput::new(&SERVO_180.with_channel(2), 45);
        let mut servos = [None; SERVO_COUNT];
        servos[2] = Some(elbow);

        assert!(hw
            .apply(&tick(DcOutput::stopped(8), DcOutput::stopped(9), servos))
            .is_err());
        assert_eq!(hw.unsynced()[2], Some(elbow));

        // the joint does not move again, but the missed pulse still goes out
        hw.pwm().broken_channel = None;
        let idle = tick(DcOutput::stopped(8), DcOutput::stopped(9), [None; SERVO_COUNT]);
        assert!(hw.apply(&idle).is_ok());
        assert_eq!(hw.pwm().widths_us[2], Some(elbow.pulse_us as u32));
        assert_eq!(hw.unsynced()[2], None);
    }

    #[test]
    fn test_newer_pulse_replaces_unsynced_one() {
        let mut hw = outputs(false, Some(2));
        let first = ServoOutput::new(&SERVO_180.with_channel(2), 45);
        let second = ServoOutput::new(&SERVO_180.with_channel(2), 46);
        let mut servos = [None; SERVO_COUNT];
        servos[2] = Some(first);
        assert!(hw
            .apply(&tick(DcOutput::stopped(8), DcOutput::stopped(9), servos))
            .is_err());

        hw.pwm().broken_channel = None;
        servos[2] = Some(second);
        assert!(hw
            .apply(&tick(DcOutput::stopped(8), DcOutput::stopped(9), servos))
            .is_ok());
        assert_eq!(hw.pwm().widths_us[2], Some(second.pulse_us as u32));
        assert!(hw.unsynced().iter().all(Option::is_none));
    }
}
