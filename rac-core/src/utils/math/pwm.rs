//! PWM signal mapping for DC motors and hobby servos.
//!
//! Everything here is a pure function of its inputs so it can be called from
//! the tick handler. Two input forms are supported:
//!
//! - a duty cycle in percent (DC motors), clamped to `[0, 100]`
//! - an absolute pulse width in microseconds (servos)
//!
//! Both end up as a compare level in `0..=max_level`, where `max_level` is the
//! counter top of whatever PWM peripheral drives the channel.
//!
//! # Example
//! ```rust
//! use rac_core::utils::math::pwm;
//! // 1.5 ms pulse on a 16-bit counter
//! assert_eq!(pwm::width_to_level(1_500, 65_465), 4_909);
//! // 50 % duty is half a 20 ms period
//! assert_eq!(pwm::duty_to_width_us(50.0), 10_000);
//! ```

use crate::utils::config::ServoConfig;

/// PWM frequency used for every channel (Hz).
pub const PWM_FREQUENCY_HZ: u32 = 50;

/// PWM period in microseconds (50 Hz = 20 ms).
pub const PWM_PERIOD_US: u32 = 1_000_000 / PWM_FREQUENCY_HZ;

/// Clamp a duty cycle percentage into `[0, 100]`. NaN maps to zero.
#[inline]
pub fn clamp_percent(percent: f32) -> f32 {
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}

/// Convert a duty cycle percentage into an absolute pulse width (µs).
pub fn duty_to_width_us(percent: f32) -> u32 {
    let percent = clamp_percent(percent);
    (percent / 100.0 * PWM_PERIOD_US as f32) as u32
}

/// Convert an absolute pulse width (µs) into a compare level.
///
/// Zero width is fully off, anything at or past the period is fully on, and
/// everything in between scales linearly, truncating toward zero.
pub fn width_to_level(
    width_us: u32,
    max_level: u16,
) -> u16 {
    if width_us == 0 {
        0
    } else if width_us >= PWM_PERIOD_US {
        max_level
    } else {
        (max_level as u32 * width_us / PWM_PERIOD_US) as u16
    }
}

/// Convert a duty cycle percentage straight into a compare level.
#[inline]
pub fn duty_to_level(
    percent: f32,
    max_level: u16,
) -> u16 {
    width_to_level(duty_to_width_us(percent), max_level)
}

/// Pulse width (µs) that places a servo at `degrees`.
///
/// Linear from `left_us` at 0 through `center_us` at mid-travel to
/// `right_us` at `degrees_max`, clamped to the pulse range and truncated to
/// whole microseconds. Never panics, even on a config that fails
/// [`ServoConfig::validate`].
pub fn degrees_to_pulse_us(
    servo: &ServoConfig,
    degrees: i16,
) -> u16 {
    let travel = servo.degrees_max.max(1) as f32;
    let mid = travel / 2.0;
    let degrees = degrees as f32;
    let pulse = if degrees <= mid {
        servo.center_us - (servo.center_us - servo.left_us) * (mid - degrees) / mid
    } else {
        servo.center_us + (servo.right_us - servo.center_us) * (degrees - mid) / (travel - mid)
    };
    let low = servo.left_us.min(servo.right_us);
    let high = servo.left_us.max(servo.right_us);
    pulse.max(low).min(high) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::{ServoConfig, SERVO_180, SERVO_270};

    #[test]
    fn test_width_edges() {
        assert_eq!(width_to_level(0, 4095), 0);
        assert_eq!(width_to_level(PWM_PERIOD_US, 4095), 4095);
        assert_eq!(width_to_level(PWM_PERIOD_US + 1, 4095), 4095);
        assert_eq!(width_to_level(1, 4095), 0);
    }

    #[test]
    fn test_width_scales_linearly() {
        assert_eq!(width_to_level(10_000, 4096), 2048);
        // 4095 * 1500 / 20000 = 307.125
        assert_eq!(width_to_level(1_500, 4095), 307);
    }

    #[test]
    fn test_duty_is_clamped() {
        assert_eq!(duty_to_width_us(-5.0), 0);
        assert_eq!(duty_to_width_us(150.0), PWM_PERIOD_US);
        assert_eq!(duty_to_width_us(f32::NAN), 0);
        assert_eq!(duty_to_level(100.0, 1000), 1000);
        assert_eq!(duty_to_level(0.0, 1000), 0);
        assert_eq!(duty_to_level(25.0, 1000), 250);
    }

    #[test]
    fn test_degrees_to_pulse() {
        assert_eq!(degrees_to_pulse_us(&SERVO_180, 0), 500);
        assert_eq!(degrees_to_pulse_us(&SERVO_180, 90), 1500);
        assert_eq!(degrees_to_pulse_us(&SERVO_180, 180), 2500);
        assert_eq!(degrees_to_pulse_us(&SERVO_270, 135), 1500);
    }

    #[test]
    fn test_degrees_outside_range_clamp_to_pulse_bounds() {
        assert_eq!(degrees_to_pulse_us(&SERVO_180, -20), 500);
        assert_eq!(degrees_to_pulse_us(&SERVO_180, 400), 2500);
    }

    #[test]
    fn test_off_centre_servo_uses_both_halves() {
        // 400 µs over the lower half, 1100 µs over the upper half
        let servo = ServoConfig::new(90, 1000.0, 1400.0, 2500.0);
        assert_eq!(degrees_to_pulse_us(&servo, 0), 1000);
        assert_eq!(degrees_to_pulse_us(&servo, 45), 1400);
        assert_eq!(degrees_to_pulse_us(&servo, 90), 2500);
    }

    #[test]
    fn test_invalid_geometry_does_not_panic() {
        let reversed = ServoConfig::new(180, 2500.0, 1500.0, 500.0);
        assert_eq!(degrees_to_pulse_us(&reversed, 0), 2500);
        assert_eq!(degrees_to_pulse_us(&reversed, 180), 500);

        let no_travel = ServoConfig::new(0, 500.0, 1500.0, 2500.0);
        assert!((500..=2500).contains(&degrees_to_pulse_us(&no_travel, 90)));

        let nan = ServoConfig::new(180, 500.0, f32::NAN, 2500.0);
        assert!((500..=2500).contains(&degrees_to_pulse_us(&nan, 90)));
    }
}
