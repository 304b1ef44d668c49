//! Configuration validation.

use crate::error::{ConfigError, Error, Result};

use super::machine::{LeadscrewConfig, MotionConfig, SpindleConfig};
use super::MachineConfig;

/// Validate a machine configuration.
///
/// Checks:
/// - Pulses-per-revolution values are non-zero, the spindle's fits a signed
///   32-bit position
/// - Leadscrew pitch is positive
/// - Motor resolution is at least the tracked lead-axis resolution
/// - Pulse delays are finite and non-negative, increment <= initial delay
/// - Tick period is non-zero
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    validate_spindle(&config.spindle)?;
    validate_leadscrew(&config.leadscrew)?;
    validate_motion(&config.motion)?;

    Ok(())
}

fn validate_spindle(config: &SpindleConfig) -> Result<()> {
    const FIELD: &str = "spindle.encoder_pulses_per_revolution";
    let ppr = config.encoder_pulses_per_revolution;
    non_zero_ppr(FIELD, ppr)?;

    // Spindle angles are wrapped into `[0, PPR)` as `i32`.
    if ppr > i32::MAX as u32 {
        return Err(Error::Config(ConfigError::InvalidPulsesPerRevolution {
            field: FIELD,
            value: ppr,
        }));
    }
    Ok(())
}

fn validate_leadscrew(config: &LeadscrewConfig) -> Result<()> {
    non_zero_ppr(
        "leadscrew.motor_pulses_per_revolution",
        config.motor_pulses_per_revolution,
    )?;
    non_zero_ppr(
        "leadscrew.lead_axis_pulses_per_revolution",
        config.lead_axis_pulses_per_revolution,
    )?;

    let pitch = config.pitch.value();
    if !pitch.is_finite() || pitch <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidLeadscrewPitch(pitch)));
    }

    // The accumulator can only absorb pulses, so one position unit must take
    // at least one motor pulse.
    if config.motor_pulses_per_revolution < config.lead_axis_pulses_per_revolution {
        return Err(Error::Config(ConfigError::InsufficientMotorResolution {
            motor_ppr: config.motor_pulses_per_revolution,
            lead_axis_ppr: config.lead_axis_pulses_per_revolution,
        }));
    }

    Ok(())
}

fn validate_motion(config: &MotionConfig) -> Result<()> {
    let initial = config.initial_pulse_delay_us;
    if !initial.is_finite() || initial < 0.0 {
        return Err(Error::Config(ConfigError::InvalidPulseDelay(initial)));
    }

    let increment = config.pulse_delay_increment_us;
    if !increment.is_finite() || increment < 0.0 || increment > initial {
        return Err(Error::Config(ConfigError::InvalidPulseDelayIncrement {
            increment,
            initial,
        }));
    }

    if config.tick_period_us == 0 {
        return Err(Error::Config(ConfigError::InvalidTickPeriod(0)));
    }

    Ok(())
}

fn non_zero_ppr(field: &'static str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(Error::Config(ConfigError::InvalidPulsesPerRevolution {
            field,
            value,
        }));
    }
    Ok(())
}
