//! Mechanical constraints derived from machine configuration.

use super::machine::MachineConfig;
use super::units::Millimeters;

/// Derived leadscrew parameters computed from machine configuration.
///
/// These are computed once at initialization and used by every control tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MechanicalConstraints {
    /// Motor pulses per tracked position unit.
    pub accumulator_unit: f32,

    /// Spindle encoder pulses per revolution.
    pub spindle_pulses_per_revolution: u32,

    /// Motor pulses per millimetre of carriage travel.
    pub motor_pulses_per_mm: f32,

    /// Pulse delay from standstill, microseconds.
    pub initial_pulse_delay_us: f32,

    /// Pulse delay change per pulse, microseconds.
    pub pulse_delay_increment_us: f32,

    /// Fixed jog pulse delay, microseconds.
    pub jog_pulse_delay_us: u32,

    /// Control tick period, microseconds. Pulse edges land on ticks, so a
    /// pulse lasts at least one tick high plus its delay rounded up to ticks.
    pub tick_period_us: u32,

    /// Invert direction pin logic.
    pub invert_direction: bool,
}

impl MechanicalConstraints {
    /// Compute mechanical constraints from machine configuration.
    pub fn from_config(config: &MachineConfig) -> Self {
        let motor_pulses_per_mm =
            config.leadscrew.motor_pulses_per_revolution as f32 / config.leadscrew.pitch.value();

        Self {
            accumulator_unit: config.accumulator_unit(),
            spindle_pulses_per_revolution: config.spindle.encoder_pulses_per_revolution,
            motor_pulses_per_mm,
            initial_pulse_delay_us: config.motion.initial_pulse_delay_us,
            pulse_delay_increment_us: config.motion.pulse_delay_increment_us,
            jog_pulse_delay_us: config.motion.jog_pulse_delay_us,
            tick_period_us: config.motion.tick_period_us,
            invert_direction: config.leadscrew.invert_direction,
        }
    }

    /// Convert a motor pulse count to carriage travel.
    #[inline]
    pub fn pulses_to_mm(&self, pulses: f32) -> Millimeters {
        Millimeters(pulses / self.motor_pulses_per_mm)
    }
}
