//! Machine configuration - root configuration structure.

use heapless::String;
use serde::Deserialize;

use super::pitch::{FeedMode, UnitMode};
use super::units::Millimeters;

/// Root configuration structure from TOML.
///
/// Every section and field is optional; omitted values take the defaults of
/// a 400-line encoder on the spindle driving a 1.25 mm leadscrew.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Human-readable machine name (max 32 chars).
    pub name: String<32>,

    /// Spindle encoder.
    pub spindle: SpindleConfig,

    /// Leadscrew drive train.
    pub leadscrew: LeadscrewConfig,

    /// Pulse timing.
    pub motion: MotionConfig,

    /// Feed selection at power-up.
    pub feed: FeedConfig,
}

/// Spindle encoder parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpindleConfig {
    /// Quadrature counts per spindle revolution.
    pub encoder_pulses_per_revolution: u32,

    /// Velocity estimates older than this read as zero.
    pub velocity_timeout_us: u32,
}

impl Default for SpindleConfig {
    fn default() -> Self {
        Self {
            encoder_pulses_per_revolution: 400,
            velocity_timeout_us: 50_000,
        }
    }
}

/// Leadscrew drive train parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeadscrewConfig {
    /// Motor step pulses per leadscrew revolution (microstepping and gearing included).
    pub motor_pulses_per_revolution: u32,

    /// Position units tracked per leadscrew revolution.
    pub lead_axis_pulses_per_revolution: u32,

    /// Leadscrew pitch.
    #[serde(rename = "pitch_mm")]
    pub pitch: Millimeters,

    /// Invert direction pin logic.
    pub invert_direction: bool,
}

impl Default for LeadscrewConfig {
    fn default() -> Self {
        Self {
            motor_pulses_per_revolution: 400,
            lead_axis_pulses_per_revolution: 400,
            pitch: Millimeters(1.25),
            invert_direction: false,
        }
    }
}

/// Pulse timing parameters, all in microseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Delay between pulses from standstill (slowest speed of the ramp).
    pub initial_pulse_delay_us: f32,

    /// Delay change per pulse while accelerating or decelerating.
    pub pulse_delay_increment_us: f32,

    /// Fixed delay between pulses while jogging.
    pub jog_pulse_delay_us: u32,

    /// Period of the control tick.
    pub tick_period_us: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            initial_pulse_delay_us: 1000.0,
            pulse_delay_increment_us: 10.0,
            jog_pulse_delay_us: 500,
            tick_period_us: 20,
        }
    }
}

/// Feed selection at power-up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed or thread.
    pub mode: FeedMode,

    /// Metric or imperial tables.
    pub unit: UnitMode,
}

impl MachineConfig {
    /// Motor pulses per tracked position unit (`>= 1` once validated).
    pub fn accumulator_unit(&self) -> f32 {
        self.leadscrew.motor_pulses_per_revolution as f32
            / self.leadscrew.lead_axis_pulses_per_revolution as f32
    }

    /// Leadscrew position units per spindle encoder pulse for a pitch.
    ///
    /// One spindle revolution must move the carriage by `pitch`, which takes
    /// `pitch / leadscrew_pitch` leadscrew revolutions.
    pub fn ratio_for_pitch(&self, pitch: Millimeters) -> f32 {
        pitch.value() * self.leadscrew.lead_axis_pulses_per_revolution as f32
            / (self.leadscrew.pitch.value() * self.spindle.encoder_pulses_per_revolution as f32)
    }
}
