//! Axes of the lathe and the capabilities they expose.
//!
//! The spindle is a measured rotational axis; the leadscrew is a driven linear
//! axis whose target is derived from the spindle through a ratio. Each
//! capability is its own trait so consumers ask only for what they use.

mod leadscrew;
mod quadrature;
mod spindle;

pub use leadscrew::{Leadscrew, SyncAnchor};
pub use quadrature::QuadratureEncoder;
pub use spindle::Spindle;

use crate::config::{MillimetersPerSec, Rpm};
use crate::error::Result;
use crate::motion::MotionState;

/// Axis with an integer position in its own pulses.
pub trait HasPosition {
    /// Current position.
    fn current_position(&self) -> i32;

    /// Declare the current position to be zero.
    fn reset_current_position(&mut self);
}

/// Axis that turns.
pub trait Rotational {
    /// Estimated speed at `now_us`.
    fn estimated_velocity_rpm(&self, now_us: u32) -> Rpm;
}

/// Axis that moves the carriage.
pub trait Linear {
    /// Estimated carriage speed from the last completed pulse.
    fn estimated_velocity_mm_per_sec(&self) -> MillimetersPerSec;
}

/// Axis whose target follows another axis.
pub trait Derived {
    /// Own position units per lead-axis pulse.
    fn ratio(&self) -> f32;

    /// Change the ratio.
    fn set_ratio(&mut self, ratio: f32);
}

/// Source of lead-axis motion for a [`Driven`] axis.
pub trait LeadAxis {
    /// Take the movement accumulated since the previous call.
    fn consume_position(&self) -> i32;
}

/// Axis that is actively driven toward an expected position.
pub trait Driven {
    /// Position the axis should be at.
    fn expected_position(&self) -> f32;

    /// `expected_position - current_position`.
    fn position_error(&self) -> f32;

    /// Run one control tick.
    fn update<L: LeadAxis>(&mut self, lead: &L, state: &MotionState, now_us: u32) -> Result<()>;
}
