//! Configuration module for els-motion.
//!
//! Provides the machine description (encoder, leadscrew drive train, pulse
//! timing), the pitch tables the operator selects from, and loading from TOML
//! files (with `std` feature) or pre-built values.

mod machine;
mod mechanical;
pub mod pitch;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use machine::{FeedConfig, LeadscrewConfig, MachineConfig, MotionConfig, SpindleConfig};
pub use mechanical::MechanicalConstraints;
pub use pitch::{FeedMode, FeedSelector, UnitMode};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Millimeters, MillimetersPerSec, Rpm};
