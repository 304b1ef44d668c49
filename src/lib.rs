//! # els-motion
//!
//! Electronic leadscrew motion engine: a lathe leadscrew stepper that follows
//! the spindle encoder, for feeding and thread cutting, with embedded-hal 1.0
//! support.
//!
//! ## Features
//!
//! - **Spindle tracking**: Interrupt-safe quadrature decoding and speed estimate
//! - **Synchronized leadscrew**: Expected position = spindle travel × ratio,
//!   with fractional carry when the motor is finer than the tracked axis
//! - **Trapezoidal ramps**: Linear pulse-delay ramp that settles on the
//!   spindle's pace and brakes down to rest before stops and reversals
//! - **Operator stops**: Hard stops the carriage never crosses
//! - **Thread re-engagement**: Later passes restart on the same helix
//! - **no_std compatible**: Core library works without standard library
//! - **Configuration-driven**: Machine description from TOML files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use els_motion::{ElsSystem, PinIo, QuadratureEncoder, Spindle};
//!
//! static ENCODER: QuadratureEncoder = QuadratureEncoder::new();
//! static SPINDLE: Spindle = Spindle::new(400, 50_000);
//!
//! let config = els_motion::load_config("lathe.toml")?;
//! let mut els = ElsSystem::from_config(PinIo::new(step_pin, dir_pin), config)?;
//!
//! // encoder edge interrupt
//! ENCODER.on_edge(channel_a.is_high()?, channel_b.is_high()?);
//!
//! // 20us timer interrupt
//! SPINDLE.update(&ENCODER, now_us);
//! els.tick(&SPINDLE, now_us)?;
//!
//! // button handler
//! els.toggle_enabled();
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `defmt`: Derives `defmt::Format` on state and status types

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

// Core modules
pub mod axis;
pub mod config;
pub mod error;
pub mod io;
pub mod motion;
pub mod system;

// Re-exports for ergonomic API
pub use axis::{
    Derived, Driven, HasPosition, LeadAxis, Leadscrew, Linear, QuadratureEncoder, Rotational,
    Spindle, SyncAnchor,
};
pub use config::{
    validate_config, FeedMode, FeedSelector, MachineConfig, MechanicalConstraints, UnitMode,
};
pub use error::{Error, Result};
pub use io::{LatchedIo, LeadscrewIo, PinIo};
pub use motion::{Direction, MotionMode, MotionState, ThreadSyncState};
pub use system::{ElsSystem, StatusSnapshot};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Millimeters, MillimetersPerSec, Rpm};
