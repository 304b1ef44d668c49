//! Motion module for els-motion.
//!
//! Provides the pulse-delay ramp, stopping distance and the shared
//! motion/sync state.

mod profile;
mod state;

pub use profile::{stopping_distance, Direction, PulseDelayProfile};
pub use state::{MotionMode, MotionState, ThreadSyncState};
