//! Error types for els-motion.
//!
//! Configuration problems are reported before the control loop starts. Pin
//! failures are the only errors the control tick itself can produce.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all els-motion operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Step/direction port error
    Io(IoError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// A pulses-per-revolution value is zero
    InvalidPulsesPerRevolution {
        /// Configuration field holding the value
        field: &'static str,
        /// Offending value
        value: u32,
    },
    /// Leadscrew pitch must be finite and > 0
    InvalidLeadscrewPitch(f32),
    /// Motor resolution is coarser than the tracked lead-axis resolution
    InsufficientMotorResolution {
        /// Motor pulses per leadscrew revolution
        motor_ppr: u32,
        /// Lead-axis pulses per leadscrew revolution
        lead_axis_ppr: u32,
    },
    /// Pulse delay must be finite and >= 0
    InvalidPulseDelay(f32),
    /// Pulse delay increment must be finite, >= 0 and not above the initial delay
    InvalidPulseDelayIncrement {
        /// Configured increment in microseconds
        increment: f32,
        /// Configured initial delay in microseconds
        initial: f32,
    },
    /// Control tick period must be > 0
    InvalidTickPeriod(u32),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Which output of the step/direction port failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinRole {
    /// Step output
    Step,
    /// Direction output
    Direction,
}

/// Step/direction port errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Pin write or read-back failed
    Pin(PinRole),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidPulsesPerRevolution { field, value } => {
                write!(f, "Invalid {}: {}. Must be between 1 and {}", field, value, i32::MAX)
            }
            ConfigError::InvalidLeadscrewPitch(v) => {
                write!(f, "Invalid leadscrew pitch: {}. Must be > 0", v)
            }
            ConfigError::InsufficientMotorResolution {
                motor_ppr,
                lead_axis_ppr,
            } => write!(
                f,
                "Motor pulses per revolution ({}) must be >= lead-axis pulses per revolution ({})",
                motor_ppr, lead_axis_ppr
            ),
            ConfigError::InvalidPulseDelay(v) => {
                write!(f, "Invalid pulse delay: {}. Must be >= 0", v)
            }
            ConfigError::InvalidPulseDelayIncrement { increment, initial } => write!(
                f,
                "Invalid pulse delay increment: {}. Must be between 0 and the initial delay ({})",
                increment, initial
            ),
            ConfigError::InvalidTickPeriod(v) => {
                write!(f, "Invalid tick period: {}. Must be > 0", v)
            }
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinRole::Step => write!(f, "step"),
            PinRole::Direction => write!(f, "direction"),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Pin(role) => write!(f, "{} pin operation failed", role),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for IoError {}
