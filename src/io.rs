//! Step/direction output port.
//!
//! The leadscrew only ever talks to its driver through [`LeadscrewIo`]: two
//! outputs that can be written and read back. [`PinIo`] adapts a pair of
//! embedded-hal 1.0 pins, [`LatchedIo`] is a pair of plain bits for tests and
//! simulation.

use embedded_hal::digital::StatefulOutputPin;

use crate::error::{IoError, PinRole};

/// Step and direction outputs with read-back of the last written level.
pub trait LeadscrewIo {
    /// Drive the step output.
    fn write_step_pin(&mut self, high: bool) -> Result<(), IoError>;

    /// Level last driven on the step output.
    fn read_step_pin(&mut self) -> Result<bool, IoError>;

    /// Drive the direction output.
    fn write_dir_pin(&mut self, high: bool) -> Result<(), IoError>;

    /// Level last driven on the direction output.
    fn read_dir_pin(&mut self) -> Result<bool, IoError>;
}

/// Two latched bits. Counts rising step edges for inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatchedIo {
    step: bool,
    dir: bool,
    rising_edges: u32,
}

impl LatchedIo {
    /// Both outputs low.
    pub const fn new() -> Self {
        Self {
            step: false,
            dir: false,
            rising_edges: 0,
        }
    }

    /// Number of step pulses started so far.
    #[inline]
    pub fn pulse_count(&self) -> u32 {
        self.rising_edges
    }

    /// Current step level.
    #[inline]
    pub fn step(&self) -> bool {
        self.step
    }

    /// Current direction level.
    #[inline]
    pub fn dir(&self) -> bool {
        self.dir
    }
}

impl LeadscrewIo for LatchedIo {
    fn write_step_pin(&mut self, high: bool) -> Result<(), IoError> {
        if high && !self.step {
            self.rising_edges = self.rising_edges.wrapping_add(1);
        }
        self.step = high;
        Ok(())
    }

    fn read_step_pin(&mut self) -> Result<bool, IoError> {
        Ok(self.step)
    }

    fn write_dir_pin(&mut self, high: bool) -> Result<(), IoError> {
        self.dir = high;
        Ok(())
    }

    fn read_dir_pin(&mut self) -> Result<bool, IoError> {
        Ok(self.dir)
    }
}

/// Step/direction port over embedded-hal pins.
///
/// # Type Parameters
///
/// - `STEP`: STEP pin type (must implement `StatefulOutputPin`)
/// - `DIR`: DIR pin type (must implement `StatefulOutputPin`)
#[derive(Debug)]
pub struct PinIo<STEP, DIR>
where
    STEP: StatefulOutputPin,
    DIR: StatefulOutputPin,
{
    step_pin: STEP,
    dir_pin: DIR,
}

impl<STEP, DIR> PinIo<STEP, DIR>
where
    STEP: StatefulOutputPin,
    DIR: StatefulOutputPin,
{
    /// Wrap a step and a direction pin.
    pub fn new(step_pin: STEP, dir_pin: DIR) -> Self {
        Self { step_pin, dir_pin }
    }

    /// Give the pins back.
    pub fn release(self) -> (STEP, DIR) {
        (self.step_pin, self.dir_pin)
    }
}

impl<STEP, DIR> LeadscrewIo for PinIo<STEP, DIR>
where
    STEP: StatefulOutputPin,
    DIR: StatefulOutputPin,
{
    fn write_step_pin(&mut self, high: bool) -> Result<(), IoError> {
        let result = if high {
            self.step_pin.set_high()
        } else {
            self.step_pin.set_low()
        };
        result.map_err(|_| IoError::Pin(PinRole::Step))
    }

    fn read_step_pin(&mut self) -> Result<bool, IoError> {
        self.step_pin
            .is_set_high()
            .map_err(|_| IoError::Pin(PinRole::Step))
    }

    fn write_dir_pin(&mut self, high: bool) -> Result<(), IoError> {
        let result = if high {
            self.dir_pin.set_high()
        } else {
            self.dir_pin.set_low()
        };
        result.map_err(|_| IoError::Pin(PinRole::Direction))
    }

    fn read_dir_pin(&mut self) -> Result<bool, IoError> {
        self.dir_pin
            .is_set_high()
            .map_err(|_| IoError::Pin(PinRole::Direction))
    }
}
