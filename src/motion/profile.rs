//! Trapezoidal pulse-delay profile.
//!
//! Speed is expressed as the delay between step pulses. Every completed pulse
//! moves the delay by a constant increment toward zero (accelerate) or toward
//! the initial delay (decelerate), which yields a linear ramp in pulse count.

use libm::{ceilf, sqrtf};

/// Direction of leadscrew motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Toward the headstock (negative position).
    Left,
    /// Toward the tailstock (positive position).
    Right,
}

impl Direction {
    /// Direction needed to close a position error, if the error is at least
    /// one position unit. Errors inside `(-1, 1)` are the dead zone.
    #[inline]
    pub fn from_error(error: f32) -> Option<Self> {
        if error >= 1.0 {
            Some(Direction::Right)
        } else if error <= -1.0 {
            Some(Direction::Left)
        } else {
            None
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub const fn sign(self) -> i32 {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }

    /// The other direction.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Level of the direction pin. Right is high unless inverted.
    #[inline]
    pub const fn pin_level(self, inverted: bool) -> bool {
        matches!(self, Direction::Right) != inverted
    }
}

/// Number of pulses needed to ramp from `current_delay` back to
/// `initial_delay` when each pulse adds `increment` to the delay.
///
/// Solves `n*d + n(n-1)/2 * s = D - d` for the non-negative root and rounds
/// up. A non-positive increment means there is no ramp, so the answer is 0.
pub fn stopping_distance(current_delay: f32, increment: f32, initial_delay: f32) -> u32 {
    if increment <= 0.0 {
        return 0;
    }

    let remaining = initial_delay - current_delay;
    if remaining <= 0.0 {
        return 0;
    }

    // (s/2)n^2 + (d - s/2)n - (D - d) = 0
    let b = current_delay - increment / 2.0;
    let discriminant = b * b + 2.0 * increment * remaining;
    let root = (-b + sqrtf(discriminant)) / increment;

    if root <= 0.0 {
        0
    } else {
        ceilf(root) as u32
    }
}

/// Pulse delay state, clamped to `[0, initial]` after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseDelayProfile {
    initial_us: f32,
    increment_us: f32,
    current_us: f32,
}

impl PulseDelayProfile {
    /// Profile resting at the initial delay.
    pub const fn new(initial_us: f32, increment_us: f32) -> Self {
        Self {
            initial_us,
            increment_us,
            current_us: initial_us,
        }
    }

    /// Current delay between pulses in microseconds.
    #[inline]
    pub fn current(&self) -> f32 {
        self.current_us
    }

    /// Delay from standstill.
    #[inline]
    pub fn initial(&self) -> f32 {
        self.initial_us
    }

    /// Whether the delay is back at the standstill value.
    #[inline]
    pub fn is_at_rest(&self) -> bool {
        self.current_us >= self.initial_us
    }

    /// Shorten the delay by one increment.
    pub fn accelerate(&mut self) {
        self.set(self.current_us - self.increment_us);
    }

    /// Lengthen the delay by one increment.
    pub fn decelerate(&mut self) {
        self.set(self.current_us + self.increment_us);
    }

    /// Return to the standstill delay.
    pub fn reset(&mut self) {
        self.current_us = self.initial_us;
    }

    /// Pulses left before the delay is back at rest, if decelerating now.
    ///
    /// The larger of [`stopping_distance`] and the pulse count of the linear
    /// ramp itself, so a stop planned with it is always reached at rest.
    pub fn pulses_to_stop(&self) -> u32 {
        stopping_distance(self.current_us, self.increment_us, self.initial_us)
            .max(self.pulses_to_reach(self.initial_us))
    }

    /// Decelerating pulses needed to lengthen the delay to `delay_us`.
    pub fn pulses_to_reach(&self, delay_us: f32) -> u32 {
        let target = delay_us.min(self.initial_us);
        if self.increment_us <= 0.0 || target <= self.current_us {
            return 0;
        }
        ceilf((target - self.current_us) / self.increment_us) as u32
    }

    /// Lengthen the delay to at least `delay_us`.
    pub fn slow_to(&mut self, delay_us: f32) {
        if delay_us > self.current_us {
            self.set(delay_us);
        }
    }

    fn set(&mut self, delay_us: f32) {
        self.current_us = delay_us.clamp(0.0, self.initial_us);
    }
}
