//! Spindle: measured rotational axis fed from the encoder.

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use super::{HasPosition, LeadAxis, QuadratureEncoder, Rotational};
use crate::config::{MachineConfig, Rpm};

const MICROS_PER_MINUTE: f32 = 60_000_000.0;

/// Spindle position and speed tracking.
///
/// All state lives in atomics so a `static Spindle` can be written from the
/// encoder interrupt and read from the control tick. The position wraps into
/// `[0, PPR)`; the unconsumed delta is the raw signed pulse count since the
/// last [`consume_position`](Spindle::consume_position).
///
/// # Example
///
/// ```rust
/// use els_motion::{QuadratureEncoder, Spindle};
///
/// static ENCODER: QuadratureEncoder = QuadratureEncoder::new();
/// static SPINDLE: Spindle = Spindle::new(400, 50_000);
///
/// // edge interrupt
/// ENCODER.on_edge(true, false);
///
/// // control tick
/// SPINDLE.update(&ENCODER, 20);
/// assert_eq!(SPINDLE.consume_position(), 1);
/// ```
#[derive(Debug)]
pub struct Spindle {
    pulses_per_revolution: i32,
    velocity_timeout_us: u32,
    current_position: AtomicI32,
    unconsumed_position: AtomicI32,
    last_pulse_us: AtomicU32,
    /// Zero until the first pulse.
    last_full_pulse_duration_us: AtomicU32,
}

impl Spindle {
    /// Create a spindle with the given encoder resolution.
    ///
    /// # Panics
    ///
    /// Panics if `pulses_per_revolution` is zero or does not fit an `i32`.
    /// In a `static` initializer this is a compile-time error.
    pub const fn new(pulses_per_revolution: u32, velocity_timeout_us: u32) -> Self {
        assert!(pulses_per_revolution > 0 && pulses_per_revolution <= i32::MAX as u32);

        Self {
            pulses_per_revolution: pulses_per_revolution as i32,
            velocity_timeout_us,
            current_position: AtomicI32::new(0),
            unconsumed_position: AtomicI32::new(0),
            last_pulse_us: AtomicU32::new(0),
            last_full_pulse_duration_us: AtomicU32::new(0),
        }
    }

    /// Create a spindle from a validated machine configuration.
    ///
    /// # Panics
    ///
    /// Panics on an encoder resolution that [`validate_config`] rejects.
    ///
    /// [`validate_config`]: crate::config::validate_config
    pub fn from_config(config: &MachineConfig) -> Self {
        Self::new(
            config.spindle.encoder_pulses_per_revolution,
            config.spindle.velocity_timeout_us,
        )
    }

    /// Encoder pulses per revolution.
    #[inline]
    pub fn pulses_per_revolution(&self) -> u32 {
        self.pulses_per_revolution as u32
    }

    /// Apply `delta` encoder pulses observed at `now_us`.
    pub fn increment_current_position(&self, delta: i32, now_us: u32) {
        if delta == 0 {
            return;
        }

        let ppr = self.pulses_per_revolution;
        // The closure always returns Some, so this cannot fail.
        let _ = self
            .current_position
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |position| {
                Some(position.wrapping_add(delta % ppr).rem_euclid(ppr))
            });
        self.unconsumed_position.fetch_add(delta, Ordering::AcqRel);

        let previous = self.last_pulse_us.swap(now_us, Ordering::AcqRel);
        let per_pulse = now_us.wrapping_sub(previous) / delta.unsigned_abs();
        self.last_full_pulse_duration_us
            .store(per_pulse.max(1), Ordering::Release);
    }

    /// Drain the encoder into the spindle.
    #[inline]
    pub fn update(&self, encoder: &QuadratureEncoder, now_us: u32) {
        self.increment_current_position(encoder.take(), now_us);
    }

    /// Take the signed pulse count accumulated since the previous call.
    #[inline]
    pub fn consume_position(&self) -> i32 {
        self.unconsumed_position.swap(0, Ordering::AcqRel)
    }

    /// Wrapped angular position in `[0, PPR)`.
    #[inline]
    pub fn current_position(&self) -> i32 {
        self.current_position.load(Ordering::Acquire)
    }

    /// Declare the current angle to be zero. Unconsumed pulses are kept.
    #[inline]
    pub fn reset(&self) {
        self.current_position.store(0, Ordering::Release);
    }

    /// Estimated speed at `now_us`; zero before the first pulse or once the
    /// estimate is older than the configured timeout.
    pub fn estimated_velocity_rpm(&self, now_us: u32) -> Rpm {
        let duration = self.last_full_pulse_duration_us.load(Ordering::Acquire);
        if duration == 0 || duration > self.velocity_timeout_us {
            return Rpm::ZERO;
        }

        let since_last = now_us.wrapping_sub(self.last_pulse_us.load(Ordering::Acquire));
        if since_last > self.velocity_timeout_us {
            return Rpm::ZERO;
        }

        Rpm(MICROS_PER_MINUTE / duration as f32 / self.pulses_per_revolution as f32)
    }
}

impl HasPosition for Spindle {
    fn current_position(&self) -> i32 {
        Spindle::current_position(self)
    }

    fn reset_current_position(&mut self) {
        self.reset();
    }
}

impl Rotational for Spindle {
    fn estimated_velocity_rpm(&self, now_us: u32) -> Rpm {
        Spindle::estimated_velocity_rpm(self, now_us)
    }
}

impl LeadAxis for Spindle {
    fn consume_position(&self) -> i32 {
        Spindle::consume_position(self)
    }
}
