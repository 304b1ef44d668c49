//! Quadrature decoding of the spindle encoder.

use core::sync::atomic::{AtomicI32, AtomicU8, Ordering};

/// Count change for `TRANSITIONS[old * 4 + new]`, state = `(b << 1) | a`.
///
/// Gray-code neighbours count ±1; no change and double steps count 0.
const TRANSITIONS: [i8; 16] = [
    0, 1, -1, 0, //
    -1, 0, 0, 1, //
    1, 0, 0, -1, //
    0, -1, 1, 0, //
];

/// Two-channel encoder decoder fed from the edge interrupt.
///
/// `on_edge` is a table lookup plus two atomic operations, so it can run in
/// interrupt context while the control tick drains the count with [`take`].
///
/// [`take`]: QuadratureEncoder::take
#[derive(Debug)]
pub struct QuadratureEncoder {
    state: AtomicU8,
    count: AtomicI32,
}

impl QuadratureEncoder {
    /// Decoder assuming both channels start low.
    pub const fn new() -> Self {
        Self::with_levels(false, false)
    }

    /// Decoder seeded with the current channel levels.
    pub const fn with_levels(a: bool, b: bool) -> Self {
        Self {
            state: AtomicU8::new(encode(a, b)),
            count: AtomicI32::new(0),
        }
    }

    /// Count change between two channel states. Invalid transitions give 0.
    #[inline]
    pub const fn decode(old: u8, new: u8) -> i32 {
        TRANSITIONS[((old & 0b11) * 4 + (new & 0b11)) as usize] as i32
    }

    /// Record new channel levels.
    #[inline]
    pub fn on_edge(&self, a: bool, b: bool) {
        let new = encode(a, b);
        let old = self.state.swap(new, Ordering::Relaxed);
        self.count
            .fetch_add(Self::decode(old, new), Ordering::Relaxed);
    }

    /// Take the count accumulated since the previous call.
    #[inline]
    pub fn take(&self) -> i32 {
        self.count.swap(0, Ordering::AcqRel)
    }
}

impl Default for QuadratureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
const fn encode(a: bool, b: bool) -> u8 {
    ((b as u8) << 1) | a as u8
}
