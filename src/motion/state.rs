//! Operator-facing motion state shared between the input handler and the
//! control tick.
//!
//! Both fields are single bytes behind atomics, so the input context can
//! change them while the tick reads them without locking.

use core::sync::atomic::{AtomicU8, Ordering};

/// What the leadscrew is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MotionMode {
    /// No motion; spindle movement is ignored.
    #[default]
    Disabled = 0,
    /// Operator-driven fixed-rate motion; spindle movement is ignored.
    Jog = 1,
    /// Leadscrew follows the spindle.
    Enabled = 2,
}

impl MotionMode {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => MotionMode::Jog,
            2 => MotionMode::Enabled,
            _ => MotionMode::Disabled,
        }
    }

    /// Mode name for display/debugging.
    pub const fn name(self) -> &'static str {
        match self {
            MotionMode::Disabled => "Disabled",
            MotionMode::Jog => "Jog",
            MotionMode::Enabled => "Enabled",
        }
    }
}

/// Whether the leadscrew holds a known phase relation to the spindle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ThreadSyncState {
    /// Following the spindle in phase.
    Sync = 0,
    /// Phase lost; waiting to re-engage.
    #[default]
    Unsync = 1,
}

impl ThreadSyncState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ThreadSyncState::Sync,
            _ => ThreadSyncState::Unsync,
        }
    }

    /// State name for display/debugging.
    pub const fn name(self) -> &'static str {
        match self {
            ThreadSyncState::Sync => "Sync",
            ThreadSyncState::Unsync => "Unsync",
        }
    }
}

/// Motion mode and thread sync state, shared by reference.
#[derive(Debug)]
pub struct MotionState {
    motion_mode: AtomicU8,
    thread_sync: AtomicU8,
}

impl MotionState {
    /// Disabled and unsynchronized.
    pub const fn new() -> Self {
        Self {
            motion_mode: AtomicU8::new(MotionMode::Disabled as u8),
            thread_sync: AtomicU8::new(ThreadSyncState::Unsync as u8),
        }
    }

    /// Current motion mode.
    #[inline]
    pub fn motion_mode(&self) -> MotionMode {
        MotionMode::from_u8(self.motion_mode.load(Ordering::Acquire))
    }

    /// Change the motion mode.
    pub fn set_motion_mode(&self, mode: MotionMode) {
        let previous = MotionMode::from_u8(self.motion_mode.swap(mode as u8, Ordering::AcqRel));
        if previous != mode {
            log::debug!("motion mode {} -> {}", previous.name(), mode.name());
        }
    }

    /// Current thread sync state.
    #[inline]
    pub fn thread_sync_state(&self) -> ThreadSyncState {
        ThreadSyncState::from_u8(self.thread_sync.load(Ordering::Acquire))
    }

    /// Change the thread sync state.
    pub fn set_thread_sync_state(&self, state: ThreadSyncState) {
        let previous =
            ThreadSyncState::from_u8(self.thread_sync.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            log::trace!("thread sync {} -> {}", previous.name(), state.name());
        }
    }
}

impl Default for MotionState {
    fn default() -> Self {
        Self::new()
    }
}
