//! ELS system facade.
//!
//! Ties the leadscrew, the shared motion state and the feed selection to the
//! operator's commands. Commands return whether they were accepted.

use crate::axis::{Derived, Driven, HasPosition, LeadAxis, Leadscrew, Linear, Spindle};
use crate::config::{FeedSelector, MachineConfig, Millimeters, MillimetersPerSec, Rpm};
use crate::config::{FeedMode, UnitMode};
use crate::error::Result;
use crate::io::LeadscrewIo;
use crate::motion::{Direction, MotionMode, MotionState, ThreadSyncState};

/// Everything a display needs, copied out in one go.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    /// Feed or thread.
    pub feed_mode: FeedMode,
    /// Metric or imperial.
    pub unit_mode: UnitMode,
    /// Selected pitch.
    pub pitch: Millimeters,
    /// Index into the active pitch table.
    pub pitch_index: usize,
    /// Current motion mode.
    pub motion_mode: MotionMode,
    /// Current thread sync state.
    pub thread_sync: ThreadSyncState,
    /// Whether operator commands are locked out.
    pub locked: bool,
    /// Spindle speed.
    pub spindle_rpm: Rpm,
    /// Leadscrew position in position units.
    pub leadscrew_position: i32,
    /// Leadscrew target in position units.
    pub expected_position: f32,
    /// Carriage speed, negative toward the headstock.
    pub leadscrew_velocity: MillimetersPerSec,
    /// Left stop, if set.
    pub left_stop: Option<i32>,
    /// Right stop, if set.
    pub right_stop: Option<i32>,
}

/// An electronic leadscrew: one spindle-driven leadscrew plus operator state.
///
/// The spindle itself is not owned: it is shared with the encoder interrupt
/// and passed into [`tick`](ElsSystem::tick) and
/// [`snapshot`](ElsSystem::snapshot).
///
/// # Example
///
/// ```rust
/// use els_motion::{ElsSystem, LatchedIo, MachineConfig, MotionMode, QuadratureEncoder, Spindle};
///
/// static ENCODER: QuadratureEncoder = QuadratureEncoder::new();
/// static SPINDLE: Spindle = Spindle::new(400, 50_000);
///
/// let mut els = ElsSystem::from_config(LatchedIo::new(), MachineConfig::default())?;
/// els.toggle_enabled();
///
/// // timer interrupt, every 20us
/// let now_us = 20;
/// SPINDLE.update(&ENCODER, now_us);
/// els.tick(&SPINDLE, now_us)?;
///
/// assert_eq!(els.snapshot(&SPINDLE, now_us).motion_mode, MotionMode::Enabled);
/// # Ok::<(), els_motion::Error>(())
/// ```
#[derive(Debug)]
pub struct ElsSystem<IO: LeadscrewIo> {
    config: MachineConfig,
    leadscrew: Leadscrew<IO>,
    state: MotionState,
    feed: FeedSelector,
    locked: bool,
}

impl<IO: LeadscrewIo> ElsSystem<IO> {
    /// Validate `config` and build the system, disabled and unlocked, with
    /// the configured default feed selected.
    ///
    /// # Errors
    ///
    /// Returns the first validation error of `config`.
    pub fn from_config(io: IO, config: MachineConfig) -> Result<Self> {
        let leadscrew = Leadscrew::from_config(io, &config)?;
        let feed = FeedSelector::new(config.feed.mode, config.feed.unit);

        let mut system = Self {
            config,
            leadscrew,
            state: MotionState::new(),
            feed,
            locked: false,
        };
        system.apply_ratio();
        log::info!(
            "els ready: {:?} {:?}, pitch {} mm",
            system.feed.feed_mode(),
            system.feed.unit_mode(),
            system.feed.pitch().value()
        );
        Ok(system)
    }

    /// Get the machine configuration.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Get the leadscrew.
    pub fn leadscrew(&self) -> &Leadscrew<IO> {
        &self.leadscrew
    }

    /// Get the leadscrew mutably.
    pub fn leadscrew_mut(&mut self) -> &mut Leadscrew<IO> {
        &mut self.leadscrew
    }

    /// Get the shared motion state.
    pub fn motion_state(&self) -> &MotionState {
        &self.state
    }

    /// Get the feed selection.
    pub fn feed_selector(&self) -> &FeedSelector {
        &self.feed
    }

    /// Whether operator commands are locked out.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Control tick: run the leadscrew once against the spindle.
    ///
    /// # Errors
    ///
    /// Returns an error if the step/direction port fails.
    pub fn tick<L: LeadAxis>(&mut self, spindle: &L, now_us: u32) -> Result<()> {
        self.leadscrew.update(spindle, &self.state, now_us)
    }

    /// Switch between following the spindle and standing still.
    pub fn toggle_enabled(&mut self) -> bool {
        if !self.unlocked("enable") {
            return false;
        }

        let next = match self.state.motion_mode() {
            MotionMode::Enabled => MotionMode::Disabled,
            MotionMode::Disabled | MotionMode::Jog => MotionMode::Enabled,
        };
        self.state.set_motion_mode(next);
        true
    }

    /// Jog one position unit. Ignored while following the spindle.
    pub fn jog(&mut self, direction: Direction) -> bool {
        if !self.unlocked("jog") || self.is_enabled("jog") {
            return false;
        }

        self.state.set_motion_mode(MotionMode::Jog);
        self.state.set_thread_sync_state(ThreadSyncState::Unsync);
        self.leadscrew.jog(direction);
        true
    }

    /// Leave jog mode.
    pub fn end_jog(&mut self) -> bool {
        if self.state.motion_mode() != MotionMode::Jog {
            return false;
        }
        self.state.set_motion_mode(MotionMode::Disabled);
        true
    }

    /// Set a stop at the current leadscrew position. Ignored while following
    /// the spindle.
    pub fn set_stop(&mut self, side: Direction) -> bool {
        if !self.unlocked("set stop") || self.is_enabled("set stop") {
            return false;
        }

        let position = self.leadscrew.current_position();
        self.leadscrew.set_stop_position(side, position);
        true
    }

    /// Clear a stop.
    pub fn unset_stop(&mut self, side: Direction) -> bool {
        if !self.unlocked("clear stop") {
            return false;
        }
        self.leadscrew.unset_stop_position(side);
        true
    }

    /// Declare the current leadscrew position zero. Ignored while following
    /// the spindle.
    pub fn home(&mut self) -> bool {
        if !self.unlocked("home") || self.is_enabled("home") {
            return false;
        }
        self.leadscrew.reset_current_position();
        true
    }

    /// Select the next pitch in the table.
    pub fn next_pitch(&mut self) -> bool {
        self.change_feed("next pitch", FeedSelector::next)
    }

    /// Select the previous pitch in the table.
    pub fn prev_pitch(&mut self) -> bool {
        self.change_feed("previous pitch", FeedSelector::prev)
    }

    /// Switch between feeding and threading.
    pub fn toggle_feed_mode(&mut self) -> bool {
        self.change_feed("feed mode", |feed| {
            feed.set_feed_mode(feed.feed_mode().toggled())
        })
    }

    /// Switch between metric and imperial tables.
    pub fn toggle_unit_mode(&mut self) -> bool {
        self.change_feed("unit mode", |feed| {
            feed.set_unit_mode(feed.unit_mode().toggled())
        })
    }

    /// Lock or unlock operator commands. Always accepted; returns the new
    /// lock state.
    pub fn toggle_button_lock(&mut self) -> bool {
        self.locked = !self.locked;
        log::info!("buttons {}", if self.locked { "locked" } else { "unlocked" });
        self.locked
    }

    /// Drop the phase relation so the next pass re-engages at the anchor.
    /// Only meaningful while following the spindle.
    pub fn request_resync(&mut self) -> bool {
        if !self.unlocked("resync") || self.state.motion_mode() != MotionMode::Enabled {
            return false;
        }
        self.state.set_thread_sync_state(ThreadSyncState::Unsync);
        true
    }

    /// Copy out the display state.
    pub fn snapshot(&self, spindle: &Spindle, now_us: u32) -> StatusSnapshot {
        StatusSnapshot {
            feed_mode: self.feed.feed_mode(),
            unit_mode: self.feed.unit_mode(),
            pitch: self.feed.pitch(),
            pitch_index: self.feed.index(),
            motion_mode: self.state.motion_mode(),
            thread_sync: self.state.thread_sync_state(),
            locked: self.locked,
            spindle_rpm: spindle.estimated_velocity_rpm(now_us),
            leadscrew_position: self.leadscrew.current_position(),
            expected_position: self.leadscrew.expected_position(),
            leadscrew_velocity: self.leadscrew.estimated_velocity_mm_per_sec(),
            left_stop: self.leadscrew.stop_position(Direction::Left),
            right_stop: self.leadscrew.stop_position(Direction::Right),
        }
    }

    fn change_feed(&mut self, command: &str, change: impl FnOnce(&mut FeedSelector)) -> bool {
        if !self.unlocked(command) {
            return false;
        }
        change(&mut self.feed);
        self.apply_ratio();
        log::info!(
            "{:?} {:?} #{}: {} mm/rev",
            self.feed.feed_mode(),
            self.feed.unit_mode(),
            self.feed.index(),
            self.feed.pitch().value()
        );
        true
    }

    fn apply_ratio(&mut self) {
        let ratio = self.config.ratio_for_pitch(self.feed.pitch());
        self.leadscrew.set_ratio(ratio);
    }

    fn unlocked(&self, command: &str) -> bool {
        if self.locked {
            log::debug!("{} ignored: buttons locked", command);
        }
        !self.locked
    }

    fn is_enabled(&self, command: &str) -> bool {
        let enabled = self.state.motion_mode() == MotionMode::Enabled;
        if enabled {
            log::debug!("{} ignored while enabled", command);
        }
        enabled
    }
}
