//! Leadscrew: driven linear axis that follows the spindle.
//!
//! Every control tick the leadscrew takes the spindle movement since the last
//! tick, scales it by the ratio into its expected position and moves one step
//! edge closer to it. Speed follows a linear ramp of the pulse delay. The ramp
//! speeds up until the leadscrew keeps pace with the spindle, and slows down
//! early enough to stop on a still target or at an operator stop. A reversal
//! keeps stepping the old way on a lengthening delay until the ramp is back at
//! rest.
//!
//! Positions are counted in position units (lead-axis pulses). When the motor
//! is finer than the lead axis, several motor pulses make one position unit;
//! the accumulator counts them down.

use libm::{fabsf, roundf};

use super::{Derived, Driven, HasPosition, LeadAxis, Linear};
use crate::config::{validate_config, MachineConfig, MechanicalConstraints, MillimetersPerSec};
use crate::error::Result;
use crate::io::LeadscrewIo;
use crate::motion::{Direction, MotionMode, MotionState, PulseDelayProfile, ThreadSyncState};

/// Spindle phase recorded with the leadscrew at rest, used to re-engage a
/// thread on the same helix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncAnchor {
    /// Stop the anchor belongs to.
    pub side: Direction,
    /// Leadscrew position when the phase was recorded.
    pub position: i32,
    /// Spindle phase in `[0, PPR)` at that position.
    pub spindle_phase: i32,
}

/// What the position error asks for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Demand {
    /// Inside the dead zone.
    Hold,
    /// Wants to move past a stop; expected position was pulled back.
    AtStop,
    /// Move this way.
    Move(Direction),
}

impl Demand {
    fn direction(self) -> Option<Direction> {
        match self {
            Demand::Move(direction) => Some(direction),
            Demand::Hold | Demand::AtStop => None,
        }
    }
}

/// Leadscrew control loop over a step/direction port.
///
/// # Type Parameters
///
/// - `IO`: step/direction output port
///
/// # Example
///
/// ```rust
/// use els_motion::{
///     Derived, Driven, LatchedIo, Leadscrew, MachineConfig, MotionMode, MotionState, Spindle,
/// };
///
/// let config = MachineConfig::default();
/// let spindle = Spindle::from_config(&config);
/// let state = MotionState::new();
/// let mut leadscrew = Leadscrew::from_config(LatchedIo::new(), &config)?;
/// leadscrew.set_ratio(1.0);
///
/// state.set_motion_mode(MotionMode::Enabled);
/// spindle.increment_current_position(10, 0);
/// for tick in 0..1_000u32 {
///     leadscrew.update(&spindle, &state, tick * 20)?;
/// }
/// assert_eq!(leadscrew.current_position(), 10);
/// # Ok::<(), els_motion::Error>(())
/// ```
#[derive(Debug)]
pub struct Leadscrew<IO: LeadscrewIo> {
    io: IO,
    constraints: MechanicalConstraints,
    ratio: f32,
    expected_position: f32,
    current_position: i32,
    direction: Option<Direction>,
    pulse_delay: PulseDelayProfile,
    /// Once set, the delay only grows until the ramp is back at rest.
    decelerating: bool,
    /// Motor pulses left in the current position unit, signed by direction.
    accumulator: f32,
    last_pulse_us: u32,
    last_full_pulse_duration_us: u32,
    left_stop: Option<i32>,
    right_stop: Option<i32>,
    sync_anchor: Option<SyncAnchor>,
    /// Spindle angle rebuilt from consumed deltas, so it always agrees with
    /// what has been applied to the expected position.
    spindle_phase: i32,
    /// Last tick that consumed spindle movement.
    spindle_moved_us: u32,
    /// Microseconds per spindle pulse over that movement.
    spindle_period_us: u32,
    /// Sign of that movement, 0 before the spindle has moved.
    spindle_heading: i32,
}

impl<IO: LeadscrewIo> Leadscrew<IO> {
    /// Create a leadscrew at position zero with ratio zero.
    ///
    /// `constraints` must come from a validated configuration.
    pub fn new(io: IO, constraints: MechanicalConstraints) -> Self {
        let pulse_delay = PulseDelayProfile::new(
            constraints.initial_pulse_delay_us,
            constraints.pulse_delay_increment_us,
        );

        Self {
            io,
            constraints,
            ratio: 0.0,
            expected_position: 0.0,
            current_position: 0,
            direction: None,
            pulse_delay,
            decelerating: false,
            accumulator: 0.0,
            last_pulse_us: 0,
            last_full_pulse_duration_us: 0,
            left_stop: None,
            right_stop: None,
            sync_anchor: None,
            spindle_phase: 0,
            spindle_moved_us: 0,
            spindle_period_us: 0,
            spindle_heading: 0,
        }
    }

    /// Validate `config` and create a leadscrew from it.
    ///
    /// # Errors
    ///
    /// Returns the first validation error of `config`.
    pub fn from_config(io: IO, config: &MachineConfig) -> Result<Self> {
        validate_config(config)?;
        Ok(Self::new(io, MechanicalConstraints::from_config(config)))
    }

    /// Derived parameters in use.
    #[inline]
    pub fn constraints(&self) -> &MechanicalConstraints {
        &self.constraints
    }

    /// The step/direction port.
    #[inline]
    pub fn io(&self) -> &IO {
        &self.io
    }

    /// Mutable access to the step/direction port.
    #[inline]
    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    /// Current position in position units.
    #[inline]
    pub fn current_position(&self) -> i32 {
        self.current_position
    }

    /// Direction of the motion in progress, `None` at rest.
    #[inline]
    pub fn current_direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Current delay between pulses in microseconds.
    #[inline]
    pub fn current_pulse_delay(&self) -> f32 {
        self.pulse_delay.current()
    }

    /// Whether the ramp is committed to slowing down.
    #[inline]
    pub fn is_decelerating(&self) -> bool {
        self.decelerating
    }

    /// Motor pulses left in the current position unit.
    #[inline]
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Spindle phase as seen through consumed deltas.
    #[inline]
    pub fn spindle_phase(&self) -> i32 {
        self.spindle_phase
    }

    /// Anchor used to re-engage a thread, if recorded.
    #[inline]
    pub fn sync_anchor(&self) -> Option<SyncAnchor> {
        self.sync_anchor
    }

    /// Stop on `side`, if set.
    #[inline]
    pub fn stop_position(&self, side: Direction) -> Option<i32> {
        match side {
            Direction::Left => self.left_stop,
            Direction::Right => self.right_stop,
        }
    }

    /// Move the expected position by one unit for jogging.
    pub fn jog(&mut self, direction: Direction) {
        self.expected_position += direction.sign() as f32;
    }

    /// Set the stop on `side`.
    ///
    /// With the leadscrew settled on its target, the current spindle phase is
    /// recorded as the thread sync anchor.
    pub fn set_stop_position(&mut self, side: Direction, position: i32) {
        match side {
            Direction::Left => self.left_stop = Some(position),
            Direction::Right => self.right_stop = Some(position),
        }
        log::info!("{:?} stop set at {}", side, position);

        if fabsf(self.position_error()) < 1.0 {
            self.sync_anchor = Some(SyncAnchor {
                side,
                position: self.current_position,
                spindle_phase: self.spindle_phase,
            });
            log::debug!(
                "sync anchor at position {} phase {}",
                self.current_position,
                self.spindle_phase
            );
        }
    }

    /// Clear the stop on `side`.
    ///
    /// An anchor belonging to that stop moves to the other stop if it is set,
    /// otherwise it is dropped.
    pub fn unset_stop_position(&mut self, side: Direction) {
        match side {
            Direction::Left => self.left_stop = None,
            Direction::Right => self.right_stop = None,
        }
        log::info!("{:?} stop cleared", side);

        let Some(anchor) = self.sync_anchor else {
            return;
        };
        if anchor.side != side {
            return;
        }

        self.sync_anchor = match self.stop_position(side.opposite()) {
            Some(other) if self.ratio != 0.0 => Some(SyncAnchor {
                side: side.opposite(),
                position: other,
                spindle_phase: self.predicted_phase(&anchor, other),
            }),
            _ => None,
        };
        if self.sync_anchor.is_none() {
            log::debug!("sync anchor cleared");
        }
    }

    fn update_disabled(&mut self, state: &MotionState, now_us: u32) -> Result<()> {
        if self.io.read_step_pin()? {
            self.finish_pulse(now_us, false)?;
        }

        self.expected_position = self.current_position as f32;
        self.release();
        state.set_thread_sync_state(ThreadSyncState::Unsync);
        Ok(())
    }

    fn update_jog(&mut self, state: &MotionState, now_us: u32) -> Result<()> {
        state.set_thread_sync_state(ThreadSyncState::Unsync);

        if self.io.read_step_pin()? {
            return self.finish_pulse(now_us, false);
        }

        let Some(required) = self.demand().direction() else {
            self.release();
            return Ok(());
        };

        match self.direction {
            None => self.start_moving(required)?,
            // Spend one tick at rest before turning around.
            Some(current) if current != required => {
                self.release();
                return Ok(());
            }
            Some(_) => {}
        }

        if self.pulse_due(now_us, self.constraints.jog_pulse_delay_us as f32) {
            self.io.write_step_pin(true)?;
        }
        Ok(())
    }

    fn update_enabled(&mut self, delta: i32, state: &MotionState, now_us: u32) -> Result<()> {
        let engaged = self.follow_spindle(delta, state);

        let demand = self.demand();
        if demand == Demand::AtStop {
            state.set_thread_sync_state(ThreadSyncState::Unsync);
        } else if engaged {
            state.set_thread_sync_state(ThreadSyncState::Sync);
        }

        if self.io.read_step_pin()? {
            return self.finish_pulse(now_us, true);
        }

        match (self.direction, demand) {
            (None, Demand::Move(required)) => {
                self.start_moving(required)?;
                self.last_pulse_us = now_us;
            }
            (None, _) => self.pulse_delay.reset(),
            (Some(current), Demand::Move(required)) if current == required => {
                if self.pulse_due(now_us, self.pulse_delay.current()) {
                    self.io.write_step_pin(true)?;
                }
            }
            (Some(_), Demand::Hold) => self.dwell(now_us),
            (Some(current), _) => self.brake(current, now_us)?,
        }
        Ok(())
    }

    /// Apply this tick's spindle movement. Returns `true` when an UNSYNC
    /// leadscrew is ready to engage.
    fn follow_spindle(&mut self, delta: i32, state: &MotionState) -> bool {
        if state.thread_sync_state() == ThreadSyncState::Sync {
            self.expected_position += delta as f32 * self.ratio;
            return false;
        }

        let Some(anchor) = self.sync_anchor else {
            self.expected_position += delta as f32 * self.ratio;
            return true;
        };
        if self.direction.is_some() {
            return false;
        }

        match self.phase_crossing(&anchor, delta) {
            Some(overshoot) => {
                self.expected_position =
                    self.current_position as f32 + overshoot as f32 * self.ratio;
                log::trace!("thread re-engaged at phase {}", self.spindle_phase);
                true
            }
            None => false,
        }
    }

    /// Pulses past the predicted phase if this tick's spindle movement swept
    /// through it, signed like `delta`.
    fn phase_crossing(&self, anchor: &SyncAnchor, delta: i32) -> Option<i32> {
        if self.ratio == 0.0 {
            return Some(0);
        }
        if delta == 0 {
            return None;
        }

        let predicted = self.predicted_phase(anchor, self.current_position);
        let sign = delta.signum();
        let overshoot = ((self.spindle_phase - predicted) * sign).rem_euclid(self.spindle_ppr());

        if (overshoot as u32) < delta.unsigned_abs() {
            Some(overshoot * sign)
        } else {
            None
        }
    }

    /// Spindle phase that puts the leadscrew at `position` on the anchor's helix.
    fn predicted_phase(&self, anchor: &SyncAnchor, position: i32) -> i32 {
        let travel = (position as i64 - anchor.position as i64) as f32;
        let pulses = roundf(travel / self.ratio) as i64;
        (anchor.spindle_phase as i64 + pulses).rem_euclid(self.spindle_ppr() as i64) as i32
    }

    fn track_spindle(&mut self, delta: i32, now_us: u32) {
        if delta == 0 {
            return;
        }

        let ppr = self.spindle_ppr();
        self.spindle_phase = (self.spindle_phase + delta % ppr).rem_euclid(ppr);

        self.spindle_period_us = now_us.wrapping_sub(self.spindle_moved_us) / delta.unsigned_abs();
        self.spindle_moved_us = now_us;
        self.spindle_heading = delta.signum();
    }

    /// Pulse delay at which the leadscrew keeps pace with a target moving
    /// `direction`. The initial delay when the target is still or heading the
    /// other way.
    fn pace_delay(&self, direction: Direction, now_us: u32) -> f32 {
        let initial = self.pulse_delay.initial();
        let tick = self.constraints.tick_period_us;

        // no spindle pulse for two periods: stopped
        let since = now_us.wrapping_sub(self.spindle_moved_us);
        if since > self.spindle_period_us.saturating_mul(2).saturating_add(tick) {
            return initial;
        }

        let heading = self.spindle_heading as f32 * self.ratio * direction.sign() as f32;
        if heading <= 0.0 {
            return initial;
        }

        let motor_pulses = fabsf(self.ratio) * self.constraints.accumulator_unit;
        let period = self.spindle_period_us as f32 / motor_pulses;
        // one tick of every pulse is spent with the step pin high
        (period - tick as f32).clamp(0.0, initial)
    }

    fn spindle_ppr(&self) -> i32 {
        self.constraints
            .spindle_pulses_per_revolution
            .clamp(1, i32::MAX as u32) as i32
    }

    fn demand(&mut self) -> Demand {
        match Direction::from_error(self.position_error()) {
            None => Demand::Hold,
            Some(direction) if self.is_at_stop(direction) => {
                self.expected_position = self.current_position as f32;
                Demand::AtStop
            }
            Some(direction) => Demand::Move(direction),
        }
    }

    fn is_at_stop(&self, direction: Direction) -> bool {
        match direction {
            Direction::Left => self.left_stop.map_or(false, |stop| self.current_position <= stop),
            Direction::Right => self
                .right_stop
                .map_or(false, |stop| self.current_position >= stop),
        }
    }

    fn start_moving(&mut self, direction: Direction) -> Result<()> {
        self.io
            .write_dir_pin(direction.pin_level(self.constraints.invert_direction))?;
        self.seed_accumulator(direction);
        self.direction = Some(direction);
        self.pulse_delay.reset();
        self.decelerating = false;
        Ok(())
    }

    fn seed_accumulator(&mut self, direction: Direction) {
        let unit = self.constraints.accumulator_unit;
        let sign = direction.sign() as f32;

        self.accumulator = if self.accumulator * sign > 0.0 {
            // Resuming a partly stepped unit.
            self.accumulator
        } else if self.accumulator == 0.0 {
            sign * unit
        } else {
            // Step back over the partial unit, then a whole one.
            sign * (2.0 * unit - fabsf(self.accumulator))
        };
    }

    fn release(&mut self) {
        self.direction = None;
        self.pulse_delay.reset();
        self.decelerating = false;
    }

    fn pulse_due(&self, now_us: u32, delay_us: f32) -> bool {
        now_us.wrapping_sub(self.last_pulse_us) as f32 >= delay_us
    }

    /// Reversal or stop ahead: keep stepping `direction` on a lengthening
    /// delay, and let go once the ramp is back at rest.
    fn brake(&mut self, direction: Direction, now_us: u32) -> Result<()> {
        self.decelerating = true;
        if self.pulse_delay.is_at_rest() {
            self.release();
            return Ok(());
        }
        if self.is_at_stop(direction) {
            log::debug!(
                "{:?} stop reached at {:.0}us pulse delay",
                direction,
                self.pulse_delay.current()
            );
            self.release();
            return Ok(());
        }

        if self.pulse_due(now_us, self.pulse_delay.current()) {
            self.io.write_step_pin(true)?;
        }
        Ok(())
    }

    /// On target while moving: wait at the current delay for the target to
    /// move on. Waiting a whole initial delay means the motor has stopped.
    fn dwell(&mut self, now_us: u32) {
        if self.pulse_delay.is_at_rest() || self.pulse_due(now_us, self.pulse_delay.initial()) {
            self.release();
        }
    }

    /// Falling edge: the pulse is complete.
    fn finish_pulse(&mut self, now_us: u32, ramp: bool) -> Result<()> {
        self.io.write_step_pin(false)?;

        let elapsed = now_us.wrapping_sub(self.last_pulse_us);
        let ceiling = if ramp {
            (self.pulse_delay.initial() as u32).max(1)
        } else {
            u32::MAX
        };
        self.last_full_pulse_duration_us = elapsed.clamp(1, ceiling);
        self.last_pulse_us = now_us;

        let Some(direction) = self.direction else {
            return Ok(());
        };
        self.advance(direction);
        if ramp {
            // A pulse held back by dwelling ran slower than the ramp says.
            let tick = self.constraints.tick_period_us;
            let waited = elapsed.saturating_sub(tick) as f32;
            if waited > self.pulse_delay.current() + tick as f32 {
                self.pulse_delay.slow_to(waited);
            }
            self.update_ramp(direction, now_us);
        }
        Ok(())
    }

    fn advance(&mut self, direction: Direction) {
        let sign = direction.sign() as f32;
        if fabsf(self.accumulator) > 1.0 {
            self.accumulator -= sign;
        } else {
            self.current_position += direction.sign();
            self.accumulator += sign * (self.constraints.accumulator_unit - 1.0);
        }
    }

    fn update_ramp(&mut self, direction: Direction, now_us: u32) {
        let pace = self.pace_delay(direction, now_us);

        if self.decelerating || self.should_stop(direction, pace) {
            self.decelerating = true;
            self.pulse_delay.decelerate();
            if self.pulse_delay.is_at_rest() {
                self.decelerating = false;
            }
            return;
        }

        // Close the lag, then settle on the spindle's pace.
        let units_to_pace =
            self.pulse_delay.pulses_to_reach(pace) as f32 / self.constraints.accumulator_unit;
        let lag = fabsf(self.position_error());
        if lag <= units_to_pace {
            self.pulse_delay.decelerate();
        } else if self.pulse_delay.current() > pace || lag > units_to_pace + 1.0 {
            self.pulse_delay.accelerate();
        }
    }

    /// Whether the ramp has to go back to rest before the target or a stop.
    fn should_stop(&self, direction: Direction, pace: f32) -> bool {
        let units_to_stop =
            self.pulse_delay.pulses_to_stop() as f32 / self.constraints.accumulator_unit;
        let error = self.position_error();

        if Direction::from_error(error) == Some(direction.opposite()) {
            return true;
        }
        if pace >= self.pulse_delay.initial() && fabsf(error) <= units_to_stop {
            return true;
        }

        match self.stop_position(direction) {
            Some(stop) => ((stop - self.current_position) * direction.sign()) as f32 <= units_to_stop,
            None => false,
        }
    }
}

impl<IO: LeadscrewIo> HasPosition for Leadscrew<IO> {
    fn current_position(&self) -> i32 {
        self.current_position
    }

    /// Homing: both positions become zero, stops and anchor are dropped.
    fn reset_current_position(&mut self) {
        self.current_position = 0;
        self.expected_position = 0.0;
        self.accumulator = 0.0;
        self.left_stop = None;
        self.right_stop = None;
        self.sync_anchor = None;
        self.release();
        log::info!("leadscrew homed");
    }
}

impl<IO: LeadscrewIo> Linear for Leadscrew<IO> {
    fn estimated_velocity_mm_per_sec(&self) -> MillimetersPerSec {
        let Some(direction) = self.direction else {
            return MillimetersPerSec(0.0);
        };
        if self.last_full_pulse_duration_us == 0 {
            return MillimetersPerSec(0.0);
        }

        let pulses_per_sec = 1_000_000.0 / self.last_full_pulse_duration_us as f32;
        MillimetersPerSec(self.constraints.pulses_to_mm(pulses_per_sec).value())
            * direction.sign() as f32
    }
}

impl<IO: LeadscrewIo> Derived for Leadscrew<IO> {
    fn ratio(&self) -> f32 {
        self.ratio
    }

    fn set_ratio(&mut self, ratio: f32) {
        if ratio == self.ratio {
            return;
        }
        self.ratio = ratio;
        if self.sync_anchor.take().is_some() {
            log::debug!("sync anchor cleared by ratio change");
        }
    }
}

impl<IO: LeadscrewIo> Driven for Leadscrew<IO> {
    fn expected_position(&self) -> f32 {
        self.expected_position
    }

    fn position_error(&self) -> f32 {
        self.expected_position - self.current_position as f32
    }

    fn update<L: LeadAxis>(&mut self, lead: &L, state: &MotionState, now_us: u32) -> Result<()> {
        let delta = lead.consume_position();
        self.track_spindle(delta, now_us);

        match state.motion_mode() {
            MotionMode::Disabled => self.update_disabled(state, now_us),
            MotionMode::Jog => self.update_jog(state, now_us),
            MotionMode::Enabled => self.update_enabled(delta, state, now_us),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::LatchedIo;
    use core::cell::Cell;

    const TICK_US: u32 = 20;

    /// Lead axis fed by hand.
    struct ManualLead(Cell<i32>);

    impl ManualLead {
        fn new() -> Self {
            Self(Cell::new(0))
        }

        fn turn(&self, pulses: i32) {
            self.0.set(self.0.get() + pulses);
        }
    }

    impl LeadAxis for ManualLead {
        fn consume_position(&self) -> i32 {
            self.0.replace(0)
        }
    }

    fn config(initial: f32, increment: f32) -> MachineConfig {
        let mut config = MachineConfig::default();
        config.motion.initial_pulse_delay_us = initial;
        config.motion.pulse_delay_increment_us = increment;
        config
    }

    fn leadscrew(initial: f32, increment: f32) -> Leadscrew<LatchedIo> {
        let mut leadscrew = Leadscrew::from_config(LatchedIo::new(), &config(initial, increment)).unwrap();
        leadscrew.set_ratio(1.0);
        leadscrew
    }

    fn state(mode: MotionMode) -> MotionState {
        let state = MotionState::new();
        state.set_motion_mode(mode);
        state
    }

    /// Run ticks in `[from, to)` and return `to`.
    fn run(
        leadscrew: &mut Leadscrew<LatchedIo>,
        lead: &ManualLead,
        state: &MotionState,
        from: u32,
        to: u32,
    ) -> u32 {
        let mut now = from;
        while now < to {
            leadscrew.update(lead, state, now).unwrap();
            now += TICK_US;
        }
        to
    }

    #[test]
    fn test_first_pulse_waits_initial_delay_then_accelerates() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        lead.turn(100);
        leadscrew.update(&lead, &state, 0).unwrap();
        assert_eq!(leadscrew.current_direction(), Some(Direction::Right));
        assert!(leadscrew.io().dir());

        for now in (TICK_US..=100).step_by(TICK_US as usize) {
            leadscrew.update(&lead, &state, now).unwrap();
            assert_eq!(leadscrew.current_position(), 0, "at {}us", now);
        }

        leadscrew.update(&lead, &state, 120).unwrap();
        assert_eq!(leadscrew.current_position(), 1);
        assert_eq!(leadscrew.current_pulse_delay(), 90.0);

        run(&mut leadscrew, &lead, &state, 140, 260);
        assert_eq!(leadscrew.current_position(), 2);
        assert_eq!(leadscrew.current_pulse_delay(), 80.0);
    }

    #[test]
    fn test_reaches_target_and_settles() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        lead.turn(100);
        run(&mut leadscrew, &lead, &state, 0, 20_000);

        assert_eq!(leadscrew.current_position(), 100);
        assert_eq!(leadscrew.current_direction(), None);
        assert_eq!(leadscrew.current_pulse_delay(), 100.0);
        assert_eq!(state.thread_sync_state(), ThreadSyncState::Sync);
        assert_eq!(leadscrew.io().pulse_count(), 100);
    }

    #[test]
    fn test_accumulator_absorbs_motor_pulses() {
        let mut config = config(0.0, 0.0);
        config.leadscrew.motor_pulses_per_revolution = 600;
        config.leadscrew.lead_axis_pulses_per_revolution = 100;
        let mut leadscrew = Leadscrew::from_config(LatchedIo::new(), &config).unwrap();
        leadscrew.set_ratio(1.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        lead.turn(1);
        let mut now = 0;
        while leadscrew.io().pulse_count() < 6 || leadscrew.io().step() {
            leadscrew.update(&lead, &state, now).unwrap();
            now += TICK_US;
            if leadscrew.io().pulse_count() < 6 {
                assert_eq!(leadscrew.current_position(), 0);
            }
        }
        assert_eq!(leadscrew.current_position(), 1);

        run(&mut leadscrew, &lead, &state, now, now + 2_000);
        assert_eq!(leadscrew.io().pulse_count(), 6);
        assert_eq!(leadscrew.current_direction(), None);
    }

    #[test]
    fn test_fractional_accumulator_unit() {
        let mut config = config(0.0, 0.0);
        config.leadscrew.motor_pulses_per_revolution = 500;
        config.leadscrew.lead_axis_pulses_per_revolution = 200;
        let mut leadscrew = Leadscrew::from_config(LatchedIo::new(), &config).unwrap();
        leadscrew.set_ratio(1.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        lead.turn(10);
        run(&mut leadscrew, &lead, &state, 0, 10_000);
        assert_eq!(leadscrew.current_position(), 10);
        assert_eq!(leadscrew.io().pulse_count(), 25);
    }

    #[test]
    fn test_stops_at_right_stop_and_unsyncs() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);
        state.set_thread_sync_state(ThreadSyncState::Sync);

        leadscrew.set_stop_position(Direction::Right, 5);
        lead.turn(50);
        run(&mut leadscrew, &lead, &state, 0, 10_000);

        assert_eq!(leadscrew.current_position(), 5);
        assert_eq!(leadscrew.expected_position(), 5.0);
        assert_eq!(state.thread_sync_state(), ThreadSyncState::Unsync);
    }

    #[test]
    fn test_reversal_keeps_stepping_until_at_rest() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        lead.turn(200);
        let mut now = run(&mut leadscrew, &lead, &state, 0, 1_500);
        assert!(leadscrew.current_pulse_delay() < 100.0);
        let turned_at = leadscrew.current_position();

        lead.turn(-400);
        let mut pulses = leadscrew.io().pulse_count();
        let mut last_rise = None;
        let mut last_interval = 0;
        while leadscrew.current_direction() == Some(Direction::Right) {
            assert!(now < 40_000, "still braking at {}", leadscrew.current_position());
            leadscrew.update(&lead, &state, now).unwrap();

            if leadscrew.io().pulse_count() != pulses {
                pulses = leadscrew.io().pulse_count();
                if let Some(rise) = last_rise {
                    let interval = now - rise;
                    assert!(interval >= last_interval, "{}us after {}us", interval, last_interval);
                    last_interval = interval;
                }
                last_rise = Some(now);
            }
            now += TICK_US;
        }

        // carried on past the turn and let go only at the standstill delay
        assert!(leadscrew.current_position() > turned_at + 1);
        assert_eq!(leadscrew.current_direction(), None);
        assert_eq!(leadscrew.current_pulse_delay(), 100.0);

        run(&mut leadscrew, &lead, &state, now, now + 40_000);
        assert_eq!(leadscrew.current_position(), -200);
    }

    #[test]
    fn test_pushing_into_stop_stays_unsynced() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        leadscrew.set_stop_position(Direction::Right, 0);
        leadscrew.set_ratio(2.0);
        assert_eq!(leadscrew.sync_anchor(), None);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        let mut now = 0;
        for _ in 0..50 {
            lead.turn(1);
            leadscrew.update(&lead, &state, now).unwrap();
            assert_eq!(state.thread_sync_state(), ThreadSyncState::Unsync);
            now += TICK_US;
        }
        assert_eq!(leadscrew.current_position(), 0);
        assert_eq!(leadscrew.io().pulse_count(), 0);
    }

    #[test]
    fn test_steady_spindle_holds_pace() {
        let mut leadscrew = leadscrew(1000.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        // one spindle pulse every 200us: 180us delay plus the high tick
        let mut now = 0;
        for tick in 0..25_000u32 {
            if tick % 10 == 0 {
                lead.turn(1);
            }
            leadscrew.update(&lead, &state, now).unwrap();
            now += TICK_US;

            if tick >= 15_000 {
                assert_eq!(leadscrew.current_direction(), Some(Direction::Right));
                assert!(!leadscrew.is_decelerating());
                assert!(fabsf(leadscrew.position_error()) < 4.0);
                let delay = leadscrew.current_pulse_delay();
                assert!((150.0..=190.0).contains(&delay), "delay {} at tick {}", delay, tick);
            }
        }
    }

    #[test]
    fn test_disabled_ignores_spindle() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Disabled);

        lead.turn(100);
        run(&mut leadscrew, &lead, &state, 0, 2_000);

        assert_eq!(leadscrew.current_position(), 0);
        assert_eq!(leadscrew.expected_position(), 0.0);
        assert_eq!(leadscrew.io().pulse_count(), 0);
        assert_eq!(state.thread_sync_state(), ThreadSyncState::Unsync);
    }

    #[test]
    fn test_disabling_completes_half_pulse() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        lead.turn(10);
        let mut now = 0;
        while !leadscrew.io().step() {
            leadscrew.update(&lead, &state, now).unwrap();
            now += TICK_US;
        }

        state.set_motion_mode(MotionMode::Disabled);
        leadscrew.update(&lead, &state, now).unwrap();
        assert!(!leadscrew.io().step());
        assert_eq!(leadscrew.current_position(), 1);
        assert_eq!(leadscrew.expected_position(), 1.0);
        assert_eq!(leadscrew.current_direction(), None);
    }

    #[test]
    fn test_jog_at_fixed_rate() {
        let mut leadscrew = leadscrew(1000.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Jog);

        for _ in 0..3 {
            leadscrew.jog(Direction::Right);
        }
        lead.turn(1_000);

        run(&mut leadscrew, &lead, &state, 0, 500);
        assert_eq!(leadscrew.io().pulse_count(), 0);

        run(&mut leadscrew, &lead, &state, 500, 2_000);
        assert_eq!(leadscrew.current_position(), 3);
        assert_eq!(leadscrew.expected_position(), 3.0);
        assert_eq!(leadscrew.current_pulse_delay(), 1000.0);
        assert_eq!(state.thread_sync_state(), ThreadSyncState::Unsync);
    }

    #[test]
    fn test_jog_honours_left_stop() {
        let mut leadscrew = leadscrew(1000.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Jog);

        leadscrew.set_stop_position(Direction::Left, -2);
        for _ in 0..5 {
            leadscrew.jog(Direction::Left);
        }
        run(&mut leadscrew, &lead, &state, 0, 10_000);

        assert_eq!(leadscrew.current_position(), -2);
        assert_eq!(leadscrew.expected_position(), -2.0);
    }

    #[test]
    fn test_zero_ratio_freezes() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        leadscrew.set_ratio(0.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        lead.turn(1_000);
        run(&mut leadscrew, &lead, &state, 0, 5_000);
        assert_eq!(leadscrew.current_position(), 0);
        assert_eq!(leadscrew.io().pulse_count(), 0);
    }

    #[test]
    fn test_resync_waits_for_recorded_phase() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Disabled);

        lead.turn(100);
        leadscrew.update(&lead, &state, 0).unwrap();
        leadscrew.set_stop_position(Direction::Left, 0);
        assert_eq!(
            leadscrew.sync_anchor(),
            Some(SyncAnchor {
                side: Direction::Left,
                position: 0,
                spindle_phase: 100
            })
        );

        state.set_motion_mode(MotionMode::Enabled);
        let mut now = TICK_US;
        for _ in 0..13 {
            lead.turn(30);
            leadscrew.update(&lead, &state, now).unwrap();
            now += TICK_US;
            assert_eq!(state.thread_sync_state(), ThreadSyncState::Unsync);
            assert_eq!(leadscrew.expected_position(), 0.0);
        }

        lead.turn(30);
        leadscrew.update(&lead, &state, now).unwrap();
        assert_eq!(state.thread_sync_state(), ThreadSyncState::Sync);
        assert_eq!(leadscrew.expected_position(), 20.0);
    }

    #[test]
    fn test_resync_extrapolates_along_helix() {
        let mut leadscrew = leadscrew(1000.0, 10.0);
        leadscrew.set_ratio(0.5);
        let lead = ManualLead::new();
        let state = state(MotionMode::Jog);

        leadscrew.set_stop_position(Direction::Left, 0);
        for _ in 0..10 {
            leadscrew.jog(Direction::Right);
        }
        let now = run(&mut leadscrew, &lead, &state, 0, 8_000);
        assert_eq!(leadscrew.current_position(), 10);

        // helix passes position 10 at phase 0 + 10 / 0.5 = 20
        state.set_motion_mode(MotionMode::Enabled);
        lead.turn(7);
        leadscrew.update(&lead, &state, now).unwrap();
        lead.turn(7);
        leadscrew.update(&lead, &state, now + TICK_US).unwrap();
        assert_eq!(state.thread_sync_state(), ThreadSyncState::Unsync);

        lead.turn(7);
        leadscrew.update(&lead, &state, now + 2 * TICK_US).unwrap();
        assert_eq!(state.thread_sync_state(), ThreadSyncState::Sync);
        assert_eq!(leadscrew.expected_position(), 10.5);
    }

    #[test]
    fn test_feed_without_anchor_syncs_immediately() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        lead.turn(3);
        leadscrew.update(&lead, &state, 0).unwrap();
        assert_eq!(state.thread_sync_state(), ThreadSyncState::Sync);
        assert_eq!(leadscrew.expected_position(), 3.0);
    }

    #[test]
    fn test_unset_anchored_stop_moves_anchor() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Disabled);

        lead.turn(30);
        leadscrew.update(&lead, &state, 0).unwrap();
        leadscrew.set_stop_position(Direction::Left, 0);

        // set the right stop while the leadscrew lags its target
        state.set_motion_mode(MotionMode::Enabled);
        state.set_thread_sync_state(ThreadSyncState::Sync);
        lead.turn(10);
        leadscrew.update(&lead, &state, TICK_US).unwrap();
        leadscrew.set_stop_position(Direction::Right, 100);
        assert_eq!(leadscrew.sync_anchor().map(|a| a.side), Some(Direction::Left));

        leadscrew.unset_stop_position(Direction::Left);
        assert_eq!(
            leadscrew.sync_anchor(),
            Some(SyncAnchor {
                side: Direction::Right,
                position: 100,
                spindle_phase: 130
            })
        );

        leadscrew.unset_stop_position(Direction::Right);
        assert_eq!(leadscrew.sync_anchor(), None);
    }

    #[test]
    fn test_ratio_change_clears_anchor() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        leadscrew.set_stop_position(Direction::Left, 0);
        assert!(leadscrew.sync_anchor().is_some());

        leadscrew.set_ratio(1.0);
        assert!(leadscrew.sync_anchor().is_some());

        leadscrew.set_ratio(2.0);
        assert!(leadscrew.sync_anchor().is_none());
    }

    #[test]
    fn test_homing_clears_positions_and_stops() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);

        lead.turn(5);
        run(&mut leadscrew, &lead, &state, 0, 5_000);
        leadscrew.set_stop_position(Direction::Left, 5);

        leadscrew.reset_current_position();
        assert_eq!(leadscrew.current_position(), 0);
        assert_eq!(leadscrew.expected_position(), 0.0);
        assert_eq!(leadscrew.stop_position(Direction::Left), None);
        assert_eq!(leadscrew.sync_anchor(), None);
    }

    #[test]
    fn test_velocity_zero_at_rest_and_signed_while_moving() {
        let mut leadscrew = leadscrew(100.0, 10.0);
        let lead = ManualLead::new();
        let state = state(MotionMode::Enabled);
        assert_eq!(leadscrew.estimated_velocity_mm_per_sec().value(), 0.0);

        lead.turn(-500);
        run(&mut leadscrew, &lead, &state, 0, 2_000);
        assert!(leadscrew.estimated_velocity_mm_per_sec().value() < 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = MachineConfig::default();
        config.leadscrew.lead_axis_pulses_per_revolution = 0;
        assert!(Leadscrew::from_config(LatchedIo::new(), &config).is_err());
    }
}
