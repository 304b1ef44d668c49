//! Shared simulation rig for the integration and property tests.

#![allow(dead_code)]

use els_motion::{
    Derived, Driven, LatchedIo, Leadscrew, MachineConfig, MotionMode, MotionState, Spindle,
};

/// Control tick period used by every simulation.
pub const TICK_US: u32 = 20;

/// Machine with the given ramp and default drive train.
pub fn config(initial_delay_us: f32, increment_us: f32) -> MachineConfig {
    let mut config = MachineConfig::default();
    config.motion.initial_pulse_delay_us = initial_delay_us;
    config.motion.pulse_delay_increment_us = increment_us;
    config
}

/// A leadscrew wired to a spindle, stepped in fixed ticks.
pub struct Rig {
    pub leadscrew: Leadscrew<LatchedIo>,
    pub spindle: Spindle,
    pub state: MotionState,
    pub now: u32,
}

impl Rig {
    /// Enabled rig with the given ratio.
    pub fn new(config: &MachineConfig, ratio: f32) -> Self {
        let mut leadscrew = Leadscrew::from_config(LatchedIo::new(), config).unwrap();
        leadscrew.set_ratio(ratio);
        let state = MotionState::new();
        state.set_motion_mode(MotionMode::Enabled);

        Self {
            leadscrew,
            spindle: Spindle::from_config(config),
            state,
            now: 0,
        }
    }

    /// Spindle moves by `pulses` now.
    pub fn turn(&self, pulses: i32) {
        self.spindle.increment_current_position(pulses, self.now);
    }

    /// One control tick.
    pub fn tick(&mut self) {
        self.leadscrew
            .update(&self.spindle, &self.state, self.now)
            .unwrap();
        self.now += TICK_US;
    }

    /// `ticks` control ticks.
    pub fn run(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// `ticks` control ticks, calling `observe` after each one.
    pub fn run_observed(&mut self, ticks: u32, mut observe: impl FnMut(&Leadscrew<LatchedIo>)) {
        for _ in 0..ticks {
            self.tick();
            observe(&self.leadscrew);
        }
    }
}

/// Drives a quadrature encoder one count at a time.
#[derive(Debug, Default)]
pub struct QuadratureSignal {
    index: usize,
}

impl QuadratureSignal {
    // (a, b) levels of one forward electrical cycle, starting from both low
    const CYCLE: [(bool, bool); 4] = [(false, false), (true, false), (true, true), (false, true)];

    /// Channel levels after one count forward or backward.
    pub fn step(&mut self, forward: bool) -> (bool, bool) {
        self.index = if forward {
            (self.index + 1) % 4
        } else {
            (self.index + 3) % 4
        };
        Self::CYCLE[self.index]
    }
}
