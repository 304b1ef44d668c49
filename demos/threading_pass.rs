//! Example: Threading between two stops on a simulated lathe.
//!
//! This example demonstrates how to:
//! - Load the machine configuration from TOML
//! - Drive the leadscrew through embedded-hal pins with `PinIo`
//! - Feed the spindle from quadrature edges in simulated time
//! - Jog to set stops, then cut two passes that land on the same helix
//!
//! Run with: `cargo run --example threading_pass --features std`

use els_motion::{
    parse_config, Derived, Direction, ElsSystem, PinIo, QuadratureEncoder, Result, Spindle,
    ThreadSyncState,
};

/// Mock output pin that remembers its level.
#[derive(Default)]
struct MockPin {
    high: bool,
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

impl embedded_hal::digital::StatefulOutputPin for MockPin {
    fn is_set_high(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

const TICK_US: u32 = 20;

/// Spindle speed: one encoder count every 5 ticks, 1500 RPM at 400 PPR.
const SPINDLE_PERIOD_TICKS: u32 = 5;

/// Lathe with a spindle that never stops.
struct Lathe {
    els: ElsSystem<PinIo<MockPin, MockPin>>,
    encoder: QuadratureEncoder,
    spindle: Spindle,
    /// Index into the quadrature cycle.
    phase: usize,
    ticks: u32,
}

impl Lathe {
    // (a, b) levels of one forward cycle
    const CYCLE: [(bool, bool); 4] = [(false, false), (true, false), (true, true), (false, true)];

    fn tick(&mut self) -> Result<()> {
        self.ticks += 1;
        if self.ticks % SPINDLE_PERIOD_TICKS == 0 {
            self.phase = (self.phase + 1) % 4;
            let (a, b) = Self::CYCLE[self.phase];
            self.encoder.on_edge(a, b);
        }

        let now = self.now();
        self.spindle.update(&self.encoder, now);
        self.els.tick(&self.spindle, now)
    }

    fn now(&self) -> u32 {
        self.ticks.wrapping_mul(TICK_US)
    }

    fn position(&self) -> i32 {
        self.els.leadscrew().current_position()
    }

    fn jog(&mut self, direction: Direction, units: i32) -> Result<()> {
        let target = self.position() + direction.sign() * units;
        for _ in 0..units {
            self.els.jog(direction);
        }
        while self.position() != target {
            self.tick()?;
        }
        self.els.end_jog();
        self.tick()
    }

    /// Run until the carriage rests on the right stop.
    fn pass(&mut self, right: i32) -> Result<i32> {
        self.els.toggle_enabled();
        let mut engaged_at = None;

        loop {
            let before = self.els.motion_state().thread_sync_state();
            self.tick()?;
            let engaged = before == ThreadSyncState::Unsync
                && self.els.motion_state().thread_sync_state() == ThreadSyncState::Sync;

            if engaged_at.is_none() && engaged {
                engaged_at = Some(self.spindle.current_position());
            }
            if self.position() == right && self.els.leadscrew().current_direction().is_none() {
                break;
            }
        }

        self.els.toggle_enabled();
        Ok(engaged_at.unwrap_or_default())
    }
}

fn main() -> Result<()> {
    println!("=== Threading Pass Example ===\n");

    let toml_content = r#"
name = "Bench lathe"

[spindle]
encoder_pulses_per_revolution = 400

[leadscrew]
motor_pulses_per_revolution = 400
lead_axis_pulses_per_revolution = 400
pitch_mm = 2.0

[motion]
initial_pulse_delay_us = 400.0
pulse_delay_increment_us = 10.0
jog_pulse_delay_us = 200

[feed]
mode = "thread"
unit = "metric"
"#;

    let config = parse_config(toml_content)?;
    println!("Machine: {}", config.name);

    let spindle = Spindle::from_config(&config);
    let els = ElsSystem::from_config(PinIo::new(MockPin::default(), MockPin::default()), config)?;
    let mut lathe = Lathe {
        els,
        encoder: QuadratureEncoder::new(),
        spindle,
        phase: 0,
        ticks: 0,
    };

    let snapshot = lathe.els.snapshot(&lathe.spindle, lathe.now());
    println!(
        "Pitch {:.3} mm ({:?}, {:?}), ratio {:.3}",
        snapshot.pitch.value(),
        snapshot.feed_mode,
        snapshot.unit_mode,
        lathe.els.leadscrew().ratio()
    );

    // Let the spindle come up to speed before touching anything.
    for _ in 0..1_000 {
        lathe.tick()?;
    }

    // Stops 80 units apart, the right one records the helix.
    lathe.els.set_stop(Direction::Left);
    lathe.jog(Direction::Right, 80)?;
    lathe.els.set_stop(Direction::Right);
    lathe.jog(Direction::Left, 80)?;

    if let Some(anchor) = lathe.els.leadscrew().sync_anchor() {
        println!(
            "Anchor: {:?} stop at {} on spindle phase {}",
            anchor.side, anchor.position, anchor.spindle_phase
        );
    }

    for pass in 1..=2 {
        let phase = lathe.pass(80)?;
        let snapshot = lathe.els.snapshot(&lathe.spindle, lathe.now());
        println!(
            "Pass {}: engaged on spindle phase {}, now at {} ({:.0} RPM)",
            pass,
            phase,
            snapshot.leadscrew_position,
            snapshot.spindle_rpm.value()
        );
        lathe.jog(Direction::Left, 80)?;
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
