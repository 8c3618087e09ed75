//! Simulated bench hardware: step counters stand in for motors and the
//! slide limit switch closes when the carriage reaches it.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use stepper::{AccelSequencer, SimulatedMotor};
use tracing::trace;

use crate::{
    config::SliderConfig,
    hardware::{DigitalIo, Level, MonotonicClock, PinMode},
};

pub type BenchSequencer = AccelSequencer<SimulatedMotor, MonotonicClock>;

pub struct Rig {
    pub slide: BenchSequencer,
    pub pan: BenchSequencer,
    pub io: SimulatedIo,
    pub clock: MonotonicClock,
}

impl Rig {
    pub fn new(config: &SliderConfig) -> Self {
        let clock = MonotonicClock::new();
        let slide_physical = Arc::new(AtomicI64::new(0));
        let pan_physical = Arc::new(AtomicI64::new(0));

        let switch_steps =
            -(config.bench.slide_switch_distance * config.slide.steps_per_unit).round() as i64;

        Self {
            slide: AccelSequencer::new(SimulatedMotor::new(slide_physical.clone()), clock),
            pan: AccelSequencer::new(SimulatedMotor::new(pan_physical), clock),
            io: SimulatedIo::new(config.pins.limit_switch, slide_physical, switch_steps),
            clock,
        }
    }
}

/// Pins remember what was written to them; the limit switch pin reads the
/// simulated carriage instead.
#[derive(Debug)]
pub struct SimulatedIo {
    limit_pin: u8,
    carriage: Arc<AtomicI64>,
    switch_position: i64,
    levels: HashMap<u8, Level>,
}

impl SimulatedIo {
    pub fn new(limit_pin: u8, carriage: Arc<AtomicI64>, switch_position: i64) -> Self {
        Self {
            limit_pin,
            carriage,
            switch_position,
            levels: HashMap::new(),
        }
    }
}

impl DigitalIo for SimulatedIo {
    fn pin_mode(&mut self, pin: u8, mode: PinMode) {
        trace!("pin {} mode {:?}", pin, mode);
        if mode != PinMode::Output {
            self.levels.remove(&pin);
        }
    }

    fn digital_read(&self, pin: u8) -> Level {
        if pin == self.limit_pin {
            return if self.carriage.load(Ordering::Relaxed) <= self.switch_position {
                Level::Low
            } else {
                Level::High
            };
        }
        self.levels.get(&pin).copied().unwrap_or(Level::High)
    }

    fn digital_write(&mut self, pin: u8, level: Level) {
        trace!("pin {} {:?}", pin, level);
        self.levels.insert(pin, level);
    }
}
