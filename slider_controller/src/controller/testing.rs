//! In-memory collaborators for controller tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use stepper::StepSequencer;

use crate::hardware::{Clock, DigitalIo, Level, Link, Millis, PinMode};

/// Takes exactly one step per `run()` with no ramping.
#[derive(Debug, Default)]
pub struct FakeSequencer {
    position: i64,
    target: i64,
    max_speed: f32,
    acceleration: f32,
}

impl FakeSequencer {
    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }
}

impl StepSequencer for FakeSequencer {
    fn move_to(&mut self, target: i64) {
        self.target = target;
    }

    fn run(&mut self) -> bool {
        if self.position == self.target {
            return false;
        }
        self.position += (self.target - self.position).signum();
        true
    }

    fn stop(&mut self) {
        self.target = self.position;
    }

    fn set_current_position(&mut self, position: i64) {
        self.position = position;
        self.target = position;
    }

    fn set_max_speed(&mut self, steps_per_second: f32) {
        self.max_speed = steps_per_second;
    }

    fn set_acceleration(&mut self, steps_per_second_sq: f32) {
        self.acceleration = steps_per_second_sq;
    }

    fn current_position(&self) -> i64 {
        self.position
    }

    fn target_position(&self) -> i64 {
        self.target
    }

    fn speed(&self) -> f32 {
        self.max_speed * self.distance_to_go().signum() as f32
    }

    fn max_speed(&self) -> f32 {
        self.max_speed
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: Millis) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Pins {
    modes: HashMap<u8, PinMode>,
    levels: HashMap<u8, Level>,
    writes: Vec<(u8, Level)>,
}

/// Digital I/O whose pins tests can inspect and drive. Unwritten pins read
/// high, like a pulled-up input.
#[derive(Debug, Clone, Default)]
pub struct FakeIo {
    pins: Arc<Mutex<Pins>>,
}

impl FakeIo {
    pub fn set_input(&self, pin: u8, level: Level) {
        self.pins.lock().unwrap().levels.insert(pin, level);
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.pins.lock().unwrap().modes.get(&pin).copied()
    }

    pub fn level(&self, pin: u8) -> Level {
        self.pins
            .lock()
            .unwrap()
            .levels
            .get(&pin)
            .copied()
            .unwrap_or(Level::High)
    }

    pub fn writes(&self) -> Vec<(u8, Level)> {
        self.pins.lock().unwrap().writes.clone()
    }
}

impl DigitalIo for FakeIo {
    fn pin_mode(&mut self, pin: u8, mode: PinMode) {
        self.pins.lock().unwrap().modes.insert(pin, mode);
    }

    fn digital_read(&self, pin: u8) -> Level {
        self.level(pin)
    }

    fn digital_write(&mut self, pin: u8, level: Level) {
        let mut pins = self.pins.lock().unwrap();
        pins.levels.insert(pin, level);
        pins.writes.push((pin, level));
    }
}

/// Link that keeps every line it is asked to send.
#[derive(Debug, Clone)]
pub struct RecordingLink {
    lines: Arc<Mutex<Vec<String>>>,
    connected: bool,
}

impl Default for RecordingLink {
    fn default() -> Self {
        Self {
            lines: Arc::default(),
            connected: true,
        }
    }
}

impl RecordingLink {
    /// Returns and forgets everything sent so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap())
    }
}

impl Link for RecordingLink {
    fn send_line(&mut self, line: &str) -> bool {
        self.lines.lock().unwrap().push(line.to_string());
        self.connected
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
