use std::time::{Duration, Instant};

/// Milliseconds on a monotonic clock.
pub type Millis = u64;

pub trait Clock: Send {
    fn now_ms(&self) -> Millis;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    InputPullup,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

pub trait DigitalIo: Send {
    fn pin_mode(&mut self, pin: u8, mode: PinMode);
    fn digital_read(&self, pin: u8) -> Level;
    fn digital_write(&mut self, pin: u8, level: Level);
}

/// Outgoing side of the transport to the controller app.
pub trait Link: Send {
    /// Queues one line for transmission. Returns `false` when nobody is
    /// connected and the line was dropped.
    fn send_line(&mut self, line: &str) -> bool;

    fn is_connected(&self) -> bool;
}

/// Process-wide monotonic clock. Copies share the same origin.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

impl stepper::SystemClock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}
