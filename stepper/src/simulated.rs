use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use accel_stepper::{Device, StepContext};

use crate::PulseOutput;

/// Pulse output for a bench without motors. Every step moves a shared
/// physical position counter that other simulated hardware can read.
#[derive(Debug, Clone)]
pub struct SimulatedMotor {
    physical: Arc<AtomicI64>,
    last_position: i64,
}

impl SimulatedMotor {
    pub fn new(physical: Arc<AtomicI64>) -> Self {
        Self {
            physical,
            last_position: 0,
        }
    }

    pub fn physical_position(&self) -> i64 {
        self.physical.load(Ordering::Relaxed)
    }

    /// The step counter has just moved to `position`.
    fn record_step(&mut self, position: i64) {
        let direction = (position - self.last_position).signum();
        self.last_position = position;
        self.physical.fetch_add(direction, Ordering::Relaxed);
    }
}

impl Device for SimulatedMotor {
    type Error = Infallible;

    fn step(&mut self, ctx: &StepContext) -> Result<(), Self::Error> {
        self.record_step(ctx.position);
        Ok(())
    }
}

impl PulseOutput for SimulatedMotor {
    fn rebase(&mut self, position: i64) {
        self.last_position = position;
    }
}
