use std::fmt::Debug;

use accel_stepper::{Driver, SystemClock};
use tracing::warn;

use crate::{PulseOutput, StepSequencer};

/// Slowest rate handed to the driver. The driver cannot represent a zero
/// rate, so a request for 0 parks the motor at one step per ~17 minutes.
const MIN_STEP_RATE: f32 = 0.001;

/// [`StepSequencer`] backed by the `accel-stepper` trapezoidal driver.
pub struct AccelSequencer<D, C> {
    driver: Driver,
    device: D,
    clock: C,
    max_speed: f32,
}

impl<D, C> AccelSequencer<D, C>
where
    D: PulseOutput,
    D::Error: Debug,
    C: SystemClock,
{
    pub fn new(device: D, clock: C) -> Self {
        let mut driver = Driver::new();
        driver.set_max_speed(1.0_f32.into());

        Self {
            driver,
            device,
            clock,
            max_speed: 1.0,
        }
    }
}

impl<D, C> StepSequencer for AccelSequencer<D, C>
where
    D: PulseOutput,
    D::Error: Debug,
    C: SystemClock,
{
    fn move_to(&mut self, target: i64) {
        self.driver.move_to(target);
    }

    fn run(&mut self) -> bool {
        if let Err(e) = self.driver.poll(&mut self.device, &self.clock) {
            warn!("Step output failed: {:?}", e);
        }
        self.driver.is_running()
    }

    fn stop(&mut self) {
        self.driver.stop();
    }

    fn set_current_position(&mut self, position: i64) {
        self.driver.set_current_position(position);
        self.device.rebase(position);
    }

    fn set_max_speed(&mut self, steps_per_second: f32) {
        let steps_per_second = steps_per_second.abs();
        self.max_speed = steps_per_second;
        self.driver
            .set_max_speed(steps_per_second.max(MIN_STEP_RATE).into());
    }

    fn set_acceleration(&mut self, steps_per_second_sq: f32) {
        let steps_per_second_sq = steps_per_second_sq.abs();
        if steps_per_second_sq > 0.0 {
            self.driver.set_acceleration(steps_per_second_sq.into());
        }
    }

    fn current_position(&self) -> i64 {
        self.driver.current_position()
    }

    fn target_position(&self) -> i64 {
        self.driver.target_position()
    }

    fn distance_to_go(&self) -> i64 {
        self.driver.distance_to_go()
    }

    fn speed(&self) -> f32 {
        self.driver.speed() as f32
    }

    fn max_speed(&self) -> f32 {
        self.max_speed
    }
}
