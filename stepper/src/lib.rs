pub mod accel;
pub mod simulated;

pub use accel::AccelSequencer;
pub use simulated::SimulatedMotor;

pub use accel_stepper::SystemClock;

/// Single-step motion primitive with its own position, speed and
/// acceleration state. All positions are in steps, all rates in steps per
/// second (squared for acceleration).
pub trait StepSequencer {
    /// Sets the absolute target position.
    fn move_to(&mut self, target: i64);

    /// Emits at most one step if one is due. Returns `true` while the motor
    /// is still moving or has steps left to go.
    fn run(&mut self) -> bool;

    /// Retargets so the motor decelerates to a stop as quickly as the
    /// current acceleration allows.
    fn stop(&mut self);

    /// Redefines the current position. Target follows and speed drops to 0.
    fn set_current_position(&mut self, position: i64);

    fn set_max_speed(&mut self, steps_per_second: f32);
    fn set_acceleration(&mut self, steps_per_second_sq: f32);

    fn current_position(&self) -> i64;
    fn target_position(&self) -> i64;

    fn distance_to_go(&self) -> i64 {
        self.target_position() - self.current_position()
    }

    /// Signed speed of the current movement.
    fn speed(&self) -> f32;
    fn max_speed(&self) -> f32;
}

/// A pulse output that needs to hear about position redefinitions so it
/// can keep inferring step direction.
pub trait PulseOutput: accel_stepper::Device {
    fn rebase(&mut self, position: i64);
}
