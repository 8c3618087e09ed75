use stepper::StepSequencer;
use tracing::debug;

use crate::hardware::Millis;

/// Outcome of one [`ScaledAxis::run`] tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Stopped,
    Moving,
    ReachedGoal,
}

/// One stepper axis expressed in logical units (mm, degrees).
///
/// Wraps a [`StepSequencer`] and owns everything the sequencer does not:
/// the unit scale, soft limits, the speed cap, the acceleration setting
/// (which the sequencer cannot report back) and move timing.
pub struct ScaledAxis<S: StepSequencer> {
    name: &'static str,
    sequencer: S,
    steps_per_unit: f32,
    speed_limit: f32,
    /// Steps per second squared.
    acceleration: f32,
    min_limit: i64,
    max_limit: i64,
    moving: bool,
    move_start_ms: Millis,
    move_stop_ms: Millis,
}

/// Soft limits before anything narrows them.
pub const UNBOUNDED_LIMIT: i64 = 2_000_000_000;

impl<S: StepSequencer> ScaledAxis<S> {
    pub fn new(name: &'static str, sequencer: S, steps_per_unit: f32) -> Self {
        Self {
            name,
            sequencer,
            steps_per_unit,
            speed_limit: 0.0,
            acceleration: 0.0,
            min_limit: -UNBOUNDED_LIMIT,
            max_limit: UNBOUNDED_LIMIT,
            moving: false,
            move_start_ms: 0,
            move_stop_ms: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn sequencer(&self) -> &S {
        &self.sequencer
    }

    fn to_steps(&self, units: f32) -> i64 {
        (units * self.steps_per_unit).round() as i64
    }

    fn to_units(&self, steps: f32) -> f32 {
        steps / self.steps_per_unit
    }

    /// Advances the move by at most one step.
    ///
    /// A move cut short by a soft limit reports `ReachedGoal` once and
    /// leaves the sequencer re-targeted at its current position, so the
    /// following tick reports `Stopped`.
    pub fn run(&mut self, now: Millis) -> RunStatus {
        if !self.moving {
            return RunStatus::Stopped;
        }

        let distance = self.sequencer.distance_to_go();
        let position = self.sequencer.current_position();
        if (distance > 0 && position >= self.max_limit) || (distance < 0 && position <= self.min_limit)
        {
            debug!("{} halted at soft limit, step {}", self.name, position);
            self.sequencer.set_current_position(position);
            self.finish(now);
            return RunStatus::ReachedGoal;
        }

        if self.sequencer.run() {
            return RunStatus::Moving;
        }

        self.finish(now);
        if self.sequencer.distance_to_go() == 0 {
            RunStatus::ReachedGoal
        } else {
            RunStatus::Stopped
        }
    }

    fn finish(&mut self, now: Millis) {
        self.moving = false;
        self.move_stop_ms = now;
    }

    /// Starts a move to `position`, clamped into the soft limits.
    pub fn move_to(&mut self, position: f32, now: Millis) {
        let goal = self.to_steps(position).clamp(self.min_limit, self.max_limit);
        self.sequencer.move_to(goal);
        self.moving = true;
        self.move_start_ms = now;
    }

    /// Decelerates to a stop. Completion shows up in [`ScaledAxis::run`].
    pub fn stop(&mut self) {
        self.sequencer.stop();
    }

    pub fn set_zero(&mut self, now: Millis) {
        self.set_current_position(0.0, now);
    }

    /// Redefines the current position. Ends any move in progress.
    pub fn set_current_position(&mut self, position: f32, now: Millis) {
        let steps = self.to_steps(position);
        self.sequencer.set_current_position(steps);
        self.finish(now);
    }

    pub fn current_position(&self) -> f32 {
        self.to_units(self.sequencer.current_position() as f32)
    }

    pub fn target_position(&self) -> f32 {
        self.to_units(self.sequencer.target_position() as f32)
    }

    pub fn distance_to_go(&self) -> f32 {
        self.to_units(self.sequencer.distance_to_go() as f32)
    }

    pub fn speed(&self) -> f32 {
        self.to_units(self.sequencer.speed())
    }

    pub fn acceleration(&self) -> f32 {
        self.to_units(self.acceleration)
    }

    pub fn set_acceleration(&mut self, acceleration: f32) {
        self.acceleration = acceleration.abs() * self.steps_per_unit;
        self.sequencer.set_acceleration(self.acceleration);
    }

    pub fn max_speed(&self) -> f32 {
        self.to_units(self.sequencer.max_speed())
    }

    /// Sets the cruise speed, capped at the speed limit when one is set.
    pub fn set_max_speed(&mut self, speed: f32) {
        let mut speed = speed.abs();
        if self.speed_limit != 0.0 && speed > self.speed_limit {
            speed = self.speed_limit;
        }
        self.sequencer.set_max_speed(speed * self.steps_per_unit);
    }

    pub fn speed_limit(&self) -> f32 {
        self.speed_limit
    }

    pub fn set_speed_limit(&mut self, speed: f32) {
        self.speed_limit = speed.abs();
    }

    pub fn limits(&self) -> (f32, f32) {
        (
            self.to_units(self.min_limit as f32),
            self.to_units(self.max_limit as f32),
        )
    }

    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.min_limit = self.to_steps(min);
        self.max_limit = self.to_steps(max);
    }

    pub fn scale(&self) -> f32 {
        self.steps_per_unit
    }

    pub fn micros_per_step(&self) -> u32 {
        let max_speed = self.sequencer.max_speed();
        if max_speed <= 0.0 {
            return 0;
        }
        (1_000_000.0 / max_speed) as u32
    }

    /// Alternative way to set the max speed, bypassing the speed limit.
    /// Zero is ignored.
    pub fn set_micros_per_step(&mut self, micros: u32) {
        if micros == 0 {
            return;
        }
        self.sequencer.set_max_speed(1_000_000.0 / micros as f32);
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Duration of the last completed move, in seconds.
    pub fn last_move_time(&self) -> f32 {
        self.move_stop_ms.saturating_sub(self.move_start_ms) as f32 / 1000.0
    }

    /// Cruise speed covering `distance` in `seconds` at the configured
    /// acceleration. See [`max_speed_for_distance_and_time`].
    pub fn max_speed_for_distance_and_time(&self, distance: f32, seconds: f32) -> f32 {
        max_speed_for_distance_and_time(distance, seconds, self.acceleration())
    }
}

/// Solves a symmetric trapezoidal profile for its cruise speed.
///
/// Starting and ending at rest with acceleration `a`, a cruise speed `s`
/// covers `d = s·t − s²/a` in time `t`. The smaller root of that quadratic
/// is the one with a non-negative cruise phase.
///
/// When `seconds` is too short for the distance, the result is the speed
/// reached by the fastest possible (triangular) profile, negated. Callers
/// must check the sign. The result is not capped by any speed limit.
pub fn max_speed_for_distance_and_time(distance: f32, seconds: f32, acceleration: f32) -> f32 {
    if acceleration <= 0.0 {
        return 0.0;
    }

    let distance = distance.abs();
    let discriminant = seconds * seconds - 4.0 * distance / acceleration;

    if discriminant == 0.0 {
        seconds / 2.0 * acceleration
    } else if discriminant > 0.0 {
        (seconds - discriminant.sqrt()) / 2.0 * acceleration
    } else {
        let shortest = (4.0 * distance / acceleration).sqrt();
        -(shortest / 2.0 * acceleration)
    }
}
