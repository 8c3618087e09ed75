use stepper::StepSequencer;
use tracing::{debug, info, trace, warn};
use utilities::{applet::Applet, metronome::Metronome};

use crate::{
    commands::{parse_command, AxisCommand, ButtonEvent, CameraCommand, GlobalCommand, Request},
    config::{AxisConfig, HomingConfig, SliderConfig},
    controller::{
        axis::{RunStatus, ScaledAxis},
        buttons::{ButtonAction, ButtonPad},
        shutter::{Shutter, ShutterPins},
    },
    hardware::{Clock, DigitalIo, Level, Link, Millis, PinMode},
    models::{AxisId, AxisProperty, CameraProperty, Notification},
};

/// Jog target in logical units, far enough to only set a direction.
const JOG_GOAL: f32 = 99_999.0;

/// The motion and camera applet: owns both axes and the shutter, answers
/// `s`, `p`, `c`, `g` and `!` commands and runs the slide homing protocol.
pub struct Control<S, IO, C, L>
where
    S: StepSequencer,
{
    axes: [ScaledAxis<S>; 2],
    axis_config: [AxisConfig; 2],
    shutter: Shutter,
    buttons: ButtonPad,

    io: IO,
    clock: C,
    link: L,

    limit_pin: u8,
    homing: HomingConfig,
    button_jog_percent: f32,

    homed: bool,
    limit_active: bool,
    last_status: [RunStatus; 2],
    last_speed: [f32; 2],
    notify: Metronome,
    /// Opaque value the controller app stores here to recover its UI state
    /// after a reconnect.
    action: i64,
}

impl<S, IO, C, L> Control<S, IO, C, L>
where
    S: StepSequencer + Send,
    IO: DigitalIo,
    C: Clock,
    L: Link,
{
    pub fn new(config: &SliderConfig, slide: S, pan: S, io: IO, clock: C, link: L) -> Self {
        let shutter = Shutter::new(
            ShutterPins {
                focus: config.pins.focus,
                shutter: config.pins.shutter,
            },
            config.camera.focus_delay_ms,
            config.camera.shutter_hold_ms,
        );

        Self {
            axes: [
                ScaledAxis::new(AxisId::Slide.name(), slide, config.slide.steps_per_unit),
                ScaledAxis::new(AxisId::Pan.name(), pan, config.pan.steps_per_unit),
            ],
            axis_config: [config.slide.clone(), config.pan.clone()],
            shutter,
            buttons: ButtonPad::default(),
            io,
            clock,
            link,
            limit_pin: config.pins.limit_switch,
            homing: config.homing.clone(),
            button_jog_percent: config.control.button_jog_percent,
            homed: false,
            limit_active: false,
            last_status: [RunStatus::Stopped; 2],
            last_speed: [0.0; 2],
            notify: Metronome::new(config.control.notify_period_ms, 0),
            action: 0,
        }
    }

    pub fn axis(&self, id: AxisId) -> &ScaledAxis<S> {
        &self.axes[id.index()]
    }

    fn axis_mut(&mut self, id: AxisId) -> &mut ScaledAxis<S> {
        &mut self.axes[id.index()]
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }

    pub fn shutter(&self) -> &Shutter {
        &self.shutter
    }

    fn send(&mut self, notification: Notification, echo: bool) {
        if echo {
            info!("{}", notification);
            return;
        }
        let line = notification.to_string();
        if !self.link.send_line(&line) {
            trace!("Dropped {} while disconnected", line);
        }
    }

    fn axis_value(&self, id: AxisId, property: AxisProperty) -> f32 {
        let axis = self.axis(id);
        match property {
            AxisProperty::Position => axis.current_position(),
            AxisProperty::Acceleration => axis.acceleration(),
            AxisProperty::Speed => axis.speed(),
            AxisProperty::MaxSpeed => axis.max_speed(),
            AxisProperty::SpeedLimit => axis.speed_limit(),
            AxisProperty::Homed => {
                if self.homed {
                    1.0
                } else {
                    0.0
                }
            }
            AxisProperty::TargetPosition => axis.target_position(),
        }
    }

    fn send_axis(&mut self, id: AxisId, property: AxisProperty, echo: bool) {
        let value = self.axis_value(id, property);
        self.send(Notification::axis(id, property, value), echo);
    }

    /// Calibrates the slide when the limit switch closes while the slide is
    /// heading toward it. Closing while moving away is switch bounce.
    fn check_limit_switch(&mut self, now: Millis) {
        let active = self.io.digital_read(self.limit_pin) == Level::Low;
        if active == self.limit_active {
            return;
        }
        self.limit_active = active;

        if !active || self.axis(AxisId::Slide).distance_to_go() >= 0.0 {
            return;
        }

        let (min, max) = (self.homing.calibrated_min, self.homing.calibrated_max);
        let slide = self.axis_mut(AxisId::Slide);
        debug!(
            "Slide hit limit at {:.2} after {:.2} s",
            slide.current_position(),
            slide.last_move_time()
        );
        slide.set_zero(now);
        slide.set_limits(min, max);
        self.send_axis(AxisId::Slide, AxisProperty::Position, false);

        if !self.homed {
            self.homed = true;
            info!("Slide homed");
            self.send_axis(AxisId::Slide, AxisProperty::Homed, false);
        }
    }

    /// Forgets the calibration and seeks the limit switch again.
    fn rehome(&mut self, now: Millis) {
        info!("Slide homing");
        self.homed = false;
        self.send_axis(AxisId::Slide, AxisProperty::Homed, false);

        let homing = self.homing.clone();
        let slide = self.axis_mut(AxisId::Slide);
        slide.set_limits(homing.relaxed_min, homing.relaxed_max);
        slide.move_to(homing.seek_position, now);
    }

    fn zero(&mut self, id: AxisId, now: Millis) {
        if id != AxisId::Pan {
            debug!("{} cannot be zeroed by command", id.name());
            return;
        }
        self.axis_mut(id).set_zero(now);
        self.send_axis(id, AxisProperty::Position, false);
    }

    /// Moves indefinitely at `percent` of the speed limit, signed for
    /// direction. Zero stops.
    fn jog(&mut self, id: AxisId, percent: f32, now: Millis) {
        if percent == 0.0 {
            self.axis_mut(id).stop();
            return;
        }

        let axis = self.axis_mut(id);
        let speed = percent.abs() * axis.speed_limit() / 100.0;
        axis.set_max_speed(speed);
        self.send_axis(id, AxisProperty::MaxSpeed, false);

        let goal = JOG_GOAL.copysign(percent);
        self.axis_mut(id).move_to(goal, now);
    }

    fn waypoint(&mut self, id: AxisId, distance: f32, seconds: f32, now: Millis) {
        let axis = self.axis_mut(id);
        let speed = axis.max_speed_for_distance_and_time(distance, seconds);
        if speed < 0.0 {
            warn!(
                "{} cannot move {:.2} in {:.2} s, moving at {:.2}",
                id.name(),
                distance,
                seconds,
                -speed
            );
        } else {
            debug!("{} waypoint {:.2} in {:.2} s at {:.2}", id.name(), distance, seconds, speed);
        }

        axis.set_max_speed(speed);
        let goal = axis.current_position() + distance;
        axis.move_to(goal, now);
    }

    fn set_axis_property(&mut self, id: AxisId, property: AxisProperty, value: f32, now: Millis) {
        let axis = self.axis_mut(id);
        match property {
            AxisProperty::Position => axis.move_to(value, now),
            AxisProperty::Acceleration => axis.set_acceleration(value),
            AxisProperty::MaxSpeed => axis.set_max_speed(value),
            AxisProperty::SpeedLimit => axis.set_speed_limit(value),
            AxisProperty::Homed => {
                if id == AxisId::Slide && value == 0.0 {
                    self.rehome(now);
                }
            }
            // speed follows from the move, target is set with `p`
            AxisProperty::Speed | AxisProperty::TargetPosition => {}
        }
    }

    fn axis_command(&mut self, id: AxisId, command: AxisCommand, now: Millis) {
        match command {
            AxisCommand::Query { property, echo } => self.send_axis(id, property, echo),
            AxisCommand::Jog(percent) => self.jog(id, percent, now),
            AxisCommand::Waypoint { distance, seconds } => {
                self.waypoint(id, distance, seconds, now)
            }
            AxisCommand::Zero => self.zero(id, now),
            AxisCommand::Timing(micros) => self.axis_mut(id).set_micros_per_step(micros),
            AxisCommand::Set(property, value) => self.set_axis_property(id, property, value, now),
            AxisCommand::Ignored => {}
        }
    }

    fn camera_command(&mut self, command: CameraCommand) {
        match command {
            CameraCommand::Query { property, echo } => {
                let value = self.shutter.property(property);
                self.send(Notification::camera(property, value), echo);
            }
            CameraCommand::Set(property, value) => self.shutter.set_property(property, value),
            CameraCommand::Trigger => self.shutter.trigger(),
            CameraCommand::Ignored => {}
        }
    }

    fn global_command(&mut self, command: GlobalCommand) {
        match command {
            GlobalCommand::Query { echo } => {
                self.send(Notification::global_action(self.action), echo)
            }
            GlobalCommand::SetAction(action) => {
                self.action = action;
                debug!("Action set: {}", action);
            }
            GlobalCommand::Ignored => {}
        }
    }

    fn button(&mut self, event: ButtonEvent, now: Millis) {
        let Some(action) = self.buttons.handle(event) else {
            return;
        };
        debug!("Button {} -> {:?}", event.code, action);

        match action {
            ButtonAction::HomeSlide => self.rehome(now),
            ButtonAction::ZeroPan => self.zero(AxisId::Pan, now),
            ButtonAction::StopAll => {
                for axis in self.axes.iter_mut() {
                    axis.stop();
                }
            }
            ButtonAction::Shutter => self.shutter.trigger(),
            ButtonAction::Jog { axis, direction } => {
                self.jog(axis, direction * self.button_jog_percent, now)
            }
            ButtonAction::StopJog(axis) => self.axis_mut(axis).stop(),
        }
    }

    /// Sends position while an axis has somewhere to go and speed whenever
    /// it changed since last sent.
    fn notify_changes(&mut self) {
        for id in AxisId::ALL {
            if self.axis(id).distance_to_go() != 0.0 {
                self.send_axis(id, AxisProperty::Position, false);
            }

            let speed = self.axis(id).speed();
            if speed != self.last_speed[id.index()] {
                self.last_speed[id.index()] = speed;
                self.send_axis(id, AxisProperty::Speed, false);
            }
        }
    }
}

impl<S, IO, C, L> Applet for Control<S, IO, C, L>
where
    S: StepSequencer + Send,
    IO: DigitalIo,
    C: Clock,
    L: Link,
{
    fn name(&self) -> &str {
        "Control"
    }

    fn setup(&mut self) -> anyhow::Result<()> {
        let now = self.clock.now_ms();

        self.io.pin_mode(self.limit_pin, PinMode::InputPullup);
        self.shutter.release(&mut self.io);

        for id in AxisId::ALL {
            let config = self.axis_config[id.index()].clone();
            let axis = self.axis_mut(id);
            axis.set_speed_limit(config.speed_limit);
            axis.set_max_speed(config.max_speed);
            axis.set_acceleration(config.acceleration);
            info!(
                "{} ready at {:.2} steps per unit, limit {:.2}",
                axis.name(),
                axis.scale(),
                axis.speed_limit()
            );
        }

        // the slide's position means nothing until it has found the switch
        let seek = self.homing.seek_position;
        self.axis_mut(AxisId::Slide).move_to(seek, now);
        self.notify.restart(now);

        Ok(())
    }

    fn run(&mut self) {
        let now = self.clock.now_ms();

        self.check_limit_switch(now);

        for id in AxisId::ALL {
            let status = self.axis_mut(id).run(now);
            if status == self.last_status[id.index()] {
                continue;
            }
            self.last_status[id.index()] = status;
            if status == RunStatus::ReachedGoal {
                debug!(
                    "{} reached goal after {:.2} s",
                    id.name(),
                    self.axis(id).last_move_time()
                );
                self.send_axis(id, AxisProperty::Position, false);
            }
        }

        if self.notify.ready(now) {
            self.notify_changes();
        }

        if let Some(frames) = self.shutter.poll(now, &mut self.io) {
            self.send(Notification::camera(CameraProperty::Frames, frames), false);
        }
    }

    fn command(&mut self, line: &str) -> bool {
        let Some(request) = parse_command(line) else {
            return false;
        };
        debug!("Command: {}", line);

        let now = self.clock.now_ms();
        match request {
            Request::Axis(id, command) => self.axis_command(id, command, now),
            Request::Camera(command) => self.camera_command(command),
            Request::Global(command) => self.global_command(command),
            Request::Button(Some(event)) => self.button(event, now),
            Request::Button(None) => debug!("Malformed button event {:?}", line),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::controller::{
        shutter::ShutterState,
        testing::{FakeIo, FakeSequencer, ManualClock, RecordingLink},
    };

    type TestControl = Control<FakeSequencer, FakeIo, ManualClock, RecordingLink>;

    struct Bench {
        control: TestControl,
        io: FakeIo,
        clock: ManualClock,
        link: RecordingLink,
    }

    impl Bench {
        fn new() -> Self {
            let io = FakeIo::default();
            let clock = ManualClock::default();
            let link = RecordingLink::default();
            let mut control = Control::new(
                &SliderConfig::default(),
                FakeSequencer::default(),
                FakeSequencer::default(),
                io.clone(),
                clock.clone(),
                link.clone(),
            );
            control.setup().unwrap();

            Self {
                control,
                io,
                clock,
                link,
            }
        }

        fn cycles(&mut self, count: usize) {
            for _ in 0..count {
                self.control.run();
            }
        }

        fn command(&mut self, line: &str) -> Vec<String> {
            assert!(self.control.command(line), "{} not recognized", line);
            self.link.take()
        }

        fn press_limit_switch(&mut self) {
            self.io.set_input(6, Level::Low);
            self.control.run();
        }

        fn release_limit_switch(&mut self) {
            self.io.set_input(6, Level::High);
            self.control.run();
        }

        fn slide(&self) -> &ScaledAxis<FakeSequencer> {
            self.control.axis(AxisId::Slide)
        }

        fn pan(&self) -> &ScaledAxis<FakeSequencer> {
            self.control.axis(AxisId::Pan)
        }
    }

    #[test]
    fn setup_configures_axes_and_seeks_the_switch() {
        let bench = Bench::new();

        assert_relative_eq!(bench.slide().speed_limit(), 50.0);
        assert_relative_eq!(bench.slide().max_speed(), 30.0);
        assert_relative_eq!(bench.pan().max_speed(), 55.0, epsilon = 1e-4);
        assert_relative_eq!(bench.pan().acceleration(), 45.0, epsilon = 1e-4);
        assert_eq!(bench.slide().sequencer().target_position(), -56_000);
        assert!(!bench.control.is_homed());
        assert_eq!(bench.io.mode(6), Some(PinMode::InputPullup));
        assert_eq!(bench.io.mode(18), Some(PinMode::Input));
    }

    #[test]
    fn velocity_jog_is_a_percentage_of_the_speed_limit() {
        let mut bench = Bench::new();

        let lines = bench.command("sv50");
        assert_eq!(lines, vec!["sm25.00"]);
        assert_relative_eq!(bench.slide().max_speed(), 25.0);
        assert!(bench.slide().sequencer().target_position() > 0);

        bench.cycles(3);
        bench.command("sv0");
        assert_eq!(bench.slide().distance_to_go(), 0.0);
    }

    #[test]
    fn negative_jog_uses_the_new_speed_limit() {
        let mut bench = Bench::new();

        bench.command("pl90");
        bench.command("pv-50");

        assert_relative_eq!(bench.pan().max_speed(), 45.0, epsilon = 1e-4);
        assert!(bench.pan().sequencer().target_position() < 0);
    }

    #[test]
    fn only_pan_can_be_zeroed() {
        let mut bench = Bench::new();
        bench.command("pp1");
        bench.cycles(10);

        assert!(bench.command("sz").is_empty());
        assert_eq!(bench.slide().sequencer().current_position(), -10);

        assert_eq!(bench.command("pz"), vec!["pp0.00"]);
        assert_eq!(bench.pan().sequencer().current_position(), 0);
        assert!(!bench.pan().is_moving());
    }

    #[test]
    fn position_query_answers_on_the_link() {
        let mut bench = Bench::new();
        bench.cycles(8);

        assert_eq!(bench.command("sp?"), vec!["sp-0.10"]);
        assert_eq!(bench.command("st?"), vec!["st-700.00"]);
        assert_eq!(bench.command("sh?"), vec!["sh0.00"]);
        assert!(bench.command("sp??").is_empty());
        assert!(bench.command("sx?").is_empty());
    }

    #[test]
    fn limit_switch_homes_the_slide_once() {
        let mut bench = Bench::new();
        bench.cycles(5);

        bench.press_limit_switch();

        assert!(bench.control.is_homed());
        assert_eq!(bench.slide().current_position(), 0.0);
        assert_eq!(bench.slide().limits(), (0.0, 640.0));
        assert_eq!(bench.link.take(), vec!["sp0.00", "sh1.00"]);

        bench.command("sp1000");
        assert_eq!(bench.slide().sequencer().target_position(), 51_200);

        // bounce while driving away from the switch
        bench.cycles(4);
        bench.release_limit_switch();
        bench.press_limit_switch();
        assert_eq!(bench.slide().sequencer().current_position(), 6);

        // heading back into the switch recalibrates without re-announcing
        bench.release_limit_switch();
        bench.command("sp-5");
        bench.press_limit_switch();
        assert_eq!(bench.slide().sequencer().current_position(), 0);
        assert_eq!(bench.link.take(), vec!["sp0.00"]);
    }

    #[test]
    fn home_request_relaxes_limits_and_seeks_again() {
        let mut bench = Bench::new();
        bench.cycles(2);
        bench.press_limit_switch();
        bench.link.take();

        assert!(bench.command("sh1").is_empty());
        assert!(bench.control.is_homed());

        assert_eq!(bench.command("sh0"), vec!["sh0.00"]);
        assert!(!bench.control.is_homed());
        assert_eq!(bench.slide().limits(), (-900.0, 900.0));
        assert_eq!(bench.slide().sequencer().target_position(), -56_000);
    }

    #[test]
    fn reached_goal_is_announced_once() {
        let mut bench = Bench::new();
        bench.command("pp0.1");

        bench.cycles(10);

        assert_eq!(bench.link.take(), vec!["pp0.09"]);
    }

    #[test]
    fn periodic_notification_reports_moving_axes() {
        let mut bench = Bench::new();
        bench.cycles(3);
        assert!(bench.link.take().is_empty());

        bench.clock.set(500);
        bench.cycles(1);
        assert_eq!(bench.link.take(), vec!["sp-0.05", "ss-30.00"]);

        // speed unchanged, so only the position follows
        bench.clock.set(1_000);
        bench.cycles(1);
        let lines = bench.link.take();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("sp-"));
    }

    #[test]
    fn waypoint_moves_relative_at_the_solved_speed() {
        let mut bench = Bench::new();

        bench.command("pw10,5");

        let expected = crate::controller::axis::max_speed_for_distance_and_time(10.0, 5.0, 45.0);
        assert_relative_eq!(bench.pan().max_speed(), expected, epsilon = 1e-3);
        assert_eq!(bench.pan().sequencer().target_position(), 444);

        bench.command("pw10");
        assert_eq!(bench.pan().sequencer().target_position(), 444);
    }

    #[test]
    fn camera_properties_and_trigger() {
        let mut bench = Bench::new();

        assert_eq!(bench.command("cd?"), vec!["cd150"]);
        bench.command("ci2000");
        assert_eq!(bench.command("ci?"), vec!["ci2000"]);

        bench.command("ct");
        assert_eq!(bench.control.shutter().state(), ShutterState::Init);

        bench.cycles(1);
        bench.clock.set(20);
        bench.cycles(1);
        bench.clock.set(170);
        bench.cycles(1);
        bench.clock.set(220);
        bench.cycles(1);

        assert_eq!(bench.control.shutter().state(), ShutterState::Idle);
        assert_eq!(bench.link.take(), vec!["cf0"]);
    }

    #[test]
    fn frames_start_the_intervalometer() {
        let mut bench = Bench::new();

        bench.command("cf3");
        assert_eq!(bench.control.shutter().state(), ShutterState::Idle);

        bench.command("ci1000");
        bench.command("cf3");

        assert_eq!(bench.control.shutter().state(), ShutterState::Init);
        assert_eq!(bench.command("cf?"), vec!["cf3"]);
    }

    #[test]
    fn global_action_is_stored_for_the_app() {
        let mut bench = Bench::new();

        assert!(bench.command("ga42").is_empty());
        assert_eq!(bench.command("ga?"), vec!["ga42"]);
    }

    #[test]
    fn buttons_jog_and_stop() {
        let mut bench = Bench::new();

        assert_eq!(bench.command("!b51"), vec!["sm25.00"]);
        assert!(bench.slide().sequencer().target_position() > 0);
        bench.cycles(2);

        bench.command("!b50");
        assert_eq!(bench.slide().distance_to_go(), 0.0);

        bench.command("!b21");
        bench.command("!b81");
        assert!(bench.pan().sequencer().target_position() > 0);
        bench.command("!b31");
        assert_eq!(bench.pan().distance_to_go(), 0.0);
    }

    #[test]
    fn recognition_depends_only_on_the_target() {
        let mut bench = Bench::new();

        assert!(bench.control.command("s"));
        assert!(bench.control.command("!garbage"));
        assert!(bench.control.command("gx"));
        assert!(!bench.control.command("bsHello"));
        assert!(!bench.control.command("x1"));
        assert!(!bench.control.command(""));
    }

    #[test]
    fn speed_cannot_be_set_directly() {
        let mut bench = Bench::new();

        bench.command("ss10");

        assert_relative_eq!(bench.slide().max_speed(), 30.0);
        assert!(bench.command("ss?")[0].starts_with("ss"));
    }
}
