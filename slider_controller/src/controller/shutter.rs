use tracing::debug;

use crate::{
    hardware::{DigitalIo, Level, Millis, PinMode},
    models::CameraProperty,
};

/// Settling time after (re)arming the trigger lines.
pub const SETTLE_MS: Millis = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterState {
    Idle,
    Init,
    Focus,
    Shutter,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct ShutterPins {
    pub focus: u8,
    pub shutter: u8,
}

/// Camera trigger sequencer and intervalometer.
///
/// The trigger lines are active low. Between sequences they are released to
/// inputs so the camera's own buttons keep working.
pub struct Shutter {
    pins: ShutterPins,
    state: ShutterState,
    next_action_ms: Millis,
    focus_delay_ms: u32,
    shutter_hold_ms: u32,
    interval_ms: u32,
    frames_remaining: u32,
}

impl Shutter {
    pub fn new(pins: ShutterPins, focus_delay_ms: u32, shutter_hold_ms: u32) -> Self {
        Self {
            pins,
            state: ShutterState::Idle,
            next_action_ms: 0,
            focus_delay_ms,
            shutter_hold_ms,
            interval_ms: 0,
            frames_remaining: 0,
        }
    }

    pub fn state(&self) -> ShutterState {
        self.state
    }

    /// Releases both trigger lines.
    pub fn release(&self, io: &mut impl DigitalIo) {
        io.pin_mode(self.pins.focus, PinMode::Input);
        io.pin_mode(self.pins.shutter, PinMode::Input);
    }

    /// Requests one exposure. Ignored while a sequence is running.
    pub fn trigger(&mut self) {
        if self.state == ShutterState::Idle {
            self.state = ShutterState::Init;
        }
    }

    pub fn property(&self, property: CameraProperty) -> u32 {
        match property {
            CameraProperty::FocusDelay => self.focus_delay_ms,
            CameraProperty::ShutterHold => self.shutter_hold_ms,
            CameraProperty::Interval => self.interval_ms,
            CameraProperty::Frames => self.frames_remaining,
        }
    }

    /// Setting a non-zero frame count while idle starts the intervalometer,
    /// provided an interval is set.
    pub fn set_property(&mut self, property: CameraProperty, value: u32) {
        match property {
            CameraProperty::FocusDelay => self.focus_delay_ms = value,
            CameraProperty::ShutterHold => self.shutter_hold_ms = value,
            CameraProperty::Interval => self.interval_ms = value,
            CameraProperty::Frames => {
                self.frames_remaining = value;
                if value > 0 && self.interval_ms > 0 {
                    self.trigger();
                }
            }
        }
    }

    /// Wait between the end of one exposure and the next focus.
    fn frame_gap(&self) -> Millis {
        let busy = self.focus_delay_ms.saturating_add(self.shutter_hold_ms);
        Millis::from(self.interval_ms.saturating_sub(busy)).max(SETTLE_MS)
    }

    /// Advances the sequence. Returns the remaining frame count whenever an
    /// exposure completes.
    pub fn poll(&mut self, now: Millis, io: &mut impl DigitalIo) -> Option<u32> {
        match self.state {
            ShutterState::Idle => None,
            ShutterState::Init => {
                io.pin_mode(self.pins.focus, PinMode::Output);
                io.digital_write(self.pins.focus, Level::High);
                io.pin_mode(self.pins.shutter, PinMode::Output);
                io.digital_write(self.pins.shutter, Level::High);
                self.next_action_ms = now + SETTLE_MS;
                self.state = ShutterState::Focus;
                None
            }
            _ if now < self.next_action_ms => None,
            ShutterState::Focus => {
                io.digital_write(self.pins.focus, Level::Low);
                self.next_action_ms = now + Millis::from(self.focus_delay_ms);
                self.state = ShutterState::Shutter;
                None
            }
            ShutterState::Shutter => {
                io.digital_write(self.pins.shutter, Level::Low);
                self.next_action_ms = now + Millis::from(self.shutter_hold_ms);
                self.state = ShutterState::Done;
                None
            }
            ShutterState::Done => {
                self.frames_remaining = self.frames_remaining.saturating_sub(1);
                if self.frames_remaining == 0 {
                    debug!("Camera sequence complete");
                    self.release(io);
                    self.state = ShutterState::Idle;
                } else {
                    debug!("Camera frames left: {}", self.frames_remaining);
                    io.digital_write(self.pins.focus, Level::High);
                    io.digital_write(self.pins.shutter, Level::High);
                    self.next_action_ms = now + self.frame_gap();
                    self.state = ShutterState::Focus;
                }
                Some(self.frames_remaining)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::FakeIo;

    const PINS: ShutterPins = ShutterPins {
        focus: 18,
        shutter: 19,
    };

    fn count_writes(io: &FakeIo, pin: u8, level: Level) -> usize {
        io.writes()
            .iter()
            .filter(|&&write| write == (pin, level))
            .count()
    }

    /// Polls once per millisecond, recording when and what each completed
    /// exposure reported.
    fn drive(shutter: &mut Shutter, io: &mut FakeIo, until: Millis) -> Vec<(Millis, u32)> {
        (0..until)
            .filter_map(|now| shutter.poll(now, io).map(|frames| (now, frames)))
            .collect()
    }

    #[test]
    fn intervalometer_takes_each_frame_then_idles() {
        let mut io = FakeIo::default();
        let mut shutter = Shutter::new(PINS, 150, 50);
        shutter.set_property(CameraProperty::Interval, 1000);
        shutter.set_property(CameraProperty::Frames, 3);
        assert_eq!(shutter.state(), ShutterState::Init);

        let reports = drive(&mut shutter, &mut io, 5_000);

        // settle 20, focus 150, hold 50, then an 800 ms gap per frame
        assert_eq!(reports, vec![(220, 2), (1_220, 1), (2_220, 0)]);
        assert_eq!(count_writes(&io, PINS.focus, Level::Low), 3);
        assert_eq!(count_writes(&io, PINS.shutter, Level::Low), 3);
        assert_eq!(shutter.state(), ShutterState::Idle);
        assert_eq!(io.mode(PINS.focus), Some(PinMode::Input));
        assert_eq!(io.mode(PINS.shutter), Some(PinMode::Input));
    }

    #[test]
    fn short_interval_still_waits_for_the_lines_to_settle() {
        let mut io = FakeIo::default();
        let mut shutter = Shutter::new(PINS, 150, 50);
        shutter.set_property(CameraProperty::Interval, 100);
        shutter.set_property(CameraProperty::Frames, 2);

        let reports = drive(&mut shutter, &mut io, 2_000);

        assert_eq!(reports, vec![(220, 1), (440, 0)]);
    }

    #[test]
    fn single_shot() {
        let mut io = FakeIo::default();
        let mut shutter = Shutter::new(PINS, 150, 50);
        shutter.trigger();

        let reports = drive(&mut shutter, &mut io, 1_000);

        assert_eq!(reports, vec![(220, 0)]);
        assert_eq!(count_writes(&io, PINS.focus, Level::Low), 1);
        assert_eq!(shutter.state(), ShutterState::Idle);
    }

    #[test]
    fn frames_set_mid_sequence_do_not_restart_it() {
        let mut io = FakeIo::default();
        let mut shutter = Shutter::new(PINS, 150, 50);
        shutter.trigger();
        shutter.poll(0, &mut io);
        shutter.poll(20, &mut io);
        assert_eq!(shutter.state(), ShutterState::Shutter);

        shutter.set_property(CameraProperty::Frames, 1);
        assert_eq!(shutter.state(), ShutterState::Shutter);
        assert_eq!(shutter.property(CameraProperty::Frames), 1);
    }

    #[test]
    fn zero_frames_does_not_start() {
        let mut shutter = Shutter::new(PINS, 150, 50);
        shutter.set_property(CameraProperty::Interval, 1000);
        shutter.set_property(CameraProperty::Frames, 0);
        assert_eq!(shutter.state(), ShutterState::Idle);
    }

    #[test]
    fn frames_without_an_interval_wait_for_a_trigger() {
        let mut io = FakeIo::default();
        let mut shutter = Shutter::new(PINS, 150, 50);
        shutter.set_property(CameraProperty::Frames, 2);
        assert_eq!(shutter.state(), ShutterState::Idle);
        assert_eq!(shutter.property(CameraProperty::Frames), 2);

        shutter.trigger();
        let reports = drive(&mut shutter, &mut io, 1_000);

        assert_eq!(reports, vec![(220, 1), (440, 0)]);
    }
}
