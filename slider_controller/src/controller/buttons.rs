use crate::{commands::ButtonEvent, models::AxisId};

const BUTTONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ButtonAction {
    HomeSlide,
    ZeroPan,
    StopAll,
    Shutter,
    /// `direction` is +1 or -1.
    Jog { axis: AxisId, direction: f32 },
    StopJog(AxisId),
}

/// Turns raw button reports from the remote pad into actions. Only state
/// changes act, so repeated reports are harmless.
#[derive(Debug, Default)]
pub struct ButtonPad {
    pressed: [bool; BUTTONS],
}

impl ButtonPad {
    pub fn handle(&mut self, event: ButtonEvent) -> Option<ButtonAction> {
        let index = usize::from(event.code).checked_sub(1)?;
        let state = self.pressed.get_mut(index)?;
        if *state == event.pressed {
            return None;
        }
        *state = event.pressed;

        let jog = |axis, direction| {
            if event.pressed {
                ButtonAction::Jog { axis, direction }
            } else {
                ButtonAction::StopJog(axis)
            }
        };

        match (event.code, event.pressed) {
            (1, true) => Some(ButtonAction::HomeSlide),
            (2, true) => Some(ButtonAction::ZeroPan),
            (3, true) => Some(ButtonAction::StopAll),
            (4, true) => Some(ButtonAction::Shutter),
            (5, _) => Some(jog(AxisId::Slide, 1.0)),
            (6, _) => Some(jog(AxisId::Slide, -1.0)),
            (7, _) => Some(jog(AxisId::Pan, -1.0)),
            (8, _) => Some(jog(AxisId::Pan, 1.0)),
            _ => None,
        }
    }
}
