use crate::models::{AxisId, AxisProperty, CameraProperty, CAMERA_PREFIX, GLOBAL_ACTION, GLOBAL_PREFIX};
use crate::numeric::{parse_integer, parse_real};

pub const BUTTON_PREFIX: char = '!';

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    Axis(AxisId, AxisCommand),
    Camera(CameraCommand),
    Global(GlobalCommand),
    /// `None` when the line does not have the fixed `!b<code><state>` form.
    Button(Option<ButtonEvent>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisCommand {
    /// `echo` routes the answer to the log instead of the link.
    Query { property: AxisProperty, echo: bool },
    /// Signed percentage of the speed limit; zero stops.
    Jog(f32),
    Waypoint { distance: f32, seconds: f32 },
    Zero,
    Timing(u32),
    Set(AxisProperty, f32),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraCommand {
    Query { property: CameraProperty, echo: bool },
    Set(CameraProperty, u32),
    Trigger,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalCommand {
    Query { echo: bool },
    SetAction(i64),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub code: u8,
    pub pressed: bool,
}

/// Splits a command line into target, property and value.
///
/// Returns `None` only when the target character is unknown. A known target
/// with a bad property or value still yields a request, usually `Ignored`.
pub fn parse_command(line: &str) -> Option<Request> {
    let mut chars = line.chars();
    let target = chars.next()?;
    let property = chars.next();
    let rest = chars.as_str();

    let request = match target {
        's' => Request::Axis(AxisId::Slide, parse_axis(property, rest)),
        'p' => Request::Axis(AxisId::Pan, parse_axis(property, rest)),
        CAMERA_PREFIX => Request::Camera(parse_camera(property, rest)),
        GLOBAL_PREFIX => Request::Global(parse_global(property, rest)),
        BUTTON_PREFIX => Request::Button(parse_button(property, rest)),
        _ => return None,
    };

    Some(request)
}

/// `Some(echo)` when the value part is a query.
fn query(rest: &str) -> Option<bool> {
    let mut chars = rest.chars();
    match chars.next() {
        Some('?') => Some(chars.next() == Some('?')),
        _ => None,
    }
}

fn parse_axis(property: Option<char>, rest: &str) -> AxisCommand {
    let Some(code) = property else {
        return AxisCommand::Ignored;
    };

    if rest.is_empty() {
        // the only axis action that needs no value
        return match code {
            'z' => AxisCommand::Zero,
            _ => AxisCommand::Ignored,
        };
    }

    if let Some(echo) = query(rest) {
        return match AxisProperty::from_code(code) {
            Some(property) => AxisCommand::Query { property, echo },
            None => AxisCommand::Ignored,
        };
    }

    match code {
        'v' => AxisCommand::Jog(parse_real(rest)),
        'w' => match rest.split_once(',') {
            Some((distance, seconds)) => AxisCommand::Waypoint {
                distance: parse_real(distance),
                seconds: parse_real(seconds),
            },
            None => AxisCommand::Ignored,
        },
        'z' => AxisCommand::Zero,
        't' => AxisCommand::Timing(u32::try_from(parse_integer(rest)).unwrap_or(0)),
        _ => match AxisProperty::from_code(code) {
            Some(property) => AxisCommand::Set(property, parse_real(rest)),
            None => AxisCommand::Ignored,
        },
    }
}

fn parse_camera(property: Option<char>, rest: &str) -> CameraCommand {
    let Some(code) = property else {
        return CameraCommand::Ignored;
    };

    if code == 't' {
        return match query(rest) {
            Some(_) => CameraCommand::Ignored,
            None => CameraCommand::Trigger,
        };
    }

    if rest.is_empty() {
        return CameraCommand::Ignored;
    }

    let Some(property) = CameraProperty::from_code(code) else {
        return CameraCommand::Ignored;
    };

    match query(rest) {
        Some(echo) => CameraCommand::Query { property, echo },
        // float-to-unsigned casts saturate, so negatives land on zero
        None => CameraCommand::Set(property, parse_real(rest) as u32),
    }
}

fn parse_global(property: Option<char>, rest: &str) -> GlobalCommand {
    if property != Some(GLOBAL_ACTION) || rest.is_empty() {
        return GlobalCommand::Ignored;
    }

    match query(rest) {
        Some(echo) => GlobalCommand::Query { echo },
        None => GlobalCommand::SetAction(parse_integer(rest)),
    }
}

fn parse_button(property: Option<char>, rest: &str) -> Option<ButtonEvent> {
    if property != Some('b') {
        return None;
    }

    let mut chars = rest.chars();
    let code = chars.next()?.to_digit(10)?;
    let pressed = match chars.next()? {
        '1' => true,
        '0' => false,
        _ => return None,
    };
    if chars.next().is_some() {
        return None;
    }

    Some(ButtonEvent {
        code: code as u8,
        pressed,
    })
}
