use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisId {
    Slide,
    Pan,
}

impl AxisId {
    pub const ALL: [AxisId; 2] = [AxisId::Slide, AxisId::Pan];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Target character used on the wire.
    pub fn prefix(self) -> char {
        match self {
            AxisId::Slide => 's',
            AxisId::Pan => 'p',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AxisId::Slide => "Slide",
            AxisId::Pan => "Pan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisProperty {
    Position,
    Acceleration,
    Speed,
    MaxSpeed,
    SpeedLimit,
    Homed,
    TargetPosition,
}

impl AxisProperty {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'p' => Some(AxisProperty::Position),
            'a' => Some(AxisProperty::Acceleration),
            's' => Some(AxisProperty::Speed),
            'm' => Some(AxisProperty::MaxSpeed),
            'l' => Some(AxisProperty::SpeedLimit),
            'h' => Some(AxisProperty::Homed),
            't' => Some(AxisProperty::TargetPosition),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            AxisProperty::Position => 'p',
            AxisProperty::Acceleration => 'a',
            AxisProperty::Speed => 's',
            AxisProperty::MaxSpeed => 'm',
            AxisProperty::SpeedLimit => 'l',
            AxisProperty::Homed => 'h',
            AxisProperty::TargetPosition => 't',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraProperty {
    FocusDelay,
    ShutterHold,
    Interval,
    Frames,
}

impl CameraProperty {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'd' => Some(CameraProperty::FocusDelay),
            's' => Some(CameraProperty::ShutterHold),
            'i' => Some(CameraProperty::Interval),
            'f' => Some(CameraProperty::Frames),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            CameraProperty::FocusDelay => 'd',
            CameraProperty::ShutterHold => 's',
            CameraProperty::Interval => 'i',
            CameraProperty::Frames => 'f',
        }
    }
}

pub const CAMERA_PREFIX: char = 'c';
pub const GLOBAL_PREFIX: char = 'g';
pub const GLOBAL_ACTION: char = 'a';

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Logical-unit quantity, sent with two decimals.
    Real(f32),
    Count(i64),
}

/// One outgoing `<prefix><property><value>` line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Notification {
    pub prefix: char,
    pub property: char,
    pub value: Value,
}

impl Notification {
    pub fn axis(axis: AxisId, property: AxisProperty, value: f32) -> Self {
        Self {
            prefix: axis.prefix(),
            property: property.code(),
            value: Value::Real(value),
        }
    }

    pub fn camera(property: CameraProperty, value: u32) -> Self {
        Self {
            prefix: CAMERA_PREFIX,
            property: property.code(),
            value: Value::Count(value.into()),
        }
    }

    pub fn global_action(value: i64) -> Self {
        Self {
            prefix: GLOBAL_PREFIX,
            property: GLOBAL_ACTION,
            value: Value::Count(value),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.property)?;
        match self.value {
            // keeps "-0.00" off the wire
            Value::Real(v) if (v * 100.0).round() == 0.0 => write!(f, "0.00"),
            Value::Real(v) => write!(f, "{:.2}", v),
            Value::Count(v) => write!(f, "{}", v),
        }
    }
}
