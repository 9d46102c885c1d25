use serde::{Deserialize, Serialize};

/// A single (time, temperature) control point. Time is in seconds from the start
/// of the firing. Serialized as a `[time, temperature]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Waypoint {
    pub time_s: f64,
    pub temperature: f64,
}

impl Waypoint {
    pub fn new(time_s: f64, temperature: f64) -> Self {
        Self { time_s, temperature }
    }
}

impl From<(f64, f64)> for Waypoint {
    fn from((time_s, temperature): (f64, f64)) -> Self {
        Self { time_s, temperature }
    }
}

impl From<Waypoint> for (f64, f64) {
    fn from(point: Waypoint) -> Self {
        (point.time_s, point.temperature)
    }
}

/// One ramp-then-hold unit of a ramp-hold profile. Serialized as
/// `[duration_minutes, target_temperature, hold_minutes]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64, f64)", into = "(f64, f64, f64)")]
pub struct Segment {
    pub duration_min: f64,
    pub target_temperature: f64,
    pub hold_min: f64,
}

impl Segment {
    pub fn new(duration_min: f64, target_temperature: f64, hold_min: f64) -> Self {
        Self {
            duration_min,
            target_temperature,
            hold_min,
        }
    }
}

impl From<(f64, f64, f64)> for Segment {
    fn from((duration_min, target_temperature, hold_min): (f64, f64, f64)) -> Self {
        Self {
            duration_min,
            target_temperature,
            hold_min,
        }
    }
}

impl From<Segment> for (f64, f64, f64) {
    fn from(segment: Segment) -> Self {
        (segment.duration_min, segment.target_temperature, segment.hold_min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileKind {
    #[serde(rename = "profile")]
    Waypoints,
    #[serde(rename = "ramp-hold")]
    RampHold,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Waypoints => "profile",
            ProfileKind::RampHold => "ramp-hold",
        }
    }
}

/// One live telemetry reading. Simulation samples carry no target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub runtime: f64,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
}

impl TelemetrySample {
    pub fn new(runtime: f64, temperature: f64, target: Option<f64>) -> Self {
        Self {
            runtime,
            temperature,
            target,
        }
    }
}

/// Device state label as reported by the status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceState {
    Idle,
    Running,
    Paused,
}

impl DeviceState {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Some(DeviceState::Idle),
            "RUNNING" => Some(DeviceState::Running),
            "PAUSED" => Some(DeviceState::Paused),
            _ => None,
        }
    }
}

/// Session state as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Editing,
    Running,
    Paused,
}

impl From<DeviceState> for SessionState {
    fn from(state: DeviceState) -> Self {
        match state {
            DeviceState::Idle => SessionState::Idle,
            DeviceState::Running => SessionState::Running,
            DeviceState::Paused => SessionState::Paused,
        }
    }
}

pub const AMBIENT_START_TEMPERATURE: f64 = 68.0; // first waypoint of every ramp-hold conversion
pub const DEVICE_POWER_KW: f64 = 3.85;
pub const NEW_POINT_STEP_S: f64 = 15.0;
pub const HEAT_ACTIVE_THRESHOLD: f64 = 0.5;
pub const SECONDS_PER_MINUTE: f64 = 60.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const MAX_OUTPUTS_PER_INPUT: usize = 16;
