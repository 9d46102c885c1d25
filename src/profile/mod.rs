//! Firing profiles: the two representations, conversion between them, and the
//! in-memory profile model with selection and edit working copy.

pub mod converter;
pub mod model;
pub mod table;

pub use converter::*;
pub use model::*;
pub use table::*;

use crate::types::{ProfileKind, Segment, Waypoint};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileData {
    Waypoints(Vec<Waypoint>),
    RampHold(Vec<Segment>),
}

/// A named firing profile. On the wire: `{name, type, data}` where the shape of
/// `data` depends on `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProfile", into = "RawProfile")]
pub struct Profile {
    pub name: String,
    pub data: ProfileData,
}

impl Profile {
    pub fn waypoints(name: impl Into<String>, points: Vec<Waypoint>) -> Self {
        Self {
            name: name.into(),
            data: ProfileData::Waypoints(points),
        }
    }

    pub fn ramp_hold(name: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            name: name.into(),
            data: ProfileData::RampHold(segments),
        }
    }

    pub fn kind(&self) -> ProfileKind {
        match self.data {
            ProfileData::Waypoints(_) => ProfileKind::Waypoints,
            ProfileData::RampHold(_) => ProfileKind::RampHold,
        }
    }

    /// Total firing duration in seconds: the time of the last plotted waypoint.
    pub fn duration_s(&self) -> f64 {
        to_waypoints(self).last().map(|p| p.time_s).unwrap_or(0.0)
    }

    /// Same profile as a plain waypoint profile. Ramp-hold structure is not kept.
    pub fn to_waypoint_profile(&self) -> Profile {
        Profile::waypoints(self.name.clone(), to_waypoints(self))
    }
}

#[derive(Serialize, Deserialize)]
struct RawProfile {
    name: String,
    #[serde(rename = "type")]
    kind: ProfileKind,
    #[serde(default)]
    data: serde_json::Value,
}

impl TryFrom<RawProfile> for Profile {
    type Error = String;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        // Deleted or freshly created profiles may carry an empty string as data
        let data = match &raw.data {
            serde_json::Value::Null => serde_json::Value::Array(Vec::new()),
            serde_json::Value::String(s) if s.is_empty() => serde_json::Value::Array(Vec::new()),
            other => other.clone(),
        };

        let data = match raw.kind {
            ProfileKind::Waypoints => ProfileData::Waypoints(
                serde_json::from_value(data)
                    .map_err(|e| format!("profile '{}': bad waypoint data: {}", raw.name, e))?,
            ),
            ProfileKind::RampHold => ProfileData::RampHold(
                serde_json::from_value(data)
                    .map_err(|e| format!("profile '{}': bad ramp-hold data: {}", raw.name, e))?,
            ),
        };

        Ok(Profile {
            name: raw.name,
            data,
        })
    }
}

impl From<Profile> for RawProfile {
    fn from(profile: Profile) -> Self {
        let kind = profile.kind();
        let data = match profile.data {
            ProfileData::Waypoints(points) => serde_json::to_value(points),
            ProfileData::RampHold(segments) => serde_json::to_value(segments),
        }
        .unwrap_or(serde_json::Value::Array(Vec::new()));

        RawProfile {
            name: profile.name,
            kind,
            data,
        }
    }
}
