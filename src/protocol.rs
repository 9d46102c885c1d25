//! JSON messages exchanged with the controller process, per channel.

use crate::error::SessionError;
use crate::profile::Profile;
use crate::reconciler::ChannelKind;
use crate::system::config::Configuration;
use crate::telemetry::DeviceStatus;
use crate::types::TelemetrySample;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const GET_REQUEST: &str = "GET";
pub const STORAGE_FAIL: &str = "FAIL";

// === inbound ===

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileHint {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BacklogEntry {
    pub runtime: f64,
    pub temperature: f64,
    pub target: f64,
}

impl From<BacklogEntry> for TelemetrySample {
    fn from(entry: BacklogEntry) -> Self {
        TelemetrySample::new(entry.runtime, entry.temperature, Some(entry.target))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Backlog {
    #[serde(default)]
    pub profile: Option<ProfileHint>,
    #[serde(default)]
    pub log: Vec<BacklogEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    Backlog(Backlog),
    Status(DeviceStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SimulationSample {
    pub runtime: f64,
    pub temperature: f64,
}

impl From<SimulationSample> for TelemetrySample {
    fn from(sample: SimulationSample) -> Self {
        TelemetrySample::new(sample.runtime, sample.temperature, None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageResponse {
    /// Envelope with a `resp` field. `FAIL` means a name collision.
    Reply { resp: String },
    /// The full current profile set, in server order.
    Profiles(Vec<Profile>),
}

impl StorageResponse {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageResponse::Reply { resp } if resp == STORAGE_FAIL)
    }
}

fn malformed(channel: ChannelKind, reason: impl ToString) -> SessionError {
    SessionError::Malformed {
        channel,
        reason: reason.to_string(),
    }
}

fn parse_value(channel: ChannelKind, raw: &str) -> Result<serde_json::Value, SessionError> {
    serde_json::from_str(raw).map_err(|e| {
        warn!("Undecodable {} message: {}", channel, e);
        malformed(channel, e)
    })
}

pub fn decode_status(raw: &str) -> Result<StatusMessage, SessionError> {
    let value = parse_value(ChannelKind::Status, raw)?;

    let message = if value.get("type").and_then(|t| t.as_str()) == Some("backlog") {
        StatusMessage::Backlog(
            serde_json::from_value(value).map_err(|e| malformed(ChannelKind::Status, e))?,
        )
    } else {
        StatusMessage::Status(
            serde_json::from_value(value).map_err(|e| malformed(ChannelKind::Status, e))?,
        )
    };

    debug!("Status message: {:?}", message);
    Ok(message)
}

pub fn decode_simulation(raw: &str) -> Result<SimulationSample, SessionError> {
    serde_json::from_str(raw).map_err(|e| {
        warn!("Undecodable simulation sample: {}", e);
        malformed(ChannelKind::Control, e)
    })
}

pub fn decode_config(raw: &str) -> Result<Configuration, SessionError> {
    serde_json::from_str(raw).map_err(|e| {
        warn!("Undecodable configuration: {}", e);
        malformed(ChannelKind::Config, e)
    })
}

pub fn decode_storage(raw: &str) -> Result<StorageResponse, SessionError> {
    let value = parse_value(ChannelKind::Storage, raw)?;

    if let Some(resp) = value.get("resp") {
        let resp = resp
            .as_str()
            .ok_or_else(|| malformed(ChannelKind::Storage, "resp is not a string"))?;
        return Ok(StorageResponse::Reply {
            resp: resp.to_string(),
        });
    }

    if value.is_array() {
        let profiles: Vec<Profile> =
            serde_json::from_value(value).map_err(|e| malformed(ChannelKind::Storage, e))?;
        return Ok(StorageResponse::Profiles(profiles));
    }

    Err(malformed(
        ChannelKind::Storage,
        "expected a resp envelope or a profile array",
    ))
}

// === outbound ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlVerb {
    Run,
    Pause,
    Simulate,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub cmd: ControlVerb,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl ControlCommand {
    pub fn start(verb: ControlVerb, profile: Profile) -> Self {
        Self {
            cmd: verb,
            profile: Some(profile),
        }
    }

    pub fn stop() -> Self {
        Self {
            cmd: ControlVerb::Stop,
            profile: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageVerb {
    Put,
    Delete,
}

impl StorageVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageVerb::Put => "PUT",
            StorageVerb::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageCommand {
    pub cmd: StorageVerb,
    pub profile: Profile,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
}

impl StorageCommand {
    pub fn put(profile: Profile) -> Self {
        Self {
            cmd: StorageVerb::Put,
            profile,
            force: false,
        }
    }

    /// Deletion only needs the name; the data travels empty.
    pub fn delete(name: &str) -> Self {
        Self {
            cmd: StorageVerb::Delete,
            profile: Profile::waypoints(name, Vec::new()),
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Get,
    Control(ControlCommand),
    Storage(StorageCommand),
}

impl OutboundMessage {
    pub fn encode(&self) -> Result<String, SessionError> {
        match self {
            OutboundMessage::Get => Ok(GET_REQUEST.to_string()),
            OutboundMessage::Control(cmd) => {
                serde_json::to_string(cmd).map_err(|e| malformed(ChannelKind::Control, e))
            }
            OutboundMessage::Storage(cmd) => {
                serde_json::to_string(cmd).map_err(|e| malformed(ChannelKind::Storage, e))
            }
        }
    }
}
