//! Maps raw events of the four controller channels to session inputs, and
//! session outputs back to wire frames.

use crate::error::SessionError;
use crate::protocol::{self, OutboundMessage, StatusMessage};
use crate::session::SessionInput;
use log::{debug, error, info, warn};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Status,
    Control,
    Config,
    Storage,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Status,
        ChannelKind::Control,
        ChannelKind::Config,
        ChannelKind::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Status => "status",
            ChannelKind::Control => "control",
            ChannelKind::Config => "config",
            ChannelKind::Storage => "storage",
        }
    }

    /// Endpoint path on the controller process.
    pub fn path(&self) -> &'static str {
        match self {
            ChannelKind::Status => "/status",
            ChannelKind::Control => "/control",
            ChannelKind::Config => "/config",
            ChannelKind::Storage => "/storage",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }

    fn index(&self) -> usize {
        match self {
            ChannelKind::Status => 0,
            ChannelKind::Control => 1,
            ChannelKind::Config => 2,
            ChannelKind::Storage => 3,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Message(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub channel: ChannelKind,
    pub event: ChannelEvent,
}

impl InboundEvent {
    pub fn opened(channel: ChannelKind) -> Self {
        Self {
            channel,
            event: ChannelEvent::Opened,
        }
    }

    pub fn message(channel: ChannelKind, raw: impl Into<String>) -> Self {
        Self {
            channel,
            event: ChannelEvent::Message(raw.into()),
        }
    }

    pub fn closed(channel: ChannelKind) -> Self {
        Self {
            channel,
            event: ChannelEvent::Closed,
        }
    }
}

/// Outbound side of the four channels. Implemented by the transport collaborator.
pub trait Transport {
    fn send(&mut self, channel: ChannelKind, payload: &str) -> Result<(), SessionError>;
}

/// Transport that keeps every frame, for replays and tests.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub frames: Vec<(ChannelKind, String)>,
}

impl RecordingTransport {
    pub fn sent_on(&self, channel: ChannelKind) -> Vec<&str> {
        self.frames
            .iter()
            .filter(|(kind, _)| *kind == channel)
            .map(|(_, payload)| payload.as_str())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, channel: ChannelKind, payload: &str) -> Result<(), SessionError> {
        info!("-> {}: {}", channel.path(), payload);
        self.frames.push((channel, payload.to_string()));
        Ok(())
    }
}

/// Tracks which channels are open and translates in both directions.
#[derive(Debug, Default)]
pub struct ChannelReconciler {
    open: [bool; 4],
}

impl ChannelReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self, channel: ChannelKind) -> bool {
        self.open[channel.index()]
    }

    /// Decode one raw channel event into a session input.
    pub fn inbound(&mut self, event: InboundEvent) -> Result<SessionInput, SessionError> {
        let channel = event.channel;
        match event.event {
            ChannelEvent::Opened => {
                info!("{} channel opened", channel);
                self.open[channel.index()] = true;
                Ok(SessionInput::ChannelOpened(channel))
            }
            ChannelEvent::Closed => {
                error!("{} channel closed", channel);
                self.open[channel.index()] = false;
                Ok(SessionInput::ChannelClosed(channel))
            }
            ChannelEvent::Message(raw) => {
                debug!("<- {}: {}", channel.path(), raw);
                Self::decode(channel, &raw)
            }
        }
    }

    fn decode(channel: ChannelKind, raw: &str) -> Result<SessionInput, SessionError> {
        match channel {
            ChannelKind::Status => Ok(match protocol::decode_status(raw)? {
                StatusMessage::Backlog(backlog) => SessionInput::Backlog(backlog),
                StatusMessage::Status(status) => SessionInput::DeviceStatus(status),
            }),
            ChannelKind::Control => protocol::decode_simulation(raw).map(SessionInput::Simulation),
            ChannelKind::Config => protocol::decode_config(raw).map(SessionInput::ConfigReceived),
            ChannelKind::Storage => protocol::decode_storage(raw).map(SessionInput::Storage),
        }
    }

    /// Encode and hand one outbound message to the transport.
    pub fn outbound<T: Transport>(
        &self,
        transport: &mut T,
        channel: ChannelKind,
        message: &OutboundMessage,
    ) -> Result<(), SessionError> {
        if !self.is_open(channel) {
            warn!("Dropping {:?} for closed {} channel", message, channel);
            return Err(SessionError::ChannelUnavailable(channel));
        }
        let payload = message.encode()?;
        transport.send(channel, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StorageResponse;

    #[test]
    fn test_open_and_close_track_channel_state() {
        let mut reconciler = ChannelReconciler::new();
        assert!(!reconciler.is_open(ChannelKind::Storage));

        let input = reconciler
            .inbound(InboundEvent::opened(ChannelKind::Storage))
            .unwrap();
        assert_eq!(input, SessionInput::ChannelOpened(ChannelKind::Storage));
        assert!(reconciler.is_open(ChannelKind::Storage));

        reconciler
            .inbound(InboundEvent::closed(ChannelKind::Storage))
            .unwrap();
        assert!(!reconciler.is_open(ChannelKind::Storage));
    }

    #[test]
    fn test_messages_route_by_channel() {
        let mut reconciler = ChannelReconciler::new();

        let input = reconciler
            .inbound(InboundEvent::message(ChannelKind::Storage, r#"{"resp":"FAIL"}"#))
            .unwrap();
        assert_eq!(
            input,
            SessionInput::Storage(StorageResponse::Reply {
                resp: "FAIL".to_string()
            })
        );

        let input = reconciler
            .inbound(InboundEvent::message(
                ChannelKind::Control,
                r#"{"runtime":10,"temperature":30}"#,
            ))
            .unwrap();
        assert!(matches!(input, SessionInput::Simulation(_)));

        // Same JSON on the wrong channel does not decode
        assert!(reconciler
            .inbound(InboundEvent::message(
                ChannelKind::Config,
                r#"{"runtime":10,"temperature":30}"#,
            ))
            .is_err());
    }

    #[test]
    fn test_outbound_requires_open_channel() {
        let mut reconciler = ChannelReconciler::new();
        let mut transport = RecordingTransport::default();

        let err = reconciler
            .outbound(&mut transport, ChannelKind::Config, &OutboundMessage::Get)
            .unwrap_err();
        assert_eq!(err, SessionError::ChannelUnavailable(ChannelKind::Config));

        reconciler
            .inbound(InboundEvent::opened(ChannelKind::Config))
            .unwrap();
        reconciler
            .outbound(&mut transport, ChannelKind::Config, &OutboundMessage::Get)
            .unwrap();
        assert_eq!(transport.sent_on(ChannelKind::Config), vec!["GET"]);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(ChannelKind::parse("Storage"), Some(ChannelKind::Storage));
        assert_eq!(ChannelKind::parse("user"), None);
        assert_eq!(ChannelKind::Status.path(), "/status");
    }
}
