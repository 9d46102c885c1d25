//! Events the session core hands to the presentation layer.
//! The core never touches widgets; it describes what changed and the
//! presentation collaborator decides how to show it.

use crate::error::SessionError;
use crate::profile::SelectedProfileInfo;
use crate::system::config::Configuration;
use crate::types::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Success,
    Error,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Success => "SUCCESS",
            AlertLevel::Error => "ERROR",
        }
    }
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: AlertLevel,
    pub title: String,
    pub body: Option<String>,
    /// Sticky notifications stay until dismissed.
    pub sticky: bool,
}

impl Notification {
    pub fn info(title: &str, body: &str) -> Self {
        Self {
            level: AlertLevel::Info,
            title: title.to_string(),
            body: Some(body.to_string()),
            sticky: false,
        }
    }

    pub fn error(title: &str, body: &str) -> Self {
        Self {
            level: AlertLevel::Error,
            title: title.to_string(),
            body: Some(body.to_string()),
            sticky: false,
        }
    }

    pub fn firing_completed() -> Self {
        Self {
            level: AlertLevel::Success,
            title: "Firing completed".to_string(),
            body: None,
            sticky: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    StateChanged { from: SessionState, to: SessionState },
    EditModeChanged { editing: bool },
    ProfileSelected(SelectedProfileInfo),
    SelectionCleared,
    ProfilesChanged { names: Vec<String> },
    WaypointsChanged,
    LiveSeriesChanged,
    RunStatusChanged,
    ConfigChanged(Configuration),
    /// The storage reported a name collision; answer with `confirm_overwrite`.
    ConfirmOverwrite { name: String },
    Notify(Notification),
    Error(SessionError),
}

/// Collaborator that renders presentation events.
pub trait Presenter {
    fn present(&mut self, event: &PresentationEvent);
}

/// Presenter that only logs, used by the transcript replay binary.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn present(&mut self, event: &PresentationEvent) {
        match event {
            PresentationEvent::Notify(note) => {
                log::info!(
                    "[{}] {}{}",
                    note.level.as_str(),
                    note.title,
                    note.body
                        .as_deref()
                        .map(|body| format!(": {}", body))
                        .unwrap_or_default()
                );
            }
            PresentationEvent::Error(err) => log::warn!("Surfaced error: {}", err),
            other => log::debug!("Presentation event: {:?}", other),
        }
    }
}
