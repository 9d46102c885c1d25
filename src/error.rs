use crate::reconciler::ChannelKind;
use thiserror::Error;

/// Errors raised by the session core. None of them is fatal: the session always
/// stays interactable in `Idle` at minimum.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("storage rejected {command} for profile '{name}': name already taken")]
    StorageConflict { command: &'static str, name: String },

    #[error("{0} channel not available")]
    ChannelUnavailable(ChannelKind),

    #[error("malformed {channel} message: {reason}")]
    Malformed { channel: ChannelKind, reason: String },
}

impl SessionError {
    /// Non-monotonic waypoint times on save.
    pub fn time_machine(index: usize, time_s: f64, last_s: f64) -> Self {
        SessionError::InvalidProfile(format!(
            "an oven is not a time-machine: point {} at {}s does not come after {}s",
            index + 1,
            time_s,
            last_s
        ))
    }
}
