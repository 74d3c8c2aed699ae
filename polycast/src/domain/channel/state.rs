//! Channel lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Channel lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    /// No remote process.
    #[default]
    Inactive,
    /// A remote process is being created.
    Starting,
    /// Streaming to every enabled output.
    Active,
    /// The remote process is being torn down.
    Stopping,
    /// Streaming as a time-boxed preview.
    Preview,
    /// The last start attempt failed; see `last_error`.
    Error,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Starting => "STARTING",
            Self::Active => "ACTIVE",
            Self::Stopping => "STOPPING",
            Self::Preview => "PREVIEW",
            Self::Error => "ERROR",
        }
    }

    /// Whether a remote process is expected to exist.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Preview)
    }

    /// Validate a state transition.
    pub fn can_transition_to(&self, target: ChannelStatus) -> bool {
        use ChannelStatus::*;

        match (self, target) {
            (from, to) if from == &to => true,

            // Precondition failures land in Error without a Starting phase
            (Inactive | Error, Starting | Error) => true,
            (Starting, Active | Preview | Error) => true,
            (Preview, Active) => true,
            (Active | Preview | Error | Starting, Stopping) => true,
            (Stopping | Error, Inactive) => true,

            _ => false,
        }
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&self, target: ChannelStatus) -> Result<ChannelStatus, Error> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(Error::invalid_transition(self, target))
        }
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(ChannelStatus::Preview.to_string(), "PREVIEW");
        assert_eq!(ChannelStatus::Error.as_str(), "ERROR");
    }

    #[test]
    fn test_start_path() {
        let s = ChannelStatus::Inactive;
        let s = s.transition_to(ChannelStatus::Starting).unwrap();
        let s = s.transition_to(ChannelStatus::Active).unwrap();
        let s = s.transition_to(ChannelStatus::Stopping).unwrap();
        assert_eq!(
            s.transition_to(ChannelStatus::Inactive).unwrap(),
            ChannelStatus::Inactive
        );
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!ChannelStatus::Inactive.can_transition_to(ChannelStatus::Active));
        assert!(!ChannelStatus::Active.can_transition_to(ChannelStatus::Preview));
        assert!(!ChannelStatus::Inactive.can_transition_to(ChannelStatus::Preview));

        let err = ChannelStatus::Active
            .transition_to(ChannelStatus::Starting)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_preview_can_go_live() {
        assert!(ChannelStatus::Preview.can_transition_to(ChannelStatus::Active));
        assert!(ChannelStatus::Preview.is_live());
    }
}
