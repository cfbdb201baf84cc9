use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one (resource, destination) dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Created, no attempt made yet
    #[default]
    Pending,
    /// Submit call in flight
    Sending,
    /// Transport accepted the request
    Sent,
    /// Last attempt failed; awaiting a retry decision
    Failed,
    /// Waiting for the next retry offset
    RetryScheduled,
    /// Retries exhausted or error not retryable
    FailedPermanent,
}

impl DispatchState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::FailedPermanent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::RetryScheduled => "retry_scheduled",
            Self::FailedPermanent => "failed_permanent",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DispatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "retry_scheduled" => Ok(Self::RetryScheduled),
            "failed_permanent" => Ok(Self::FailedPermanent),
            _ => Err(format!("Invalid dispatch state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(DispatchState::Sent.is_terminal());
        assert!(DispatchState::FailedPermanent.is_terminal());
        assert!(!DispatchState::Pending.is_terminal());
        assert!(!DispatchState::Sending.is_terminal());
        assert!(!DispatchState::Failed.is_terminal());
        assert!(!DispatchState::RetryScheduled.is_terminal());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(DispatchState::RetryScheduled.to_string(), "retry_scheduled");
        assert_eq!(
            "failed_permanent".parse::<DispatchState>().unwrap(),
            DispatchState::FailedPermanent
        );
        assert!("done".parse::<DispatchState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&DispatchState::FailedPermanent).unwrap();
        assert_eq!(json, "\"failed_permanent\"");
        let parsed: DispatchState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, DispatchState::FailedPermanent);
    }
}
