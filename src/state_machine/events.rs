use crate::archive::JobHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events that drive a dispatch attempt between states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DispatchEvent {
    /// Begin a submit call
    Start,
    /// Transport accepted the request
    Succeed(JobHandle),
    /// Submit call failed with error message
    Fail(String),
    /// Park until the given wall-clock time
    ScheduleRetry(DateTime<Utc>),
    /// Stop retrying
    Abandon,
}

impl DispatchEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Succeed(_) => "succeed",
            Self::Fail(_) => "fail",
            Self::ScheduleRetry(_) => "schedule_retry",
            Self::Abandon => "abandon",
        }
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
