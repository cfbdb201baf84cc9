//! # Routing Event Stream
//!
//! Every routing decision and dispatch outcome is published as a
//! [`RouteEvent`]. The publisher writes each event to the tracing log at the
//! level its kind dictates and broadcasts it to any in-process subscribers.

pub mod publisher;

pub use publisher::EventPublisher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::Level;

/// Kinds of routing events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteEventKind {
    StudyReceived,
    RouteMatched,
    NoResourceToSend,
    SendStarted,
    SendSuccess,
    SendFailed,
    InvalidCallbackParams,
    FailedToGetInstances,
    FailedToGetTags,
    FeedbackEventSkipped,
    InstanceAlreadyProcessed,
    MarkFailed,
    RetryScheduled,
    SendFailedPermanent,
}

impl RouteEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StudyReceived => "study_received",
            Self::RouteMatched => "route_matched",
            Self::NoResourceToSend => "no_resource_to_send",
            Self::SendStarted => "send_started",
            Self::SendSuccess => "send_success",
            Self::SendFailed => "send_failed",
            Self::InvalidCallbackParams => "invalid_callback_params",
            Self::FailedToGetInstances => "failed_to_get_instances",
            Self::FailedToGetTags => "failed_to_get_tags",
            Self::FeedbackEventSkipped => "feedback_event_skipped",
            Self::InstanceAlreadyProcessed => "instance_already_processed",
            Self::MarkFailed => "mark_failed",
            Self::RetryScheduled => "retry_scheduled",
            Self::SendFailedPermanent => "send_failed_permanent",
        }
    }

    /// Log level the event is written at
    pub fn level(&self) -> Level {
        match self {
            Self::FeedbackEventSkipped | Self::InstanceAlreadyProcessed | Self::SendStarted => {
                Level::DEBUG
            }
            Self::StudyReceived
            | Self::RouteMatched
            | Self::SendSuccess
            | Self::RetryScheduled => Level::INFO,
            Self::NoResourceToSend
            | Self::SendFailed
            | Self::FailedToGetTags
            | Self::MarkFailed => Level::WARN,
            Self::InvalidCallbackParams
            | Self::FailedToGetInstances
            | Self::SendFailedPermanent => Level::ERROR,
        }
    }
}

impl fmt::Display for RouteEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured routing event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEvent {
    pub kind: RouteEventKind,
    pub study_id: Option<String>,
    pub rule: Option<String>,
    pub resource_id: Option<String>,
    pub destination: Option<String>,
    pub attempt: Option<u32>,
    pub job_handle: Option<String>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl RouteEvent {
    pub fn new(kind: RouteEventKind) -> Self {
        Self {
            kind,
            study_id: None,
            rule: None,
            resource_id: None,
            destination: None,
            attempt: None,
            job_handle: None,
            error: None,
            message: None,
            published_at: Utc::now(),
        }
    }

    pub fn study(mut self, study_id: impl Into<String>) -> Self {
        self.study_id = Some(study_id.into());
        self
    }

    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn job_handle(mut self, handle: impl Into<String>) -> Self {
        self.job_handle = Some(handle.into());
        self
    }

    pub fn error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
