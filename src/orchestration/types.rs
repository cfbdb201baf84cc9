//! Inbound event and outcome types for the routing engine.

use crate::archive::TagMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who caused a stability event
///
/// The only mechanism that keeps the engine from routing its own side
/// effects: events whose origin is [`EventOrigin::Engine`] are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "label")]
pub enum EventOrigin {
    /// Normal archive ingest
    Archive,
    /// A resource this engine sent or modified
    Engine,
    /// Any other labelled producer
    External(String),
}

impl EventOrigin {
    /// Classify an origin label reported by the archive
    pub fn from_label(label: Option<&str>, engine_origin: &str) -> Self {
        match label.map(str::trim) {
            None | Some("") => Self::Archive,
            Some(label) if label.eq_ignore_ascii_case(engine_origin) => Self::Engine,
            Some(label) => Self::External(label.to_string()),
        }
    }

    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine)
    }
}

impl fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Engine => write!(f, "engine"),
            Self::External(label) => write!(f, "external:{label}"),
        }
    }
}

/// "Study is stable" notification from the archive
///
/// Fields are optional because the archive may deliver incomplete callbacks;
/// the engine rejects those with `invalid_callback_params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StableStudyEvent {
    pub study_id: Option<String>,
    pub study_tags: Option<TagMap>,
    pub origin: EventOrigin,
}

impl StableStudyEvent {
    pub fn new(study_id: Option<String>, study_tags: Option<TagMap>, origin: EventOrigin) -> Self {
        Self {
            study_id,
            study_tags,
            origin,
        }
    }

    /// Complete event from normal archive ingest
    pub fn from_archive(study_id: impl Into<String>, study_tags: TagMap) -> Self {
        Self::new(Some(study_id.into()), Some(study_tags), EventOrigin::Archive)
    }

    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStatus {
    /// Every rule was evaluated
    Completed,
    /// Required callback fields were missing
    Rejected,
    /// Event was caused by this engine
    SkippedFeedback,
    /// Instance list could not be resolved
    Aborted,
}

/// Summary of one `on_stable_study` invocation
///
/// Informational only; every outcome is also on the event stream. Retries
/// still running in the background are not reflected here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingReport {
    pub study_id: Option<String>,
    pub status: RoutingStatus,
    /// Rule matches that produced a target resource, counted per resource
    pub rules_matched: usize,
    /// First-attempt submit calls
    pub dispatches: usize,
    pub sent: usize,
    /// First attempts that failed and were handed to the retry scheduler
    pub failed: usize,
    /// Instance matches skipped because the instance was already processed
    pub skipped_processed: usize,
}

impl RoutingReport {
    pub fn new(study_id: Option<String>, status: RoutingStatus) -> Self {
        Self {
            study_id,
            status,
            rules_matched: 0,
            dispatches: 0,
            sent: 0,
            failed: 0,
            skipped_processed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_from_label() {
        assert_eq!(EventOrigin::from_label(None, "study-router"), EventOrigin::Archive);
        assert_eq!(EventOrigin::from_label(Some("  "), "study-router"), EventOrigin::Archive);
        assert_eq!(
            EventOrigin::from_label(Some("Study-Router"), "study-router"),
            EventOrigin::Engine
        );
        assert_eq!(
            EventOrigin::from_label(Some("modality-push"), "study-router"),
            EventOrigin::External("modality-push".into())
        );
    }

    #[test]
    fn test_only_engine_origin_is_feedback() {
        assert!(EventOrigin::Engine.is_engine());
        assert!(!EventOrigin::Archive.is_engine());
        assert!(!EventOrigin::External("study-router-2".into()).is_engine());
    }

    #[test]
    fn test_from_archive_is_complete() {
        let event = StableStudyEvent::from_archive("study-1", TagMap::new());
        assert_eq!(event.study_id.as_deref(), Some("study-1"));
        assert!(event.study_tags.is_some());
        assert_eq!(event.origin, EventOrigin::Archive);
    }
}
