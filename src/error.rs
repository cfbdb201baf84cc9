//! Error types for the routing engine.
//!
//! [`RouterError`] is the engine-level taxonomy. The interface errors
//! ([`ArchiveError`], [`SendError`]) are what the injected collaborators return;
//! the orchestrator folds them into [`RouterError`] before logging.

use crate::config::ConfigurationError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    /// Required fields missing from the inbound stability event
    #[error("Invalid callback parameters: {0}")]
    InvalidCallback(String),

    /// Tag or instance-list resolution failed
    #[error("Metadata fetch failed for {resource_id}: {source}")]
    MetadataFetch {
        resource_id: String,
        #[source]
        source: ArchiveError,
    },

    /// Transport rejected or failed a send request
    #[error("Send to {destination} failed: {source}")]
    Send {
        destination: String,
        #[source]
        source: SendError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl RouterError {
    pub fn metadata_fetch(resource_id: impl Into<String>, source: ArchiveError) -> Self {
        Self::MetadataFetch {
            resource_id: resource_id.into(),
            source,
        }
    }

    pub fn send(destination: impl Into<String>, source: SendError) -> Self {
        Self::Send {
            destination: destination.into(),
            source,
        }
    }
}

/// Errors returned by the archive's metadata and marker interfaces
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Archive unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the send transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Destination name does not resolve to a configured endpoint
    #[error("Unknown destination: {0}")]
    UnknownDestination(String),

    /// Destination refused the resource outright
    #[error("Rejected by destination: {0}")]
    Rejected(String),

    /// Destination or transport temporarily unreachable
    #[error("Destination unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Send request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;
