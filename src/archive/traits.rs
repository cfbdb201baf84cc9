//! # Archive Traits
//!
//! Async seams to the archive and the destination transport.

use super::types::{JobHandle, ResourceRef, TagMap};
use crate::error::{ArchiveError, SendError};
use async_trait::async_trait;

/// Metadata lookup supplied by the archive
#[async_trait]
pub trait TagResolver: Send + Sync {
    /// Flattened tag map of a study or instance
    async fn resolve_tags(&self, resource_id: &str) -> Result<TagMap, ArchiveError>;

    /// Every instance currently stored under a study
    ///
    /// Iteration order is whatever the archive returns and carries no meaning.
    async fn list_instances(&self, study_id: &str) -> Result<Vec<ResourceRef>, ArchiveError>;
}

/// Persistence for the per-instance "already routed" marker
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn get_marker(&self, instance_id: &str) -> Result<bool, ArchiveError>;

    async fn set_marker(&self, instance_id: &str) -> Result<(), ArchiveError>;
}

/// Transport that pushes a resource to a named destination
///
/// `submit_send` queues the transfer and returns a job handle; it must not wait
/// for delivery confirmation. Destination names resolve to network endpoints
/// on the transport side.
#[async_trait]
pub trait SendTransport: Send + Sync {
    async fn submit_send(&self, resource_id: &str, destination: &str)
        -> Result<JobHandle, SendError>;
}
