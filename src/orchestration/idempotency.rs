//! # Idempotency Tracker
//!
//! One "already routed" marker per instance, shared by every rule and every
//! destination. Once any instance-granularity dispatch succeeds, later
//! instance-granularity rules skip that instance on this and future events.
//!
//! The backing [`MarkerStore`] is authoritative. The tracker adds two pieces of
//! in-process state on top of it:
//!
//! - a claim table so that only one task at a time evaluates and dispatches a
//!   given instance (atomic check-and-set per instance, no global lock)
//! - a cache of instances this process has already marked, so repeated
//!   successes for the same instance do not hit the store again
//!
//! Store failures never block delivery. A failed read is treated as "not
//! processed" and a failed write is reported as `mark_failed`, accepting a
//! possible duplicate send on the next event.

use crate::archive::MarkerStore;
use crate::error::RouterError;
use crate::events::{EventPublisher, RouteEvent, RouteEventKind};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct IdempotencyTracker {
    store: Arc<dyn MarkerStore>,
    claims: DashMap<String, ()>,
    marked: DashSet<String>,
    publisher: EventPublisher,
}

/// Exclusive right to evaluate and dispatch one instance
///
/// Released when dropped.
#[must_use = "the claim is released as soon as it is dropped"]
pub struct InstanceClaim<'a> {
    claims: &'a DashMap<String, ()>,
    instance_id: String,
}

impl InstanceClaim<'_> {
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

impl Drop for InstanceClaim<'_> {
    fn drop(&mut self) {
        self.claims.remove(&self.instance_id);
    }
}

impl std::fmt::Debug for IdempotencyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyTracker")
            .field("claims", &self.claims.len())
            .field("marked", &self.marked.len())
            .finish()
    }
}

impl IdempotencyTracker {
    pub fn new(store: Arc<dyn MarkerStore>, publisher: EventPublisher) -> Self {
        Self {
            store,
            claims: DashMap::new(),
            marked: DashSet::new(),
            publisher,
        }
    }

    /// Claim an instance, or `None` if another task holds it
    pub fn try_claim(&self, instance_id: &str) -> Option<InstanceClaim<'_>> {
        match self.claims.entry(instance_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!(instance_id, "Instance already claimed by another task");
                None
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(());
                Some(InstanceClaim {
                    claims: &self.claims,
                    instance_id: instance_id.to_string(),
                })
            }
        }
    }

    /// Whether the instance carries the processed marker
    pub async fn is_processed(&self, instance_id: &str) -> bool {
        if self.marked.contains(instance_id) {
            return true;
        }

        match self.store.get_marker(instance_id).await {
            Ok(true) => {
                self.marked.insert(instance_id.to_string());
                true
            }
            Ok(false) => false,
            Err(error) => {
                let error = RouterError::metadata_fetch(instance_id, error);
                warn!(instance_id, error = %error, "Marker read failed, treating instance as unprocessed");
                false
            }
        }
    }

    /// Set the processed marker; returns whether the marker is now set
    pub async fn mark_processed(&self, instance_id: &str) -> bool {
        if self.marked.contains(instance_id) {
            return true;
        }

        match self.store.set_marker(instance_id).await {
            Ok(()) => {
                self.marked.insert(instance_id.to_string());
                debug!(instance_id, "Instance marked processed");
                true
            }
            Err(error) => {
                self.publisher.publish(
                    RouteEvent::new(RouteEventKind::MarkFailed)
                        .resource(instance_id)
                        .error(&error)
                        .message("Failed to set processed marker; instance may be sent again"),
                );
                false
            }
        }
    }

    /// Number of instances currently claimed
    pub fn active_claims(&self) -> usize {
        self.claims.len()
    }
}
