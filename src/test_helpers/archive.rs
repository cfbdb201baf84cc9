use crate::archive::{MarkerStore, ResourceRef, TagMap, TagResolver};
use crate::error::ArchiveError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct ArchiveState {
    instances: HashMap<String, Vec<ResourceRef>>,
    tags: HashMap<String, TagMap>,
    markers: HashSet<String>,
    failing_listings: HashSet<String>,
    failing_tags: HashSet<String>,
    fail_marker_reads: bool,
    fail_marker_writes: bool,
}

/// Archive fake backing both [`TagResolver`] and [`MarkerStore`]
///
/// Instances are listed in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryArchive {
    state: RwLock<ArchiveState>,
    set_marker_calls: AtomicUsize,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance under a study
    pub fn add_instance(&self, study_id: &str, instance_id: &str, tags: TagMap) {
        let mut state = self.state.write();
        state
            .instances
            .entry(study_id.to_string())
            .or_default()
            .push(ResourceRef::instance(instance_id));
        state.tags.insert(instance_id.to_string(), tags);
    }

    /// Register a study with no instances
    pub fn add_study(&self, study_id: &str) {
        self.state
            .write()
            .instances
            .entry(study_id.to_string())
            .or_default();
    }

    pub fn fail_instance_listing(&self, study_id: &str) {
        self.state
            .write()
            .failing_listings
            .insert(study_id.to_string());
    }

    pub fn fail_tags_for(&self, resource_id: &str) {
        self.state
            .write()
            .failing_tags
            .insert(resource_id.to_string());
    }

    pub fn fail_marker_reads(&self, fail: bool) {
        self.state.write().fail_marker_reads = fail;
    }

    pub fn fail_marker_writes(&self, fail: bool) {
        self.state.write().fail_marker_writes = fail;
    }

    /// Set a marker directly, as a previous run would have
    pub fn mark(&self, instance_id: &str) {
        self.state.write().markers.insert(instance_id.to_string());
    }

    pub fn is_marked(&self, instance_id: &str) -> bool {
        self.state.read().markers.contains(instance_id)
    }

    pub fn marked_count(&self) -> usize {
        self.state.read().markers.len()
    }

    /// Calls to `set_marker`, failed ones included
    pub fn set_marker_calls(&self) -> usize {
        self.set_marker_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagResolver for InMemoryArchive {
    async fn resolve_tags(&self, resource_id: &str) -> Result<TagMap, ArchiveError> {
        let state = self.state.read();
        if state.failing_tags.contains(resource_id) {
            return Err(ArchiveError::Unavailable(format!(
                "tag lookup for {resource_id} failed"
            )));
        }
        state
            .tags
            .get(resource_id)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(resource_id.to_string()))
    }

    async fn list_instances(&self, study_id: &str) -> Result<Vec<ResourceRef>, ArchiveError> {
        let state = self.state.read();
        if state.failing_listings.contains(study_id) {
            return Err(ArchiveError::Unavailable(format!(
                "instance listing for {study_id} failed"
            )));
        }
        state
            .instances
            .get(study_id)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(study_id.to_string()))
    }
}

#[async_trait]
impl MarkerStore for InMemoryArchive {
    async fn get_marker(&self, instance_id: &str) -> Result<bool, ArchiveError> {
        let state = self.state.read();
        if state.fail_marker_reads {
            return Err(ArchiveError::Unavailable("marker store offline".into()));
        }
        Ok(state.markers.contains(instance_id))
    }

    async fn set_marker(&self, instance_id: &str) -> Result<(), ArchiveError> {
        self.set_marker_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        if state.fail_marker_writes {
            return Err(ArchiveError::Unavailable("marker store offline".into()));
        }
        state.markers.insert(instance_id.to_string());
        Ok(())
    }
}
