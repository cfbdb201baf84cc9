use config::FileFormat;
use std::sync::Arc;
use study_router::config::ConfigManager;
use study_router::events::{RouteEvent, RouteEventKind};
use study_router::orchestration::{EngineDependencies, RoutingEngine};
use study_router::test_helpers::{InMemoryArchive, RecordingTransport};
use study_router::TagMap;
use tokio::sync::broadcast;

/// Rule set used by the end-to-end scenarios
pub const SCENARIO_CONFIG: &str = r#"
log_level: debug
max_attempts: 3
retry_delays: [60, 120, 300]
rules:
  - name: bone_length_to_mercure
    match:
      study_description_contains: BONE LENGTH
    action:
      send_mode: highest_resolution
      destinations: [MERCURE]
  - name: qa_visualization_to_lpch
    match:
      manufacturer_equals: STANFORDAIDE
      series_description_contains: QA Visualization
      series_description_not_contains: Table
    action:
      send_mode: instance
      destinations: [LPCHROUTER, LPCHTROUTER]
  - name: ai_sr_to_modlink
    match:
      manufacturer_equals: STANFORDAIDE
    action:
      send_mode: instance
      destinations: [MODLINK]
"#;

/// Single study-level rule sending every CT study whole to the given destinations
pub fn whole_study_config(destinations: &[&str]) -> String {
    format!(
        r#"
max_attempts: 3
retry_delays: [60, 120, 300]
rules:
  - name: ct_to_archive
    match:
      study_description_contains: CT
    action:
      send_mode: study_whole
      destinations: [{}]
"#,
        destinations.join(", ")
    )
}

/// Single instance-level rule sending every CT instance to the given destinations
pub fn instance_config(destinations: &[&str]) -> String {
    format!(
        r#"
max_attempts: 3
retry_delays: [60, 120, 300]
rules:
  - name: ct_instances
    match:
      modality_equals: CT
    action:
      send_mode: instance
      destinations: [{}]
"#,
        destinations.join(", ")
    )
}

pub struct TestHarness {
    pub archive: Arc<InMemoryArchive>,
    pub transport: Arc<RecordingTransport>,
    pub engine: RoutingEngine,
}

impl TestHarness {
    pub fn from_yaml(yaml: &str) -> Self {
        let manager = ConfigManager::load_from_str(yaml, FileFormat::Yaml)
            .expect("test configuration should be valid");
        let archive = Arc::new(InMemoryArchive::new());
        let transport = Arc::new(RecordingTransport::new());
        let engine = RoutingEngine::new(
            &manager,
            EngineDependencies {
                tags: archive.clone(),
                markers: archive.clone(),
                transport: transport.clone(),
            },
        );
        Self {
            archive,
            transport,
            engine,
        }
    }

    pub fn scenario() -> Self {
        Self::from_yaml(SCENARIO_CONFIG)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouteEvent> {
        self.engine.publisher().subscribe()
    }
}

pub fn study_tags(description: &str) -> TagMap {
    TagMap::new()
        .with("StudyDescription", description)
        .with("PatientID", "MRN-0001")
}

pub fn image_tags(rows: u32, columns: u32) -> TagMap {
    TagMap::new()
        .with("Manufacturer", "SIEMENS")
        .with("Modality", "CR")
        .with("Rows", rows.to_string())
        .with("Columns", columns.to_string())
}

pub fn aide_tags(series_description: &str) -> TagMap {
    TagMap::new()
        .with("Manufacturer", "STANFORDAIDE")
        .with("Modality", "OT")
        .with("SeriesDescription", series_description)
}

/// Everything published so far
pub fn collect_events(receiver: &mut broadcast::Receiver<RouteEvent>) -> Vec<RouteEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

pub fn count_kind(events: &[RouteEvent], kind: RouteEventKind) -> usize {
    events.iter().filter(|event| event.kind == kind).count()
}

pub fn pair(resource: &str, destination: &str) -> (String, String) {
    (resource.to_string(), destination.to_string())
}
