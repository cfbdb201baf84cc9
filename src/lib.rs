#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Study Router
//!
//! Rule-based routing engine that decides, for every imaging study an archive
//! reports as stable, which configured destinations receive which representation
//! of that study, and then drives delivery with bounded retries.
//!
//! ## Overview
//!
//! The archive invokes [`RoutingEngine::on_stable_study`] once per stable study.
//! The engine evaluates every configured rule in declaration order, at study
//! granularity (whole study or the highest-resolution instance) and at instance
//! granularity (each sibling instance), and submits send requests to the named
//! destinations through an injected transport.
//!
//! ```text
//! archive ──▶ RoutingEngine ──▶ rule matcher ──▶ instance selector
//!                                    │
//!                                    ▼
//!                               Dispatcher ──▶ IdempotencyTracker (success)
//!                                    │
//!                                    └───────▶ RetryScheduler (failure)
//! ```
//!
//! ## Module Organization
//!
//! - [`archive`] - Interfaces to the archive and transport, plus shared resource types
//! - [`routing`] - Condition evaluation, rule matching and best-instance selection
//! - [`state_machine`] - Dispatch attempt lifecycle
//! - [`orchestration`] - Dispatcher, retry scheduler, idempotency tracker and engine
//! - [`config`] - Configuration loading and validation
//! - [`events`] - Structured routing event stream
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use study_router::config::ConfigManager;
//! use study_router::orchestration::{EngineDependencies, RoutingEngine, StableStudyEvent};
//! use study_router::test_helpers::{InMemoryArchive, RecordingTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("config/study-router.yaml")?;
//! study_router::logging::init_structured_logging(manager.config());
//!
//! let archive = Arc::new(InMemoryArchive::new());
//! let engine = RoutingEngine::new(
//!     &manager,
//!     EngineDependencies {
//!         tags: archive.clone(),
//!         markers: archive,
//!         transport: Arc::new(RecordingTransport::new()),
//!     },
//! );
//!
//! let report = engine
//!     .on_stable_study(StableStudyEvent::from_archive("study-1", Default::default()))
//!     .await;
//! println!("dispatched {} sends", report.dispatches);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestration;
pub mod routing;
pub mod state_machine;
pub mod test_helpers;

pub use archive::{
    Granularity, JobHandle, MarkerStore, ResourceRef, SendTransport, TagMap, TagResolver,
};
pub use config::{ConfigManager, ConfigurationError, RouterConfig};
pub use error::{ArchiveError, Result, RouterError, SendError};
pub use events::{EventPublisher, RouteEvent, RouteEventKind};
pub use orchestration::{
    EngineDependencies, EventOrigin, RoutingEngine, RoutingReport, RoutingStatus,
    StableStudyEvent,
};
pub use routing::{MatchCondition, Operator, RankingMetric, Rule, SendMode, TagField};
pub use state_machine::{DispatchAttempt, DispatchEvent, DispatchState};
