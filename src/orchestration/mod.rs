//! # Orchestration
//!
//! Turns rule matches into send requests and drives them to a terminal state.
//!
//! ## Core Components
//!
//! - **RoutingEngine**: handles stable-study events and evaluates the rule set
//! - **Dispatcher**: one bounded submit call per attempt
//! - **RetryScheduler**: fixed-offset retries per (resource, destination)
//! - **IdempotencyTracker**: the per-instance "already routed" marker
//! - **ErrorClassifier**: separates retryable transport failures from permanent ones

pub mod dispatcher;
pub mod engine;
pub mod error_classifier;
pub mod idempotency;
pub mod retry_scheduler;
pub mod types;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use engine::{EngineDependencies, RoutingEngine};
pub use error_classifier::{
    ErrorCategory, ErrorClassification, ErrorClassifier, ErrorContext, StandardErrorClassifier,
};
pub use idempotency::{IdempotencyTracker, InstanceClaim};
pub use retry_scheduler::{RetryPolicy, RetryScheduler};
pub use types::{EventOrigin, RoutingReport, RoutingStatus, StableStudyEvent};
