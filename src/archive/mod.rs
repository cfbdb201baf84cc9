//! # Archive Interfaces
//!
//! Everything the engine consumes from the outside world: metadata lookup,
//! idempotency markers and the send transport. Implementations are injected
//! into [`crate::orchestration::RoutingEngine`] so tests can substitute fakes.

pub mod traits;
pub mod types;

pub use traits::{MarkerStore, SendTransport, TagResolver};
pub use types::{Granularity, JobHandle, ResourceRef, TagMap};
