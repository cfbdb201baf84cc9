//! # System Constants
//!
//! Defaults and well-known names shared across the routing engine.

/// Configuration defaults
pub mod defaults {
    /// Total send attempts per (resource, destination) pair
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Retry offsets in seconds, measured from the first attempt
    pub const RETRY_DELAYS_SECONDS: [u64; 3] = [60, 120, 300];

    pub const LOG_LEVEL: &str = "info";

    /// Upper bound on a single submit call to the transport
    pub const SEND_TIMEOUT_SECONDS: u64 = 30;

    /// Origin label this engine stamps on archive changes it causes
    pub const ENGINE_ORIGIN: &str = "study-router";

    /// Broadcast capacity of the routing event channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
}

/// DICOM keywords read directly by the engine
pub mod tags {
    pub const ROWS: &str = "Rows";
    pub const COLUMNS: &str = "Columns";
}

/// Environment handling
pub mod env {
    /// Prefix for configuration overrides, e.g. `STUDY_ROUTER_MAX_ATTEMPTS`
    pub const CONFIG_PREFIX: &str = "STUDY_ROUTER";
}
