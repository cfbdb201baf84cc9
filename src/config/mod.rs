//! # Router Configuration
//!
//! Configuration is loaded once at startup and is immutable afterwards. It
//! holds the ordered rule set plus retry, dispatch, selection and logging
//! settings.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use study_router::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("config/study-router.yaml")?;
//! println!("{} rules, {} attempts", manager.rules().len(), manager.config().max_attempts);
//! # Ok(())
//! # }
//! ```
//!
//! ## File Format
//!
//! ```yaml
//! log_level: info
//! max_attempts: 3
//! retry_delays: [60, 120, 300]
//! rules:
//!   - name: bone_length_to_mercure
//!     match:
//!       study_description_contains: BONE LENGTH
//!     action:
//!       send_mode: highest_resolution
//!       destinations: [MERCURE]
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use crate::routing::{RankingMetric, Rule, RuleDefinition};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Root configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// `EnvFilter` directive, e.g. `info` or `info,study_router=debug`
    pub log_level: String,

    pub log_format: LogFormat,

    /// Total send attempts per (resource, destination), first attempt included
    pub max_attempts: u32,

    /// Offsets in seconds from the first attempt at which attempts 2, 3, ... fire
    pub retry_delays: Vec<u64>,

    /// Bound on one transport submit call
    pub send_timeout_seconds: u64,

    /// Origin label identifying stability events this engine caused itself
    pub engine_origin: String,

    /// Metric used by `highest_resolution` rules
    pub selection_metric: RankingMetric,

    /// Ordered rule set
    pub rules: Vec<RuleDefinition>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
            max_attempts: defaults::MAX_ATTEMPTS,
            retry_delays: defaults::RETRY_DELAYS_SECONDS.to_vec(),
            send_timeout_seconds: defaults::SEND_TIMEOUT_SECONDS,
            engine_origin: defaults::ENGINE_ORIGIN.to_string(),
            selection_metric: RankingMetric::default(),
            rules: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Validate every setting and compile the rule set
    pub fn validate(&self) -> ConfigResult<Vec<Rule>> {
        if EnvFilter::try_new(&self.log_level).is_err() {
            return Err(ConfigurationError::invalid_value(
                "log_level",
                &self.log_level,
                "not a valid log filter directive",
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_attempts",
                self.max_attempts,
                "at least one attempt is required",
            ));
        }

        let retries = (self.max_attempts - 1) as usize;
        if self.retry_delays.len() < retries {
            return Err(ConfigurationError::invalid_value(
                "retry_delays",
                format!("{:?}", self.retry_delays),
                format!("max_attempts = {} needs {retries} delays", self.max_attempts),
            ));
        }

        if self.retry_delays.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(ConfigurationError::invalid_value(
                "retry_delays",
                format!("{:?}", self.retry_delays),
                "delays are offsets from the first attempt and must not decrease",
            ));
        }

        if self.send_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "send_timeout_seconds",
                self.send_timeout_seconds,
                "must be greater than zero",
            ));
        }

        if self.engine_origin.trim().is_empty() {
            return Err(ConfigurationError::missing_field(
                "engine_origin",
                "router configuration",
            ));
        }

        Rule::compile_all(&self.rules)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_seconds)
    }

    /// Retry offsets actually used, one per retry
    pub fn retry_offsets(&self) -> Vec<Duration> {
        self.retry_delays
            .iter()
            .take(self.max_attempts.saturating_sub(1) as usize)
            .map(|secs| Duration::from_secs(*secs))
            .collect()
    }
}
