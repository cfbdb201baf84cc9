//! Configuration Loader
//!
//! Reads a configuration file (format chosen by extension) and layers
//! `STUDY_ROUTER_*` environment overrides on top, then validates the result.
//! Loading is all-or-nothing: any invalid setting or rule rejects the whole
//! configuration.

use super::error::{ConfigResult, ConfigurationError};
use super::RouterConfig;
use crate::constants::env::CONFIG_PREFIX;
use crate::routing::Rule;
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Validated, immutable configuration plus its compiled rule set
#[derive(Debug)]
pub struct ConfigManager {
    config: RouterConfig,
    rules: Vec<Rule>,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load from a file with environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigurationError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        debug!(path = %path.display(), "Loading router configuration");

        let raw = Config::builder()
            .add_source(File::from(path))
            .add_source(Self::environment_source())
            .build()
            .and_then(|built| built.try_deserialize::<RouterConfig>())
            .map_err(|e| ConfigurationError::parse_error(path.display().to_string(), e))?;

        Self::build(raw, Some(path.to_path_buf()))
    }

    /// Load from an in-memory document; no environment overrides are applied
    pub fn load_from_str(contents: &str, format: FileFormat) -> ConfigResult<Arc<ConfigManager>> {
        let raw = Config::builder()
            .add_source(File::from_str(contents, format))
            .build()
            .and_then(|built| built.try_deserialize::<RouterConfig>())
            .map_err(|e| ConfigurationError::parse_error("<inline>", e))?;

        Self::build(raw, None)
    }

    /// Validate an already-built configuration
    pub fn from_config(config: RouterConfig) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config, None)
    }

    fn build(config: RouterConfig, source: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let rules = config.validate()?;
        let source_name = source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<inline>".to_string());

        info!(
            rules = rules.len(),
            max_attempts = config.max_attempts,
            retry_delays = ?config.retry_delays,
            source = %source_name,
            "Router configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            rules,
            source,
        }))
    }

    fn environment_source() -> Environment {
        Environment::with_prefix(CONFIG_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("retry_delays")
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// File the configuration came from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
