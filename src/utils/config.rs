// src/utils/config.rs
//! Layered VM configuration
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults ([`VmConfig::default`])
//! 2. A YAML/TOML/JSON file (`--config FILE`, or `config/realm-vm.*` if present)
//! 3. Environment variables prefixed `REALM_VM__`, e.g.
//!    `REALM_VM__RESOURCE__MACHINE_NUM=1`

use crate::utils::errors::{EngineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Default config file stem, resolved relative to the working directory
pub const DEFAULT_CONFIG_STEM: &str = "config/realm-vm";

/// Top-level VM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Topology
    pub resource: ResourceConfig,

    /// Lane layout of the local realm
    pub local: RealmConfig,

    /// Lane layout of the remote realm
    pub remote: RealmConfig,

    /// Logging and metrics
    pub observability: ObservabilityConfig,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            resource: ResourceConfig::default(),
            local: RealmConfig {
                lanes: vec![
                    LaneConfig::new("host", ["host"]),
                    LaneConfig::new("symbol", ["symbol"]),
                ],
            },
            remote: RealmConfig {
                lanes: vec![LaneConfig::new("transport", ["transport"])],
            },
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Topology description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Number of hosts taking part in execution
    pub machine_num: usize,

    /// CPU devices per host
    pub cpu_device_num: usize,

    /// GPU devices per host
    pub gpu_device_num: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            machine_num: 1,
            cpu_device_num: 1,
            gpu_device_num: 0,
        }
    }
}

/// Lanes of one realm
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmConfig {
    pub lanes: Vec<LaneConfig>,
}

/// One execution lane and the affinities routed to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneConfig {
    pub name: String,
    pub affinities: Vec<String>,
}

impl LaneConfig {
    pub fn new<I, S>(name: impl Into<String>, affinities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            affinities: affinities.into_iter().map(Into::into).collect(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    /// Install the Prometheus metrics recorder
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics: true,
        }
    }
}

impl VmConfig {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading `path` instead of the default file if given
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_STEM).required(false),
        };

        // Missing sections fall back to `VmConfig::default()` through serde
        let config: VmConfig = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("REALM_VM")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Check structural consistency of the lane layout
    pub fn validate(&self) -> Result<()> {
        if self.resource.machine_num == 0 {
            return Err(EngineError::ConfigError(
                "resource.machine_num must be at least 1".into(),
            ));
        }
        if self.resource.cpu_device_num == 0 {
            return Err(EngineError::ConfigError(
                "resource.cpu_device_num must be at least 1".into(),
            ));
        }

        for (realm, cfg) in [("local", &self.local), ("remote", &self.remote)] {
            if cfg.lanes.is_empty() {
                return Err(EngineError::ConfigError(format!(
                    "{realm} realm declares no lanes"
                )));
            }

            let mut names = HashSet::new();
            for lane in &cfg.lanes {
                if !names.insert(lane.name.as_str()) {
                    return Err(EngineError::ConfigError(format!(
                        "{realm} realm declares lane `{}` twice",
                        lane.name
                    )));
                }
            }
        }

        Ok(())
    }
}
