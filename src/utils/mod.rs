// src/utils/mod.rs
//! Shared configuration and error types

pub mod config;
pub mod errors;

pub use config::{LaneConfig, LogFormat, RealmConfig, ResourceConfig, VmConfig};
pub use errors::{EngineError, Result};
