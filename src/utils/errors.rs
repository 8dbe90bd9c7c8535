// src/utils/errors.rs
//! Error taxonomy for the VM core
//!
//! Parse, registry and topology errors are recoverable and surface to the
//! caller of [`Runner::run`](crate::vm::runner::Runner::run). Scheduler
//! configuration faults are fatal: they mean the registry and the lane layout
//! disagree, which no amount of retrying fixes.

use crate::vm::realm::Realm;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the VM core
#[derive(Debug, Error)]
pub enum EngineError {
    /// Batch text could not be parsed into instruction descriptors
    #[error("batch parse error: {0}")]
    BatchParseError(String),

    /// Instruction type name is not in the registry
    #[error("unknown instruction type: {0}")]
    UnknownInstructionType(String),

    /// More than one host configured
    #[error("unsupported topology: {machine_num} hosts configured, multi-host execution is not implemented")]
    UnsupportedTopology { machine_num: usize },

    /// An instruction's lane affinity matches no lane of its realm
    #[error("scheduler configuration fault: {realm} realm has no lane accepting affinity `{affinity}` (instruction type `{instr_type}`)")]
    SchedulerConfigurationFault {
        realm: Realm,
        affinity: String,
        instr_type: String,
    },

    /// Operands do not fit the registered operand layout
    #[error("operand mismatch for `{instr_type}`: {reason}")]
    OperandMismatch { instr_type: String, reason: String },

    /// Instruction type registered twice
    #[error("instruction type already registered: {0}")]
    DuplicateInstructionType(String),

    /// Executable unit reported a failure
    #[error("kernel `{instr_type}` failed: {reason}")]
    KernelFailed { instr_type: String, reason: String },

    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl EngineError {
    /// Fatal errors indicate an internal inconsistency rather than bad input
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::SchedulerConfigurationFault { .. })
    }

    pub(crate) fn kernel(instr_type: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        EngineError::KernelFailed {
            instr_type: instr_type.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::ConfigError(e.to_string())
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        EngineError::BatchParseError(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::BatchParseError(e.to_string())
    }
}
