// src/lib.rs
//! Realm VM Library
//!
//! A two-realm instruction virtual machine driven by compile-time struct
//! layout reflection.
//!
//! # Architecture
//!
//! The crate is structured into several key modules:
//!
//! - **reflect**: const field layouts, forward/reverse field walks, oneof dispatch
//! - **vm**: instructions, the type registry, realm engines, lanes and the runner
//! - **observability**: tracing subscriber and Prometheus recorder setup
//! - **utils**: configuration and errors
//!
//! # Example
//!
//! ```no_run
//! use realm_vm::vm::{register_builtins, InstructionTypeRegistry, Runner, SymbolTable, VmContext};
//! use realm_vm::VmConfig;
//! use std::sync::Arc;
//!
//! # fn main() -> realm_vm::Result<()> {
//! let mut registry = InstructionTypeRegistry::new();
//! register_builtins(&mut registry, Arc::new(SymbolTable::new()))?;
//!
//! let mut runner = Runner::new(VmContext::new(&VmConfig::load()?, registry)?);
//! let report = runner.run("instruction:\n  - instr_type_name: Nop\n")?;
//! assert_eq!(report.executed.local, 1);
//! # Ok(())
//! # }
//! ```

pub mod observability;
pub mod reflect;
pub mod utils;
pub mod vm;

// Re-export commonly used types
pub use reflect::{Reflect, StructLayout};
pub use utils::config::VmConfig;
pub use utils::errors::{EngineError, Result};
pub use vm::{Instruction, InstructionList, Realm, RealmEngine, RunReport, Runner, VmContext};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
