// src/vm/mod.rs
//! Two-realm instruction VM
//!
//! Instructions are grouped by realm (`local` or `remote`). Each realm has an
//! engine with a pending list and a set of lanes; a lane accepts the
//! instructions whose affinity it serves and runs them one at a time.
//!
//! # Architecture
//!
//! ```text
//!  batch text ──► BatchParser ──► InstructionBatch
//!                                      │ new_instruction (registry lookup + operand check)
//!                                      ▼
//!                        ┌──── classify by realm ────┐
//!                        ▼                           ▼
//!                   local_list                  remote_list
//!                        │ detach_all / receive      │
//!                        ▼                           ▼
//!             ┌─ RealmEngine(local) ─┐    ┌─ RealmEngine(remote) ─┐
//!             │ pending              │    │ pending               │
//!             │   │ schedule()       │    │   │ schedule()        │
//!             │   ▼                  │    │   ▼                   │
//!             │ host │ symbol  lanes │    │ transport      lanes  │
//!             └──────┴───────────────┘    └───────────────────────┘
//!                        │ run_pass()                │
//!                        ▼                           ▼
//!                  InstructionKernel::execute → discard
//! ```
//!
//! The runner repeats `schedule` + `run_pass` on both realms until every
//! queue is empty. Within a pass a realm always runs the lane whose head
//! was received earliest, so each realm executes in submission order. If
//! the drain fails, whatever is still queued is discarded unexecuted.

pub mod builtin;
pub mod instruction;
pub mod instruction_list;
pub mod operand;
pub mod parallel_desc;
pub mod parser;
pub mod realm;
pub mod realm_engine;
pub mod registry;
pub mod runner;
pub mod thread_ctx;

pub use builtin::{register_builtins, NoOperands, SymbolOperands, SymbolTable, SymbolValue};
pub use instruction::{new_instruction, Instruction, InstructionId};
pub use instruction_list::InstructionList;
pub use operand::{decode_operands, InstructionOperand, ObjectOperand, SeparatorOperand, SymbolOperand};
pub use parallel_desc::{DeviceKind, ParallelDesc, ParallelDescError};
pub use parser::{parse_batch, BatchParser, InstructionBatch, InstructionDescriptor, TextBatchParser};
pub use realm::Realm;
pub use realm_engine::{EngineState, EngineStats, LaneStats, RealmEngine};
pub use registry::{InstrTypeId, InstructionKernel, InstructionType, InstructionTypeRegistry, InstructionTypeSpec};
pub use runner::{RealmCounts, RunReport, Runner, VmContext};
pub use thread_ctx::ThreadContext;
