// src/vm/builtin.rs
//! Built-in instruction types
//!
//! | name                    | realm  | affinity    | operands                                   |
//! |-------------------------|--------|-------------|--------------------------------------------|
//! | `Nop`                   | local  | `host`      | none                                       |
//! | `NewSymbol`             | local  | `symbol`    | `init_symbol_operand`                      |
//! | `DeleteSymbol`          | local  | `symbol`    | `symbol_operand`                           |
//! | `InitStringSymbol`      | local  | `symbol`    | `init_symbol_operand`                      |
//! | `NewParallelDescSymbol` | local  | `symbol`    | `int64_operand` (staged device name id)    |
//! | `NewObject`             | local  | `host`      | `int64_operand` ×2 (parallel desc, object) |
//! | `DeleteObject`          | local  | `host`      | `mut_operand`                              |
//! | `RemoteNop`             | remote | `transport` | none                                       |
//!
//! String and device-name payloads do not travel in batch text. The host
//! stages them on the [`SymbolTable`] under the symbol id before the run,
//! and the initializing instruction consumes the staged value.

use crate::utils::config::ResourceConfig;
use crate::utils::errors::{EngineError, Result};
use crate::vm::instruction::Instruction;
use crate::vm::operand::{ObjectOperand, SymbolOperand};
use crate::vm::parallel_desc::{ParallelDesc, ParallelDescError};
use crate::vm::realm::Realm;
use crate::vm::registry::{InstructionTypeRegistry, InstructionTypeSpec};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Operand struct of instructions that take no operands
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOperands {}

crate::reflect_struct! { NoOperands {} }

/// Operand struct of symbol instructions
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolOperands {
    pub symbol: SymbolOperand,
}

crate::reflect_struct! { SymbolOperands { symbol: SymbolOperand } }

/// Operand struct of `NewParallelDescSymbol`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelDescOperands {
    pub symbol: i64,
}

crate::reflect_struct! { ParallelDescOperands { symbol: i64 } }

/// Operand struct of `NewObject`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NewObjectOperands {
    pub parallel_desc: i64,
    pub object: i64,
}

crate::reflect_struct! { NewObjectOperands { parallel_desc: i64, object: i64 } }

/// Operand struct of `DeleteObject`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectOperands {
    pub object: ObjectOperand,
}

crate::reflect_struct! { ObjectOperands { object: ObjectOperand } }

/// Value bound to a live symbol
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolValue {
    /// Created, not yet initialized
    Bare,
    String(String),
    ParallelDesc(ParallelDesc),
}

/// Host-side payload waiting for its initializing instruction
#[derive(Debug)]
enum Staged {
    String(String),
    DeviceName(String),
}

impl Staged {
    fn kind(&self) -> &'static str {
        match self {
            Staged::String(_) => "string",
            Staged::DeviceName(_) => "device name",
        }
    }
}

/// Logical symbols and objects managed by the built-in kernels
#[derive(Debug, Default)]
pub struct SymbolTable {
    resource: ResourceConfig,
    symbols: RwLock<HashMap<i64, SymbolValue>>,
    staged: Mutex<HashMap<i64, Staged>>,
    /// Object id → id of its parallel desc symbol
    objects: RwLock<HashMap<i64, i64>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that checks placements against `resource`
    pub fn with_resource(resource: &ResourceConfig) -> Self {
        Self {
            resource: resource.clone(),
            ..Self::default()
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.symbols.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }

    pub fn symbol(&self, id: i64) -> Option<SymbolValue> {
        self.symbols.read().get(&id).cloned()
    }

    pub fn string(&self, id: i64) -> Option<String> {
        match self.symbols.read().get(&id) {
            Some(SymbolValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn parallel_desc(&self, id: i64) -> Option<ParallelDesc> {
        match self.symbols.read().get(&id) {
            Some(SymbolValue::ParallelDesc(desc)) => Some(desc.clone()),
            _ => None,
        }
    }

    /// Parallel desc symbol the object was created on
    pub fn object(&self, id: i64) -> Option<i64> {
        self.objects.read().get(&id).copied()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Stage the string an `InitStringSymbol` on `id` will bind
    pub fn stage_string(&self, id: i64, value: impl Into<String>) {
        self.staged.lock().insert(id, Staged::String(value.into()));
    }

    /// Stage the device name a `NewParallelDescSymbol` on `id` will parse
    pub fn stage_device_name(&self, id: i64, device_name: impl Into<String>) {
        self.staged.lock().insert(id, Staged::DeviceName(device_name.into()));
    }

    fn insert(&self, id: i64) -> std::result::Result<(), String> {
        match self.symbols.write().entry(id) {
            Entry::Occupied(_) => Err(format!("symbol {id} already exists")),
            Entry::Vacant(slot) => {
                slot.insert(SymbolValue::Bare);
                Ok(())
            }
        }
    }

    fn remove(&self, id: i64) -> std::result::Result<(), String> {
        self.symbols
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| format!("symbol {id} does not exist"))
    }

    fn take_staged(&self, id: i64, want: &str) -> std::result::Result<Staged, String> {
        let mut staged = self.staged.lock();
        match staged.remove(&id) {
            Some(value) if value.kind() == want => Ok(value),
            Some(other) => {
                let found = other.kind();
                staged.insert(id, other);
                Err(format!("symbol {id} has a staged {found}, not a {want}"))
            }
            None => Err(format!("no {want} staged for symbol {id}")),
        }
    }

    fn init_string(&self, id: i64) -> std::result::Result<(), String> {
        let mut symbols = self.symbols.write();
        match symbols.get_mut(&id) {
            None => Err(format!("symbol {id} does not exist")),
            Some(slot) if *slot == SymbolValue::Bare => {
                let Staged::String(value) = self.take_staged(id, "string")? else {
                    return Err(format!("no string staged for symbol {id}"));
                };
                *slot = SymbolValue::String(value);
                Ok(())
            }
            Some(_) => Err(format!("symbol {id} is already initialized")),
        }
    }

    fn new_parallel_desc(&self, id: i64) -> std::result::Result<ParallelDesc, String> {
        let mut symbols = self.symbols.write();
        if symbols.contains_key(&id) {
            return Err(format!("symbol {id} already exists"));
        }
        let Staged::DeviceName(device_name) = self.take_staged(id, "device name")? else {
            return Err(format!("no device name staged for symbol {id}"));
        };

        let desc: ParallelDesc = device_name.parse().map_err(|e: ParallelDescError| e.to_string())?;
        desc.check(&self.resource).map_err(|e| e.to_string())?;
        symbols.insert(id, SymbolValue::ParallelDesc(desc.clone()));
        Ok(desc)
    }

    fn new_object(&self, parallel_desc: i64, object: i64) -> std::result::Result<(), String> {
        match self.symbols.read().get(&parallel_desc) {
            Some(SymbolValue::ParallelDesc(_)) => {}
            Some(_) => return Err(format!("symbol {parallel_desc} is not a parallel desc")),
            None => return Err(format!("symbol {parallel_desc} does not exist")),
        }
        match self.objects.write().entry(object) {
            Entry::Occupied(_) => Err(format!("object {object} already exists")),
            Entry::Vacant(slot) => {
                slot.insert(parallel_desc);
                Ok(())
            }
        }
    }

    fn delete_object(&self, object: i64) -> std::result::Result<(), String> {
        self.objects
            .write()
            .remove(&object)
            .map(|_| ())
            .ok_or_else(|| format!("object {object} does not exist"))
    }
}

/// Register the built-in types, sharing `symbols` between the kernels
pub fn register_builtins(registry: &mut InstructionTypeRegistry, symbols: Arc<SymbolTable>) -> Result<()> {
    registry.register(InstructionTypeSpec::new::<NoOperands>(
        "Nop",
        Realm::Local,
        "host",
        |_: &Instruction| -> Result<()> { Ok(()) },
    ))?;

    let table = Arc::clone(&symbols);
    registry.register(InstructionTypeSpec::new::<SymbolOperands>(
        "NewSymbol",
        Realm::Local,
        "symbol",
        move |instr: &Instruction| -> Result<()> {
            let ops: SymbolOperands = instr.decode_operands()?;
            let id = ops.symbol.logical_object_id;
            table.insert(id).map_err(|e| EngineError::kernel(instr.type_name(), e))?;
            debug!(symbol = id, "symbol created");
            Ok(())
        },
    ))?;

    let table = Arc::clone(&symbols);
    registry.register(InstructionTypeSpec::new::<SymbolOperands>(
        "DeleteSymbol",
        Realm::Local,
        "symbol",
        move |instr: &Instruction| -> Result<()> {
            let ops: SymbolOperands = instr.decode_operands()?;
            let id = ops.symbol.logical_object_id;
            table.remove(id).map_err(|e| EngineError::kernel(instr.type_name(), e))?;
            debug!(symbol = id, "symbol deleted");
            Ok(())
        },
    ))?;

    let table = Arc::clone(&symbols);
    registry.register(InstructionTypeSpec::new::<SymbolOperands>(
        "InitStringSymbol",
        Realm::Local,
        "symbol",
        move |instr: &Instruction| -> Result<()> {
            let ops: SymbolOperands = instr.decode_operands()?;
            let id = ops.symbol.logical_object_id;
            table.init_string(id).map_err(|e| EngineError::kernel(instr.type_name(), e))?;
            debug!(symbol = id, "string symbol initialized");
            Ok(())
        },
    ))?;

    let table = Arc::clone(&symbols);
    registry.register(InstructionTypeSpec::new::<ParallelDescOperands>(
        "NewParallelDescSymbol",
        Realm::Local,
        "symbol",
        move |instr: &Instruction| -> Result<()> {
            let ops: ParallelDescOperands = instr.decode_operands()?;
            let desc = table
                .new_parallel_desc(ops.symbol)
                .map_err(|e| EngineError::kernel(instr.type_name(), e))?;
            debug!(symbol = ops.symbol, %desc, "parallel desc created");
            Ok(())
        },
    ))?;

    let table = Arc::clone(&symbols);
    registry.register(InstructionTypeSpec::new::<NewObjectOperands>(
        "NewObject",
        Realm::Local,
        "host",
        move |instr: &Instruction| -> Result<()> {
            let ops: NewObjectOperands = instr.decode_operands()?;
            table
                .new_object(ops.parallel_desc, ops.object)
                .map_err(|e| EngineError::kernel(instr.type_name(), e))?;
            debug!(object = ops.object, parallel_desc = ops.parallel_desc, "object created");
            Ok(())
        },
    ))?;

    let table = symbols;
    registry.register(InstructionTypeSpec::new::<ObjectOperands>(
        "DeleteObject",
        Realm::Local,
        "host",
        move |instr: &Instruction| -> Result<()> {
            let ops: ObjectOperands = instr.decode_operands()?;
            let id = ops.object.logical_object_id;
            table.delete_object(id).map_err(|e| EngineError::kernel(instr.type_name(), e))?;
            debug!(object = id, "object deleted");
            Ok(())
        },
    ))?;

    registry.register(InstructionTypeSpec::new::<NoOperands>(
        "RemoteNop",
        Realm::Remote,
        "transport",
        |_: &Instruction| -> Result<()> { Ok(()) },
    ))?;

    Ok(())
}
