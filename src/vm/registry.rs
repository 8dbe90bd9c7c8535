// src/vm/registry.rs
//! Instruction type registry
//!
//! Maps an instruction type name to everything the VM needs to run it:
//! realm, opcode, lane affinity, operand layout and executable unit.
//! Populated at start-up, read-only once handed to a
//! [`VmContext`](crate::vm::runner::VmContext).

use crate::reflect::{Reflect, StructLayout};
use crate::utils::errors::{EngineError, Result};
use crate::vm::instruction::Instruction;
use crate::vm::operand::{decode_operands, InstructionOperand};
use crate::vm::realm::Realm;
use indexmap::IndexMap;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Executable unit behind an instruction type
pub trait InstructionKernel: Send + Sync {
    fn execute(&self, instruction: &Instruction) -> Result<()>;
}

impl<F> InstructionKernel for F
where
    F: Fn(&Instruction) -> Result<()> + Send + Sync,
{
    fn execute(&self, instruction: &Instruction) -> Result<()> {
        self(instruction)
    }
}

/// Realm plus opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrTypeId {
    pub realm: Realm,
    pub opcode: u32,
}

type OperandCheck = fn(&str, &[InstructionOperand]) -> Result<()>;

fn check_operands<T: Reflect + Default>(instr_type: &str, operands: &[InstructionOperand]) -> Result<()> {
    decode_operands::<T>(instr_type, operands).map(|_| ())
}

/// A registered instruction type
pub struct InstructionType {
    name: String,
    id: InstrTypeId,
    affinity: String,
    operand_layout: StructLayout,
    operand_type: TypeId,
    operand_type_name: &'static str,
    check: OperandCheck,
    kernel: Arc<dyn InstructionKernel>,
}

impl InstructionType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> InstrTypeId {
        self.id
    }

    pub fn realm(&self) -> Realm {
        self.id.realm
    }

    pub fn opcode(&self) -> u32 {
        self.id.opcode
    }

    /// Lane routing key
    pub fn affinity(&self) -> &str {
        &self.affinity
    }

    pub fn operand_layout(&self) -> &StructLayout {
        &self.operand_layout
    }

    /// Type of the operand struct the kernel decodes into
    pub fn operand_type(&self) -> TypeId {
        self.operand_type
    }

    /// Full path of the operand struct
    pub fn operand_type_name(&self) -> &'static str {
        self.operand_type_name
    }

    pub(crate) fn kernel(&self) -> &dyn InstructionKernel {
        self.kernel.as_ref()
    }

    /// Check that `operands` decode into this type's operand struct
    pub fn check_operands(&self, operands: &[InstructionOperand]) -> Result<()> {
        (self.check)(&self.name, operands)
    }
}

impl fmt::Debug for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionType")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("affinity", &self.affinity)
            .field("operands", &self.operand_layout.type_name)
            .finish()
    }
}

/// Instruction type awaiting registration
pub struct InstructionTypeSpec {
    name: String,
    realm: Realm,
    affinity: String,
    operand_layout: StructLayout,
    operand_type: TypeId,
    operand_type_name: &'static str,
    check: OperandCheck,
    kernel: Arc<dyn InstructionKernel>,
}

impl InstructionTypeSpec {
    /// Instruction type whose operands decode into `T`
    pub fn new<T>(
        name: impl Into<String>,
        realm: Realm,
        affinity: impl Into<String>,
        kernel: impl InstructionKernel + 'static,
    ) -> Self
    where
        T: Reflect + Default,
    {
        Self {
            name: name.into(),
            realm,
            affinity: affinity.into(),
            operand_layout: T::LAYOUT,
            operand_type: TypeId::of::<T>(),
            operand_type_name: std::any::type_name::<T>(),
            check: check_operands::<T>,
            kernel: Arc::new(kernel),
        }
    }
}

/// Name → instruction type table, in registration order
#[derive(Debug, Default)]
pub struct InstructionTypeRegistry {
    types: IndexMap<String, Arc<InstructionType>>,
}

impl InstructionTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type; opcodes are assigned in registration order
    pub fn register(&mut self, spec: InstructionTypeSpec) -> Result<InstrTypeId> {
        if self.types.contains_key(&spec.name) {
            return Err(EngineError::DuplicateInstructionType(spec.name));
        }

        let id = InstrTypeId {
            realm: spec.realm,
            opcode: self.types.len() as u32,
        };

        debug!(
            name = %spec.name,
            realm = %spec.realm,
            opcode = id.opcode,
            affinity = %spec.affinity,
            operands = spec.operand_layout.type_name,
            "registered instruction type"
        );

        let instr_type = InstructionType {
            name: spec.name.clone(),
            id,
            affinity: spec.affinity,
            operand_layout: spec.operand_layout,
            operand_type: spec.operand_type,
            operand_type_name: spec.operand_type_name,
            check: spec.check,
            kernel: spec.kernel,
        };
        self.types.insert(spec.name, Arc::new(instr_type));
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<InstructionType>> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownInstructionType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<InstructionType>> {
        self.types.values()
    }
}
