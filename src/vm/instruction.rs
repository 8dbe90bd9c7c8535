// src/vm/instruction.rs
//! Instructions
//!
//! An [`Instruction`] is neither `Clone` nor `Copy`: whoever holds the value
//! owns it, so an instruction sits in exactly one queue at a time and leaves
//! the system only by being executed and dropped.

use crate::reflect::Reflect;
use crate::utils::errors::{EngineError, Result};
use crate::vm::operand::{decode_operands, release_operands, InstructionOperand};
use crate::vm::realm::Realm;
use crate::vm::registry::{InstrTypeId, InstructionType, InstructionTypeRegistry};
use std::any::TypeId;
use std::sync::Arc;
use tracing::trace;
use ulid::Ulid;

/// Unique instruction identity
pub type InstructionId = Ulid;

/// A unit of work with a registered type and its operands
#[derive(Debug)]
pub struct Instruction {
    id: InstructionId,
    instr_type: Arc<InstructionType>,
    operands: Vec<InstructionOperand>,
    /// Position in the owning realm's submission order, stamped on receive
    seq: u64,
}

impl Instruction {
    /// Resolve `type_name` and validate `operands` against its operand layout
    pub fn new(
        registry: &InstructionTypeRegistry,
        type_name: &str,
        operands: Vec<InstructionOperand>,
    ) -> Result<Self> {
        let instr_type = registry.lookup(type_name)?;
        instr_type.check_operands(&operands)?;

        let instruction = Self {
            id: Ulid::new(),
            instr_type,
            operands,
            seq: 0,
        };
        trace!(id = %instruction.id, instr_type = type_name, "instruction created");
        Ok(instruction)
    }

    pub fn id(&self) -> InstructionId {
        self.id
    }

    pub fn instr_type(&self) -> &InstructionType {
        &self.instr_type
    }

    pub fn type_name(&self) -> &str {
        self.instr_type.name()
    }

    pub fn type_id(&self) -> InstrTypeId {
        self.instr_type.id()
    }

    pub fn realm(&self) -> Realm {
        self.instr_type.realm()
    }

    pub fn opcode(&self) -> u32 {
        self.instr_type.opcode()
    }

    pub fn affinity(&self) -> &str {
        self.instr_type.affinity()
    }

    pub fn operands(&self) -> &[InstructionOperand] {
        &self.operands
    }

    /// Submission sequence within the realm engine that received it
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Decode the operands into the registered operand struct
    pub fn decode_operands<T>(&self) -> Result<T>
    where
        T: Reflect + Default,
    {
        if TypeId::of::<T>() != self.instr_type.operand_type() {
            return Err(EngineError::OperandMismatch {
                instr_type: self.type_name().to_string(),
                reason: format!(
                    "registered with {} operands, decoded as {}",
                    self.instr_type.operand_type_name(),
                    std::any::type_name::<T>()
                ),
            });
        }
        decode_operands(self.type_name(), &self.operands)
    }

    /// Run the executable unit, then tear the instruction down
    pub(crate) fn execute_and_discard(mut self) -> Result<()> {
        let result = self.instr_type.kernel().execute(&self);
        let instr_type = Arc::clone(&self.instr_type);
        release_operands(instr_type.name(), &mut self.operands);
        trace!(id = %self.id, instr_type = instr_type.name(), ok = result.is_ok(), "instruction discarded");
        result
    }

    /// Tear the instruction down without running it
    pub(crate) fn discard(mut self) {
        let instr_type = Arc::clone(&self.instr_type);
        release_operands(instr_type.name(), &mut self.operands);
        trace!(id = %self.id, instr_type = instr_type.name(), "instruction dropped unexecuted");
    }
}

/// Construct an instruction from the registry
pub fn new_instruction(
    registry: &InstructionTypeRegistry,
    type_name: &str,
    operands: Vec<InstructionOperand>,
) -> Result<Instruction> {
    Instruction::new(registry, type_name, operands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::operand::SymbolOperand;
    use crate::vm::registry::InstructionTypeSpec;
    use parking_lot::Mutex;

    #[repr(C)]
    #[derive(Debug, Default)]
    struct SymbolOperands {
        symbol: SymbolOperand,
        weight: f64,
    }

    crate::reflect_struct! { SymbolOperands { symbol: SymbolOperand, weight: f64 } }

    #[repr(C)]
    #[derive(Debug, Default)]
    struct OtherOperands {
        symbol: SymbolOperand,
        weight: f64,
    }

    crate::reflect_struct! { OtherOperands { symbol: SymbolOperand, weight: f64 } }

    fn registry(seen: Arc<Mutex<Vec<i64>>>) -> InstructionTypeRegistry {
        let mut registry = InstructionTypeRegistry::new();
        registry
            .register(InstructionTypeSpec::new::<SymbolOperands>(
                "Touch",
                Realm::Local,
                "host",
                move |instr: &Instruction| -> Result<()> {
                    let ops: SymbolOperands = instr.decode_operands()?;
                    seen.lock().push(ops.symbol.logical_object_id);
                    Ok(())
                },
            ))
            .unwrap();
        registry
    }

    fn operands(id: i64) -> Vec<InstructionOperand> {
        vec![
            InstructionOperand::Symbol(SymbolOperand {
                logical_object_id: id,
            }),
            InstructionOperand::Double(0.5),
        ]
    }

    #[test]
    fn test_new_instruction() {
        let registry = registry(Arc::default());
        let instr = new_instruction(&registry, "Touch", operands(4)).unwrap();
        assert_eq!(instr.type_name(), "Touch");
        assert_eq!(instr.realm(), Realm::Local);
        assert_eq!(instr.opcode(), 0);
        assert_eq!(instr.affinity(), "host");
        assert_eq!(instr.operands().len(), 2);

        let other = new_instruction(&registry, "Touch", operands(4)).unwrap();
        assert_ne!(instr.id(), other.id());
    }

    #[test]
    fn test_unknown_type() {
        let registry = registry(Arc::default());
        let err = new_instruction(&registry, "Nope", vec![]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownInstructionType(_)));
    }

    #[test]
    fn test_bad_operands_rejected_at_construction() {
        let registry = registry(Arc::default());
        let err = new_instruction(&registry, "Touch", vec![InstructionOperand::Int64(1)]).unwrap_err();
        assert!(matches!(err, EngineError::OperandMismatch { .. }));
    }

    #[test]
    fn test_decode_with_wrong_struct() {
        let registry = registry(Arc::default());
        let instr = new_instruction(&registry, "Touch", operands(1)).unwrap();
        let err = instr.decode_operands::<OtherOperands>().unwrap_err();
        assert!(err.to_string().contains("OtherOperands"));
    }

    mod shadow {
        use crate::vm::operand::SymbolOperand;

        /// Same name and shape as the registered operand struct, different type
        #[repr(C)]
        #[derive(Debug, Default)]
        pub struct SymbolOperands {
            pub symbol: SymbolOperand,
            pub weight: f64,
        }

        crate::reflect_struct! { SymbolOperands { symbol: SymbolOperand, weight: f64 } }
    }

    #[test]
    fn test_decode_with_same_named_struct() {
        let registry = registry(Arc::default());
        let instr = new_instruction(&registry, "Touch", operands(1)).unwrap();
        assert!(instr.decode_operands::<SymbolOperands>().is_ok());

        let err = instr.decode_operands::<shadow::SymbolOperands>().unwrap_err();
        assert!(matches!(err, EngineError::OperandMismatch { .. }));
        assert!(err.to_string().contains("shadow::SymbolOperands"));
    }

    #[test]
    fn test_discard_skips_kernel() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(Arc::clone(&seen));
        new_instruction(&registry, "Touch", operands(3)).unwrap().discard();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_execute_and_discard() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(Arc::clone(&seen));
        let instr = new_instruction(&registry, "Touch", operands(9)).unwrap();
        instr.execute_and_discard().unwrap();
        assert_eq!(*seen.lock(), vec![9]);
    }
}
