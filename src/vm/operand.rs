// src/vm/operand.rs
//! Instruction operands
//!
//! Every operand is a oneof: a case selector plus the operand substructure
//! for that case. In batch text the case is the map key:
//!
//! ```yaml
//! operand:
//!   - int64_operand: 3
//!   - mut_operand: { logical_object_id: 7 }
//!   - separator: {}
//! ```
//!
//! Typed operand structs (declared with [`reflect_struct!`](crate::reflect_struct))
//! are filled from the operand list by a forward field walk: field `i` takes
//! operand `i`.

use crate::reflect::{Field, FieldValue, FieldVisitor, OneofField, Reflect};
use crate::utils::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Reference to a logical object
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectOperand {
    pub logical_object_id: i64,
}

crate::reflect_struct! { ObjectOperand { logical_object_id: i64 } }

/// Reference to a symbol
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolOperand {
    pub logical_object_id: i64,
}

crate::reflect_struct! { SymbolOperand { logical_object_id: i64 } }

/// Marks the boundary between operand groups
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparatorOperand {}

crate::reflect_struct! { SeparatorOperand {} }

/// One operand of an instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionOperand {
    #[serde(rename = "const_operand")]
    Const(ObjectOperand),
    #[serde(rename = "mut_operand")]
    Mut(ObjectOperand),
    #[serde(rename = "mut2_operand")]
    Mut2(ObjectOperand),
    #[serde(rename = "symbol_operand")]
    Symbol(SymbolOperand),
    #[serde(rename = "init_symbol_operand")]
    InitSymbol(SymbolOperand),
    #[serde(rename = "separator")]
    Separator(SeparatorOperand),
    #[serde(rename = "double_operand")]
    Double(f64),
    #[serde(rename = "int64_operand")]
    Int64(i64),
    #[serde(rename = "uint64_operand")]
    Uint64(u64),
    #[serde(rename = "bool_operand")]
    Bool(bool),
}

crate::reflect_oneof! {
    InstructionOperand {
        Const(ObjectOperand) => const_operand = 1,
        Mut(ObjectOperand) => mut_operand = 2,
        Mut2(ObjectOperand) => mut2_operand = 3,
        Symbol(SymbolOperand) => symbol_operand = 4,
        InitSymbol(SymbolOperand) => init_symbol_operand = 5,
        Separator(SeparatorOperand) => separator = 6,
        Double(f64) => double_operand = 7,
        Int64(i64) => int64_operand = 8,
        Uint64(u64) => uint64_operand = 9,
        Bool(bool) => bool_operand = 10,
    }
}

/// Walk context for filling a typed operand struct
pub(crate) struct DecodeCtx<'a> {
    operands: std::slice::Iter<'a, InstructionOperand>,
    error: Option<String>,
}

/// Assigns the next operand to each visited field
pub(crate) struct AssignOperand;

impl<'a> FieldVisitor<DecodeCtx<'a>> for AssignOperand {
    fn visit<F: FieldValue>(ctx: &mut DecodeCtx<'a>, mut field: Field<'_, F>) {
        if ctx.error.is_some() {
            return;
        }

        let Some(operand) = ctx.operands.next() else {
            ctx.error = Some(format!("no operand left for field `{}`", field.name));
            return;
        };

        if !assign(operand, &mut field) {
            ctx.error = Some(format!(
                "field `{}` (#{}) cannot take a {}",
                field.name,
                field.index,
                operand.case_name()
            ));
        }
    }
}

fn assign<F: FieldValue>(operand: &InstructionOperand, field: &mut Field<'_, F>) -> bool {
    use InstructionOperand as Op;

    if let Some(slot) = field.downcast_mut::<i64>() {
        if let Op::Int64(v) = operand {
            *slot = *v;
            return true;
        }
    } else if let Some(slot) = field.downcast_mut::<u64>() {
        if let Op::Uint64(v) = operand {
            *slot = *v;
            return true;
        }
    } else if let Some(slot) = field.downcast_mut::<f64>() {
        if let Op::Double(v) = operand {
            *slot = *v;
            return true;
        }
    } else if let Some(slot) = field.downcast_mut::<bool>() {
        if let Op::Bool(v) = operand {
            *slot = *v;
            return true;
        }
    } else if let Some(slot) = field.downcast_mut::<ObjectOperand>() {
        if let Op::Const(v) | Op::Mut(v) | Op::Mut2(v) = operand {
            *slot = *v;
            return true;
        }
    } else if let Some(slot) = field.downcast_mut::<SymbolOperand>() {
        if let Op::Symbol(v) | Op::InitSymbol(v) = operand {
            *slot = *v;
            return true;
        }
    } else if field.downcast_ref::<SeparatorOperand>().is_some() {
        return matches!(operand, Op::Separator(_));
    }
    false
}

/// Fill a `T` from `operands`, field `i` from operand `i`
///
/// Fields of `T` must be `i64`, `u64`, `f64`, `bool`, [`ObjectOperand`],
/// [`SymbolOperand`] or [`SeparatorOperand`]. A field of any other type,
/// an [`InstructionOperand`] included, never accepts an operand and fails
/// the decode with [`EngineError::OperandMismatch`]. A field declared
/// `oneof` is visited as the payload of its default case, so decoding can
/// never select a different case; oneof fields are not decodable.
pub fn decode_operands<T>(instr_type: &str, operands: &[InstructionOperand]) -> Result<T>
where
    T: Reflect + Default,
{
    if operands.len() != T::FIELD_COUNT {
        return Err(EngineError::OperandMismatch {
            instr_type: instr_type.to_string(),
            reason: format!(
                "{} expects {} operands, got {}",
                T::LAYOUT.type_name,
                T::FIELD_COUNT,
                operands.len()
            ),
        });
    }

    let mut value = T::default();
    let mut ctx = DecodeCtx {
        operands: operands.iter(),
        error: None,
    };
    value.walk_fields::<AssignOperand, _>(&mut ctx);

    match ctx.error {
        Some(reason) => Err(EngineError::OperandMismatch {
            instr_type: instr_type.to_string(),
            reason,
        }),
        None => Ok(value),
    }
}

/// Context for tracing operand teardown
pub(crate) struct ReleaseCtx<'a> {
    pub instr_type: &'a str,
}

/// Emits one trace event per released operand
pub(crate) struct TraceRelease;

impl<'a> FieldVisitor<ReleaseCtx<'a>> for TraceRelease {
    fn visit<F: FieldValue>(ctx: &mut ReleaseCtx<'a>, field: Field<'_, F>) {
        trace!(
            instr_type = ctx.instr_type,
            operand = field.index,
            case = field.name,
            value = ?field.value,
            "releasing operand"
        );
    }
}

/// Release operands last to first, dispatching each on its live case
pub(crate) fn release_operands(instr_type: &str, operands: &mut [InstructionOperand]) {
    release_operands_with::<TraceRelease, _>(&mut ReleaseCtx { instr_type }, operands);
}

/// Visit operands last to first with `V`, each as its live case
pub(crate) fn release_operands_with<V, C>(ctx: &mut C, operands: &mut [InstructionOperand])
where
    V: FieldVisitor<C>,
{
    for (index, operand) in operands.iter_mut().enumerate().rev() {
        operand.dispatch::<V, _>(ctx, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::walk::{RecordVisit, VisitLog};

    #[repr(C)]
    #[derive(Debug, Default, PartialEq)]
    struct CopyOperands {
        src: ObjectOperand,
        dst: ObjectOperand,
        bytes: u64,
        verify: bool,
    }

    crate::reflect_struct! {
        CopyOperands {
            src: ObjectOperand,
            dst: ObjectOperand,
            bytes: u64,
            verify: bool,
        }
    }

    #[test]
    fn test_parse_operand_cases() {
        let ops: Vec<InstructionOperand> = serde_json::from_str(
            r#"[{"int64_operand": -3}, {"mut_operand": {"logical_object_id": 7}}, {"separator": {}}, {"bool_operand": true}]"#,
        )
        .unwrap();

        assert_eq!(
            ops,
            vec![
                InstructionOperand::Int64(-3),
                InstructionOperand::Mut(ObjectOperand {
                    logical_object_id: 7
                }),
                InstructionOperand::Separator(SeparatorOperand {}),
                InstructionOperand::Bool(true),
            ]
        );
        assert_eq!(ops[1].case(), 2);
        assert_eq!(ops[2].case_name(), "separator");
    }

    #[test]
    fn test_unknown_case_is_rejected() {
        let result: std::result::Result<Vec<InstructionOperand>, _> =
            serde_json::from_str(r#"[{"tensor_operand": 1}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_operands() {
        let ops = vec![
            InstructionOperand::Const(ObjectOperand {
                logical_object_id: 1,
            }),
            InstructionOperand::Mut(ObjectOperand {
                logical_object_id: 2,
            }),
            InstructionOperand::Uint64(64),
            InstructionOperand::Bool(true),
        ];

        let decoded: CopyOperands = decode_operands("Copy", &ops).unwrap();
        assert_eq!(
            decoded,
            CopyOperands {
                src: ObjectOperand {
                    logical_object_id: 1
                },
                dst: ObjectOperand {
                    logical_object_id: 2
                },
                bytes: 64,
                verify: true,
            }
        );
    }

    #[test]
    fn test_decode_count_mismatch() {
        let ops = vec![InstructionOperand::Uint64(64)];
        let err = decode_operands::<CopyOperands>("Copy", &ops).unwrap_err();
        assert!(matches!(err, EngineError::OperandMismatch { .. }));
        assert!(err.to_string().contains("expects 4 operands, got 1"));
    }

    #[test]
    fn test_decode_case_mismatch() {
        let ops = vec![
            InstructionOperand::Const(ObjectOperand::default()),
            InstructionOperand::Int64(2),
            InstructionOperand::Uint64(64),
            InstructionOperand::Bool(false),
        ];
        let err = decode_operands::<CopyOperands>("Copy", &ops).unwrap_err();
        assert!(err.to_string().contains("field `dst` (#1) cannot take a int64_operand"));
    }

    #[test]
    fn test_release_visits_every_operand() {
        let mut ops = vec![
            InstructionOperand::Double(1.5),
            InstructionOperand::Symbol(SymbolOperand {
                logical_object_id: 9,
            }),
        ];
        release_operands("Release", &mut ops);
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn test_release_runs_last_to_first() {
        let mut ops = vec![
            InstructionOperand::Double(1.5),
            InstructionOperand::Symbol(SymbolOperand {
                logical_object_id: 9,
            }),
            InstructionOperand::Separator(SeparatorOperand {}),
        ];
        let mut log = VisitLog::default();
        release_operands_with::<RecordVisit, _>(&mut log, &mut ops);
        assert_eq!(
            log.visited,
            vec![(2, "separator"), (1, "symbol_operand"), (0, "double_operand")]
        );
    }

    #[repr(C)]
    #[derive(Debug)]
    struct NestedOperands {
        inner: InstructionOperand,
    }

    impl Default for NestedOperands {
        fn default() -> Self {
            Self {
                inner: InstructionOperand::Bool(false),
            }
        }
    }

    crate::reflect_struct! { NestedOperands { inner: InstructionOperand } }

    #[test]
    fn test_oneof_field_is_not_decodable() {
        let ops = vec![InstructionOperand::Int64(3)];
        let err = decode_operands::<NestedOperands>("Nested", &ops).unwrap_err();
        assert!(matches!(err, EngineError::OperandMismatch { .. }));
        assert!(err.to_string().contains("field `inner` (#0) cannot take a int64_operand"));
    }

    #[repr(C)]
    #[derive(Debug)]
    struct OneofOperands {
        inner: InstructionOperand,
    }

    impl Default for OneofOperands {
        fn default() -> Self {
            Self {
                inner: InstructionOperand::Bool(false),
            }
        }
    }

    crate::reflect_struct! { OneofOperands { oneof inner: InstructionOperand } }

    #[test]
    fn test_oneof_field_keeps_default_case() {
        // the walk only sees the default case's payload
        let err = decode_operands::<OneofOperands>("Oneof", &[InstructionOperand::Int64(3)]).unwrap_err();
        assert!(err.to_string().contains("field `bool_operand` (#0) cannot take a int64_operand"));
    }
}
