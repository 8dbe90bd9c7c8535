// src/vm/parser.rs
//! Batch text parsing
//!
//! A batch is a YAML document (JSON works too) with an `instruction`
//! sequence:
//!
//! ```yaml
//! instruction:
//!   - instr_type_name: NewSymbol
//!     operand:
//!       - init_symbol_operand: { logical_object_id: 1 }
//!   - instr_type_name: Nop
//! ```

use crate::utils::errors::{EngineError, Result};
use crate::vm::operand::InstructionOperand;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One instruction as written in batch text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstructionDescriptor {
    pub instr_type_name: String,

    #[serde(default)]
    pub operand: Vec<InstructionOperand>,
}

impl InstructionDescriptor {
    pub fn new(instr_type_name: impl Into<String>, operand: Vec<InstructionOperand>) -> Self {
        Self {
            instr_type_name: instr_type_name.into(),
            operand,
        }
    }
}

/// Parsed batch, instructions in submission order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstructionBatch {
    #[serde(default)]
    pub instruction: Vec<InstructionDescriptor>,
}

impl InstructionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction (builder style)
    pub fn with(mut self, instr_type_name: impl Into<String>, operand: Vec<InstructionOperand>) -> Self {
        self.instruction.push(InstructionDescriptor::new(instr_type_name, operand));
        self
    }

    pub fn len(&self) -> usize {
        self.instruction.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruction.is_empty()
    }

    /// Serialize back to batch text
    pub fn to_text(&self) -> Result<String> {
        // serde_yaml writes enum variants as `!tag` scalars; keep the map form
        let document = serde_json::to_value(self)?;
        Ok(serde_yaml::to_string(&document)?)
    }
}

/// Turns serialized batch text into descriptors
pub trait BatchParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<InstructionBatch>;
}

/// YAML/JSON batch parser
#[derive(Debug, Clone, Copy, Default)]
pub struct TextBatchParser;

impl BatchParser for TextBatchParser {
    fn parse(&self, text: &str) -> Result<InstructionBatch> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        if document.is_null() {
            return Ok(InstructionBatch::default());
        }

        // Operands are externally tagged maps (`{ int64_operand: 3 }`), which
        // serde_yaml only reads as `!tag` enums; go through a JSON value instead.
        let document = serde_json::to_value(document)?;
        let batch: InstructionBatch = serde_json::from_value(document)?;
        debug!(instructions = batch.len(), "batch parsed");
        Ok(batch)
    }
}

impl<P: BatchParser + ?Sized> BatchParser for Box<P> {
    fn parse(&self, text: &str) -> Result<InstructionBatch> {
        (**self).parse(text)
    }
}

/// Parse `text` with the default parser
pub fn parse_batch(text: &str) -> Result<InstructionBatch> {
    TextBatchParser.parse(text).map_err(|e| match e {
        EngineError::BatchParseError(_) => e,
        other => EngineError::BatchParseError(other.to_string()),
    })
}
