// src/vm/thread_ctx.rs
//! Execution lanes
//!
//! A lane is a named FIFO inside a realm engine that accepts instructions
//! whose affinity is in its set. Lanes are logical: the runner polls each
//! one in turn on the control thread.

use crate::utils::config::LaneConfig;
use crate::utils::errors::Result;
use crate::vm::instruction::Instruction;
use crate::vm::instruction_list::InstructionList;
use crate::vm::realm::Realm;
use std::collections::HashSet;
use tracing::{debug, warn};

/// One lane of a realm engine
#[derive(Debug)]
pub struct ThreadContext {
    /// Position within the owning engine
    index: usize,

    /// Lane name, unique per realm
    name: String,

    realm: Realm,

    /// Affinities routed to this lane
    affinities: HashSet<String>,

    queue: InstructionList,

    /// Instructions run to completion (failed kernels included)
    executed: u64,
}

impl ThreadContext {
    pub fn new(index: usize, realm: Realm, config: &LaneConfig) -> Self {
        Self {
            index,
            name: config.name.clone(),
            realm,
            affinities: config.affinities.iter().cloned().collect(),
            queue: InstructionList::new(),
            executed: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn realm(&self) -> Realm {
        self.realm
    }

    pub fn affinities(&self) -> impl Iterator<Item = &str> {
        self.affinities.iter().map(String::as_str)
    }

    pub fn accepts(&self, affinity: &str) -> bool {
        self.affinities.contains(affinity)
    }

    pub fn queue(&self) -> &InstructionList {
        &self.queue
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Submission sequence of the instruction at the head of the queue
    pub fn head_seq(&self) -> Option<u64> {
        self.queue.front().map(Instruction::seq)
    }

    pub(crate) fn enqueue(&mut self, instruction: Instruction) {
        self.queue.push_back(instruction);
    }

    /// Hand back every queued instruction without running it
    pub(crate) fn detach_queue(&mut self) -> InstructionList {
        self.queue.detach_all()
    }

    /// Pop one instruction, run it and discard it
    ///
    /// Returns `Ok(false)` when the lane has no work. A failing kernel still
    /// consumes its instruction; the error is returned to the caller.
    pub fn try_receive_and_run(&mut self) -> Result<bool> {
        let Some(instruction) = self.queue.pop_front() else {
            return Ok(false);
        };

        let id = instruction.id();
        let instr_type = instruction.type_name().to_string();
        debug!(lane = %self.name, realm = %self.realm, %id, %instr_type, "running instruction");

        let result = instruction.execute_and_discard();
        self.executed += 1;
        metrics::counter!(
            "vm_instructions_executed_total",
            "realm" => self.realm.as_str(),
            "lane" => self.name.clone()
        )
        .increment(1);

        if let Err(ref e) = result {
            warn!(lane = %self.name, %id, %instr_type, error = %e, "instruction failed");
        }
        result.map(|()| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::EngineError;
    use crate::vm::instruction::new_instruction;
    use crate::vm::operand::InstructionOperand;
    use crate::vm::registry::{InstructionTypeRegistry, InstructionTypeSpec};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[repr(C)]
    #[derive(Debug, Default)]
    struct Step {
        n: i64,
    }

    crate::reflect_struct! { Step { n: i64 } }

    fn registry(log: Arc<Mutex<Vec<i64>>>) -> InstructionTypeRegistry {
        let mut registry = InstructionTypeRegistry::new();
        registry
            .register(InstructionTypeSpec::new::<Step>(
                "Step",
                Realm::Local,
                "host",
                move |instr: &Instruction| -> Result<()> {
                    let step: Step = instr.decode_operands()?;
                    if step.n < 0 {
                        return Err(EngineError::kernel("Step", "negative step"));
                    }
                    log.lock().push(step.n);
                    Ok(())
                },
            ))
            .unwrap();
        registry
    }

    fn lane() -> ThreadContext {
        ThreadContext::new(0, Realm::Local, &LaneConfig::new("host", ["host"]))
    }

    #[test]
    fn test_empty_lane_has_no_work() {
        let mut lane = lane();
        assert!(!lane.try_receive_and_run().unwrap());
        assert_eq!(lane.executed(), 0);
    }

    #[test]
    fn test_runs_in_fifo_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(Arc::clone(&log));
        let mut lane = lane();
        assert!(lane.accepts("host"));
        assert!(!lane.accepts("transport"));

        for n in [3, 1, 2] {
            lane.enqueue(new_instruction(&registry, "Step", vec![InstructionOperand::Int64(n)]).unwrap());
        }
        while lane.try_receive_and_run().unwrap() {}

        assert_eq!(*log.lock(), vec![3, 1, 2]);
        assert_eq!(lane.executed(), 3);
        assert!(lane.is_empty());
    }

    #[test]
    fn test_failed_kernel_consumes_instruction() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(Arc::clone(&log));
        let mut lane = lane();
        lane.enqueue(new_instruction(&registry, "Step", vec![InstructionOperand::Int64(-1)]).unwrap());
        lane.enqueue(new_instruction(&registry, "Step", vec![InstructionOperand::Int64(5)]).unwrap());

        let err = lane.try_receive_and_run().unwrap_err();
        assert!(matches!(err, EngineError::KernelFailed { .. }));
        assert_eq!(lane.queue_len(), 1);

        assert!(lane.try_receive_and_run().unwrap());
        assert_eq!(*log.lock(), vec![5]);
    }
}
