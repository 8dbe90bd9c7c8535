// src/vm/realm_engine.rs
//! Realm engine
//!
//! Owns the pending list and the lanes of one realm. Work enters through
//! [`RealmEngine::receive`], is routed to lanes by [`RealmEngine::schedule`]
//! and leaves through [`RealmEngine::run_pass`], which always runs the
//! earliest-submitted head across lanes so a realm executes in the order
//! its work was received.

use crate::utils::config::RealmConfig;
use crate::utils::errors::{EngineError, Result};
use crate::vm::instruction_list::InstructionList;
use crate::vm::realm::Realm;
use crate::vm::thread_ctx::ThreadContext;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, trace};

/// Liveness of an engine, derived from its queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Pending list and every lane queue are empty
    Idle,
    /// Work is queued somewhere
    Draining,
}

/// Queue depths of one lane
#[derive(Debug, Clone, Serialize)]
pub struct LaneStats {
    pub name: String,
    pub queued: usize,
    pub executed: u64,
}

/// Snapshot of an engine's queues
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub realm: Realm,
    pub state: EngineState,
    pub pending: usize,
    pub lanes: Vec<LaneStats>,
}

impl EngineStats {
    pub fn queued(&self) -> usize {
        self.pending + self.lanes.iter().map(|l| l.queued).sum::<usize>()
    }

    pub fn executed(&self) -> u64 {
        self.lanes.iter().map(|l| l.executed).sum()
    }
}

/// Scheduler for one realm
#[derive(Debug)]
pub struct RealmEngine {
    realm: Realm,
    pending: InstructionList,
    lanes: Vec<ThreadContext>,
    /// Affinity → lane index
    routes: HashMap<String, usize>,
    /// Sequence stamped on the next received instruction
    next_seq: u64,
}

impl RealmEngine {
    /// Build the lanes of `realm`; an affinity may be claimed by one lane only
    pub fn new(realm: Realm, config: &RealmConfig) -> Result<Self> {
        let mut lanes = Vec::with_capacity(config.lanes.len());
        let mut routes: HashMap<String, usize> = HashMap::new();

        for (index, lane_config) in config.lanes.iter().enumerate() {
            for affinity in &lane_config.affinities {
                if let Some(&other) = routes.get(affinity.as_str()) {
                    return Err(EngineError::ConfigError(format!(
                        "{realm} realm routes affinity `{affinity}` to both `{}` and `{}`",
                        config.lanes[other].name, lane_config.name
                    )));
                }
                routes.insert(affinity.clone(), index);
            }
            lanes.push(ThreadContext::new(index, realm, lane_config));
        }

        debug!(%realm, lanes = lanes.len(), affinities = routes.len(), "realm engine created");

        Ok(Self {
            realm,
            pending: InstructionList::new(),
            lanes,
            routes,
            next_seq: 0,
        })
    }

    pub fn realm(&self) -> Realm {
        self.realm
    }

    /// Take ownership of every instruction in `list`
    pub fn receive(&mut self, mut list: InstructionList) {
        if list.is_empty() {
            return;
        }
        let count = list.len();
        for instruction in list.iter_mut() {
            instruction.set_seq(self.next_seq);
            self.next_seq += 1;
        }
        self.pending.append_list(&mut list);
        metrics::counter!("vm_instructions_received_total", "realm" => self.realm.as_str())
            .increment(count as u64);
        trace!(realm = %self.realm, count, pending = self.pending.len(), "received instructions");
    }

    /// Move every pending instruction into the lane serving its affinity
    ///
    /// Returns how many instructions were placed. An affinity no lane serves
    /// is a fatal fault; the offending instruction stays at the head of the
    /// pending list.
    pub fn schedule(&mut self) -> Result<usize> {
        let mut placed = 0;

        while let Some(instruction) = self.pending.pop_front() {
            match self.routes.get(instruction.affinity()) {
                Some(&lane) => {
                    self.lanes[lane].enqueue(instruction);
                    placed += 1;
                }
                None => {
                    let fault = EngineError::SchedulerConfigurationFault {
                        realm: self.realm,
                        affinity: instruction.affinity().to_string(),
                        instr_type: instruction.type_name().to_string(),
                    };
                    self.pending.push_front(instruction);
                    error!(realm = %self.realm, error = %fault, "scheduling aborted");
                    self.record_scheduled(placed);
                    return Err(fault);
                }
            }
        }

        self.record_scheduled(placed);
        Ok(placed)
    }

    fn record_scheduled(&self, placed: usize) {
        if placed > 0 {
            metrics::counter!("vm_instructions_scheduled_total", "realm" => self.realm.as_str())
                .increment(placed as u64);
            trace!(realm = %self.realm, placed, "scheduled instructions");
        }
    }

    /// Run one pass over the lanes in submission order
    ///
    /// Repeatedly runs the lane whose head instruction was received first.
    /// The pass ends when that lane has already run once in this pass or
    /// every lane is empty. Returns how many instructions ran.
    pub fn run_pass(&mut self) -> Result<usize> {
        let mut ran = vec![false; self.lanes.len()];
        let mut executed = 0;

        while let Some(index) = self.earliest_lane() {
            if ran[index] {
                break;
            }
            ran[index] = true;
            if self.lanes[index].try_receive_and_run()? {
                executed += 1;
            }
        }
        Ok(executed)
    }

    fn earliest_lane(&self) -> Option<usize> {
        self.lanes
            .iter()
            .filter_map(|lane| lane.head_seq().map(|seq| (seq, lane.index())))
            .min()
            .map(|(_, index)| index)
    }

    /// Drop all queued work without running it, returning how much was dropped
    pub(crate) fn discard_all(&mut self) -> usize {
        let mut leftovers = self.pending.detach_all();
        for lane in &mut self.lanes {
            leftovers.append_list(&mut lane.detach_queue());
        }

        let count = leftovers.len();
        for instruction in leftovers {
            instruction.discard();
        }
        if count > 0 {
            metrics::counter!("vm_instructions_discarded_total", "realm" => self.realm.as_str())
                .increment(count as u64);
            debug!(realm = %self.realm, count, "discarded queued instructions");
        }
        count
    }

    /// Lane serving `affinity`, if any
    pub fn route(&self, affinity: &str) -> Option<&ThreadContext> {
        self.routes.get(affinity).map(|&i| &self.lanes[i])
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.lanes.iter().all(ThreadContext::is_empty)
    }

    pub fn state(&self) -> EngineState {
        if self.is_empty() {
            EngineState::Idle
        } else {
            EngineState::Draining
        }
    }

    pub fn pending(&self) -> &InstructionList {
        &self.pending
    }

    pub fn lanes(&self) -> &[ThreadContext] {
        &self.lanes
    }

    pub fn lanes_mut(&mut self) -> &mut [ThreadContext] {
        &mut self.lanes
    }

    pub fn lane(&self, name: &str) -> Option<&ThreadContext> {
        self.lanes.iter().find(|l| l.name() == name)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            realm: self.realm,
            state: self.state(),
            pending: self.pending.len(),
            lanes: self
                .lanes
                .iter()
                .map(|l| LaneStats {
                    name: l.name().to_string(),
                    queued: l.queue_len(),
                    executed: l.executed(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::LaneConfig;
    use crate::vm::instruction::{new_instruction, Instruction};
    use crate::vm::registry::{InstructionTypeRegistry, InstructionTypeSpec};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[repr(C)]
    #[derive(Debug, Default)]
    struct Bare {}

    crate::reflect_struct! { Bare {} }

    fn registry() -> InstructionTypeRegistry {
        let mut registry = InstructionTypeRegistry::new();
        for (name, affinity) in [("Compute", "host"), ("Intern", "symbol"), ("Orphan", "gpu")] {
            registry
                .register(InstructionTypeSpec::new::<Bare>(
                    name,
                    Realm::Local,
                    affinity,
                    |_: &Instruction| -> Result<()> { Ok(()) },
                ))
                .unwrap();
        }
        registry
    }

    fn recording_registry(log: Arc<Mutex<Vec<String>>>) -> InstructionTypeRegistry {
        let mut registry = InstructionTypeRegistry::new();
        for (name, affinity) in [("Compute", "host"), ("Intern", "symbol")] {
            let log = Arc::clone(&log);
            registry
                .register(InstructionTypeSpec::new::<Bare>(
                    name,
                    Realm::Local,
                    affinity,
                    move |instr: &Instruction| -> Result<()> {
                        log.lock().push(instr.type_name().to_string());
                        Ok(())
                    },
                ))
                .unwrap();
        }
        registry
    }

    fn engine() -> RealmEngine {
        let config = RealmConfig {
            lanes: vec![
                LaneConfig::new("host", ["host"]),
                LaneConfig::new("symbol", ["symbol"]),
            ],
        };
        RealmEngine::new(Realm::Local, &config).unwrap()
    }

    fn batch(registry: &InstructionTypeRegistry, names: &[&str]) -> InstructionList {
        names
            .iter()
            .map(|name| new_instruction(registry, name, vec![]).unwrap())
            .collect()
    }

    #[test]
    fn test_new_engine_is_idle() {
        let engine = engine();
        assert!(engine.is_empty());
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.lanes().len(), 2);
        assert_eq!(engine.route("symbol").map(|l| l.name()), Some("symbol"));
        assert!(engine.route("gpu").is_none());
    }

    #[test]
    fn test_affinity_claimed_twice_is_rejected() {
        let config = RealmConfig {
            lanes: vec![
                LaneConfig::new("a", ["host"]),
                LaneConfig::new("b", ["host"]),
            ],
        };
        let err = RealmEngine::new(Realm::Local, &config).unwrap_err();
        assert!(matches!(err, EngineError::ConfigError(_)));
    }

    #[test]
    fn test_receive_then_schedule() {
        let registry = registry();
        let mut engine = engine();

        engine.receive(batch(&registry, &["Compute", "Intern", "Compute"]));
        assert_eq!(engine.pending().len(), 3);
        assert_eq!(engine.state(), EngineState::Draining);

        assert_eq!(engine.schedule().unwrap(), 3);
        assert!(engine.pending().is_empty());
        assert_eq!(engine.lane("host").unwrap().queue_len(), 2);
        assert_eq!(engine.lane("symbol").unwrap().queue_len(), 1);

        // scheduling an empty pending list places nothing
        assert_eq!(engine.schedule().unwrap(), 0);
    }

    #[test]
    fn test_schedule_preserves_fifo_per_lane() {
        let registry = registry();
        let mut engine = engine();
        let list = batch(&registry, &["Compute", "Intern", "Compute"]);
        let host_ids: Vec<_> = list
            .iter()
            .filter(|i| i.affinity() == "host")
            .map(|i| i.id())
            .collect();

        engine.receive(list);
        engine.schedule().unwrap();

        let lane_ids: Vec<_> = engine.lane("host").unwrap().queue().iter().map(|i| i.id()).collect();
        assert_eq!(lane_ids, host_ids);
    }

    #[test]
    fn test_unrouted_affinity_is_fatal_and_keeps_instruction() {
        let registry = registry();
        let mut engine = engine();
        engine.receive(batch(&registry, &["Compute", "Orphan", "Intern"]));

        let err = engine.schedule().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            &err,
            EngineError::SchedulerConfigurationFault { affinity, .. } if affinity == "gpu"
        ));

        // placed work stays placed, the orphan heads pending
        assert_eq!(engine.lane("host").unwrap().queue_len(), 1);
        assert_eq!(engine.pending().len(), 2);
        assert_eq!(engine.pending().front().map(|i| i.type_name()), Some("Orphan"));
    }

    #[test]
    fn test_drain_lanes() {
        let registry = registry();
        let mut engine = engine();
        engine.receive(batch(&registry, &["Compute", "Intern"]));
        engine.schedule().unwrap();

        for lane in engine.lanes_mut() {
            assert!(lane.try_receive_and_run().unwrap());
            assert!(!lane.try_receive_and_run().unwrap());
        }

        assert!(engine.is_empty());
        let stats = engine.stats();
        assert_eq!(stats.state, EngineState::Idle);
        assert_eq!(stats.queued(), 0);
        assert_eq!(stats.executed(), 2);
    }

    #[test]
    fn test_receive_stamps_submission_order() {
        let registry = registry();
        let mut engine = engine();
        engine.receive(batch(&registry, &["Compute", "Intern"]));
        engine.receive(batch(&registry, &["Intern"]));

        let seqs: Vec<u64> = engine.pending().iter().map(|i| i.seq()).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_run_pass_follows_submission_order_across_lanes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = recording_registry(Arc::clone(&log));
        let mut engine = engine();

        // the symbol lane is configured second but its head was received first
        engine.receive(batch(&registry, &["Intern", "Compute", "Compute", "Intern"]));
        engine.schedule().unwrap();

        let mut total = 0;
        while !engine.is_empty() {
            total += engine.run_pass().unwrap();
        }

        assert_eq!(total, 4);
        assert_eq!(*log.lock(), vec!["Intern", "Compute", "Compute", "Intern"]);
    }

    #[test]
    fn test_run_pass_runs_each_lane_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = recording_registry(Arc::clone(&log));
        let mut engine = engine();
        engine.receive(batch(&registry, &["Compute", "Compute", "Intern"]));
        engine.schedule().unwrap();

        // second Compute is next in order, but the host lane already ran
        assert_eq!(engine.run_pass().unwrap(), 1);
        assert_eq!(engine.run_pass().unwrap(), 2);
        assert_eq!(engine.run_pass().unwrap(), 0);
        assert_eq!(*log.lock(), vec!["Compute", "Compute", "Intern"]);
    }

    #[test]
    fn test_discard_all_skips_kernels() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = recording_registry(Arc::clone(&log));
        let mut engine = engine();
        engine.receive(batch(&registry, &["Compute", "Intern"]));
        engine.schedule().unwrap();
        engine.receive(batch(&registry, &["Compute"]));

        assert_eq!(engine.discard_all(), 3);
        assert!(engine.is_empty());
        assert!(log.lock().is_empty());
        assert_eq!(engine.stats().executed(), 0);
    }
}
