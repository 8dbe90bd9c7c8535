// src/vm/runner.rs
//! Batch runner
//!
//! [`VmContext`] is built once at start-up from the configuration and the
//! instruction type registry. [`Runner::run`] takes serialized batch text
//! through parse, construction, classification and the drain loop, and
//! returns only once both realm engines are empty.

use crate::utils::config::{ResourceConfig, VmConfig};
use crate::utils::errors::{EngineError, Result};
use crate::vm::instruction::new_instruction;
use crate::vm::instruction_list::InstructionList;
use crate::vm::parser::{BatchParser, TextBatchParser};
use crate::vm::realm::Realm;
use crate::vm::realm_engine::{EngineStats, RealmEngine};
use crate::vm::registry::InstructionTypeRegistry;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Registry, engines, topology and parser of one VM
pub struct VmContext {
    registry: InstructionTypeRegistry,
    resource: ResourceConfig,
    local: RealmEngine,
    remote: RealmEngine,
    parser: Box<dyn BatchParser>,
}

impl VmContext {
    /// Build both engines and check that every registered type has a lane
    pub fn new(config: &VmConfig, registry: InstructionTypeRegistry) -> Result<Self> {
        config.validate()?;

        let local = RealmEngine::new(Realm::Local, &config.local)?;
        let remote = RealmEngine::new(Realm::Remote, &config.remote)?;

        let ctx = Self {
            registry,
            resource: config.resource.clone(),
            local,
            remote,
            parser: Box::new(TextBatchParser),
        };
        ctx.check_routes()?;

        info!(
            instruction_types = ctx.registry.len(),
            local_lanes = ctx.local.lanes().len(),
            remote_lanes = ctx.remote.lanes().len(),
            machine_num = ctx.resource.machine_num,
            "vm context ready"
        );
        Ok(ctx)
    }

    /// Replace the batch parser
    pub fn with_parser(mut self, parser: impl BatchParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    fn check_routes(&self) -> Result<()> {
        for instr_type in self.registry.iter() {
            let engine = self.engine(instr_type.realm());
            if engine.route(instr_type.affinity()).is_none() {
                return Err(EngineError::SchedulerConfigurationFault {
                    realm: instr_type.realm(),
                    affinity: instr_type.affinity().to_string(),
                    instr_type: instr_type.name().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn registry(&self) -> &InstructionTypeRegistry {
        &self.registry
    }

    pub fn resource(&self) -> &ResourceConfig {
        &self.resource
    }

    pub fn engine(&self, realm: Realm) -> &RealmEngine {
        match realm {
            Realm::Local => &self.local,
            Realm::Remote => &self.remote,
        }
    }

    pub fn engine_mut(&mut self, realm: Realm) -> &mut RealmEngine {
        match realm {
            Realm::Local => &mut self.local,
            Realm::Remote => &mut self.remote,
        }
    }

    /// Both engines have no queued work
    pub fn is_idle(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }

    pub fn stats(&self) -> [EngineStats; 2] {
        [self.local.stats(), self.remote.stats()]
    }
}

impl std::fmt::Debug for VmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmContext")
            .field("registry", &self.registry)
            .field("resource", &self.resource)
            .field("local", &self.local)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

/// Per-realm instruction counts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RealmCounts {
    pub local: usize,
    pub remote: usize,
}

impl RealmCounts {
    pub fn total(&self) -> usize {
        self.local + self.remote
    }

    fn bump(&mut self, realm: Realm) {
        self.add(realm, 1);
    }

    fn add(&mut self, realm: Realm, n: usize) {
        match realm {
            Realm::Local => self.local += n,
            Realm::Remote => self.remote += n,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub submitted: RealmCounts,
    pub executed: RealmCounts,
    /// Iterations of the drain loop
    pub passes: u64,
    pub elapsed_us: u64,
}

/// Drives batches through a [`VmContext`]
#[derive(Debug)]
pub struct Runner {
    ctx: VmContext,
}

impl Runner {
    pub fn new(ctx: VmContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &VmContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut VmContext {
        &mut self.ctx
    }

    pub fn into_context(self) -> VmContext {
        self.ctx
    }

    /// Parse, construct, classify and drain one serialized batch
    ///
    /// Nothing is enqueued unless the whole batch parses and every
    /// instruction constructs. A kernel failure or scheduler fault stops the
    /// drain; already executed instructions stay executed and everything
    /// still queued is discarded unexecuted, leaving both engines idle.
    pub fn run(&mut self, text: &str) -> Result<RunReport> {
        let started = Instant::now();

        let machine_num = self.ctx.resource.machine_num;
        if machine_num > 1 {
            warn!(machine_num, "multi-host batch rejected");
            return Err(EngineError::UnsupportedTopology { machine_num });
        }

        let batch = self.ctx.parser.parse(text).map_err(|e| match e {
            EngineError::BatchParseError(_) => e,
            other => EngineError::BatchParseError(other.to_string()),
        })?;

        let mut report = RunReport::default();
        let mut local_list = InstructionList::new();
        let mut remote_list = InstructionList::new();

        for descriptor in batch.instruction {
            let instruction = new_instruction(
                &self.ctx.registry,
                &descriptor.instr_type_name,
                descriptor.operand,
            )?;
            report.submitted.bump(instruction.realm());
            match instruction.realm() {
                Realm::Local => local_list.push_back(instruction),
                Realm::Remote => remote_list.push_back(instruction),
            }
        }

        debug!(
            local = report.submitted.local,
            remote = report.submitted.remote,
            "batch classified"
        );

        self.ctx.local.receive(local_list.detach_all());
        self.ctx.remote.receive(remote_list.detach_all());

        let drained = self.drain(&mut report);
        report.elapsed_us = started.elapsed().as_micros() as u64;
        metrics::counter!("vm_runs_total").increment(1);
        metrics::counter!("vm_drain_passes_total").increment(report.passes);

        if let Err(e) = drained {
            let discarded = self.ctx.local.discard_all() + self.ctx.remote.discard_all();
            warn!(error = %e, discarded, "drain aborted");
            return Err(e);
        }

        info!(
            submitted = report.submitted.total(),
            executed = report.executed.total(),
            passes = report.passes,
            elapsed_us = report.elapsed_us,
            "batch drained"
        );
        Ok(report)
    }

    fn drain(&mut self, report: &mut RunReport) -> Result<()> {
        while !self.ctx.is_idle() {
            report.passes += 1;
            for engine in [&mut self.ctx.local, &mut self.ctx.remote] {
                engine.schedule()?;
                let ran = engine.run_pass()?;
                report.executed.add(engine.realm(), ran);
            }
        }
        Ok(())
    }
}
