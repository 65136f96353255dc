//! Pipeline executor: graph building and the per-entity run loop.
//!
//! A pipeline is built once (stages added, edges connected, then
//! [`Pipeline::compile`]) and then run synchronously, one entity at a time:
//! 1. Push the entity to the entry stage.
//! 2. Pop the next (stage, entity) pair from the worklist and process it.
//! 3. Route every emitted entity to the successors that accept its kind,
//!    cloning for fan-out.
//! 4. Repeat until the worklist is empty.

use crate::entity::Entity;
use crate::pipeline::compiled_plan::{CompiledPlan, PlanStats};
use crate::pipeline::compiler::PipelineCompiler;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{EdgeId, StageId};
use crate::pipeline::node::{AnyStage, StageContext};
use std::collections::VecDeque;

/// An edge binding a stage's output to a successor's input.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub from_stage: StageId,
    pub to_stage: StageId,
}

/// Counters kept while running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Entities handed to `run`
    pub entities_run: u64,
    /// Stage invocations across all runs
    pub stage_invocations: u64,
    /// Recoverable errors (dropped tokens or lines)
    pub recoverable_errors: u64,
}

/// What one call to `run` produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub invocations: usize,
    /// Recoverable errors raised along the way, already logged.
    pub errors: Vec<PipelineError>,
}

/// A stage graph and its compiled routing.
pub struct Pipeline {
    name: String,
    stages: Vec<AnyStage>,
    edges: Vec<Edge>,
    entry: StageId,
    plan: Option<CompiledPlan>,
    stats: PipelineStats,
    worklist: VecDeque<(usize, Entity)>,
    output: Vec<Entity>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            edges: Vec::new(),
            entry: StageId::INVALID,
            plan: None,
            stats: PipelineStats::default(),
            worklist: VecDeque::new(),
            output: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Graph building ──

    /// Add a stage. The first stage added becomes the entry.
    pub fn add_stage(&mut self, stage: impl Into<AnyStage>) -> StageId {
        let id = StageId(self.stages.len() as u32);
        self.stages.push(stage.into());
        if !self.entry.is_valid() {
            self.entry = id;
        }
        self.plan = None;
        id
    }

    /// Add `stage` and bind `from`'s output to it.
    pub fn bind(&mut self, from: StageId, stage: impl Into<AnyStage>) -> StageId {
        let id = self.add_stage(stage);
        self.connect(from, id);
        id
    }

    /// Bind the output of `from` to the input of `to`.
    pub fn connect(&mut self, from: StageId, to: StageId) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            id,
            from_stage: from,
            to_stage: to,
        });
        self.plan = None;
        id
    }

    pub fn set_entry(&mut self, entry: StageId) {
        self.entry = entry;
        self.plan = None;
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(AnyStage::name)
    }

    /// Validate guards and build the dispatch table.
    pub fn compile(&mut self) -> PipelineResult<&PlanStats> {
        let plan = PipelineCompiler::compile(&self.stages, &self.edges, self.entry)?;

        tracing::info!(
            "Pipeline '{}' compiled: {} active / {} total stages, {} fan-out routes ({} us)",
            self.name,
            plan.stats.active_stages,
            plan.stats.total_stages,
            plan.stats.fan_out_routes,
            plan.stats.compile_time_us,
        );
        for &idx in &plan.inactive_stages {
            tracing::warn!(
                "Stage '{}' (idx {}) in pipeline '{}' is unreachable from the entry",
                self.stages[idx].name(),
                idx,
                self.name
            );
        }

        Ok(&self.plan.insert(plan).stats)
    }

    pub fn is_compiled(&self) -> bool {
        self.plan.is_some()
    }

    pub fn plan(&self) -> Option<&CompiledPlan> {
        self.plan.as_ref()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    // ── Running ──

    /// Run one entity through the graph to completion.
    ///
    /// Recoverable errors drop the affected entity, are logged and returned in
    /// the outcome. Any other error aborts the run.
    pub fn run(&mut self, entity: Entity) -> PipelineResult<RunOutcome> {
        let plan = self.plan.as_ref().ok_or(PipelineError::NotBuilt)?;

        let entry = plan.entry;
        let ports = self.stages[entry].ports();
        if !ports.accepts.contains(entity.kind()) {
            return Err(PipelineError::UnroutedKind {
                stage: self.stages[entry].name().to_string(),
                kind: entity.kind(),
            });
        }

        self.stats.entities_run += 1;
        let mut outcome = RunOutcome::default();
        self.worklist.clear();
        self.worklist.push_back((entry, entity));

        while let Some((idx, entity)) = self.worklist.pop_front() {
            outcome.invocations += 1;
            let stage = &mut self.stages[idx];

            let mut diagnostics = Vec::new();
            let result = {
                let mut ctx = StageContext::new(&mut self.output, &mut diagnostics);
                stage.process(entity, &mut ctx)
            };

            if let Err(err) = result {
                if !err.is_recoverable() {
                    self.output.clear();
                    return Err(err);
                }
                diagnostics.push(err);
            }

            for err in diagnostics {
                tracing::warn!("{} [{}]: {}", self.name, stage.name(), err);
                self.stats.recoverable_errors += 1;
                outcome.errors.push(err);
            }

            for out in self.output.drain(..) {
                let targets = plan.targets(idx, out.kind());
                match targets.split_last() {
                    Some((&last, rest)) => {
                        for &to in rest {
                            self.worklist.push_back((to, out.clone()));
                        }
                        self.worklist.push_back((last, out));
                    }
                    None => {
                        tracing::warn!(
                            "{} [{}]: emitted undeclared {}, dropped",
                            self.name,
                            stage.name(),
                            out.kind()
                        );
                    }
                }
            }
        }

        self.stats.stage_invocations += outcome.invocations as u64;
        Ok(outcome)
    }
}
