use crate::entity::EntityKind;

/// Compiled dispatch table for a pipeline graph.
///
/// Built once by [`PipelineCompiler`](super::compiler::PipelineCompiler);
/// running an entity never inspects guards again, it only indexes `routes`.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    /// Stage that receives entities handed to `Pipeline::run`
    pub entry: usize,

    /// Stage indices reachable from the entry, in topological order
    pub active_stages: Vec<usize>,

    /// `routes[stage * EntityKind::COUNT + kind]` = successors accepting `kind`
    routes: Vec<Vec<usize>>,

    /// Compilation statistics
    pub stats: PlanStats,

    /// Stages never reached from the entry
    pub inactive_stages: Vec<usize>,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Total number of stages in the graph
    pub total_stages: usize,

    /// Number of stages reachable from the entry
    pub active_stages: usize,

    /// Number of terminal stages (emit nothing)
    pub sink_stages: usize,

    /// Number of (stage, kind) routes with more than one successor
    pub fan_out_routes: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl CompiledPlan {
    pub(crate) fn new(
        entry: usize,
        active_stages: Vec<usize>,
        routes: Vec<Vec<usize>>,
        stats: PlanStats,
        inactive_stages: Vec<usize>,
    ) -> Self {
        Self {
            entry,
            active_stages,
            routes,
            stats,
            inactive_stages,
        }
    }

    /// Successors of `stage` that receive entities of `kind`.
    #[inline]
    pub fn targets(&self, stage: usize, kind: EntityKind) -> &[usize] {
        self.routes
            .get(stage * EntityKind::COUNT + kind.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
