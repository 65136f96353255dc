use super::compiled_plan::{CompiledPlan, PlanStats};
use super::error::{PipelineError, PipelineResult};
use super::executor::Edge;
use super::id::StageId;
use super::node::AnyStage;
use super::port::StagePorts;
use crate::entity::EntityKind;
use std::collections::VecDeque;

/// Compiles a pipeline graph into a per-kind dispatch table
pub struct PipelineCompiler;

impl PipelineCompiler {
    /// Validate the graph and resolve routing.
    ///
    /// Fails if an edge references a missing stage, joins two stages whose
    /// guards share no kind, closes a cycle, or if a reachable stage emits a
    /// kind none of its successors accept.
    pub fn compile(stages: &[AnyStage], edges: &[Edge], entry: StageId) -> PipelineResult<CompiledPlan> {
        let start_time = std::time::Instant::now();

        let n = stages.len();
        if entry.index() >= n {
            return Err(PipelineError::InvalidEdge(format!(
                "entry {} is not a stage",
                entry
            )));
        }

        let ports: Vec<StagePorts> = stages.iter().map(AnyStage::ports).collect();

        let adj = Self::build_adjacency(stages, &ports, edges)?;

        let order = Self::topological_sort(&adj)?;

        let reachable = Self::forward_reachability(entry.index(), &adj);

        let mut routes = vec![Vec::new(); n * EntityKind::COUNT];
        let mut fan_out_routes = 0;
        for from in (0..n).filter(|&i| reachable[i]) {
            for kind in ports[from].emits.iter() {
                let targets: Vec<usize> = adj[from]
                    .iter()
                    .copied()
                    .filter(|&to| ports[to].accepts.contains(kind))
                    .collect();
                if targets.is_empty() {
                    return Err(PipelineError::UnroutedKind {
                        stage: stages[from].name().to_string(),
                        kind,
                    });
                }
                if targets.len() > 1 {
                    fan_out_routes += 1;
                }
                routes[from * EntityKind::COUNT + kind.index()] = targets;
            }
        }

        let active_stages: Vec<usize> = order.iter().copied().filter(|&i| reachable[i]).collect();
        let inactive_stages: Vec<usize> = (0..n).filter(|&i| !reachable[i]).collect();

        let stats = PlanStats {
            total_stages: n,
            active_stages: active_stages.len(),
            sink_stages: ports.iter().filter(|p| p.is_sink()).count(),
            fan_out_routes,
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        Ok(CompiledPlan::new(
            entry.index(),
            active_stages,
            routes,
            stats,
            inactive_stages,
        ))
    }

    /// Build the forward adjacency list, checking every edge's guards
    fn build_adjacency(
        stages: &[AnyStage],
        ports: &[StagePorts],
        edges: &[Edge],
    ) -> PipelineResult<Vec<Vec<usize>>> {
        let n = stages.len();
        let mut adj = vec![Vec::new(); n];

        for edge in edges {
            let from = edge.from_stage.index();
            let to = edge.to_stage.index();

            if from >= n || to >= n {
                return Err(PipelineError::InvalidEdge(format!(
                    "{:?} joins {} to {}, but only {} stages exist",
                    edge.id, edge.from_stage, edge.to_stage, n
                )));
            }

            if ports[from].emits.intersection(ports[to].accepts).is_empty() {
                return Err(PipelineError::GuardMismatch {
                    from: stages[from].name().to_string(),
                    to: stages[to].name().to_string(),
                });
            }

            if !adj[from].contains(&to) {
                adj[from].push(to);
            }
        }

        Ok(adj)
    }

    /// Kahn's algorithm over the whole graph
    fn topological_sort(adj: &[Vec<usize>]) -> PipelineResult<Vec<usize>> {
        let n = adj.len();
        let mut in_degree = vec![0usize; n];
        for targets in adj {
            for &to in targets {
                in_degree[to] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(stage) = queue.pop_front() {
            order.push(stage);
            for &next in &adj[stage] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != n {
            return Err(PipelineError::CycleDetected);
        }
        Ok(order)
    }

    /// DFS from the entry stage
    fn forward_reachability(entry: usize, adj: &[Vec<usize>]) -> Vec<bool> {
        let mut reachable = vec![false; adj.len()];
        let mut stack = vec![entry];
        reachable[entry] = true;

        while let Some(stage) = stack.pop() {
            for &next in &adj[stage] {
                if !reachable[next] {
                    reachable[next] = true;
                    stack.push(next);
                }
            }
        }

        reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::pipeline::id::EdgeId;
    use crate::pipeline::node::{StageContext, StagePlugin};
    use crate::pipeline::port::KindSet;

    struct Relay {
        name: &'static str,
        ports: StagePorts,
    }

    impl StagePlugin for Relay {
        fn name(&self) -> &str {
            self.name
        }

        fn ports(&self) -> StagePorts {
            self.ports
        }

        fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
            ctx.emit(entity);
            Ok(())
        }
    }

    fn stage(name: &'static str, accepts: &[EntityKind], emits: &[EntityKind]) -> AnyStage {
        AnyStage::Plugin(Box::new(Relay {
            name,
            ports: StagePorts::new(KindSet::of(accepts), KindSet::of(emits)),
        }))
    }

    fn edge(id: u32, from: u32, to: u32) -> Edge {
        Edge {
            id: EdgeId(id),
            from_stage: StageId(from),
            to_stage: StageId(to),
        }
    }

    use EntityKind::{Asset, Data, Observation, Tokens};

    #[test]
    fn test_routes_by_kind() {
        let stages = vec![
            stage("Source", &[Data], &[Observation, Asset]),
            stage("Observations", &[Observation], &[]),
            stage("Assets", &[Asset], &[]),
        ];
        let edges = vec![edge(0, 0, 1), edge(1, 0, 2)];

        let plan = PipelineCompiler::compile(&stages, &edges, StageId(0)).unwrap();
        assert_eq!(plan.targets(0, Observation), &[1]);
        assert_eq!(plan.targets(0, Asset), &[2]);
        assert!(plan.targets(0, Data).is_empty());
        assert_eq!(plan.stats.active_stages, 3);
        assert_eq!(plan.stats.sink_stages, 2);
    }

    #[test]
    fn test_fan_out() {
        let stages = vec![
            stage("Source", &[Data], &[Observation]),
            stage("A", &[Observation], &[]),
            stage("B", &[Observation], &[]),
        ];
        let edges = vec![edge(0, 0, 1), edge(1, 0, 2)];

        let plan = PipelineCompiler::compile(&stages, &edges, StageId(0)).unwrap();
        assert_eq!(plan.targets(0, Observation), &[1, 2]);
        assert_eq!(plan.stats.fan_out_routes, 1);
    }

    #[test]
    fn test_guard_mismatch() {
        let stages = vec![
            stage("Tokenizer", &[Data], &[Tokens]),
            stage("Sink", &[Observation], &[]),
        ];
        let err = PipelineCompiler::compile(&stages, &[edge(0, 0, 1)], StageId(0)).unwrap_err();
        assert_eq!(
            err,
            PipelineError::GuardMismatch {
                from: "Tokenizer".into(),
                to: "Sink".into()
            }
        );
    }

    #[test]
    fn test_unrouted_kind() {
        let stages = vec![
            stage("Mapper", &[Tokens], &[Observation, Asset]),
            stage("Sink", &[Observation], &[]),
        ];
        let err = PipelineCompiler::compile(&stages, &[edge(0, 0, 1)], StageId(0)).unwrap_err();
        assert_eq!(
            err,
            PipelineError::UnroutedKind {
                stage: "Mapper".into(),
                kind: Asset
            }
        );
    }

    #[test]
    fn test_cycle_detected() {
        let stages = vec![
            stage("A", &[Observation], &[Observation]),
            stage("B", &[Observation], &[Observation]),
        ];
        let edges = vec![edge(0, 0, 1), edge(1, 1, 0)];
        assert_eq!(
            PipelineCompiler::compile(&stages, &edges, StageId(0)).unwrap_err(),
            PipelineError::CycleDetected
        );
    }

    #[test]
    fn test_invalid_edge() {
        let stages = vec![stage("A", &[Data], &[])];
        assert!(matches!(
            PipelineCompiler::compile(&stages, &[edge(0, 0, 5)], StageId(0)),
            Err(PipelineError::InvalidEdge(_))
        ));
    }

    #[test]
    fn test_unreachable_stage_is_inactive() {
        let stages = vec![
            stage("Source", &[Data], &[Observation]),
            stage("Sink", &[Observation], &[]),
            stage("Orphan", &[Observation], &[Asset]),
        ];
        let plan = PipelineCompiler::compile(&stages, &[edge(0, 0, 1)], StageId(0)).unwrap();
        assert_eq!(plan.inactive_stages, vec![2]);
        assert_eq!(plan.stats.active_stages, 2);
    }
}
