//! Start: the entry stage of a producer pipeline.
//!
//! Accepts every kind the transport produces and forwards it unchanged. The
//! compiler then routes each kind to its own branch.

use crate::entity::{Entity, EntityKind};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{StageContext, StagePlugin};
use crate::pipeline::port::{KindSet, StagePorts};

const PORTS: StagePorts = StagePorts::pass_through(KindSet::of(&[
    EntityKind::ConnectionStatus,
    EntityKind::Data,
    EntityKind::ProtocolCommand,
]));

#[derive(Debug, Default)]
pub struct Start;

impl StagePlugin for Start {
    fn name(&self) -> &str {
        "Start"
    }

    fn ports(&self) -> StagePorts {
        PORTS
    }

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        ctx.emit(entity);
        Ok(())
    }
}
