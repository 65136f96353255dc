//! Terminal stages handing finished entities to the [`EntitySink`].

use crate::entity::{Entity, EntityKind};
use crate::pipeline::context::EntitySink;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{StageContext, StagePlugin};
use crate::pipeline::port::{KindSet, StagePorts};
use std::sync::Arc;

/// Delivers observations.
pub struct DeliverObservation {
    sink: Arc<dyn EntitySink>,
    delivered: u64,
}

impl DeliverObservation {
    pub fn new(sink: Arc<dyn EntitySink>) -> Self {
        Self { sink, delivered: 0 }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl StagePlugin for DeliverObservation {
    fn name(&self) -> &str {
        "DeliverObservation"
    }

    fn ports(&self) -> StagePorts {
        StagePorts::sink(KindSet::single(EntityKind::Observation))
    }

    fn process(&mut self, entity: Entity, _ctx: &mut StageContext) -> PipelineResult<()> {
        if let Entity::Observation(obs) = entity {
            self.delivered += 1;
            self.sink.deliver_observation(obs);
        }
        Ok(())
    }
}

/// Delivers assets and asset commands.
pub struct DeliverAsset {
    sink: Arc<dyn EntitySink>,
}

impl DeliverAsset {
    pub fn new(sink: Arc<dyn EntitySink>) -> Self {
        Self { sink }
    }
}

impl StagePlugin for DeliverAsset {
    fn name(&self) -> &str {
        "DeliverAsset"
    }

    fn ports(&self) -> StagePorts {
        StagePorts::sink(KindSet::of(&[EntityKind::Asset, EntityKind::AssetCommand]))
    }

    fn process(&mut self, entity: Entity, _ctx: &mut StageContext) -> PipelineResult<()> {
        match entity {
            Entity::Asset(asset) => self.sink.deliver_asset(asset),
            Entity::AssetCommand(command) => self.sink.deliver_asset_command(command),
            _ => {}
        }
        Ok(())
    }
}

/// Delivers connection status changes.
pub struct DeliverConnectionStatus {
    sink: Arc<dyn EntitySink>,
}

impl DeliverConnectionStatus {
    pub fn new(sink: Arc<dyn EntitySink>) -> Self {
        Self { sink }
    }
}

impl StagePlugin for DeliverConnectionStatus {
    fn name(&self) -> &str {
        "DeliverConnectionStatus"
    }

    fn ports(&self) -> StagePorts {
        StagePorts::sink(KindSet::single(EntityKind::ConnectionStatus))
    }

    fn process(&mut self, entity: Entity, _ctx: &mut StageContext) -> PipelineResult<()> {
        if let Entity::ConnectionStatus(status) = entity {
            self.sink.deliver_connection_status(status);
        }
        Ok(())
    }
}

/// Delivers protocol commands.
pub struct DeliverCommand {
    sink: Arc<dyn EntitySink>,
}

impl DeliverCommand {
    pub fn new(sink: Arc<dyn EntitySink>) -> Self {
        Self { sink }
    }
}

impl StagePlugin for DeliverCommand {
    fn name(&self) -> &str {
        "DeliverCommand"
    }

    fn ports(&self) -> StagePorts {
        StagePorts::sink(KindSet::single(EntityKind::ProtocolCommand))
    }

    fn process(&mut self, entity: Entity, _ctx: &mut StageContext) -> PipelineResult<()> {
        if let Entity::ProtocolCommand(command) = entity {
            self.sink.deliver_command(command);
        }
        Ok(())
    }
}
