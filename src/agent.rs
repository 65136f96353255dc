//! Agent: owns the buffers and the device model and hands out producer
//! pipelines that deliver into them.

use crate::buffer::{AssetBuffer, ObservationBuffer};
use crate::clock::{Clock, SystemClock};
use crate::config::{AgentConfig, ProducerConfig};
use crate::device::{DataItemLookup, DeviceModel};
use crate::entity::{
    Asset, AssetCommand, ConnectionState, ConnectionStatus, Observation, ProtocolCommand,
};
use crate::error::{AgentError, Result, ResultExt};
use crate::pipeline::{EntitySink, PipelineContext, ProducerPipeline};
use std::sync::Arc;

/// Delivers pipeline output into the agent's buffers.
struct AgentSink {
    observations: Arc<ObservationBuffer>,
    assets: Arc<AssetBuffer>,
    devices: Arc<DeviceModel>,
    clock: Arc<dyn Clock>,
}

impl AgentSink {
    /// Record UNAVAILABLE for every data item of `device` that currently has
    /// a known value.
    fn mark_unavailable(&self, device: &str) {
        let now = self.clock.now();
        let mut marked = 0;
        for item in self.devices.device_data_items(device) {
            let known = self
                .observations
                .latest(&item.id)
                .is_some_and(|obs| !obs.is_unavailable());
            if known {
                self.observations
                    .append(Observation::unavailable(item, now));
                marked += 1;
            }
        }
        tracing::debug!("Marked {} data items of '{}' unavailable", marked, device);
    }
}

impl EntitySink for AgentSink {
    fn deliver_observation(&self, observation: Observation) {
        let sequence = self.observations.append(observation);
        tracing::trace!("Appended observation {}", sequence);
    }

    fn deliver_asset(&self, asset: Asset) {
        let id = asset.asset_id().to_string();
        let change = self.assets.add_asset(asset);
        tracing::debug!("Stored asset '{}' at slot {}", id, change.index());
    }

    fn deliver_asset_command(&self, command: AssetCommand) {
        match command {
            AssetCommand::Remove {
                asset_id,
                timestamp,
            } => {
                if !self.assets.remove_asset(&asset_id, timestamp) {
                    tracing::warn!("Cannot remove asset '{}': not present", asset_id);
                }
            }
            AssetCommand::RemoveAll {
                asset_type,
                device_uuid,
                timestamp,
            } => {
                let removed =
                    self.assets
                        .remove_all(asset_type.as_deref(), Some(&device_uuid), timestamp);
                tracing::debug!(
                    "Removed {} assets of type {:?} for device '{}'",
                    removed,
                    asset_type,
                    device_uuid
                );
            }
            AssetCommand::Update {
                asset_id,
                properties,
                timestamp,
            } => {
                if self
                    .assets
                    .update_asset(&asset_id, &properties, timestamp)
                    .is_none()
                {
                    tracing::warn!("Cannot update asset '{}': not present", asset_id);
                }
            }
        }
    }

    fn deliver_connection_status(&self, status: ConnectionStatus) {
        tracing::debug!("Producer '{}' is {}", status.source, status.state);
        if status.state == ConnectionState::Disconnected {
            self.mark_unavailable(&status.device);
        }
    }

    fn deliver_command(&self, command: ProtocolCommand) {
        tracing::info!(
            "Protocol command from '{}': {} = {}",
            command.source,
            command.name,
            command.value
        );
    }
}

pub struct Agent {
    config: AgentConfig,
    devices: Arc<DeviceModel>,
    observations: Arc<ObservationBuffer>,
    assets: Arc<AssetBuffer>,
    context: Arc<PipelineContext>,
}

impl Agent {
    /// Create an agent using wall-clock time.
    pub fn new(config: &AgentConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AgentConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let devices = Arc::new(
            DeviceModel::from_config(&config.devices).context("Failed to build device model")?,
        );
        let observations = Arc::new(ObservationBuffer::new(
            config.agent.buffer_size,
            config.agent.checkpoint_frequency,
        ));
        let assets = Arc::new(AssetBuffer::new(config.agent.max_assets));

        let sink = Arc::new(AgentSink {
            observations: observations.clone(),
            assets: assets.clone(),
            devices: devices.clone(),
            clock: clock.clone(),
        });
        let context = Arc::new(PipelineContext::new(devices.clone(), sink, clock));

        tracing::info!(
            "Agent ready: {} devices, buffer {} observations, {} assets",
            config.devices.len(),
            config.agent.buffer_size,
            config.agent.max_assets
        );

        Ok(Self {
            config: config.clone(),
            devices,
            observations,
            assets,
            context,
        })
    }

    /// Build a pipeline for `producer`. The caller drives it.
    pub fn add_producer(&self, producer: &ProducerConfig) -> Result<ProducerPipeline> {
        if !self.devices.contains_device(&producer.device) {
            return Err(AgentError::Config(format!(
                "producer '{}' references unknown device '{}'",
                producer.name, producer.device
            )));
        }
        let mut pipeline = ProducerPipeline::new(producer, self.context.clone());
        pipeline
            .build()
            .with_context(|| format!("Failed to build producer '{}'", producer.name))?;
        Ok(pipeline)
    }

    /// Build every configured producer.
    pub fn producers(&self) -> Result<Vec<ProducerPipeline>> {
        self.config
            .producers
            .iter()
            .map(|producer| self.add_producer(producer))
            .collect()
    }

    /// Sequence the next observation will receive.
    pub fn sequence(&self) -> u64 {
        self.observations.next_sequence()
    }

    pub fn get_from_buffer(&self, sequence: u64) -> Option<Observation> {
        self.observations.get(sequence)
    }

    pub fn observations(&self) -> &Arc<ObservationBuffer> {
        &self.observations
    }

    pub fn assets(&self) -> &Arc<AssetBuffer> {
        &self.assets
    }

    pub fn devices(&self) -> &Arc<DeviceModel> {
        &self.devices
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.context
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}
