//! Test data builders for creating agents and devices

use super::{at, START};
use shopfloor_agent::config::{AgentConfig, DeviceConfig, PipelineOptions, ProducerConfig};
use shopfloor_agent::device::{Category, DataItem, UnitConversion};
use shopfloor_agent::{Agent, ManualClock, Observation, ProducerPipeline, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for device sections
pub struct DeviceBuilder {
    name: String,
    uuid: String,
    data_items: Vec<DataItem>,
}

impl DeviceBuilder {
    pub fn new(name: &str, uuid: &str) -> Self {
        Self {
            name: name.to_string(),
            uuid: uuid.to_string(),
            data_items: Vec::new(),
        }
    }

    pub fn item(mut self, item: DataItem) -> Self {
        self.data_items.push(item);
        self
    }

    pub fn sample(self, id: &str, name: &str) -> Self {
        self.item(DataItem::new(id, Category::Sample).with_name(name))
    }

    pub fn event(self, id: &str, name: &str) -> Self {
        self.item(DataItem::new(id, Category::Event).with_name(name))
    }

    pub fn build(self) -> DeviceConfig {
        DeviceConfig {
            name: self.name,
            uuid: self.uuid,
            data_items: self.data_items,
        }
    }
}

/// The lathe most tests talk to.
///
/// - `x1` / `Xpos`: sample
/// - `y1` / `Ypos`: sample, at most one per second
/// - `xin` / `Xin`: sample in inches, converted to millimetres
/// - `exec` / `execution`: event
/// - `msg` / `message`: message
/// - `cond` / `system`: condition
pub fn linuxcnc() -> DeviceConfig {
    DeviceBuilder::new("LinuxCNC", "000")
        .sample("x1", "Xpos")
        .item(
            DataItem::new("y1", Category::Sample)
                .with_name("Ypos")
                .with_minimum_period(Duration::from_millis(1000)),
        )
        .item(
            DataItem::new("xin", Category::Sample)
                .with_name("Xin")
                .with_conversion(UnitConversion::new(25.4, 0.0)),
        )
        .event("exec", "execution")
        .item(DataItem::new("msg", Category::Message).with_name("message"))
        .item(DataItem::new("cond", Category::Condition).with_name("system"))
        .build()
}

/// A second device, for cross-device keys.
pub fn mill() -> DeviceConfig {
    DeviceBuilder::new("Mill", "001").sample("s1", "Spindle").build()
}

/// Builder for an agent with a manual clock
pub struct AgentBuilder {
    config: AgentConfig,
}

impl AgentBuilder {
    /// Agent with the LinuxCNC and Mill devices and no producers.
    pub fn new() -> Self {
        let mut config = AgentConfig::new();
        config.devices = vec![linuxcnc(), mill()];
        Self { config }
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.agent.buffer_size = size;
        self
    }

    pub fn max_assets(mut self, max: usize) -> Self {
        self.config.agent.max_assets = max;
        self
    }

    pub fn producer(mut self, name: &str, options: PipelineOptions) -> Self {
        self.config
            .producers
            .push(ProducerConfig::new(name, "LinuxCNC").with_options(options));
        self
    }

    pub fn build(self) -> Harness {
        self.build_result().unwrap()
    }

    pub fn build_result(self) -> Result<Harness> {
        let clock = Arc::new(ManualClock::new(at(START)));
        let agent = Agent::with_clock(&self.config, clock.clone())?;
        Ok(Harness { agent, clock })
    }
}

/// An agent plus the clock driving it
pub struct Harness {
    pub agent: Agent,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// Agent with one connected producer named `adapter`.
    pub fn connected(options: PipelineOptions) -> (Harness, ProducerPipeline) {
        let harness = AgentBuilder::new().producer("adapter", options).build();
        let mut producer = harness.producer("adapter");
        producer.connected().unwrap();
        (harness, producer)
    }

    /// Build the configured producer `name`.
    pub fn producer(&self, name: &str) -> ProducerPipeline {
        let config = self.agent.config().find_producer(name).unwrap().clone();
        self.agent.add_producer(&config).unwrap()
    }

    pub fn sequence(&self) -> u64 {
        self.agent.sequence()
    }

    /// The most recently appended observation.
    pub fn last(&self) -> Observation {
        self.agent.get_from_buffer(self.sequence() - 1).unwrap()
    }

    /// Observations appended since `from`.
    pub fn since(&self, from: u64) -> Vec<Observation> {
        self.agent.observations().range(from, usize::MAX)
    }
}
