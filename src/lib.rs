//! # Shopfloor Agent: device data collection
//!
//! Ingests a line-oriented device protocol, normalizes each line into typed
//! observations and assets, and keeps them in bounded, indexed in-memory
//! stores for a query layer to read.
//!
//! ## Architecture
//!
//! - **Pipeline**: per-connection graph of type-routed stages (tokenizer,
//!   timestamp, token mapper, filters, value transforms, delivery)
//! - **Buffers**: sequence-indexed observation ring with checkpoints, and an
//!   identity-indexed asset store with FIFO eviction
//! - **Agent**: wires the device model, buffers and shared filter state, and
//!   builds producer pipelines
//!
//! ## Configuration
//!
//! Read from TOML or JSON; see [`config`] for the file layout and the
//! per-producer pipeline options.
//!
//! ## Example
//!
//! ```ignore
//! use shopfloor_agent::{Agent, AgentConfig};
//!
//! fn main() -> shopfloor_agent::Result<()> {
//!     let config = AgentConfig::load("agent.toml")?;
//!     let agent = Agent::new(&config)?;
//!     let mut producer = agent.add_producer(&config.producers[0])?;
//!
//!     producer.connected()?;
//!     producer.dispatch_line("2021-01-22T12:33:45.123Z|Xpos|100.0")?;
//!     println!("next sequence: {}", agent.sequence());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod device;
pub mod entity;
pub mod error;
pub mod logging;
pub mod pipeline;

// Re-export commonly used types
pub use agent::Agent;
pub use buffer::{AssetBuffer, Checkpoint, ObservationBuffer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AgentConfig, PipelineOptions, ProducerConfig};
pub use device::{Category, DataItem, DataItemLookup, DeviceModel};
pub use entity::{Asset, Entity, EntityKind, Observation, Value};
pub use error::{AgentError, Result};
pub use pipeline::{PipelineContext, PipelineError, ProducerPipeline};
