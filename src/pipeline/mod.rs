//! Type-routed transform pipeline.
//!
//! Raw protocol lines and transport events enter as [`Entity`] values and
//! flow through a graph of stages until a delivery stage hands them to the
//! agent's buffers. Each producer (device connection) owns one
//! [`ProducerPipeline`]; filter state may be shared between producers through
//! the [`PipelineContext`].
//!
//! # Architecture
//!
//! ```text
//! [Start] ─┬─► [DeliverConnectionStatus]
//!          ├─► [DeliverCommand]
//!          └─► [Tokenizer] ─► [Ignore|ExtractTimestamp] ─► [TokenMapper] ─┬─► [DeliverAsset]
//!                                                                        │
//!   [UpcaseValue]? ─► [DuplicateFilter]? ─► [RateFilter] ─► [ConvertSample]? ─► [DeliverObservation]
//! ```
//!
//! # Design
//!
//! - **Enum dispatch on hot path**: `BuiltinStage` enum for all built-in stages,
//!   `StagePlugin` trait objects for anything else.
//! - **Guards checked once**: every stage declares the entity kinds it accepts
//!   and emits; [`Pipeline::compile`] rejects mismatched edges and unrouted
//!   kinds and produces a fixed `(stage, kind) → successors` table.
//! - **Synchronous runs**: one entity at a time, driven by the producer's thread.
//!
//! [`Entity`]: crate::entity::Entity

pub mod compiled_plan;
pub mod compiler;
pub mod context;
pub mod error;
pub mod executor;
pub mod id;
pub mod node;
pub mod port;
pub mod producer;
pub mod stages;

pub use compiled_plan::{CompiledPlan, PlanStats};
pub use context::{EntitySink, PipelineContext};
pub use error::{PipelineError, PipelineResult};
pub use executor::{Edge, Pipeline, PipelineStats, RunOutcome};
pub use id::{EdgeId, StageId};
pub use node::{AnyStage, BuiltinStage, StageContext, StagePlugin};
pub use port::{KindSet, StagePorts};
pub use producer::ProducerPipeline;
