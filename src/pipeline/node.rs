//! Stage abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`StagePlugin` trait**: for stages supplied from outside the crate
//!   (an embedded scripting extension, for instance).
//! - **`BuiltinStage` enum**: for all built-in stages. Match arms inline, so
//!   the hot path has no dynamic dispatch.
//!
//! `AnyStage` wraps either variant so the pipeline can handle both uniformly.

use crate::entity::Entity;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::port::StagePorts;
use crate::pipeline::stages::{
    ConvertSample, DeliverAsset, DeliverCommand, DeliverConnectionStatus, DeliverObservation,
    DuplicateFilter, ExtractTimestamp, IgnoreTimestamp, RateFilter, Start, TokenMapper, Tokenizer,
    UpcaseValue,
};

/// Per-entity scratch space handed to a stage.
pub struct StageContext<'a> {
    /// Entities to forward. Each is routed by its kind.
    output: &'a mut Vec<Entity>,
    /// Recoverable errors raised while the stage kept going.
    diagnostics: &'a mut Vec<PipelineError>,
}

impl<'a> StageContext<'a> {
    pub fn new(output: &'a mut Vec<Entity>, diagnostics: &'a mut Vec<PipelineError>) -> Self {
        Self {
            output,
            diagnostics,
        }
    }

    #[inline]
    pub fn emit(&mut self, entity: Entity) {
        self.output.push(entity);
    }

    /// Record a per-token error without aborting the current entity.
    pub fn report(&mut self, error: PipelineError) {
        self.diagnostics.push(error);
    }
}

/// Trait implemented by every stage.
///
/// `process` consumes one entity. Returning an error drops that entity; a
/// recoverable error leaves the pipeline running.
pub trait StagePlugin: Send {
    /// Human-readable name of this stage.
    fn name(&self) -> &str;

    /// Kinds accepted and emitted by this stage.
    fn ports(&self) -> StagePorts;

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()>;
}

/// Enum dispatch for built-in stages.
pub enum BuiltinStage {
    Start(Start),
    Tokenizer(Tokenizer),
    IgnoreTimestamp(IgnoreTimestamp),
    ExtractTimestamp(ExtractTimestamp),
    TokenMapper(TokenMapper),
    UpcaseValue(UpcaseValue),
    DuplicateFilter(DuplicateFilter),
    RateFilter(RateFilter),
    ConvertSample(ConvertSample),
    DeliverObservation(DeliverObservation),
    DeliverAsset(DeliverAsset),
    DeliverConnectionStatus(DeliverConnectionStatus),
    DeliverCommand(DeliverCommand),
}

impl BuiltinStage {
    pub fn name(&self) -> &str {
        match self {
            BuiltinStage::Start(s) => s.name(),
            BuiltinStage::Tokenizer(s) => s.name(),
            BuiltinStage::IgnoreTimestamp(s) => s.name(),
            BuiltinStage::ExtractTimestamp(s) => s.name(),
            BuiltinStage::TokenMapper(s) => s.name(),
            BuiltinStage::UpcaseValue(s) => s.name(),
            BuiltinStage::DuplicateFilter(s) => s.name(),
            BuiltinStage::RateFilter(s) => s.name(),
            BuiltinStage::ConvertSample(s) => s.name(),
            BuiltinStage::DeliverObservation(s) => s.name(),
            BuiltinStage::DeliverAsset(s) => s.name(),
            BuiltinStage::DeliverConnectionStatus(s) => s.name(),
            BuiltinStage::DeliverCommand(s) => s.name(),
        }
    }

    pub fn ports(&self) -> StagePorts {
        match self {
            BuiltinStage::Start(s) => s.ports(),
            BuiltinStage::Tokenizer(s) => s.ports(),
            BuiltinStage::IgnoreTimestamp(s) => s.ports(),
            BuiltinStage::ExtractTimestamp(s) => s.ports(),
            BuiltinStage::TokenMapper(s) => s.ports(),
            BuiltinStage::UpcaseValue(s) => s.ports(),
            BuiltinStage::DuplicateFilter(s) => s.ports(),
            BuiltinStage::RateFilter(s) => s.ports(),
            BuiltinStage::ConvertSample(s) => s.ports(),
            BuiltinStage::DeliverObservation(s) => s.ports(),
            BuiltinStage::DeliverAsset(s) => s.ports(),
            BuiltinStage::DeliverConnectionStatus(s) => s.ports(),
            BuiltinStage::DeliverCommand(s) => s.ports(),
        }
    }

    #[inline]
    pub fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        match self {
            BuiltinStage::Start(s) => s.process(entity, ctx),
            BuiltinStage::Tokenizer(s) => s.process(entity, ctx),
            BuiltinStage::IgnoreTimestamp(s) => s.process(entity, ctx),
            BuiltinStage::ExtractTimestamp(s) => s.process(entity, ctx),
            BuiltinStage::TokenMapper(s) => s.process(entity, ctx),
            BuiltinStage::UpcaseValue(s) => s.process(entity, ctx),
            BuiltinStage::DuplicateFilter(s) => s.process(entity, ctx),
            BuiltinStage::RateFilter(s) => s.process(entity, ctx),
            BuiltinStage::ConvertSample(s) => s.process(entity, ctx),
            BuiltinStage::DeliverObservation(s) => s.process(entity, ctx),
            BuiltinStage::DeliverAsset(s) => s.process(entity, ctx),
            BuiltinStage::DeliverConnectionStatus(s) => s.process(entity, ctx),
            BuiltinStage::DeliverCommand(s) => s.process(entity, ctx),
        }
    }
}

/// Wrapper that holds either a built-in stage (enum dispatch) or a plugin (trait object).
pub enum AnyStage {
    Builtin(BuiltinStage),
    Plugin(Box<dyn StagePlugin>),
}

impl AnyStage {
    pub fn name(&self) -> &str {
        match self {
            AnyStage::Builtin(s) => s.name(),
            AnyStage::Plugin(s) => s.name(),
        }
    }

    pub fn ports(&self) -> StagePorts {
        match self {
            AnyStage::Builtin(s) => s.ports(),
            AnyStage::Plugin(s) => s.ports(),
        }
    }

    #[inline]
    pub fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        match self {
            AnyStage::Builtin(s) => s.process(entity, ctx),
            AnyStage::Plugin(s) => s.process(entity, ctx),
        }
    }
}

impl From<BuiltinStage> for AnyStage {
    fn from(stage: BuiltinStage) -> Self {
        AnyStage::Builtin(stage)
    }
}

impl From<Box<dyn StagePlugin>> for AnyStage {
    fn from(stage: Box<dyn StagePlugin>) -> Self {
        AnyStage::Plugin(stage)
    }
}

macro_rules! builtin_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for AnyStage {
                fn from(stage: $variant) -> Self {
                    AnyStage::Builtin(BuiltinStage::$variant(stage))
                }
            }
        )*
    };
}

builtin_from!(
    Start,
    Tokenizer,
    IgnoreTimestamp,
    ExtractTimestamp,
    TokenMapper,
    UpcaseValue,
    DuplicateFilter,
    RateFilter,
    ConvertSample,
    DeliverObservation,
    DeliverAsset,
    DeliverConnectionStatus,
    DeliverCommand,
);
