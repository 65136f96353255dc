//! Pipeline-specific error types.

use crate::entity::EntityKind;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
///
/// Per-line errors are recoverable: the offending token or line is dropped and
/// the pipeline keeps running. Everything else is raised while the pipeline is
/// being built and is fatal for that pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Malformed timestamp: '{0}'")]
    MalformedTimestamp(String),

    #[error("Unknown data item '{key}' on device '{device}'")]
    UnknownDataItem { device: String, key: String },

    #[error("Malformed value '{value}' for '{key}': {reason}")]
    MalformedValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Malformed asset command: {0}")]
    MalformedAsset(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Stage '{from}' emits nothing that stage '{to}' accepts")]
    GuardMismatch { from: String, to: String },

    #[error("Stage '{stage}' emits {kind} but no successor accepts it")]
    UnroutedKind { stage: String, kind: EntityKind },

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Cycle detected in pipeline graph")]
    CycleDetected,

    #[error("Pipeline has not been built")]
    NotBuilt,

    #[error("Shared state '{name}' exists with a different type")]
    SharedStateType { name: String },
}

impl PipelineError {
    /// True for per-line errors that drop data but leave the pipeline usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedTimestamp(_)
                | PipelineError::UnknownDataItem { .. }
                | PipelineError::MalformedValue { .. }
                | PipelineError::MalformedAsset(_)
        )
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
