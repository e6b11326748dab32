use thiserror::Error;

use crate::device::PipelineId;

/// Errors surfaced to callers.
///
/// Only failures that would leave the bridge inconsistent are reported this
/// way. Malformed legacy usage (unknown enums, unbound draws, mismatched
/// uniform writes) is logged and degraded instead.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("backend returned an invalid {kind} handle for '{label}'")]
    InvalidHandle { kind: &'static str, label: String },

    #[error("failed to create {label}: {reason}")]
    ResourceCreation { label: String, reason: String },

    #[error("shader '{label}' failed to compile: {details}")]
    ShaderCompilation { label: String, details: String },

    #[error("uniform '{name}' declares unsupported type '{ty}'")]
    UnknownUniformType { name: String, ty: String },

    #[error("pipeline {0:?} does not exist")]
    UnknownPipeline(PipelineId),

    #[error("buffer '{label}' needs {size} bytes but the limit is {limit}")]
    BufferTooLarge { label: String, size: u64, limit: u64 },
}

pub type Result<T> = std::result::Result<T, BridgeError>;
