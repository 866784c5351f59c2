/// Error types for pipeline setup and geometry loading
use thiserror::Error;

use crate::backend::ShaderStage;

/// Any failure that aborts render-session setup
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{stage} shader compile error: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("program link error: {log}")]
    ProgramLink { log: String },

    #[error(transparent)]
    ResourceLoad(#[from] LoadError),

    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("backend could not allocate a {0}")]
    Allocation(&'static str),

    #[error("program has no active attribute `{0}`")]
    MissingAttribute(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unrenderable geometry: {0}")]
    Geometry(String),
}

/// Failure to obtain the point dataset
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load {resource}: HTTP {status} {status_text}")]
    Http {
        resource: String,
        status: u16,
        status_text: String,
    },

    #[error("network error loading {resource}: {reason}")]
    Network { resource: String, reason: String },

    #[error("failed to parse JSON from {resource}: {source}")]
    Parse {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {resource}: {source}")]
    Io {
        resource: String,
        #[source]
        source: std::io::Error,
    },
}
