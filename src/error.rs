use thiserror::Error;

use crate::host::ReferenceSpaceKind;
use crate::tasks::DemoId;

/// Failures reported by the AR host capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XrError {
    /// No AR session could be created (no device, user denied, ...).
    #[error("AR session unavailable: {0}")]
    Unavailable(String),

    #[error("required AR feature not supported: {0}")]
    UnsupportedFeature(&'static str),

    #[error("{0} reference space request rejected")]
    ReferenceSpace(ReferenceSpaceKind),

    #[error("hit-test source request rejected: {0}")]
    HitTestSource(String),

    /// Anything the host reported that does not fit the cases above.
    #[error("AR host error: {0}")]
    Host(String),
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset '{0}' not found")]
    NotFound(String),

    #[error("failed to load asset '{id}': {reason}")]
    Load { id: String, reason: String },

    #[error("asset '{0}' contains no renderable meshes")]
    Empty(String),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("task module was already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("unknown demo '{0}'")]
    UnknownDemo(String),

    #[error("no constructor registered for demo '{0}'")]
    MissingConstructor(DemoId),

    #[error("demo '{id}' failed to start: {source}")]
    Launch {
        id: DemoId,
        #[source]
        source: TaskError,
    },
}
