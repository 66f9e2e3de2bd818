use serde::{Deserialize, Serialize};

/// Result alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PatternError>;

/// Every way a pattern request can fail.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("object not found: {id}")]
    NotFound { id: String },

    #[error("object {id} has no usable vertices")]
    EmptyGeometry { id: String },

    #[error("none of the {requested} requested objects could be loaded")]
    NoValidObjects { requested: usize },

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("outline computation failed: {0}")]
    HullComputationFailed(String),

    #[error("seam allowance computation failed: {0}")]
    OffsetComputationFailed(String),

    #[error("invalid mesh data for {id}: {message}")]
    InvalidMesh { id: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure category reported to callers alongside the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NotFound,
    EmptyGeometry,
    NoValidObjects,
    DegenerateGeometry,
    HullComputationFailed,
    OffsetComputationFailed,
    InvalidMesh,
    InvalidRequest,
    Io,
}

impl PatternError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::EmptyGeometry { .. } => ErrorCategory::EmptyGeometry,
            Self::NoValidObjects { .. } => ErrorCategory::NoValidObjects,
            Self::DegenerateGeometry(_) => ErrorCategory::DegenerateGeometry,
            Self::HullComputationFailed(_) => ErrorCategory::HullComputationFailed,
            Self::OffsetComputationFailed(_) => ErrorCategory::OffsetComputationFailed,
            Self::InvalidMesh { .. } => ErrorCategory::InvalidMesh,
            Self::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    pub(crate) fn invalid_mesh(id: &str, message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            id: id.to_string(),
            message: message.into(),
        }
    }
}
