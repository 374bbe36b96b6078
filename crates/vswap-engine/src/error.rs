//! Error types for engine operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during frame transformation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("frame not readable: {0}")]
    FrameNotReadable(PathBuf),

    #[error("frame not writable: {0}")]
    FrameNotWritable(PathBuf),

    #[error("degenerate landmark geometry: {0}")]
    DegenerateGeometry(String),

    #[error("processor precondition failed: {0}")]
    Precondition(String),

    #[error("inference backend failed: {0}")]
    BackendFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),
}
