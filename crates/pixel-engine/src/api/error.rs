use crate::api::types::GridPos;

pub use crate::api::config::ConfigError;
pub use crate::api::types::InvalidColor;

/// Rejected local edits. These never touch engine state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("cell ({}, {}) is outside the canvas", .0.x, .0.y)]
    OutOfBounds(GridPos),
    #[error("cell ({}, {}) already has a staged pixel", .0.x, .0.y)]
    AlreadyStaged(GridPos),
    #[error("not enough energy: {staged} staged of {available} available")]
    InsufficientEnergy { staged: usize, available: usize },
    #[error("only unsent pixels can be erased")]
    NotStaged(GridPos),
    #[error("open the palette before painting")]
    EditSessionClosed,
}

/// Failures of the sync protocol client surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("not connected to the canvas server")]
    NotConnected,
    #[error("place at least one pixel before submitting")]
    NothingToSubmit,
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("server rejected the batch: {0}")]
    Rejected(String),
}

/// Inbound payloads that could not be decoded at all.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed server message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server message has no \"type\" field")]
    MissingType,
    #[error("unknown server message type {0:?}")]
    UnknownType(String),
}
