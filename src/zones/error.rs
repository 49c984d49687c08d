use serde::Serialize;
use thiserror::Error;

/// Operator-facing editor failures. All of them leave the editor state
/// intact; the operator fixes the input and retries.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum EditorError {
    #[error("reference image is not loaded yet")]
    ImageNotLoaded,

    #[error("failed to load reference image: {message}")]
    ImageLoadFailed { message: String },

    #[error("a zone is already being drawn; complete or discard it first")]
    AlreadyDrawing,

    #[error("no zone is being drawn")]
    NotDrawing,

    #[error("a zone needs at least 3 points (has {points})")]
    InsufficientPoints { points: usize },

    #[error("no zone at position {index} ({len} zones)")]
    NoSuchZone { index: usize, len: usize },

    #[error("clearing all zones requires confirmation")]
    ConfirmationRequired,

    #[error("there are no completed zones to save")]
    NothingToSave,

    #[error("finish or discard the zone being drawn before saving")]
    DrawingInProgress,

    #[error("surface has no visible area")]
    InvalidSurface,

    #[error("failed to save zones, please try again")]
    SaveFailed,
}
