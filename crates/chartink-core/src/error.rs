//! Error taxonomy for the editing core.
//!
//! Validation and state errors are returned synchronously to the caller;
//! nothing here is fatal. Operations that race a concurrent remote delete
//! (a vanished feature or layer id) are logged and treated as no-ops rather
//! than surfaced as errors.

use thiserror::Error;

/// Errors raised by the feature/layer store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Deleting the sole remaining layer is rejected.
    #[error("cannot delete the last remaining layer")]
    LastLayer,
    #[error("replication error: {0}")]
    Crdt(#[from] loro::LoroError),
    #[error("value encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the drawing state machine and commit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DrawError {
    /// A commit was attempted with no active layer selected.
    /// The in-progress session is preserved.
    #[error("no active layer selected")]
    NoActiveLayer,
    /// Too few vertices to commit; the session stays in `Drawing`.
    #[error("not enough vertices to commit: need {needed}, have {got}")]
    TooFewVertices { needed: usize, got: usize },
    /// A commit operation was invoked outside of a drawing session.
    #[error("no drawing in progress")]
    NotDrawing,
}

/// Unified error for the editor facade.
#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
