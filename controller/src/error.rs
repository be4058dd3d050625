//! Error types for mapping lookup and action dispatch.
//!
//! None of these are fatal: a dispatch error skips the action for one
//! frame and leaves controller state as it was.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reading or parsing a gesture-to-action mapping store.
#[derive(Error, Debug)]
pub enum MappingError {
    /// Store could not be read
    #[error("cannot read mapping store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store is not a valid s-expression
    #[error("mapping store is not a valid s-expression: {0}")]
    Parse(String),

    /// Store parsed but is not a flat property list of names
    #[error("malformed mapping store: {0}")]
    Malformed(String),
}

/// Why a gesture did not turn into a pointer action this frame.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Gesture name has no entry in the mapping
    #[error("gesture {0} not found in mappings")]
    UnknownGestureMapping(String),

    /// Mapping names an action the controller does not implement
    #[error("action {action} (mapped from {gesture}) is not a pointer action")]
    UnknownAction { gesture: String, action: String },

    /// Mapping store unreadable; retried next frame
    #[error(transparent)]
    Store(#[from] MappingError),

    /// Pointer or volume injection call failed
    #[error("pointer injection failed: {0:#}")]
    Injection(anyhow::Error),
}

/// Result type for dispatch operations
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
