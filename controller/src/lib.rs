//! Gesture Pointer - hand-landmark gesture recognition driving the pointer.
//!
//! Per frame: detected hands are split into Major/Minor roles, each hand's
//! pose is encoded as a finger mask and classified into a debounced
//! gesture, and the acting gesture is dispatched through a user-editable
//! mapping to a pointer action (cursor motion, drag, clicks, pinch scroll
//! and volume).

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod hand;
pub mod ipc;
pub mod mapping;
pub mod pipeline;
pub mod service;
pub mod sexp;

pub use engine::{FrameOutcome, GestureEngine};
pub use error::{DispatchError, MappingError};
