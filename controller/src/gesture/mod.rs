//! Gesture recognition from hand landmarks.
//!
//! - `finger`: 4-bit open/closed finger mask
//! - `code`: gesture codes, names, and the mask conversion table
//! - `classifier`: per-role classification and debouncing

pub mod classifier;
pub mod code;
pub mod finger;

pub use classifier::{ClassifierConfig, GestureClassifier, GestureState};
pub use code::GestureCode;
pub use finger::{Finger, FingerConfig, FingerMask, FingerStateEncoder};
