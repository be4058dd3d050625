//! Hand data from the external landmark detector and role assignment.

pub mod landmarks;
pub mod roles;

pub use landmarks::{hands_sexp, HandLandmarks, Handedness, Landmark, LandmarkPoint, LANDMARK_COUNT};
pub use roles::{HandRole, HandRoleClassifier, RoleAssignment};
