//! Per-frame gesture engine: roles, classification, dispatch.
//!
//! One engine per stream.  It owns every piece of cross-frame state
//! (debounce streaks, pinch sessions, cursor reference), so independent
//! streams never share anything.

use tracing::{debug, warn};

use crate::config::ControllerConfig;
use crate::control::{PointerAction, PointerController, PointerInjector};
use crate::error::DispatchError;
use crate::gesture::{FingerMask, GestureClassifier, GestureCode};
use crate::hand::{HandLandmarks, HandRole, HandRoleClassifier};
use crate::mapping::ActionMappingStore;

/// Result of processing one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    /// Stable gesture of each role after this frame.
    pub major: GestureCode,
    pub minor: GestureCode,
    /// Role and gesture that were dispatched.
    pub acting_role: HandRole,
    pub acting: GestureCode,
    /// Action performed, or None when dispatch was skipped.
    pub action: Option<PointerAction>,
}

/// Classification and control state for one stream.
#[derive(Debug, Clone)]
pub struct GestureEngine {
    roles: HandRoleClassifier,
    major: GestureClassifier,
    minor: GestureClassifier,
    controller: PointerController,
    frames: u64,
    skipped: u64,
}

impl GestureEngine {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            roles: HandRoleClassifier::new(config.dominant_right),
            major: GestureClassifier::new(HandRole::Major, config.classifier),
            minor: GestureClassifier::new(HandRole::Minor, config.classifier),
            controller: PointerController::new(config.pointer),
            frames: 0,
            skipped: 0,
        }
    }

    pub fn controller(&self) -> &PointerController {
        &self.controller
    }

    pub fn classifier(&self, role: HandRole) -> &GestureClassifier {
        match role {
            HandRole::Major => &self.major,
            HandRole::Minor => &self.minor,
        }
    }

    /// Frames processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames whose dispatch was skipped with an error.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Run one frame's detections through classification and dispatch.
    /// Dispatch errors are logged and never propagate.
    pub fn process(
        &mut self,
        hands: &[HandLandmarks],
        store: &dyn ActionMappingStore,
        injector: &mut dyn PointerInjector,
    ) -> FrameOutcome {
        self.frames += 1;
        let assignment = self.roles.classify(hands);
        let major = self.major.update(assignment.major);
        let minor = self.minor.update(assignment.minor);

        let (acting_role, acting) = PointerController::select(major, minor);
        let hand = assignment.hand(acting_role);

        let action = match self.controller.handle(acting, hand, store, injector) {
            Ok(action) => Some(action),
            Err(err) => {
                self.skipped += 1;
                match &err {
                    DispatchError::UnknownGestureMapping(_) => debug!("{err}"),
                    _ => warn!(gesture = acting.as_str(), "dispatch skipped: {err}"),
                }
                None
            }
        };

        FrameOutcome {
            major,
            minor,
            acting_role,
            acting,
            action,
        }
    }

    /// Release held interactions and forget debounce history.  Called when
    /// the processing gate closes.
    pub fn suspend(&mut self, injector: &mut dyn PointerInjector) {
        if let Err(e) = self.controller.suspend(injector) {
            warn!("releasing pointer state failed: {e:#}");
        }
        self.major.reset();
        self.minor.reset();
    }

    /// Generate IPC s-expression for the engine.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:major {} :minor {} :major-mask {} :minor-mask {} :frames {} :skipped {} :controller {})",
            self.major.stable().as_str(),
            self.minor.stable().as_str(),
            mask_sexp(self.major.last_mask()),
            mask_sexp(self.minor.last_mask()),
            self.frames,
            self.skipped,
            self.controller.status_sexp(),
        )
    }
}

/// Mask as a 4-digit binary string, or nil before any hand was seen.
fn mask_sexp(mask: Option<FingerMask>) -> String {
    match mask {
        Some(m) => format!("\"{:04b}\"", m.bits()),
        None => "nil".to_string(),
    }
}
