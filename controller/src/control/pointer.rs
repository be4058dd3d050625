//! Stateful dispatch of stable gestures to pointer actions.
//!
//! One `PointerController` per stream.  Each frame the acting gesture is
//! chosen from the two roles, looked up in the mapping store, resolved to a
//! `PointerAction` and performed through the injector.  The controller
//! keeps the flags that turn per-frame gestures into one-shot or held
//! interactions: a held drag button, one pinch session per role, and a
//! click that fires once per gesture entry.

use std::time::Duration;

use tracing::{debug, trace};

use super::action::{MouseButton, PointerAction};
use super::cursor::{AccelerationCurve, CursorState};
use super::injector::PointerInjector;
use super::pinch::{PinchAxis, PinchCommit, PinchConfig, PinchSession};
use crate::error::{DispatchError, DispatchResult};
use crate::gesture::GestureCode;
use crate::hand::{HandLandmarks, HandRole};
use crate::mapping::ActionMappingStore;
use crate::sexp::bool_sexp;

// ── Config ─────────────────────────────────────────────────

/// Pointer behavior tuning.
#[derive(Debug, Clone, Copy)]
pub struct PointerConfig {
    /// Cursor transfer curve.
    pub curve: AccelerationCurve,
    /// Pinch controller tuning, shared by both roles.
    pub pinch: PinchConfig,
    /// Duration passed to every pointer move.
    pub move_duration: Duration,
    /// Committed pinch level is divided by this before it is added to the
    /// volume scalar.
    pub volume_divisor: f64,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            curve: AccelerationCurve::default(),
            pinch: PinchConfig::default(),
            move_duration: Duration::from_millis(100),
            volume_divisor: 50.0,
        }
    }
}

// ── Controller ─────────────────────────────────────────────

/// Per-stream pointer state machine.
#[derive(Debug, Clone)]
pub struct PointerController {
    pub config: PointerConfig,
    drag_active: bool,
    pinch_major_active: bool,
    pinch_minor_active: bool,
    click_armed: bool,
    cursor: CursorState,
    major_pinch: PinchSession,
    minor_pinch: PinchSession,
    actions_performed: u64,
}

impl Default for PointerController {
    fn default() -> Self {
        Self::new(PointerConfig::default())
    }
}

impl PointerController {
    pub fn new(config: PointerConfig) -> Self {
        Self {
            config,
            drag_active: false,
            pinch_major_active: false,
            pinch_minor_active: false,
            click_armed: false,
            cursor: CursorState::default(),
            major_pinch: PinchSession::new(config.pinch),
            minor_pinch: PinchSession::new(config.pinch),
            actions_performed: 0,
        }
    }

    pub fn drag_active(&self) -> bool {
        self.drag_active
    }

    pub fn pinch_major_active(&self) -> bool {
        self.pinch_major_active
    }

    pub fn pinch_minor_active(&self) -> bool {
        self.pinch_minor_active
    }

    pub fn click_armed(&self) -> bool {
        self.click_armed
    }

    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }

    pub fn pinch_session(&self, role: HandRole) -> &PinchSession {
        match role {
            HandRole::Major => &self.major_pinch,
            HandRole::Minor => &self.minor_pinch,
        }
    }

    /// Gesture to act on: a Minor pinch pre-empts whatever Major is doing.
    pub fn select(major: GestureCode, minor: GestureCode) -> (HandRole, GestureCode) {
        if minor == GestureCode::PinchMinor {
            (HandRole::Minor, minor)
        } else {
            (HandRole::Major, major)
        }
    }

    /// Dispatch one frame's acting gesture.  `hand` is the acting role's
    /// hand, if detected.
    ///
    /// A lookup failure returns before any state changes.  An injection
    /// failure leaves the flags as they were before the failing call.
    pub fn handle(
        &mut self,
        gesture: GestureCode,
        hand: Option<&HandLandmarks>,
        store: &dyn ActionMappingStore,
        injector: &mut dyn PointerInjector,
    ) -> DispatchResult<PointerAction> {
        let action = resolve(gesture, store)?;
        trace!(gesture = gesture.as_str(), action = action.as_str(), "dispatch");

        self.exit_checks(action, injector)?;

        let Some(hand) = hand else {
            // Next sighting must not jump the cursor.
            self.cursor.reset();
            return Ok(action);
        };

        self.perform(action, hand, injector)
            .map_err(DispatchError::Injection)?;
        self.actions_performed += 1;
        Ok(action)
    }

    /// Release interactions owned by actions other than `action`.
    fn exit_checks(
        &mut self,
        action: PointerAction,
        injector: &mut dyn PointerInjector,
    ) -> DispatchResult<()> {
        if self.drag_active && action != PointerAction::Drag {
            injector
                .button_up(MouseButton::Left)
                .map_err(DispatchError::Injection)?;
            self.drag_active = false;
            debug!("drag released");
        }
        if action != PointerAction::Volume {
            self.pinch_major_active = false;
        }
        if action != PointerAction::Scroll {
            self.pinch_minor_active = false;
        }
        Ok(())
    }

    fn perform(
        &mut self,
        action: PointerAction,
        hand: &HandLandmarks,
        injector: &mut dyn PointerInjector,
    ) -> anyhow::Result<()> {
        match action {
            PointerAction::MoveCursor => {
                self.click_armed = true;
                self.move_cursor(hand, injector)
            }
            PointerAction::Drag => {
                if !self.drag_active {
                    injector.button_down(MouseButton::Left)?;
                    self.drag_active = true;
                    debug!("drag started");
                }
                self.move_cursor(hand, injector)
            }
            PointerAction::LeftClick => self.fire_click(injector, |inj| inj.click(MouseButton::Left)),
            PointerAction::RightClick => {
                self.fire_click(injector, |inj| inj.click(MouseButton::Right))
            }
            PointerAction::DoubleClick => self.fire_click(injector, |inj| inj.double_click()),
            PointerAction::Scroll => {
                if !self.pinch_minor_active {
                    self.minor_pinch.begin(hand);
                    self.pinch_minor_active = true;
                    return Ok(());
                }
                match self.minor_pinch.update(hand) {
                    Some(commit) => apply_scroll(commit, injector),
                    None => Ok(()),
                }
            }
            PointerAction::Volume => {
                if !self.pinch_major_active {
                    self.major_pinch.begin(hand);
                    self.pinch_major_active = true;
                    return Ok(());
                }
                match self.major_pinch.update(hand) {
                    Some(commit) => self.apply_volume(commit, injector),
                    None => Ok(()),
                }
            }
            PointerAction::Noop => Ok(()),
        }
    }

    fn move_cursor(&mut self, hand: &HandLandmarks, injector: &mut dyn PointerInjector) -> anyhow::Result<()> {
        let screen = injector.screen_size()?;
        let pointer = injector.pointer_position()?;
        let (x, y) = self
            .cursor
            .next_position(hand, screen, pointer, &self.config.curve);
        if (x, y) == pointer {
            return Ok(());
        }
        injector.move_to(x, y, self.config.move_duration)
    }

    fn fire_click(
        &mut self,
        injector: &mut dyn PointerInjector,
        click: impl FnOnce(&mut dyn PointerInjector) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        if !self.click_armed {
            return Ok(());
        }
        click(injector)?;
        self.click_armed = false;
        Ok(())
    }

    fn apply_volume(&self, commit: PinchCommit, injector: &mut dyn PointerInjector) -> anyhow::Result<()> {
        match commit.axis {
            PinchAxis::Vertical => {
                let current = injector.system_volume()?;
                let target = (current + commit.level as f64 / self.config.volume_divisor).clamp(0.0, 1.0);
                debug!(from = current, to = target, "volume change");
                injector.set_system_volume(target)
            }
            PinchAxis::Horizontal => injector.scroll_horizontal(commit.level as f64),
        }
    }

    /// Release everything the controller holds.  Called when the processing
    /// gate closes.
    pub fn suspend(&mut self, injector: &mut dyn PointerInjector) -> anyhow::Result<()> {
        self.pinch_major_active = false;
        self.pinch_minor_active = false;
        self.cursor.reset();
        if self.drag_active {
            injector.button_up(MouseButton::Left)?;
            self.drag_active = false;
            debug!("drag released on suspend");
        }
        Ok(())
    }

    /// Generate IPC s-expression for controller state.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:drag {} :pinch-major {} :pinch-minor {} :click-armed {} :actions {})",
            bool_sexp(self.drag_active),
            bool_sexp(self.pinch_major_active),
            bool_sexp(self.pinch_minor_active),
            bool_sexp(self.click_armed),
            self.actions_performed,
        )
    }
}

fn resolve(gesture: GestureCode, store: &dyn ActionMappingStore) -> DispatchResult<PointerAction> {
    let name = gesture.as_str();
    let ident = store
        .action_for(name)?
        .ok_or_else(|| DispatchError::UnknownGestureMapping(name.to_string()))?;
    PointerAction::from_identifier(&ident).ok_or_else(|| DispatchError::UnknownAction {
        gesture: name.to_string(),
        action: ident,
    })
}

fn apply_scroll(commit: PinchCommit, injector: &mut dyn PointerInjector) -> anyhow::Result<()> {
    let amount = commit.level as f64;
    match commit.axis {
        PinchAxis::Vertical => injector.scroll_vertical(amount),
        PinchAxis::Horizontal => injector.scroll_horizontal(amount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::injector::{InjectorCall, RecordingInjector};
    use crate::hand::landmarks::{open_hand, translated, with_point};
    use crate::hand::{Handedness, Landmark};
    use crate::mapping::MappingTable;

    fn setup() -> (PointerController, MappingTable, RecordingInjector) {
        (
            PointerController::default(),
            MappingTable::default_table(),
            RecordingInjector::new(1000, 1000),
        )
    }

    fn hand() -> HandLandmarks {
        open_hand(Handedness::Right)
    }

    #[test]
    fn test_select_prefers_minor_pinch() {
        assert_eq!(
            PointerController::select(GestureCode::VGest, GestureCode::PinchMinor),
            (HandRole::Minor, GestureCode::PinchMinor)
        );
        assert_eq!(
            PointerController::select(GestureCode::VGest, GestureCode::Fist),
            (HandRole::Major, GestureCode::VGest)
        );
    }

    #[test]
    fn test_unmapped_gesture_leaves_state() {
        let (mut ctl, _, mut inj) = setup();
        let table = MappingTable::parse("(:fist drag)").unwrap();
        ctl.handle(GestureCode::Fist, Some(&hand()), &table, &mut inj).unwrap();
        assert!(ctl.drag_active());

        let err = ctl.handle(GestureCode::Last3, Some(&hand()), &table, &mut inj).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownGestureMapping(ref g) if g == "last3"));
        // No exit check ran.
        assert!(ctl.drag_active());
        assert_eq!(inj.count(|c| matches!(c, InjectorCall::ButtonUp(_))), 0);
    }

    #[test]
    fn test_unknown_action() {
        let (mut ctl, _, mut inj) = setup();
        let table = MappingTable::parse("(:palm launch-rockets)").unwrap();
        let err = ctl.handle(GestureCode::Palm, Some(&hand()), &table, &mut inj).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownAction { .. }));
        assert!(inj.calls.is_empty());
    }

    #[test]
    fn test_click_once_per_entry() {
        let (mut ctl, table, mut inj) = setup();
        // Not armed yet.
        ctl.handle(GestureCode::Mid, Some(&hand()), &table, &mut inj).unwrap();
        assert!(inj.calls.is_empty());

        ctl.handle(GestureCode::VGest, Some(&hand()), &table, &mut inj).unwrap();
        assert!(ctl.click_armed());
        for _ in 0..5 {
            ctl.handle(GestureCode::Mid, Some(&hand()), &table, &mut inj).unwrap();
        }
        assert_eq!(inj.count(|c| *c == InjectorCall::Click(MouseButton::Left)), 1);
        assert!(!ctl.click_armed());

        ctl.handle(GestureCode::VGest, Some(&hand()), &table, &mut inj).unwrap();
        ctl.handle(GestureCode::TwoFingerClosed, Some(&hand()), &table, &mut inj).unwrap();
        ctl.handle(GestureCode::Index, Some(&hand()), &table, &mut inj).unwrap();
        assert_eq!(inj.count(|c| *c == InjectorCall::DoubleClick), 1);
        assert_eq!(inj.count(|c| *c == InjectorCall::Click(MouseButton::Right)), 0);
    }

    #[test]
    fn test_drag_lifecycle() {
        let (mut ctl, table, mut inj) = setup();
        let h = hand();
        ctl.handle(GestureCode::Fist, Some(&h), &table, &mut inj).unwrap();
        ctl.handle(GestureCode::Fist, Some(&translated(&h, 0.02, 0.0)), &table, &mut inj)
            .unwrap();
        assert!(ctl.drag_active());
        assert_eq!(inj.count(|c| matches!(c, InjectorCall::ButtonDown(_))), 1);
        assert_eq!(inj.count(|c| matches!(c, InjectorCall::MoveTo(..))), 1);

        ctl.handle(GestureCode::Palm, Some(&h), &table, &mut inj).unwrap();
        assert!(!ctl.drag_active());
        assert_eq!(inj.calls.last(), Some(&InjectorCall::ButtonUp(MouseButton::Left)));
    }

    #[test]
    fn test_move_cursor_accelerates() {
        let (mut ctl, table, _) = setup();
        let mut inj = RecordingInjector::new(1024, 1024);
        let palm_at = |px: f32, py: f32| {
            with_point(&hand(), Landmark::MiddleMcp, px / 1024.0, py / 1024.0, 0.0)
        };
        ctl.handle(GestureCode::VGest, Some(&palm_at(500.0, 500.0)), &table, &mut inj)
            .unwrap();
        // First sighting: no move.
        assert!(inj.calls.is_empty());
        // 40px right, 30px down: flick gain.
        ctl.handle(GestureCode::VGest, Some(&palm_at(540.0, 530.0)), &table, &mut inj)
            .unwrap();
        match inj.calls.last() {
            Some(InjectorCall::MoveTo(x, y)) => {
                assert!((x - 596.0).abs() < 1e-6);
                assert!((y - 575.0).abs() < 1e-6);
            }
            other => panic!("expected move, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_hand_resets_cursor() {
        let (mut ctl, table, mut inj) = setup();
        let h = hand();
        ctl.handle(GestureCode::VGest, Some(&h), &table, &mut inj).unwrap();
        assert!(ctl.cursor().last_hand_px().is_some());
        ctl.handle(GestureCode::VGest, None, &table, &mut inj).unwrap();
        assert!(ctl.cursor().last_hand_px().is_none());
        // Reappearing far away does not jump.
        ctl.handle(GestureCode::VGest, Some(&translated(&h, 0.3, 0.0)), &table, &mut inj)
            .unwrap();
        assert!(inj.calls.is_empty());
    }

    #[test]
    fn test_volume_pinch_commits() {
        let (mut ctl, table, mut inj) = setup();
        let h = with_point(&hand(), Landmark::IndexTip, 0.5, 0.5, 0.0);
        let raised = with_point(&h, Landmark::IndexTip, 0.5, 0.4, 0.0);

        ctl.handle(GestureCode::PinchMajor, Some(&h), &table, &mut inj).unwrap();
        assert!(ctl.pinch_major_active());
        for _ in 0..6 {
            ctl.handle(GestureCode::PinchMajor, Some(&raised), &table, &mut inj).unwrap();
        }
        // Level 1.0 / 50 on top of the starting 0.5.
        assert_eq!(inj.calls.len(), 1);
        match inj.calls[0] {
            InjectorCall::SetVolume(v) => assert!((v - 0.52).abs() < 1e-6),
            ref other => panic!("expected volume, got {other:?}"),
        }

        ctl.handle(GestureCode::Palm, Some(&h), &table, &mut inj).unwrap();
        assert!(!ctl.pinch_major_active());
    }

    #[test]
    fn test_volume_clamped() {
        let (mut ctl, table, mut inj) = setup();
        inj.inner.set_system_volume(0.99).unwrap();
        let h = with_point(&hand(), Landmark::IndexTip, 0.5, 0.9, 0.0);
        let raised = with_point(&h, Landmark::IndexTip, 0.5, 0.1, 0.0);
        ctl.handle(GestureCode::PinchMajor, Some(&h), &table, &mut inj).unwrap();
        for _ in 0..6 {
            ctl.handle(GestureCode::PinchMajor, Some(&raised), &table, &mut inj).unwrap();
        }
        assert_eq!(inj.calls, vec![InjectorCall::SetVolume(1.0)]);
    }

    #[test]
    fn test_scroll_pinch_horizontal() {
        let (mut ctl, table, mut inj) = setup();
        let h = with_point(&hand(), Landmark::IndexTip, 0.5, 0.5, 0.0);
        let left = with_point(&h, Landmark::IndexTip, 0.4, 0.5, 0.0);
        ctl.handle(GestureCode::PinchMinor, Some(&h), &table, &mut inj).unwrap();
        assert!(ctl.pinch_minor_active());
        for _ in 0..6 {
            ctl.handle(GestureCode::PinchMinor, Some(&left), &table, &mut inj).unwrap();
        }
        assert_eq!(inj.calls.len(), 1);
        match inj.calls[0] {
            InjectorCall::ScrollHorizontal(a) => assert!((a + 1.0).abs() < 1e-6),
            ref other => panic!("expected scroll, got {other:?}"),
        }
    }

    #[test]
    fn test_pinch_reengage_resets_origin() {
        let (mut ctl, table, mut inj) = setup();
        let h = with_point(&hand(), Landmark::IndexTip, 0.5, 0.5, 0.0);
        let moved = with_point(&h, Landmark::IndexTip, 0.5, 0.2, 0.0);
        ctl.handle(GestureCode::PinchMinor, Some(&h), &table, &mut inj).unwrap();
        ctl.handle(GestureCode::Palm, Some(&h), &table, &mut inj).unwrap();
        ctl.handle(GestureCode::PinchMinor, Some(&moved), &table, &mut inj).unwrap();
        assert_eq!(ctl.pinch_session(HandRole::Minor).origin(), (0.5, 0.2));
    }

    #[test]
    fn test_injection_failure_keeps_flags() {
        let (mut ctl, table, mut inj) = setup();
        inj.fail = true;
        let err = ctl.handle(GestureCode::Fist, Some(&hand()), &table, &mut inj).unwrap_err();
        assert!(matches!(err, DispatchError::Injection(_)));
        assert!(!ctl.drag_active());
    }

    #[test]
    fn test_suspend_releases_drag() {
        let (mut ctl, table, mut inj) = setup();
        ctl.handle(GestureCode::Fist, Some(&hand()), &table, &mut inj).unwrap();
        ctl.suspend(&mut inj).unwrap();
        assert!(!ctl.drag_active());
        assert!(!ctl.pinch_major_active());
        assert!(!inj.inner.is_held(MouseButton::Left));
    }

    #[test]
    fn test_status_sexp() {
        let (mut ctl, table, mut inj) = setup();
        ctl.handle(GestureCode::Fist, Some(&hand()), &table, &mut inj).unwrap();
        let sexp = ctl.status_sexp();
        assert!(sexp.contains(":drag t"));
        assert!(sexp.contains(":pinch-major nil"));
        assert!(sexp.contains(":actions 1"));
    }
}
