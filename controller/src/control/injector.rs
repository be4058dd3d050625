//! Pointer and system-volume injection.
//!
//! The controller never talks to the OS directly.  Everything goes through
//! `PointerInjector`, which a platform integration implements.  The crate
//! ships `HeadlessInjector`, a virtual screen used by the replay binary.

use std::time::Duration;

use anyhow::{bail, Result};

use super::action::MouseButton;

/// Pointer and volume side effects.  Calls are synchronous; `move_to`
/// may block for up to `duration`.
pub trait PointerInjector {
    fn screen_size(&self) -> Result<(u32, u32)>;
    fn pointer_position(&self) -> Result<(f64, f64)>;
    fn move_to(&mut self, x: f64, y: f64, duration: Duration) -> Result<()>;
    fn button_down(&mut self, button: MouseButton) -> Result<()>;
    fn button_up(&mut self, button: MouseButton) -> Result<()>;
    fn click(&mut self, button: MouseButton) -> Result<()>;
    fn double_click(&mut self) -> Result<()>;
    fn scroll_vertical(&mut self, amount: f64) -> Result<()>;
    fn scroll_horizontal(&mut self, amount: f64) -> Result<()>;
    /// Current master volume scalar in [0, 1].
    fn system_volume(&self) -> Result<f64>;
    fn set_system_volume(&mut self, value: f64) -> Result<()>;
}

/// Virtual pointer on a fixed-size screen.
#[derive(Debug, Clone)]
pub struct HeadlessInjector {
    width: u32,
    height: u32,
    x: f64,
    y: f64,
    left_held: bool,
    right_held: bool,
    volume: f64,
    /// Counters for the status report
    pub clicks: u64,
    pub scroll_total: (f64, f64),
}

impl HeadlessInjector {
    /// Pointer starts centered, volume at half.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            x: width as f64 / 2.0,
            y: height as f64 / 2.0,
            left_held: false,
            right_held: false,
            volume: 0.5,
            clicks: 0,
            scroll_total: (0.0, 0.0),
        }
    }

    pub fn is_held(&self, button: MouseButton) -> bool {
        match button {
            MouseButton::Left => self.left_held,
            MouseButton::Right => self.right_held,
        }
    }

    fn held_mut(&mut self, button: MouseButton) -> &mut bool {
        match button {
            MouseButton::Left => &mut self.left_held,
            MouseButton::Right => &mut self.right_held,
        }
    }

    /// Generate IPC s-expression for the virtual pointer.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:screen ({} {}) :pointer ({:.1} {:.1}) :left-held {} :volume {:.2} :clicks {})",
            self.width,
            self.height,
            self.x,
            self.y,
            crate::sexp::bool_sexp(self.left_held),
            self.volume,
            self.clicks,
        )
    }
}

impl PointerInjector for HeadlessInjector {
    fn screen_size(&self) -> Result<(u32, u32)> {
        Ok((self.width, self.height))
    }

    fn pointer_position(&self) -> Result<(f64, f64)> {
        Ok((self.x, self.y))
    }

    fn move_to(&mut self, x: f64, y: f64, duration: Duration) -> Result<()> {
        if !x.is_finite() || !y.is_finite() {
            bail!("non-finite pointer target ({x}, {y})");
        }
        // Clamp like a real display server would.
        self.x = x.clamp(0.0, self.width.saturating_sub(1) as f64);
        self.y = y.clamp(0.0, self.height.saturating_sub(1) as f64);
        tracing::trace!(x = self.x, y = self.y, ?duration, "headless move");
        Ok(())
    }

    fn button_down(&mut self, button: MouseButton) -> Result<()> {
        *self.held_mut(button) = true;
        tracing::debug!(button = button.as_str(), "headless button down");
        Ok(())
    }

    fn button_up(&mut self, button: MouseButton) -> Result<()> {
        *self.held_mut(button) = false;
        tracing::debug!(button = button.as_str(), "headless button up");
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.clicks += 1;
        tracing::debug!(button = button.as_str(), x = self.x, y = self.y, "headless click");
        Ok(())
    }

    fn double_click(&mut self) -> Result<()> {
        self.clicks += 2;
        tracing::debug!(x = self.x, y = self.y, "headless double click");
        Ok(())
    }

    fn scroll_vertical(&mut self, amount: f64) -> Result<()> {
        self.scroll_total.1 += amount;
        tracing::debug!(amount, "headless vertical scroll");
        Ok(())
    }

    fn scroll_horizontal(&mut self, amount: f64) -> Result<()> {
        self.scroll_total.0 += amount;
        tracing::debug!(amount, "headless horizontal scroll");
        Ok(())
    }

    fn system_volume(&self) -> Result<f64> {
        Ok(self.volume)
    }

    fn set_system_volume(&mut self, value: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            bail!("volume {value} outside [0, 1]");
        }
        self.volume = value;
        tracing::debug!(volume = value, "headless volume");
        Ok(())
    }
}

/// Injector call log for controller tests.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InjectorCall {
    MoveTo(f64, f64),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    Click(MouseButton),
    DoubleClick,
    ScrollVertical(f64),
    ScrollHorizontal(f64),
    SetVolume(f64),
}

/// Records every call on top of a headless screen.  `fail` makes every
/// mutating call error out.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct RecordingInjector {
    pub inner: HeadlessInjector,
    pub calls: Vec<InjectorCall>,
    pub fail: bool,
}

#[cfg(test)]
impl RecordingInjector {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: HeadlessInjector::new(width, height),
            calls: Vec::new(),
            fail: false,
        }
    }

    fn record(&mut self, call: InjectorCall) -> Result<()> {
        if self.fail {
            bail!("injected failure on {call:?}");
        }
        self.calls.push(call);
        Ok(())
    }

    pub fn count(&self, pred: impl Fn(&InjectorCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

#[cfg(test)]
impl PointerInjector for RecordingInjector {
    fn screen_size(&self) -> Result<(u32, u32)> {
        self.inner.screen_size()
    }

    fn pointer_position(&self) -> Result<(f64, f64)> {
        self.inner.pointer_position()
    }

    fn move_to(&mut self, x: f64, y: f64, duration: Duration) -> Result<()> {
        self.record(InjectorCall::MoveTo(x, y))?;
        self.inner.move_to(x, y, duration)
    }

    fn button_down(&mut self, button: MouseButton) -> Result<()> {
        self.record(InjectorCall::ButtonDown(button))?;
        self.inner.button_down(button)
    }

    fn button_up(&mut self, button: MouseButton) -> Result<()> {
        self.record(InjectorCall::ButtonUp(button))?;
        self.inner.button_up(button)
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.record(InjectorCall::Click(button))?;
        self.inner.click(button)
    }

    fn double_click(&mut self) -> Result<()> {
        self.record(InjectorCall::DoubleClick)?;
        self.inner.double_click()
    }

    fn scroll_vertical(&mut self, amount: f64) -> Result<()> {
        self.record(InjectorCall::ScrollVertical(amount))?;
        self.inner.scroll_vertical(amount)
    }

    fn scroll_horizontal(&mut self, amount: f64) -> Result<()> {
        self.record(InjectorCall::ScrollHorizontal(amount))?;
        self.inner.scroll_horizontal(amount)
    }

    fn system_volume(&self) -> Result<f64> {
        self.inner.system_volume()
    }

    fn set_system_volume(&mut self, value: f64) -> Result<()> {
        self.record(InjectorCall::SetVolume(value))?;
        self.inner.set_system_volume(value)
    }
}
