//! Fixed set of pointer behaviors a gesture can be bound to.

use crate::gesture::code::normalize_name;

/// Behavior a mapping entry resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerAction {
    MoveCursor,
    Drag,
    LeftClick,
    RightClick,
    DoubleClick,
    Scroll,
    Volume,
    Noop,
}

impl PointerAction {
    pub const ALL: [PointerAction; 8] = [
        Self::MoveCursor,
        Self::Drag,
        Self::LeftClick,
        Self::RightClick,
        Self::DoubleClick,
        Self::Scroll,
        Self::Volume,
        Self::Noop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoveCursor => "move-cursor",
            Self::Drag => "drag",
            Self::LeftClick => "left-click",
            Self::RightClick => "right-click",
            Self::DoubleClick => "double-click",
            Self::Scroll => "scroll",
            Self::Volume => "volume",
            Self::Noop => "noop",
        }
    }

    /// Resolve an action identifier from a mapping store.  Also accepts the
    /// handler names used by older mapping files (`move_mouse`,
    /// `handle_drag`, ...).
    pub fn from_identifier(ident: &str) -> Option<Self> {
        let name = normalize_name(ident);
        if let Some(action) = Self::ALL.iter().copied().find(|a| a.as_str() == name) {
            return Some(action);
        }
        match name.as_str() {
            "move-mouse" => Some(Self::MoveCursor),
            "handle-drag" => Some(Self::Drag),
            "handle-left-click" => Some(Self::LeftClick),
            "handle-right-click" => Some(Self::RightClick),
            "handle-double-click" => Some(Self::DoubleClick),
            "handle-scroll" => Some(Self::Scroll),
            "handle-system-volume" => Some(Self::Volume),
            "handle-palm" | "none" => Some(Self::Noop),
            _ => None,
        }
    }
}

/// Pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}
