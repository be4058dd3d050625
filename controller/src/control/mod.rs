//! Pointer control: cursor acceleration, pinch controller, action dispatch.

pub mod action;
pub mod cursor;
pub mod injector;
pub mod pinch;
pub mod pointer;

pub use action::{MouseButton, PointerAction};
pub use cursor::{AccelerationCurve, CursorState};
pub use injector::{HeadlessInjector, PointerInjector};
pub use pinch::{PinchAxis, PinchCommit, PinchConfig, PinchSession};
pub use pointer::{PointerConfig, PointerController};
