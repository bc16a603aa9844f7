//! Raw input vocabulary and the global keyboard/mouse hook.
//!
//! Everything the hook produces is an [`InputEvent`].  The hook thread never
//! interprets events: chords and drags are resolved on the main loop by the
//! [`Snapper`](crate::snapper::Snapper).

pub mod listener;

use crate::hotkey::RawKey;

/// Mouse buttons the hook reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

/// A single keyboard or mouse transition, in global screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(RawKey),
    KeyUp(RawKey),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    /// Pointer moved to `(x, y)`.
    Motion { x: i32, y: i32 },
}
