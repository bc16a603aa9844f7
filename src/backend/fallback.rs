//! Neutral-result wrapper around any [`DisplayBackend`].
//!
//! Backend failures are transient from the user's point of view: the next
//! hotkey press re-queries fresh state.  [`Fallback`] therefore logs every
//! error and returns a neutral value instead of propagating it:
//!
//! | call | on error |
//! |---|---|
//! | `screen_geometry` | last geometry that succeeded, else 1920×1080 |
//! | `focused_window` | `None` |
//! | `move_resize_window` | `None` (nothing attempted) |
//! | `maximize_window` | `false` |
//! | `windows` | empty list |

use super::headless::DEFAULT_SCREEN;
use super::{MoveResizeReport, WindowHandle, WindowInfo};
use crate::geometry::ScreenRect;
use crate::traits::DisplayBackend;
use log::warn;
use std::cell::Cell;

pub struct Fallback<B> {
    inner: B,
    last_screen: Cell<Option<ScreenRect>>,
}

impl<B: DisplayBackend> Fallback<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            last_screen: Cell::new(None),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn screen_geometry(&self) -> ScreenRect {
        match self.inner.screen_geometry() {
            Ok(rect) => {
                self.last_screen.set(Some(rect));
                rect
            }
            Err(e) => {
                let rect = self.last_screen.get().unwrap_or(DEFAULT_SCREEN);
                warn!("{}: screen geometry unavailable ({}), assuming {}", self.inner.name(), e, rect);
                rect
            }
        }
    }

    pub fn focused_window(&self) -> Option<WindowHandle> {
        self.inner.focused_window().unwrap_or_else(|e| {
            warn!("{}: cannot query focused window: {}", self.inner.name(), e);
            None
        })
    }

    pub fn move_resize_window(&self, window: WindowHandle, rect: ScreenRect) -> Option<MoveResizeReport> {
        match self.inner.move_resize_window(window, rect) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("{}: cannot move window {}: {}", self.inner.name(), window, e);
                None
            }
        }
    }

    pub fn maximize_window(&self, window: WindowHandle) -> bool {
        match self.inner.maximize_window(window) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: cannot maximize window {}: {}", self.inner.name(), window, e);
                false
            }
        }
    }

    pub fn windows(&self) -> Vec<WindowInfo> {
        self.inner.windows().unwrap_or_else(|e| {
            warn!("{}: cannot list windows: {}", self.inner.name(), e);
            Vec::new()
        })
    }
}
