//! Backend used when no controllable session is reachable.

use super::{MoveResizeReport, WindowHandle, WindowInfo};
use crate::geometry::ScreenRect;
use crate::traits::DisplayBackend;
use std::convert::Infallible;

/// Geometry reported when nothing better is known.
pub const DEFAULT_SCREEN: ScreenRect = ScreenRect::new(0, 0, 1920, 1080);

/// Reports a fixed 1920×1080 screen and never has a focused window, so
/// every dispatch is a no-op.
#[derive(Debug, Default)]
pub struct HeadlessBackend;

impl HeadlessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayBackend for HeadlessBackend {
    type Error = Infallible;

    fn name(&self) -> &'static str {
        "headless"
    }

    fn screen_geometry(&self) -> Result<ScreenRect, Self::Error> {
        Ok(DEFAULT_SCREEN)
    }

    fn focused_window(&self) -> Result<Option<WindowHandle>, Self::Error> {
        Ok(None)
    }

    fn move_resize_window(
        &self,
        _window: WindowHandle,
        _rect: ScreenRect,
    ) -> Result<MoveResizeReport, Self::Error> {
        Ok(MoveResizeReport::new(&[]))
    }

    fn maximize_window(&self, _window: WindowHandle) -> Result<(), Self::Error> {
        Ok(())
    }

    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error> {
        Ok(Vec::new())
    }
}
