//! Core traits that decouple themis from any specific windowing session or
//! input transport.
//!
//! Every concrete backend (X11, sway IPC, a headless stub, a test recorder)
//! implements [`DisplayBackend`]; every producer of events (the global input
//! hook, the control socket, the signal handler) implements
//! [`EventSource`].  The [`Snapper`](crate::snapper::Snapper) only depends on
//! these abstractions.

use crate::backend::{MoveResizeReport, WindowHandle, WindowInfo};
use crate::command::Event;
use crate::drag::SnapPreview;
use crate::geometry::ScreenRect;
use std::sync::mpsc;

/// Abstraction over the session's window-management capabilities.
///
/// Implementations may fail on any call; callers normally go through
/// [`Fallback`](crate::backend::fallback::Fallback), which turns failures
/// into neutral results so the input loop never stops because of them.
pub trait DisplayBackend {
    /// The error type produced by this backend.
    type Error: std::error::Error + Send + 'static;

    /// Short name for logs (`"x11"`, `"sway"`, …).
    fn name(&self) -> &'static str;

    /// Geometry of the output windows should be snapped within.
    fn screen_geometry(&self) -> Result<ScreenRect, Self::Error>;

    /// The currently focused window, or `None` if nothing is focused.
    fn focused_window(&self) -> Result<Option<WindowHandle>, Self::Error>;

    /// Move and resize `window` to `rect`.
    ///
    /// Backends that need several round-trips report each sub-step in the
    /// returned [`MoveResizeReport`]; a failed sub-step is *not* an `Err`.
    /// `Err` means nothing could be attempted at all.
    fn move_resize_window(
        &self,
        window: WindowHandle,
        rect: ScreenRect,
    ) -> Result<MoveResizeReport, Self::Error>;

    /// Ask the session to maximize `window` natively.
    fn maximize_window(&self, window: WindowHandle) -> Result<(), Self::Error>;

    /// List the normal, user-visible windows.
    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error>;
}

//  Overlay

/// Events sent from the drag controller to an external overlay renderer
/// over an [`mpsc`] channel.
///
/// The controller only says *what* should be visible; the renderer decides
/// how to draw it.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    /// A drag became active; show the overlay covering `screen`.
    Show { screen: ScreenRect },
    /// The candidate under the pointer changed.  `None` clears the
    /// highlight without hiding the overlay.
    Highlight(Option<SnapPreview>),
    /// The drag ended or was cancelled.
    Hide,
}

//  Event Source

/// A source of [`Event`]s.
///
/// # Contract
///
/// * [`run`](EventSource::run) **blocks** until the source is exhausted,
///   stopped, or an unrecoverable error occurs.
/// * Sources never touch snapping state themselves; they only forward events
///   to the single consumer loop through `sink`.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait EventSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every event into `sink`.
    fn run(&mut self, sink: mpsc::SyncSender<Event>) -> Result<(), Self::Error>;
}
