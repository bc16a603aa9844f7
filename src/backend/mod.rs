//! Display backends and the types they share.
//!
//! Exactly one backend is chosen at startup by [`detect_session`] +
//! [`AnyBackend::connect`] and never switched afterwards.  Callers wrap it in
//! [`Fallback`](fallback::Fallback) so backend failures degrade to neutral
//! results instead of interrupting the input loop.

pub mod fallback;
pub mod headless;
pub mod sway;
pub mod x11;

use crate::geometry::ScreenRect;
use crate::traits::DisplayBackend;
use headless::HeadlessBackend;
use log::{info, warn};
use std::fmt;
use sway::{SwayBackend, SwayError};
use x11::{X11Backend, X11Error};

//  Window handles

/// Opaque, backend-specific window identifier.
///
/// X11 stores the window XID, sway the container id.  The core only passes
/// handles back into the backend that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(u64);

impl WindowHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A user-visible window as reported by [`DisplayBackend::windows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
    /// Current frame geometry, when the backend can tell.
    pub rect: Option<ScreenRect>,
}

//  Move/resize reports

/// One round-trip of a move/resize sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResizeStep {
    /// Drop a maximized state that would otherwise pin the geometry.
    Unmaximize,
    EnableFloating,
    Resize,
    Reposition,
    /// Move and resize in a single request.
    MoveResize,
}

impl fmt::Display for MoveResizeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MoveResizeStep::Unmaximize => "unmaximize",
            MoveResizeStep::EnableFloating => "enable floating",
            MoveResizeStep::Resize => "resize",
            MoveResizeStep::Reposition => "reposition",
            MoveResizeStep::MoveResize => "move/resize",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: MoveResizeStep,
    /// `None` on success.
    pub error: Option<String>,
}

/// Per-step result of a non-atomic move/resize.
///
/// Steps are executed in order and the sequence stops at the first failure,
/// so a report can describe a window that is, for example, floating but not
/// yet resized.  Nothing is rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResizeReport {
    planned: Vec<MoveResizeStep>,
    outcomes: Vec<StepOutcome>,
}

impl MoveResizeReport {
    pub fn new(planned: &[MoveResizeStep]) -> Self {
        Self {
            planned: planned.to_vec(),
            outcomes: Vec::with_capacity(planned.len()),
        }
    }

    /// Record the outcome of `step`.  Returns `true` if it succeeded.
    pub fn record<E: fmt::Display>(&mut self, step: MoveResizeStep, result: Result<(), E>) -> bool {
        let error = result.err().map(|e| e.to_string());
        let ok = error.is_none();
        self.outcomes.push(StepOutcome { step, error });
        ok
    }

    pub fn planned(&self) -> &[MoveResizeStep] {
        &self.planned
    }

    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    /// Every planned step ran and succeeded.
    pub fn is_complete(&self) -> bool {
        self.outcomes.len() == self.planned.len() && self.outcomes.iter().all(|o| o.error.is_none())
    }

    /// The step that stopped the sequence, if any.
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.error.is_some())
    }

    /// Steps that were planned but never attempted.
    pub fn skipped(&self) -> &[MoveResizeStep] {
        &self.planned[self.outcomes.len().min(self.planned.len())..]
    }
}

//  Session selection

/// The kind of graphical session themis is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    X11,
    Sway,
    /// No controllable session: geometry is a fixed default and nothing
    /// is ever focused.
    Headless,
}

/// Decide the session kind from environment variables.
///
/// `var` is normally `|k| std::env::var(k).ok()`; tests pass a map lookup.
pub fn detect_session(var: impl Fn(&str) -> Option<String>) -> SessionKind {
    let wayland = var("XDG_SESSION_TYPE").as_deref() == Some("wayland")
        || var("WAYLAND_DISPLAY").is_some_and(|v| !v.is_empty());
    let swaysock = var("SWAYSOCK").is_some_and(|v| !v.is_empty());

    if swaysock {
        SessionKind::Sway
    } else if wayland {
        // Wayland compositors other than sway expose no control channel we
        // understand; an XWayland DISPLAY would only see X clients.
        SessionKind::Headless
    } else if var("DISPLAY").is_some_and(|v| !v.is_empty()) {
        SessionKind::X11
    } else {
        SessionKind::Headless
    }
}

/// Error from whichever backend was selected.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    X11(#[from] X11Error),
    #[error(transparent)]
    Sway(#[from] SwayError),
}

/// The backend selected at startup.
pub enum AnyBackend {
    X11(X11Backend),
    Sway(SwayBackend),
    Headless(HeadlessBackend),
}

impl AnyBackend {
    /// Connect to the backend for `kind`.
    ///
    /// If the session's control channel cannot be reached the headless
    /// backend is returned instead; this is reported once here.
    pub fn connect(kind: SessionKind) -> Self {
        match kind {
            SessionKind::X11 => match X11Backend::connect() {
                Ok(b) => {
                    info!("using X11 backend");
                    AnyBackend::X11(b)
                }
                Err(e) => {
                    warn!("{}; window snapping disabled", e);
                    AnyBackend::Headless(HeadlessBackend::new())
                }
            },
            SessionKind::Sway => match SwayBackend::connect() {
                Ok(b) => {
                    info!("using sway IPC backend");
                    AnyBackend::Sway(b)
                }
                Err(e) => {
                    warn!("{}; window snapping disabled", e);
                    AnyBackend::Headless(HeadlessBackend::new())
                }
            },
            SessionKind::Headless => {
                warn!("no supported window-management session detected; window snapping disabled");
                AnyBackend::Headless(HeadlessBackend::new())
            }
        }
    }
}

impl DisplayBackend for AnyBackend {
    type Error = BackendError;

    fn name(&self) -> &'static str {
        match self {
            AnyBackend::X11(b) => b.name(),
            AnyBackend::Sway(b) => b.name(),
            AnyBackend::Headless(b) => b.name(),
        }
    }

    fn screen_geometry(&self) -> Result<ScreenRect, Self::Error> {
        match self {
            AnyBackend::X11(b) => Ok(b.screen_geometry()?),
            AnyBackend::Sway(b) => Ok(b.screen_geometry()?),
            AnyBackend::Headless(b) => b.screen_geometry().map_err(|e| match e {}),
        }
    }

    fn focused_window(&self) -> Result<Option<WindowHandle>, Self::Error> {
        match self {
            AnyBackend::X11(b) => Ok(b.focused_window()?),
            AnyBackend::Sway(b) => Ok(b.focused_window()?),
            AnyBackend::Headless(b) => b.focused_window().map_err(|e| match e {}),
        }
    }

    fn move_resize_window(
        &self,
        window: WindowHandle,
        rect: ScreenRect,
    ) -> Result<MoveResizeReport, Self::Error> {
        match self {
            AnyBackend::X11(b) => Ok(b.move_resize_window(window, rect)?),
            AnyBackend::Sway(b) => Ok(b.move_resize_window(window, rect)?),
            AnyBackend::Headless(b) => b.move_resize_window(window, rect).map_err(|e| match e {}),
        }
    }

    fn maximize_window(&self, window: WindowHandle) -> Result<(), Self::Error> {
        match self {
            AnyBackend::X11(b) => Ok(b.maximize_window(window)?),
            AnyBackend::Sway(b) => Ok(b.maximize_window(window)?),
            AnyBackend::Headless(b) => b.maximize_window(window).map_err(|e| match e {}),
        }
    }

    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error> {
        match self {
            AnyBackend::X11(b) => Ok(b.windows()?),
            AnyBackend::Sway(b) => Ok(b.windows()?),
            AnyBackend::Headless(b) => b.windows().map_err(|e| match e {}),
        }
    }
}
