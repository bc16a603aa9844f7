//! Turns a [`SnapAction`] into backend calls.
//!
//! This is the seam the hotkey recognizer, the drag controller, the control
//! socket and the CLI all go through.  Backend failures never surface as
//! errors here; they are logged by [`Fallback`] and show up as a neutral
//! [`DispatchOutcome`].

use crate::action::SnapAction;
use crate::backend::fallback::Fallback;
use crate::backend::{MoveResizeReport, WindowHandle};
use crate::geometry::{self, GeometryError, ScreenRect};
use crate::traits::DisplayBackend;
use log::{debug, info, warn};

/// What a dispatch ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing is focused.  This is normal and not an error.
    NoFocusedWindow,
    /// The computed rectangle has no area (tiny screen, huge margin).
    Degenerate { target: ScreenRect },
    Maximized { window: WindowHandle },
    Moved {
        window: WindowHandle,
        target: ScreenRect,
        report: MoveResizeReport,
    },
    /// The backend rejected the request outright.
    Failed { window: WindowHandle },
}

/// Errors that fail a single dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

pub struct ActionDispatcher<B> {
    backend: Fallback<B>,
    margin: i32,
}

impl<B: DisplayBackend> ActionDispatcher<B> {
    pub fn new(backend: B, margin: i32) -> Self {
        Self {
            backend: Fallback::new(backend),
            margin,
        }
    }

    pub fn backend(&self) -> &Fallback<B> {
        &self.backend
    }

    pub fn margin(&self) -> i32 {
        self.margin
    }

    /// Read-only geometry query for diagnostics.
    pub fn screen_geometry(&self) -> ScreenRect {
        self.backend.screen_geometry()
    }

    pub fn focused_window(&self) -> Option<WindowHandle> {
        self.backend.focused_window()
    }

    /// Apply `action` to the focused window.
    pub fn dispatch(&self, action: SnapAction) -> DispatchOutcome {
        match self.backend.focused_window() {
            Some(window) => self.dispatch_to(action, window),
            None => {
                debug!("{}: no focused window", action);
                DispatchOutcome::NoFocusedWindow
            }
        }
    }

    /// Apply `action` to a specific window (the one a drag started on).
    pub fn dispatch_to(&self, action: SnapAction, window: WindowHandle) -> DispatchOutcome {
        if action == SnapAction::Maximize {
            return if self.backend.maximize_window(window) {
                info!("maximized {}", window);
                DispatchOutcome::Maximized { window }
            } else {
                DispatchOutcome::Failed { window }
            };
        }

        let screen = self.backend.screen_geometry();
        let target = geometry::compute(screen, self.margin, action);
        if target.is_degenerate() {
            warn!("{}: target {} on screen {} has no area, skipped", action, target, screen);
            return DispatchOutcome::Degenerate { target };
        }

        let Some(report) = self.backend.move_resize_window(window, target) else {
            return DispatchOutcome::Failed { window };
        };
        match report.failed_step() {
            None => info!("{}: {} -> {}", action, window, target),
            Some(failed) => warn!(
                "{}: {} only partly moved, {} failed: {}",
                action,
                window,
                failed.step,
                failed.error.as_deref().unwrap_or("unknown error")
            ),
        }
        DispatchOutcome::Moved {
            window,
            target,
            report,
        }
    }

    /// Dispatch by action name, as sent by the settings and tray layers.
    pub fn dispatch_named(&self, name: &str) -> Result<DispatchOutcome, DispatchError> {
        let action = name
            .parse::<SnapAction>()
            .map_err(|e| GeometryError::UnknownAction(e.0))?;
        Ok(self.dispatch(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MoveResizeStep, WindowInfo};
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        MoveResize(WindowHandle, ScreenRect),
        Maximize(WindowHandle),
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock backend error")]
    struct MockError;

    struct MockBackend {
        screen: ScreenRect,
        focused: Option<WindowHandle>,
        fail_mutations: bool,
        calls: RefCell<Vec<Call>>,
    }

    impl MockBackend {
        fn new(focused: Option<WindowHandle>) -> Self {
            Self {
                screen: ScreenRect::new(0, 0, 1920, 1080),
                focused,
                fail_mutations: false,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl DisplayBackend for MockBackend {
        type Error = MockError;

        fn name(&self) -> &'static str {
            "mock"
        }

        fn screen_geometry(&self) -> Result<ScreenRect, MockError> {
            Ok(self.screen)
        }

        fn focused_window(&self) -> Result<Option<WindowHandle>, MockError> {
            Ok(self.focused)
        }

        fn move_resize_window(
            &self,
            window: WindowHandle,
            rect: ScreenRect,
        ) -> Result<MoveResizeReport, MockError> {
            self.calls.borrow_mut().push(Call::MoveResize(window, rect));
            if self.fail_mutations {
                return Err(MockError);
            }
            let mut report = MoveResizeReport::new(&[MoveResizeStep::MoveResize]);
            report.record::<MockError>(MoveResizeStep::MoveResize, Ok(()));
            Ok(report)
        }

        fn maximize_window(&self, window: WindowHandle) -> Result<(), MockError> {
            self.calls.borrow_mut().push(Call::Maximize(window));
            if self.fail_mutations {
                Err(MockError)
            } else {
                Ok(())
            }
        }

        fn windows(&self) -> Result<Vec<WindowInfo>, MockError> {
            Ok(Vec::new())
        }
    }

    const WIN: WindowHandle = WindowHandle::new(0x400001);

    fn calls(d: &ActionDispatcher<MockBackend>) -> Vec<Call> {
        d.backend().inner().calls.borrow().clone()
    }

    #[test]
    fn no_focused_window_is_a_no_op() {
        let d = ActionDispatcher::new(MockBackend::new(None), 5);
        assert_eq!(d.dispatch(SnapAction::SnapLeft), DispatchOutcome::NoFocusedWindow);
        assert_eq!(d.dispatch(SnapAction::Maximize), DispatchOutcome::NoFocusedWindow);
        assert!(calls(&d).is_empty());
    }

    #[test]
    fn snap_left_moves_focused_window() {
        let d = ActionDispatcher::new(MockBackend::new(Some(WIN)), 5);
        match d.dispatch(SnapAction::SnapLeft) {
            DispatchOutcome::Moved { window, target, report } => {
                assert_eq!(window, WIN);
                assert_eq!(target, ScreenRect::new(5, 5, 950, 1070));
                assert!(report.is_complete());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(
            calls(&d),
            vec![Call::MoveResize(WIN, ScreenRect::new(5, 5, 950, 1070))]
        );
    }

    #[test]
    fn maximize_bypasses_geometry() {
        let d = ActionDispatcher::new(MockBackend::new(Some(WIN)), 5);
        assert_eq!(
            d.dispatch(SnapAction::Maximize),
            DispatchOutcome::Maximized { window: WIN }
        );
        assert_eq!(calls(&d), vec![Call::Maximize(WIN)]);
    }

    #[test]
    fn degenerate_target_is_skipped() {
        let mut backend = MockBackend::new(Some(WIN));
        backend.screen = ScreenRect::new(0, 0, 30, 30);
        let d = ActionDispatcher::new(backend, 20);
        assert!(matches!(
            d.dispatch(SnapAction::SnapLeft),
            DispatchOutcome::Degenerate { .. }
        ));
        assert!(calls(&d).is_empty());
    }

    #[test]
    fn backend_failure_is_reported_not_raised() {
        let mut backend = MockBackend::new(Some(WIN));
        backend.fail_mutations = true;
        let d = ActionDispatcher::new(backend, 5);
        assert_eq!(
            d.dispatch(SnapAction::Center),
            DispatchOutcome::Failed { window: WIN }
        );
        assert_eq!(
            d.dispatch(SnapAction::Maximize),
            DispatchOutcome::Failed { window: WIN }
        );
    }

    #[test]
    fn dispatch_to_targets_given_window() {
        let d = ActionDispatcher::new(MockBackend::new(None), 0);
        let other = WindowHandle::new(9);
        assert!(matches!(
            d.dispatch_to(SnapAction::QuarterBottomRight, other),
            DispatchOutcome::Moved { window, .. } if window == other
        ));
    }

    #[test]
    fn dispatch_named_rejects_unknown_action() {
        let d = ActionDispatcher::new(MockBackend::new(Some(WIN)), 5);
        let err = d.dispatch_named("snap_diagonal").unwrap_err();
        assert!(err.to_string().contains("snap_diagonal"));
        assert!(matches!(
            d.dispatch_named("quarter-tr"),
            Ok(DispatchOutcome::Moved { .. })
        ));
    }
}
