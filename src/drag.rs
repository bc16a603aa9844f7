//! Drag-to-snap state machine.
//!
//! ```text
//!            button down              activation delay
//!   Idle ───────────────▶ Pending ─────────────────────▶ Active
//!    ▲                       │                             │
//!    └──── button up ────────┴──────── button up ──────────┘
//!          (no action)              (dispatch if long enough
//!                                    and over a region)
//! ```
//!
//! The controller is pure: it never touches the backend.  Callers pass the
//! current [`Instant`] with every event, feed it pointer motion, call
//! [`tick`](DragSnapController::tick) periodically so the overlay appears
//! without waiting for motion, and dispatch whatever
//! [`on_button_up`](DragSnapController::on_button_up) returns.  Overlay
//! changes are published as [`OverlayEvent`]s.

use crate::action::SnapAction;
use crate::backend::WindowHandle;
use crate::config::DragConfig;
use crate::geometry::{self, ScreenRect};
use crate::traits::OverlayEvent;
use log::{debug, info};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// A fixed screen zone bound to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapCandidateRegion {
    pub rect: ScreenRect,
    pub action: SnapAction,
}

/// What the overlay should show for the region under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapPreview {
    pub action: SnapAction,
    /// The trigger zone the pointer is in.
    pub zone: ScreenRect,
    /// Where the window would land.
    pub target: ScreenRect,
}

/// Build the candidate regions for `screen`.
///
/// Corners map to quarters, the outer edge strips to halves (left/right),
/// maximize (top) and center (bottom).  A second strip just inside each
/// edge strip, between the corners, maps to the matching third.
///
/// Strip and corner sizes are bounded by the screen's larger side.
pub fn candidate_regions(screen: ScreenRect, cfg: &DragConfig) -> Vec<SnapCandidateRegion> {
    let ScreenRect { x, y, width: w, height: h } = screen;
    let limit = w.max(h).max(0);
    let e = cfg.edge_width.clamp(0, limit);
    let c = cfg.corner_size.clamp(0, limit);
    let (r, b) = (screen.right(), screen.bottom());
    let region = |x, y, width, height, action| SnapCandidateRegion {
        rect: ScreenRect::new(x, y, width, height),
        action,
    };

    vec![
        region(x, y, c, c, SnapAction::QuarterTopLeft),
        region(r - c, y, c, c, SnapAction::QuarterTopRight),
        region(x, b - c, c, c, SnapAction::QuarterBottomLeft),
        region(r - c, b - c, c, c, SnapAction::QuarterBottomRight),
        region(x + e, y + c, e, h - 2 * c, SnapAction::ThirdLeft),
        region(r - 2 * e, y + c, e, h - 2 * c, SnapAction::ThirdRight),
        region(x + c, y + e, w - 2 * c, e, SnapAction::ThirdTop),
        region(x + c, b - 2 * e, w - 2 * c, e, SnapAction::ThirdBottom),
        region(x, y, e, h, SnapAction::SnapLeft),
        region(r - e, y, e, h, SnapAction::SnapRight),
        region(x, y, w, e, SnapAction::Maximize),
        region(x, b - e, w, e, SnapAction::Center),
    ]
}

/// Resolve a pointer position: quarter/third regions outrank edge regions;
/// within a tier the first region in `regions` wins.
pub fn resolve(regions: &[SnapCandidateRegion], px: i32, py: i32) -> Option<SnapCandidateRegion> {
    let mut fallback = None;
    for region in regions.iter().filter(|r| r.rect.contains(px, py)) {
        if region.action.is_precise() {
            return Some(*region);
        }
        fallback.get_or_insert(*region);
    }
    fallback
}

/// The drag in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    pub started: Instant,
    pub window: WindowHandle,
    pub candidate: Option<SnapCandidateRegion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    /// Button held, overlay not shown yet.
    Pending(DragSession),
    /// Overlay shown, candidate tracked.
    Active(DragSession),
}

pub struct DragSnapController {
    state: DragState,
    screen: ScreenRect,
    margin: i32,
    config: DragConfig,
    regions: Vec<SnapCandidateRegion>,
    pointer: (i32, i32),
    overlay_tx: Option<mpsc::Sender<OverlayEvent>>,
}

impl DragSnapController {
    pub fn new(screen: ScreenRect, margin: i32, config: DragConfig) -> Self {
        Self {
            state: DragState::Idle,
            screen,
            margin,
            config,
            regions: candidate_regions(screen, &config),
            pointer: (0, 0),
            overlay_tx: None,
        }
    }

    /// Publish overlay changes on `tx`.
    pub fn set_overlay_sender(&mut self, tx: mpsc::Sender<OverlayEvent>) {
        self.overlay_tx = Some(tx);
    }

    /// Recompute the regions for a new screen geometry.  Ignored while a
    /// drag is in progress.
    pub fn set_screen(&mut self, screen: ScreenRect) {
        if self.state != DragState::Idle || screen == self.screen {
            return;
        }
        self.screen = screen;
        self.regions = candidate_regions(screen, &self.config);
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn regions(&self) -> &[SnapCandidateRegion] {
        &self.regions
    }

    /// Primary button pressed over `window`.  A press while a drag is
    /// already in progress is ignored.
    pub fn on_button_down(&mut self, window: WindowHandle, now: Instant) {
        if self.state != DragState::Idle {
            debug!("drag: button down during {:?}, ignored", self.state);
            return;
        }
        debug!("drag: pending on window {}", window);
        self.state = DragState::Pending(DragSession {
            started: now,
            window,
            candidate: None,
        });
    }

    /// Pointer moved.  Tracked in every state so a later button press knows
    /// where it happened.
    pub fn on_motion(&mut self, x: i32, y: i32, now: Instant) {
        self.pointer = (x, y);
        self.tick(now);
        if let DragState::Active(session) = self.state {
            self.update_candidate(session);
        }
    }

    /// Promote a pending drag once the activation delay has elapsed.
    pub fn tick(&mut self, now: Instant) {
        let DragState::Pending(session) = self.state else {
            return;
        };
        if now.saturating_duration_since(session.started) < self.config.activation_delay() {
            return;
        }
        debug!("drag: active");
        self.state = DragState::Active(session);
        self.send(OverlayEvent::Show {
            screen: self.screen,
        });
        self.update_candidate(session);
    }

    /// Primary button released.  Returns the action to dispatch and the
    /// window it applies to, if the drag qualifies.
    pub fn on_button_up(&mut self, now: Instant) -> Option<(SnapAction, WindowHandle)> {
        self.tick(now);
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Idle => None,
            DragState::Pending(_) => {
                debug!("drag: released before activation");
                None
            }
            DragState::Active(session) => {
                self.send(OverlayEvent::Hide);
                let held = now.saturating_duration_since(session.started);
                let candidate = session.candidate?;
                if held <= self.config.min_duration() {
                    debug!("drag: released after {:?}, too short", held);
                    return None;
                }
                info!("drag: snapping {} to {}", session.window, candidate.action);
                Some((candidate.action, session.window))
            }
        }
    }

    /// Abandon any drag and hide the overlay.  Safe to call in any state.
    pub fn reset(&mut self) {
        if let DragState::Active(_) = std::mem::replace(&mut self.state, DragState::Idle) {
            self.send(OverlayEvent::Hide);
        }
    }

    /// How long a pending drag still has to wait, for callers that schedule
    /// ticks instead of polling.
    pub fn time_to_activation(&self, now: Instant) -> Option<Duration> {
        match self.state {
            DragState::Pending(s) => Some(
                self.config
                    .activation_delay()
                    .saturating_sub(now.saturating_duration_since(s.started)),
            ),
            _ => None,
        }
    }

    fn update_candidate(&mut self, mut session: DragSession) {
        let (px, py) = self.pointer;
        let candidate = resolve(&self.regions, px, py);
        if candidate == session.candidate {
            return;
        }
        session.candidate = candidate;
        self.state = DragState::Active(session);
        let preview = candidate.map(|region| SnapPreview {
            action: region.action,
            zone: region.rect,
            target: geometry::compute(self.screen, self.margin, region.action),
        });
        self.send(OverlayEvent::Highlight(preview));
    }

    fn send(&self, event: OverlayEvent) {
        if let Some(tx) = &self.overlay_tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FHD: ScreenRect = ScreenRect::new(0, 0, 1920, 1080);
    const WIN: WindowHandle = WindowHandle::new(42);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn controller() -> (DragSnapController, mpsc::Receiver<OverlayEvent>) {
        let mut c = DragSnapController::new(FHD, 5, DragConfig::default());
        let (tx, rx) = mpsc::channel();
        c.set_overlay_sender(tx);
        (c, rx)
    }

    fn action_at(x: i32, y: i32) -> Option<SnapAction> {
        let regions = candidate_regions(FHD, &DragConfig::default());
        resolve(&regions, x, y).map(|r| r.action)
    }

    //  Regions

    #[test]
    fn corners_resolve_to_quarters() {
        assert_eq!(action_at(10, 10), Some(SnapAction::QuarterTopLeft));
        assert_eq!(action_at(1910, 5), Some(SnapAction::QuarterTopRight));
        assert_eq!(action_at(0, 1080), Some(SnapAction::QuarterBottomLeft));
        assert_eq!(action_at(1900, 1000), Some(SnapAction::QuarterBottomRight));
    }

    #[test]
    fn edges_resolve_to_halves_maximize_center() {
        assert_eq!(action_at(5, 540), Some(SnapAction::SnapLeft));
        assert_eq!(action_at(1915, 540), Some(SnapAction::SnapRight));
        assert_eq!(action_at(960, 3), Some(SnapAction::Maximize));
        assert_eq!(action_at(960, 1075), Some(SnapAction::Center));
    }

    #[test]
    fn inner_strips_resolve_to_thirds() {
        assert_eq!(action_at(30, 540), Some(SnapAction::ThirdLeft));
        assert_eq!(action_at(1890, 540), Some(SnapAction::ThirdRight));
        assert_eq!(action_at(960, 30), Some(SnapAction::ThirdTop));
        assert_eq!(action_at(960, 1050), Some(SnapAction::ThirdBottom));
    }

    #[test]
    fn precise_region_wins_on_shared_border() {
        // x = 20 is the last column of the left edge strip and the first
        // column of the left-third strip.
        assert_eq!(action_at(20, 540), Some(SnapAction::ThirdLeft));
        // Corner overlaps both the left and top edge strips.
        assert_eq!(action_at(2, 2), Some(SnapAction::QuarterTopLeft));
    }

    #[test]
    fn middle_of_screen_has_no_candidate() {
        assert_eq!(action_at(960, 540), None);
    }

    #[test]
    fn oversized_config_does_not_overflow() {
        let cfg = DragConfig {
            edge_width: i32::MAX,
            corner_size: i32::MIN,
            ..DragConfig::default()
        };
        let regions = candidate_regions(FHD, &cfg);
        assert_eq!(regions.len(), 12);
        assert_eq!(
            resolve(&regions, 960, 540).map(|r| r.action),
            Some(SnapAction::SnapLeft)
        );
    }

    #[test]
    fn regions_follow_screen_offset() {
        let screen = ScreenRect::new(1920, 0, 1280, 1024);
        let regions = candidate_regions(screen, &DragConfig::default());
        assert_eq!(
            resolve(&regions, 1925, 500).map(|r| r.action),
            Some(SnapAction::SnapLeft)
        );
        assert_eq!(resolve(&regions, 5, 500), None);
    }

    //  State machine

    #[test]
    fn quick_click_never_dispatches() {
        let (mut c, rx) = controller();
        let t0 = Instant::now();
        c.on_motion(500, 500, t0);
        c.on_button_down(WIN, t0);
        c.on_motion(10, 10, t0 + ms(50));
        c.on_motion(5, 5, t0 + ms(150));
        assert_eq!(c.on_button_up(t0 + ms(190)), None);
        assert_eq!(c.state(), DragState::Idle);
        // The overlay never appeared.
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn corner_drag_dispatches_quarter() {
        let (mut c, rx) = controller();
        let t0 = Instant::now();
        c.on_motion(500, 500, t0);
        c.on_button_down(WIN, t0);
        c.on_motion(10, 10, t0 + ms(50));
        c.tick(t0 + ms(210));
        assert!(matches!(c.state(), DragState::Active(_)));

        assert_eq!(
            c.on_button_up(t0 + ms(250)),
            Some((SnapAction::QuarterTopLeft, WIN))
        );
        assert_eq!(c.state(), DragState::Idle);

        let events: Vec<OverlayEvent> = rx.try_iter().collect();
        assert_eq!(events.first(), Some(&OverlayEvent::Show { screen: FHD }));
        assert_eq!(
            events.get(1),
            Some(&OverlayEvent::Highlight(Some(SnapPreview {
                action: SnapAction::QuarterTopLeft,
                zone: ScreenRect::new(0, 0, 100, 100),
                target: ScreenRect::new(5, 5, 955, 535),
            })))
        );
        assert_eq!(events.last(), Some(&OverlayEvent::Hide));
    }

    #[test]
    fn promotion_happens_lazily_on_motion() {
        let (mut c, _rx) = controller();
        let t0 = Instant::now();
        c.on_button_down(WIN, t0);
        c.on_motion(1915, 540, t0 + ms(230));
        match c.state() {
            DragState::Active(s) => {
                assert_eq!(s.candidate.map(|r| r.action), Some(SnapAction::SnapRight));
            }
            other => panic!("expected active drag, got {:?}", other),
        }
        assert_eq!(
            c.on_button_up(t0 + ms(300)),
            Some((SnapAction::SnapRight, WIN))
        );
    }

    #[test]
    fn release_without_candidate_does_nothing() {
        let (mut c, rx) = controller();
        let t0 = Instant::now();
        c.on_button_down(WIN, t0);
        c.on_motion(960, 540, t0 + ms(300));
        assert_eq!(c.on_button_up(t0 + ms(400)), None);
        assert_eq!(rx.try_iter().last(), Some(OverlayEvent::Hide));
    }

    #[test]
    fn leaving_a_region_clears_the_highlight() {
        let (mut c, rx) = controller();
        let t0 = Instant::now();
        c.on_button_down(WIN, t0);
        c.on_motion(10, 10, t0 + ms(250));
        c.on_motion(960, 540, t0 + ms(260));
        c.on_motion(961, 541, t0 + ms(270));
        let events: Vec<OverlayEvent> = rx.try_iter().collect();
        assert_eq!(events.last(), Some(&OverlayEvent::Highlight(None)));
        let highlights = events
            .iter()
            .filter(|e| matches!(e, OverlayEvent::Highlight(_)))
            .count();
        // Entering the corner and leaving it; the second move changes nothing.
        assert_eq!(highlights, 2);
        assert_eq!(c.on_button_up(t0 + ms(300)), None);
    }

    #[test]
    fn minimum_duration_is_exclusive() {
        let config = DragConfig {
            activation_delay_ms: 100,
            ..DragConfig::default()
        };
        let mut c = DragSnapController::new(FHD, 5, config);
        let t0 = Instant::now();
        c.on_button_down(WIN, t0);
        c.on_motion(10, 10, t0 + ms(150));
        assert_eq!(c.on_button_up(t0 + ms(200)), None);
    }

    #[test]
    fn second_button_down_is_ignored() {
        let (mut c, _rx) = controller();
        let t0 = Instant::now();
        c.on_button_down(WIN, t0);
        c.on_button_down(WindowHandle::new(7), t0 + ms(100));
        match c.state() {
            DragState::Pending(s) => {
                assert_eq!(s.window, WIN);
                assert_eq!(s.started, t0);
            }
            other => panic!("expected pending drag, got {:?}", other),
        }
    }

    #[test]
    fn button_up_while_idle_is_harmless() {
        let (mut c, rx) = controller();
        assert_eq!(c.on_button_up(Instant::now()), None);
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn reset_hides_active_overlay() {
        let (mut c, rx) = controller();
        let t0 = Instant::now();
        c.on_button_down(WIN, t0);
        c.tick(t0 + ms(200));
        c.reset();
        assert_eq!(c.state(), DragState::Idle);
        assert_eq!(rx.try_iter().last(), Some(OverlayEvent::Hide));

        c.reset();
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn time_to_activation_counts_down() {
        let (mut c, _rx) = controller();
        let t0 = Instant::now();
        assert_eq!(c.time_to_activation(t0), None);
        c.on_button_down(WIN, t0);
        assert_eq!(c.time_to_activation(t0 + ms(50)), Some(ms(150)));
        assert_eq!(c.time_to_activation(t0 + ms(500)), Some(Duration::ZERO));
    }

    #[test]
    fn set_screen_is_deferred_during_drag() {
        let (mut c, _rx) = controller();
        let t0 = Instant::now();
        c.on_button_down(WIN, t0);
        c.set_screen(ScreenRect::new(0, 0, 800, 600));
        assert_eq!(c.regions()[1].rect.x, 1920 - 100);

        c.reset();
        c.set_screen(ScreenRect::new(0, 0, 800, 600));
        assert_eq!(c.regions()[1].rect.x, 800 - 100);
    }
}
