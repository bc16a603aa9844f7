//! The main orchestrator that ties input, chords, drags and the backend
//! together.
//!
//! [`Snapper`] is the single writer: every [`Event`] is handled here on the
//! main loop, in arrival order.  Chord and drag results are not applied
//! immediately; they are queued and applied by [`Snapper::run_idle`], which
//! the host loop calls once it has drained the pending events.  A burst of
//! input therefore never interleaves with window mutations.

use crate::action::{SnapAction, UnknownAction};
use crate::backend::WindowHandle;
use crate::command::{Command, Event};
use crate::config::{Config, DragConfig, DEFAULT_HOTKEYS};
use crate::dispatch::{ActionDispatcher, DispatchOutcome};
use crate::drag::{DragSnapController, DragState};
use crate::geometry::ScreenRect;
use crate::hotkey::{ChordBinding, ChordError, ChordRecognizer};
use crate::input::{InputEvent, MouseButton};
use crate::traits::{DisplayBackend, OverlayEvent};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::time::Instant;

/// Possible errors from the registration API.
#[derive(Debug, thiserror::Error)]
pub enum SnapperError {
    #[error(transparent)]
    Chord(#[from] ChordError),
    #[error(transparent)]
    Action(#[from] UnknownAction),
}

/// Whether the host loop should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// An action waiting for [`Snapper::run_idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    /// From a chord: applies to whatever is focused when it runs.
    Focused(SnapAction),
    /// From a drag: applies to the window the drag started on.
    Window(SnapAction, WindowHandle),
}

/// Orchestrates chord recognition, drag-to-snap and action dispatch.
///
/// Generic over any [`DisplayBackend`], so tests drive it with a recording
/// mock and the daemon with whatever session backend was detected.
///
/// # Typical usage
///
/// ```ignore
/// let mut snapper = Snapper::new(backend, &config);
/// snapper.register_defaults();
/// snapper.handle(event, Instant::now());
/// snapper.run_idle();
/// ```
pub struct Snapper<B: DisplayBackend> {
    dispatcher: ActionDispatcher<B>,
    recognizer: ChordRecognizer<SnapAction>,
    drag: Option<DragSnapController>,
    drag_config: DragConfig,
    overlay_tx: Option<mpsc::Sender<OverlayEvent>>,
    deferred: VecDeque<Deferred>,
}

impl<B: DisplayBackend> Snapper<B> {
    /// Create a snapper with no chord bindings.  Drag-to-snap is enabled
    /// if `config` says so.
    pub fn new(backend: B, config: &Config) -> Self {
        let mut snapper = Self {
            dispatcher: ActionDispatcher::new(backend, config.window_margin),
            recognizer: ChordRecognizer::new(),
            drag: None,
            drag_config: config.drag,
            overlay_tx: None,
            deferred: VecDeque::new(),
        };
        snapper.enable_drag_snap(config.enable_drag_snap);
        snapper
    }

    /// Attach an overlay event channel.
    ///
    /// The drag controller sends [`OverlayEvent::Show`] when a drag becomes
    /// active, [`OverlayEvent::Highlight`] whenever the candidate under the
    /// pointer changes and [`OverlayEvent::Hide`] when the drag ends.
    pub fn set_overlay(&mut self, tx: mpsc::Sender<OverlayEvent>) {
        if let Some(drag) = &mut self.drag {
            drag.set_overlay_sender(tx.clone());
        }
        self.overlay_tx = Some(tx);
    }

    pub fn dispatcher(&self) -> &ActionDispatcher<B> {
        &self.dispatcher
    }

    pub fn recognizer(&self) -> &ChordRecognizer<SnapAction> {
        &self.recognizer
    }

    pub fn drag(&self) -> Option<&DragSnapController> {
        self.drag.as_ref()
    }

    /// Screen geometry as the backend currently reports it.
    pub fn screen_geometry(&self) -> ScreenRect {
        self.dispatcher.screen_geometry()
    }

    //  Registration API

    /// Bind `chord` to `action`.  Returns the action the chord was bound to
    /// before, if any.
    pub fn register_binding(&mut self, chord: ChordBinding, action: SnapAction) -> Option<SnapAction> {
        debug!("bind {} -> {}", chord, action);
        self.recognizer.register(chord, action)
    }

    /// Bind from strings, as stored by the settings layer.
    pub fn register_binding_str(&mut self, chord: &str, action: &str) -> Result<(), SnapperError> {
        let chord = ChordBinding::parse(chord)?;
        let action: SnapAction = action.parse()?;
        self.register_binding(chord, action);
        Ok(())
    }

    /// Remove every chord bound to `action`.  Returns how many were removed.
    pub fn unregister(&mut self, action: SnapAction) -> usize {
        let removed = self.recognizer.unregister_where(|a| *a == action);
        debug!("unbound {} chord(s) from {}", removed, action);
        removed
    }

    /// Remove all chord bindings.
    pub fn clear_all(&mut self) {
        self.recognizer.clear_bindings();
    }

    /// Install the built-in chord table.
    pub fn register_defaults(&mut self) {
        for &(action, chord) in DEFAULT_HOTKEYS {
            match ChordBinding::parse(chord) {
                Ok(chord) => {
                    self.register_binding(chord, action);
                }
                Err(e) => warn!("default chord for {}: {}", action, e),
            }
        }
    }

    /// Replace all bindings with the table from `config`.  Chords that fail
    /// to parse are reported and skipped.
    pub fn load_hotkeys(&mut self, config: &Config) {
        self.clear_all();
        for (action, chord) in config.hotkey_bindings() {
            match chord {
                Ok(chord) => {
                    self.register_binding(chord, action);
                }
                Err(e) => warn!("hotkey for {} ignored: {}", action, e),
            }
        }
        info!("{} hotkey(s) registered", self.recognizer.bindings().count());
    }

    /// Construct (`true`) or tear down (`false`) the drag controller.
    pub fn enable_drag_snap(&mut self, enable: bool) {
        match (enable, self.drag.is_some()) {
            (true, false) => {
                let screen = self.dispatcher.screen_geometry();
                let mut drag = DragSnapController::new(screen, self.dispatcher.margin(), self.drag_config);
                if let Some(tx) = &self.overlay_tx {
                    drag.set_overlay_sender(tx.clone());
                }
                self.drag = Some(drag);
                info!("drag-to-snap enabled on {}", screen);
            }
            (false, true) => {
                if let Some(mut drag) = self.drag.take() {
                    drag.reset();
                }
                info!("drag-to-snap disabled");
            }
            _ => {}
        }
    }

    //  Event handling

    /// Handle one event.  Returns [`LoopControl::Exit`] after a shutdown
    /// request.
    pub fn handle(&mut self, event: Event, now: Instant) -> LoopControl {
        match event {
            Event::Input(input) => self.handle_input(input, now),
            Event::Command(cmd) => self.handle_command(cmd),
            Event::Shutdown => {
                info!("shutdown requested");
                self.shutdown();
                return LoopControl::Exit;
            }
        }
        LoopControl::Continue
    }

    /// One host-loop iteration: drain every event already queued on `rx`
    /// without blocking, advance drag timing, then apply deferred actions.
    ///
    /// A closed channel is treated like a shutdown request.
    pub fn pump(&mut self, rx: &mpsc::Receiver<Event>) -> LoopControl {
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    if self.handle(event, Instant::now()) == LoopControl::Exit {
                        return LoopControl::Exit;
                    }
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    info!("all event sources closed");
                    self.shutdown();
                    return LoopControl::Exit;
                }
            }
        }
        self.tick(Instant::now());
        self.run_idle();
        LoopControl::Continue
    }

    fn handle_input(&mut self, input: InputEvent, now: Instant) {
        match input {
            InputEvent::KeyDown(raw) => {
                if let Some(action) = self.recognizer.on_key_down(raw) {
                    self.deferred.push_back(Deferred::Focused(action));
                }
            }
            InputEvent::KeyUp(raw) => self.recognizer.on_key_up(raw),
            InputEvent::ButtonDown(MouseButton::Left) => {
                let Some(drag) = &mut self.drag else { return };
                if drag.state() != DragState::Idle {
                    return;
                }
                // Clicking the desktop or a panel leaves nothing to drag.
                if let Some(window) = self.dispatcher.focused_window() {
                    drag.on_button_down(window, now);
                }
            }
            InputEvent::ButtonUp(MouseButton::Left) => {
                if let Some(drag) = &mut self.drag {
                    if let Some((action, window)) = drag.on_button_up(now) {
                        self.deferred.push_back(Deferred::Window(action, window));
                    }
                }
            }
            InputEvent::Motion { x, y } => {
                if let Some(drag) = &mut self.drag {
                    drag.on_motion(x, y, now);
                }
            }
            InputEvent::ButtonDown(_) | InputEvent::ButtonUp(_) => {}
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        debug!("command {:?}", cmd);
        match cmd {
            Command::Dispatch(action) => self.deferred.push_back(Deferred::Focused(action)),
            Command::Bind { chord, action } => {
                if let Some(old) = self.register_binding(chord, action) {
                    info!("rebound chord from {} to {}", old, action);
                }
            }
            Command::Unbind(action) => {
                self.unregister(action);
            }
            Command::ClearBindings => self.clear_all(),
            Command::EnableDragSnap(enable) => self.enable_drag_snap(enable),
            Command::LogGeometry => {
                let screen = self.dispatcher.screen_geometry();
                info!(
                    "backend {}: screen {}, focused window {:?}",
                    self.dispatcher.backend().name(),
                    screen,
                    self.dispatcher.focused_window()
                );
                if let Some(drag) = &mut self.drag {
                    drag.set_screen(screen);
                }
            }
        }
    }

    /// Advance time-based drag state.  Call on every loop iteration.
    pub fn tick(&mut self, now: Instant) {
        if let Some(drag) = &mut self.drag {
            drag.tick(now);
        }
    }

    /// Apply every queued action, oldest first.
    pub fn run_idle(&mut self) -> Vec<(SnapAction, DispatchOutcome)> {
        let mut done = Vec::with_capacity(self.deferred.len());
        while let Some(next) = self.deferred.pop_front() {
            let (action, outcome) = match next {
                Deferred::Focused(action) => (action, self.dispatcher.dispatch(action)),
                Deferred::Window(action, window) => (action, self.dispatcher.dispatch_to(action, window)),
            };
            done.push((action, outcome));
        }
        done
    }

    /// Stop reacting to input: forget held keys and queued actions, end any
    /// drag and hide the overlay.  Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.recognizer.reset();
        self.deferred.clear();
        if let Some(drag) = &mut self.drag {
            drag.reset();
        }
    }
}

//  Tests
