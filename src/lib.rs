//! **themis**: keyboard and drag-driven window snapping.
//!
//! Global chords (`Super+Left`, `Ctrl+Alt+Up`, …) and dragging a window into
//! a screen edge or corner both place the focused window into one of a fixed
//! set of layouts: halves, quarters, thirds, centred or maximized.
//!
//! # Architecture
//!
//! The crate is organised around two core traits:
//!
//! * [`traits::DisplayBackend`]: abstracts screen geometry, focus and
//!   window placement so snapping is not coupled to any display server.
//! * [`traits::EventSource`]: abstracts the producers feeding the single
//!   consumer loop (the global input hook, the control socket, signals).
//!
//! The consumer is [`snapper::Snapper`].  It feeds key events to the
//! [`hotkey::ChordRecognizer`], pointer events to the
//! [`drag::DragSnapController`], and runs the resulting actions through the
//! [`dispatch::ActionDispatcher`] once the queued events are drained.
//!
//! Concrete backends live in [`backend`] (X11 via EWMH, sway via its IPC
//! socket, and a headless stand-in), the input hook in [`input`], and the
//! control socket in [`ipc`].

pub mod action;
pub mod backend;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod drag;
pub mod geometry;
pub mod hotkey;
pub mod input;
pub mod ipc;
pub mod snapper;
pub mod traits;
pub mod visualizer;
