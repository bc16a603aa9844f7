//! Drag-snap preview overlay.
//!
//! When the `visualizer-gtk` feature is enabled, the
//! [`gtk::run_main_loop`] function takes over the main thread and drives
//! both event processing and preview rendering through the GLib main loop.
//! Without it the daemon runs a plain channel loop and overlay events are
//! only logged.

#[cfg(feature = "visualizer-gtk")]
pub mod gtk;
