//! GTK4 + layer-shell snap preview that runs on the **main thread**.
//!
//! The GLib main loop is the host event loop: a 16 ms timer pumps the
//! [`Snapper`] (events, drag ticks, deferred actions) and then applies the
//! [`OverlayEvent`]s it produced.
//!
//! # Widget tree
//!
//! ```text
//! window                       (full output, click-through)
//! └ gtk4::Fixed
//!     └ .snap-preview          (where the window would land)
//!         └ .snap-label        (action label)
//! ```
//!
//! # CSS selectors
//!
//! | Selector         | Targets                                   |
//! |------------------|-------------------------------------------|
//! | `window`         | The overlay window (keep transparent)     |
//! | `.snap-preview`  | The target rectangle                      |
//! | `.snap-label`    | Action name inside the target rectangle   |
//!
//! Colours come from [`VisualizerConfig`]; a `style.css` next to the config
//! file is loaded on top and wins.

use crate::command::Event;
use crate::config::VisualizerConfig;
use crate::drag::SnapPreview;
use crate::geometry::ScreenRect;
use crate::input::listener::InputListener;
use crate::snapper::{LoopControl, Snapper};
use crate::traits::{DisplayBackend, OverlayEvent};
use gtk4::prelude::*;
use gtk4::{cairo, gdk, glib};
use gtk4_layer_shell::{Edge, LayerShell};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

/// Error from GTK start-up.
#[derive(Debug, thiserror::Error)]
#[error("GTK error: {0}")]
pub struct VisualizerError(String);

/// Initialise GTK.  Fails when no display is reachable; callers then run
/// without an overlay.
pub fn init() -> Result<(), VisualizerError> {
    gtk4::init().map_err(|e| VisualizerError(e.to_string()))?;
    info!("GTK4 initialised on main thread");
    Ok(())
}

fn default_css(config: &VisualizerConfig) -> String {
    format!(
        r#"
window,
window.background {{
    background-color: transparent;
    background: none;
}}

.snap-preview {{
    background-color: {fill};
    border: {width}px solid {border};
    border-radius: 12px;
}}

.snap-label {{
    color: white;
    font-weight: bold;
    font-size: 18px;
}}
"#,
        fill = config.fill,
        border = config.border,
        width = config.border_width,
    )
}

//  Overlay window

/// How the overlay window is kept above everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverlaySurface {
    /// Wayland layer-shell surface on the overlay layer.
    LayerShell,
    /// Plain undecorated window made fullscreen while a drag is active
    /// (X11 and compositors without layer-shell).
    Fullscreen,
}

impl OverlaySurface {
    fn detect(layer_shell_supported: bool) -> Self {
        if layer_shell_supported {
            OverlaySurface::LayerShell
        } else {
            OverlaySurface::Fullscreen
        }
    }
}

struct PreviewOverlay {
    window: gtk4::Window,
    fixed: gtk4::Fixed,
    preview: gtk4::Box,
    label: gtk4::Label,
    origin: (i32, i32),
    surface: OverlaySurface,
}

impl PreviewOverlay {
    fn new() -> Self {
        let surface = OverlaySurface::detect(gtk4_layer_shell::is_supported());
        info!("overlay surface: {:?}", surface);

        let window = gtk4::Window::new();
        if surface == OverlaySurface::LayerShell {
            window.init_layer_shell();
            window.set_layer(gtk4_layer_shell::Layer::Overlay);
            window.set_namespace("themis");
            window.set_keyboard_mode(gtk4_layer_shell::KeyboardMode::None);
            window.set_exclusive_zone(-1);
            for edge in [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right] {
                window.set_anchor(edge, true);
            }
        }
        window.set_decorated(false);
        window.set_can_focus(false);
        window.set_can_target(false);
        window.remove_css_class("background");

        let fixed = gtk4::Fixed::new();
        fixed.set_can_target(false);

        let preview = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
        preview.add_css_class("snap-preview");
        preview.set_can_target(false);
        preview.set_visible(false);

        let label = gtk4::Label::new(None);
        label.add_css_class("snap-label");
        label.set_vexpand(true);
        label.set_valign(gtk4::Align::Center);
        preview.append(&label);

        fixed.put(&preview, 0.0, 0.0);
        window.set_child(Some(&fixed));

        // Pointer events must reach the window being dragged underneath.
        window.connect_realize(|w| {
            if let Some(surface) = w.surface() {
                surface.set_input_region(&cairo::Region::create());
            }
        });

        Self {
            window,
            fixed,
            preview,
            label,
            origin: (0, 0),
            surface,
        }
    }

    fn apply(&mut self, event: OverlayEvent) {
        debug!("overlay: {:?}", event);
        match event {
            OverlayEvent::Show { screen } => {
                self.origin = (screen.x, screen.y);
                self.preview.set_visible(false);
                if self.surface == OverlaySurface::Fullscreen {
                    self.window.set_default_size(screen.width, screen.height);
                    self.window.fullscreen();
                }
                self.window.set_visible(true);
                self.window.present();
            }
            OverlayEvent::Highlight(Some(preview)) => self.highlight(preview),
            OverlayEvent::Highlight(None) => self.preview.set_visible(false),
            OverlayEvent::Hide => {
                self.preview.set_visible(false);
                self.window.set_visible(false);
            }
        }
    }

    fn highlight(&self, preview: SnapPreview) {
        let target = preview.target;
        let (dx, dy) = preview_offset(self.origin, target);
        self.preview.set_size_request(target.width.max(1), target.height.max(1));
        self.fixed.move_(&self.preview, dx, dy);
        self.label.set_text(preview.action.label());
        self.preview.set_visible(true);
    }
}

/// Position of `target` inside an overlay window whose top-left corner sits
/// at `origin` in screen coordinates.
fn preview_offset(origin: (i32, i32), target: ScreenRect) -> (f64, f64) {
    (
        f64::from(target.x - origin.0),
        f64::from(target.y - origin.1),
    )
}

//  Public API

/// Run the GTK4 main loop on the **current** (main) thread until a shutdown
/// request arrives or every event source has gone away.
///
/// [`init`] must have succeeded first.
pub fn run_main_loop<B: DisplayBackend + 'static>(
    mut snapper: Snapper<B>,
    event_rx: mpsc::Receiver<Event>,
    listener: InputListener,
    css_path: Option<PathBuf>,
    vis_config: VisualizerConfig,
) {
    load_css(&css_path, &vis_config);

    let mut overlay = PreviewOverlay::new();
    let (overlay_tx, overlay_rx) = mpsc::channel::<OverlayEvent>();
    snapper.set_overlay(overlay_tx);

    info!(
        "overlay ready (fill {}, border {}, CSS: {})",
        vis_config.fill,
        vis_config.border,
        css_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<built-in>".into()),
    );

    let main_loop = glib::MainLoop::new(None, false);
    let quit = main_loop.clone();

    //  Main event loop (~60 fps)
    glib::timeout_add_local(Duration::from_millis(16), move || {
        let control = snapper.pump(&event_rx);

        while let Ok(event) = overlay_rx.try_recv() {
            overlay.apply(event);
        }

        if control == LoopControl::Exit {
            listener.stop();
            quit.quit();
            return glib::ControlFlow::Break;
        }
        glib::ControlFlow::Continue
    });

    info!("entering GLib main loop");
    main_loop.run();
    info!("GLib main loop exited");
}

//  CSS loading

fn load_css(css_path: &Option<PathBuf>, config: &VisualizerConfig) {
    let Some(display) = gdk::Display::default() else {
        warn!("no GDK display, CSS will not be applied");
        return;
    };

    let base = gtk4::CssProvider::new();
    #[allow(deprecated)]
    base.load_from_data(&default_css(config));
    gtk4::style_context_add_provider_for_display(
        &display,
        &base,
        gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );

    let Some(path) = css_path.as_ref().filter(|p| p.exists()) else {
        return;
    };
    match std::fs::read_to_string(path) {
        Ok(content) => {
            info!("user CSS: {} ({} bytes)", path.display(), content.len());
            let user = gtk4::CssProvider::new();
            #[allow(deprecated)]
            user.load_from_data(&content);
            gtk4::style_context_add_provider_for_display(
                &display,
                &user,
                gtk4::STYLE_PROVIDER_PRIORITY_USER,
            );
        }
        Err(e) => warn!("CSS read failed ({}): {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_css_uses_configured_colours() {
        let css = default_css(&VisualizerConfig {
            fill: "rgba(1, 2, 3, 0.5)".into(),
            border: "#ff0000".into(),
            border_width: 4,
        });
        assert!(css.contains("background-color: rgba(1, 2, 3, 0.5);"));
        assert!(css.contains("border: 4px solid #ff0000;"));
    }

    #[test]
    fn without_layer_shell_falls_back_to_fullscreen_window() {
        assert_eq!(OverlaySurface::detect(true), OverlaySurface::LayerShell);
        assert_eq!(OverlaySurface::detect(false), OverlaySurface::Fullscreen);
    }

    #[test]
    fn preview_is_placed_relative_to_output() {
        let target = ScreenRect::new(2565, 5, 950, 1070);
        assert_eq!(preview_offset((2560, 0), target), (5.0, 5.0));
        assert_eq!(preview_offset((0, 0), target), (2565.0, 5.0));
    }
}
