//! Application configuration.
//!
//! The configuration is read from `$XDG_CONFIG_HOME/themis/config.json`
//! (falling back to `~/.config/themis/config.json`).  Writing, merging and
//! migrating the file belong to the settings tool; the daemon only reads it.
//!
//! # Example
//!
//! ```json
//! {
//!   "window_margin": 8,
//!   "enable_drag_snap": true,
//!   "hotkeys": {
//!     "snap_left": "Super+H",
//!     "snap_right": "Super+L",
//!     "center": ""
//!   },
//!   "drag": { "activation_delay_ms": 250 },
//!   "visualizer": { "fill": "rgba(53, 132, 228, 0.25)" }
//! }
//! ```

use crate::action::SnapAction;
use crate::hotkey::{ChordBinding, ChordError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
///
/// Every field is optional: a minimal `{}` file is valid and all sections
/// fall back to their compiled-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gap in pixels left around snapped windows.
    pub window_margin: i32,

    /// Whether drag-to-snap starts enabled.
    pub enable_drag_snap: bool,

    /// Per-action chord overrides keyed by action name, merged over
    /// [`DEFAULT_HOTKEYS`].  An empty string removes that action's default
    /// chord; unknown action names are skipped with a warning.
    pub hotkeys: BTreeMap<String, String>,

    /// Drag-to-snap timing and region sizes.
    pub drag: DragConfig,

    /// Overlay colours.
    pub visualizer: VisualizerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_margin: 5,
            enable_drag_snap: true,
            hotkeys: BTreeMap::new(),
            drag: DragConfig::default(),
            visualizer: VisualizerConfig::default(),
        }
    }
}

/// Chords installed when the configuration does not override them.
///
/// Order matters: the first satisfied binding wins, so the table is
/// registered top to bottom.
pub const DEFAULT_HOTKEYS: &[(SnapAction, &str)] = &[
    (SnapAction::SnapLeft, "Super+Left"),
    (SnapAction::SnapRight, "Super+Right"),
    (SnapAction::Maximize, "Super+Up"),
    (SnapAction::Center, "Super+Down"),
    (SnapAction::QuarterTopLeft, "Super+1"),
    (SnapAction::QuarterTopRight, "Super+2"),
    (SnapAction::QuarterBottomLeft, "Super+3"),
    (SnapAction::QuarterBottomRight, "Super+4"),
    (SnapAction::ThirdLeft, "Ctrl+Alt+Left"),
    (SnapAction::ThirdRight, "Ctrl+Alt+Right"),
    (SnapAction::ThirdTop, "Ctrl+Alt+Up"),
    (SnapAction::ThirdBottom, "Ctrl+Alt+Down"),
];

/// Drag-to-snap settings.  Durations are in **milliseconds**, sizes in
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Button hold time before a press counts as a drag and the overlay
    /// appears.
    pub activation_delay_ms: u64,
    /// Minimum total drag duration for a release to dispatch.
    pub min_duration_ms: u64,
    /// Thickness of the edge strips.
    pub edge_width: i32,
    /// Side length of the corner squares.
    pub corner_size: i32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            activation_delay_ms: 200,
            min_duration_ms: 200,
            edge_width: 20,
            corner_size: 100,
        }
    }
}

impl DragConfig {
    pub fn activation_delay(&self) -> Duration {
        Duration::from_millis(self.activation_delay_ms)
    }

    pub fn min_duration(&self) -> Duration {
        Duration::from_millis(self.min_duration_ms)
    }
}

/// Overlay colours, as CSS colour strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Fill of the snap preview rectangle.
    pub fill: String,
    /// Outline of the snap preview rectangle.
    pub border: String,
    /// Outline width in pixels.
    pub border_width: i32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            fill: "rgba(53, 132, 228, 0.25)".into(),
            border: "rgba(53, 132, 228, 0.9)".into(),
            border_width: 3,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/themis`, or `~/.config/themis`.
    pub fn dir() -> PathBuf {
        let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            format!("{}/.config", home)
        });
        PathBuf::from(base).join("themis")
    }

    /// The effective chord table: defaults in their fixed order with
    /// overrides applied, then any override for an action the defaults
    /// do not bind.  Unparseable chords are returned as errors so the
    /// caller can report them individually.
    pub fn hotkey_bindings(&self) -> Vec<(SnapAction, Result<ChordBinding, ChordError>)> {
        let overrides = self.hotkey_overrides();
        let mut out = Vec::new();
        for &(action, default) in DEFAULT_HOTKEYS {
            let chord = overrides.get(&action).copied().unwrap_or(default);
            if !chord.trim().is_empty() {
                out.push((action, ChordBinding::parse(chord)));
            }
        }
        for (&action, chord) in &overrides {
            let has_default = DEFAULT_HOTKEYS.iter().any(|&(a, _)| a == action);
            if !has_default && !chord.trim().is_empty() {
                out.push((action, ChordBinding::parse(chord)));
            }
        }
        out
    }

    /// Resolve the override names.  Entries naming no known action are
    /// dropped one by one so the rest of the file still applies.
    fn hotkey_overrides(&self) -> BTreeMap<SnapAction, &str> {
        let mut overrides = BTreeMap::new();
        for (name, chord) in &self.hotkeys {
            match name.parse::<SnapAction>() {
                Ok(action) => {
                    overrides.insert(action, chord.as_str());
                }
                Err(e) => warn!("hotkey {:?} ignored: {}", chord, e),
            }
        }
        overrides
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
