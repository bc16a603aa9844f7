//! The fixed table of snap actions.
//!
//! A [`SnapAction`] is a pure key into the geometry table in
//! [`geometry`](crate::geometry).  The settings and tray layers use
//! [`SnapAction::ALL`] with [`SnapAction::label`] to list actions, and the
//! canonical [`name`](SnapAction::name) on the wire and in config files.
//!
//! Parsing is forgiving: case, `-`/`_`/space separators and the short
//! quarter forms (`quarter-tl`) are all accepted.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A named window-placement outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapAction {
    SnapLeft,
    SnapRight,
    Maximize,
    Center,
    QuarterTopLeft,
    QuarterTopRight,
    QuarterBottomLeft,
    QuarterBottomRight,
    ThirdLeft,
    ThirdRight,
    ThirdTop,
    ThirdBottom,
}

impl SnapAction {
    /// Every action, in menu order.
    pub const ALL: &'static [SnapAction] = &[
        SnapAction::SnapLeft,
        SnapAction::SnapRight,
        SnapAction::Maximize,
        SnapAction::Center,
        SnapAction::QuarterTopLeft,
        SnapAction::QuarterTopRight,
        SnapAction::QuarterBottomLeft,
        SnapAction::QuarterBottomRight,
        SnapAction::ThirdLeft,
        SnapAction::ThirdRight,
        SnapAction::ThirdTop,
        SnapAction::ThirdBottom,
    ];

    /// Canonical snake_case name, e.g. `"quarter_top_left"`.
    pub fn name(self) -> &'static str {
        match self {
            SnapAction::SnapLeft => "snap_left",
            SnapAction::SnapRight => "snap_right",
            SnapAction::Maximize => "maximize",
            SnapAction::Center => "center",
            SnapAction::QuarterTopLeft => "quarter_top_left",
            SnapAction::QuarterTopRight => "quarter_top_right",
            SnapAction::QuarterBottomLeft => "quarter_bottom_left",
            SnapAction::QuarterBottomRight => "quarter_bottom_right",
            SnapAction::ThirdLeft => "third_left",
            SnapAction::ThirdRight => "third_right",
            SnapAction::ThirdTop => "third_top",
            SnapAction::ThirdBottom => "third_bottom",
        }
    }

    /// Human-readable label for menus and settings.
    pub fn label(self) -> &'static str {
        match self {
            SnapAction::SnapLeft => "Snap to Left Half",
            SnapAction::SnapRight => "Snap to Right Half",
            SnapAction::Maximize => "Maximize Window",
            SnapAction::Center => "Center Window",
            SnapAction::QuarterTopLeft => "Top Left Quarter",
            SnapAction::QuarterTopRight => "Top Right Quarter",
            SnapAction::QuarterBottomLeft => "Bottom Left Quarter",
            SnapAction::QuarterBottomRight => "Bottom Right Quarter",
            SnapAction::ThirdLeft => "Left Third",
            SnapAction::ThirdRight => "Right Third",
            SnapAction::ThirdTop => "Top Third",
            SnapAction::ThirdBottom => "Bottom Third",
        }
    }

    /// Quarter and third actions outrank plain edge actions when drag
    /// regions overlap.
    pub fn is_precise(self) -> bool {
        matches!(
            self,
            SnapAction::QuarterTopLeft
                | SnapAction::QuarterTopRight
                | SnapAction::QuarterBottomLeft
                | SnapAction::QuarterBottomRight
                | SnapAction::ThirdLeft
                | SnapAction::ThirdRight
                | SnapAction::ThirdTop
                | SnapAction::ThirdBottom
        )
    }
}

impl fmt::Display for SnapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no known action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0:?}")]
pub struct UnknownAction(pub String);

fn parse_action(s: &str) -> Option<SnapAction> {
    let normalized: String = s
        .trim()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .flat_map(|c| c.to_lowercase())
        .collect();
    let action = match normalized.as_str() {
        "snap_left" | "left_half" => SnapAction::SnapLeft,
        "snap_right" | "right_half" => SnapAction::SnapRight,
        "maximize" | "maximise" => SnapAction::Maximize,
        "center" | "centre" => SnapAction::Center,
        "quarter_top_left" | "quarter_tl" => SnapAction::QuarterTopLeft,
        "quarter_top_right" | "quarter_tr" => SnapAction::QuarterTopRight,
        "quarter_bottom_left" | "quarter_bl" => SnapAction::QuarterBottomLeft,
        "quarter_bottom_right" | "quarter_br" => SnapAction::QuarterBottomRight,
        "third_left" => SnapAction::ThirdLeft,
        "third_right" => SnapAction::ThirdRight,
        "third_top" => SnapAction::ThirdTop,
        "third_bottom" => SnapAction::ThirdBottom,
        _ => return None,
    };
    Some(action)
}

impl FromStr for SnapAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_action(s).ok_or_else(|| UnknownAction(s.to_string()))
    }
}

impl Serialize for SnapAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for SnapAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_action(&s).ok_or_else(|| DeError::custom(format!("invalid action: {:?}", s)))
    }
}
