//! Pure snap geometry.
//!
//! [`compute`] maps a screen rectangle, a margin and a [`SnapAction`] to the
//! rectangle the focused window should occupy.  All arithmetic is integer
//! arithmetic with floor division; nothing here talks to a display server.
//!
//! | Action        | Cell                         | Margin                     |
//! |---------------|------------------------------|----------------------------|
//! | halves        | `w/2 × h`                    | every edge                 |
//! | quarters      | `w/2 × h/2`                  | the two outer screen edges |
//! | third-l/r     | `w/3 × h`                    | every edge                 |
//! | third-t/b     | `w × h/3`                    | every edge                 |
//! | maximize      | `w × h`                      | none                       |
//! | center        | `2w/3 × 2h/3`, centred       | none                       |
//!
//! Degenerate results (zero or negative width/height after margins) are
//! returned as-is.  Callers treat them as a no-op when applying.

use crate::action::SnapAction;
use std::fmt;

/// An axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// X coordinate of the right edge (`x + width`).
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Y coordinate of the bottom edge (`y + height`).
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Whether the point lies inside the rectangle.  Both edges are
    /// inclusive, so a pointer resting on the last pixel column of a strip
    /// still counts.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    /// `true` if applying this rect to a window would be meaningless.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

impl fmt::Display for ScreenRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Errors from the geometry table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The action name is not one of the fixed snap actions.
    #[error("unknown action: {0:?}")]
    UnknownAction(String),
}

/// Compute the target rectangle for `action` on `screen`.
///
/// The result is not clamped: a margin too large for the screen yields a
/// degenerate rectangle.  The margin is bounded by the screen's larger side
/// first so the arithmetic cannot overflow.
pub fn compute(screen: ScreenRect, margin: i32, action: SnapAction) -> ScreenRect {
    let ScreenRect {
        x,
        y,
        width: w,
        height: h,
    } = screen;
    let limit = w.max(h).max(0);
    let m = margin.clamp(-limit, limit);

    let half_w = w / 2;
    let half_h = h / 2;
    let third_w = w / 3;
    let third_h = h / 3;

    match action {
        SnapAction::SnapLeft => ScreenRect::new(x + m, y + m, half_w - 2 * m, h - 2 * m),
        SnapAction::SnapRight => {
            ScreenRect::new(x + half_w + m, y + m, half_w - 2 * m, h - 2 * m)
        }
        SnapAction::Maximize => screen,
        SnapAction::Center => {
            let cw = w * 2 / 3;
            let ch = h * 2 / 3;
            ScreenRect::new(x + (w - cw) / 2, y + (h - ch) / 2, cw, ch)
        }
        SnapAction::QuarterTopLeft => ScreenRect::new(x + m, y + m, half_w - m, half_h - m),
        SnapAction::QuarterTopRight => ScreenRect::new(x + half_w, y + m, half_w - m, half_h - m),
        SnapAction::QuarterBottomLeft => {
            ScreenRect::new(x + m, y + half_h, half_w - m, half_h - m)
        }
        SnapAction::QuarterBottomRight => {
            ScreenRect::new(x + half_w, y + half_h, half_w - m, half_h - m)
        }
        SnapAction::ThirdLeft => ScreenRect::new(x + m, y + m, third_w - 2 * m, h - 2 * m),
        SnapAction::ThirdRight => {
            ScreenRect::new(x + w * 2 / 3 + m, y + m, third_w - 2 * m, h - 2 * m)
        }
        SnapAction::ThirdTop => ScreenRect::new(x + m, y + m, w - 2 * m, third_h - 2 * m),
        SnapAction::ThirdBottom => {
            ScreenRect::new(x + m, y + h * 2 / 3 + m, w - 2 * m, third_h - 2 * m)
        }
    }
}

/// Like [`compute`], but resolves the action from its name first.
pub fn compute_named(screen: ScreenRect, margin: i32, name: &str) -> Result<ScreenRect, GeometryError> {
    let action = name
        .parse::<SnapAction>()
        .map_err(|_| GeometryError::UnknownAction(name.to_string()))?;
    Ok(compute(screen, margin, action))
}
