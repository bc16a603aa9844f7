//! Physical keys and their normalized identities.
//!
//! The input layer reports [`RawKey`]s, which still distinguish left and
//! right modifiers and carry printable characters in whatever case the
//! keyboard produced.  [`KeyIdentity::normalize`] collapses them so that
//! "the same logical key" always compares equal:
//!
//! * left/right Super, Ctrl, Alt and Shift map to one [`Modifier`] each;
//! * printable characters are lower-cased.

use std::fmt;

/// One of the four chord modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Super,
    Ctrl,
    Alt,
    Shift,
}

/// Which physical copy of a modifier was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Non-printable keys that can take part in a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedKey {
    Left,
    Right,
    Up,
    Down,
    Enter,
    Space,
    Tab,
    Escape,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    /// Function key `F1`–`F24`.
    F(u8),
}

/// A key exactly as the global listener saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKey {
    Modifier(Modifier, Side),
    Char(char),
    Named(NamedKey),
    /// A key the listener could not classify, identified by its scan code.
    Unknown(u32),
}

/// A canonical key, the unit chords are built from.
///
/// The derived ordering puts modifiers first (Super, Ctrl, Alt, Shift), which
/// is also the order chords are displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyIdentity {
    Modifier(Modifier),
    Named(NamedKey),
    Char(char),
    Unknown(u32),
}

impl KeyIdentity {
    pub const SUPER: KeyIdentity = KeyIdentity::Modifier(Modifier::Super);
    pub const CTRL: KeyIdentity = KeyIdentity::Modifier(Modifier::Ctrl);
    pub const ALT: KeyIdentity = KeyIdentity::Modifier(Modifier::Alt);
    pub const SHIFT: KeyIdentity = KeyIdentity::Modifier(Modifier::Shift);

    /// Collapse a physical key to its logical identity.
    pub fn normalize(raw: RawKey) -> Self {
        match raw {
            RawKey::Modifier(m, _) => KeyIdentity::Modifier(m),
            RawKey::Char(c) => KeyIdentity::Char(lower(c)),
            RawKey::Named(k) => KeyIdentity::Named(k),
            RawKey::Unknown(code) => KeyIdentity::Unknown(code),
        }
    }

    /// Parse one `+`-separated token of a chord string (`"ctrl"`, `"Left"`,
    /// `"f5"`, `"1"`).  Case-insensitive.
    pub fn parse_token(token: &str) -> Option<Self> {
        let t = token.trim().to_lowercase();
        let key = match t.as_str() {
            "super" | "cmd" | "meta" | "win" | "logo" => Self::SUPER,
            "ctrl" | "control" => Self::CTRL,
            "alt" | "option" => Self::ALT,
            "shift" => Self::SHIFT,
            "left" => KeyIdentity::Named(NamedKey::Left),
            "right" => KeyIdentity::Named(NamedKey::Right),
            "up" => KeyIdentity::Named(NamedKey::Up),
            "down" => KeyIdentity::Named(NamedKey::Down),
            "enter" | "return" => KeyIdentity::Named(NamedKey::Enter),
            "space" => KeyIdentity::Named(NamedKey::Space),
            "tab" => KeyIdentity::Named(NamedKey::Tab),
            "esc" | "escape" => KeyIdentity::Named(NamedKey::Escape),
            "backspace" => KeyIdentity::Named(NamedKey::Backspace),
            "delete" | "del" => KeyIdentity::Named(NamedKey::Delete),
            "insert" | "ins" => KeyIdentity::Named(NamedKey::Insert),
            "home" => KeyIdentity::Named(NamedKey::Home),
            "end" => KeyIdentity::Named(NamedKey::End),
            "pageup" | "pgup" => KeyIdentity::Named(NamedKey::PageUp),
            "pagedown" | "pgdn" => KeyIdentity::Named(NamedKey::PageDown),
            _ => return parse_function_key(&t).or_else(|| parse_char(&t)),
        };
        Some(key)
    }
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn parse_function_key(t: &str) -> Option<KeyIdentity> {
    let n: u8 = t.strip_prefix('f')?.parse().ok()?;
    (1..=24)
        .contains(&n)
        .then_some(KeyIdentity::Named(NamedKey::F(n)))
}

fn parse_char(t: &str) -> Option<KeyIdentity> {
    let mut chars = t.chars();
    let c = chars.next()?;
    if chars.next().is_some() || !c.is_alphanumeric() {
        return None;
    }
    Some(KeyIdentity::Char(lower(c)))
}

impl fmt::Display for KeyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyIdentity::Modifier(Modifier::Super) => f.write_str("Super"),
            KeyIdentity::Modifier(Modifier::Ctrl) => f.write_str("Ctrl"),
            KeyIdentity::Modifier(Modifier::Alt) => f.write_str("Alt"),
            KeyIdentity::Modifier(Modifier::Shift) => f.write_str("Shift"),
            KeyIdentity::Named(NamedKey::F(n)) => write!(f, "F{}", n),
            KeyIdentity::Named(k) => write!(f, "{:?}", k),
            KeyIdentity::Char(c) => write!(f, "{}", c.to_uppercase()),
            KeyIdentity::Unknown(code) => write!(f, "<{}>", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_and_right_modifiers_collapse() {
        for m in [Modifier::Super, Modifier::Ctrl, Modifier::Alt, Modifier::Shift] {
            assert_eq!(
                KeyIdentity::normalize(RawKey::Modifier(m, Side::Left)),
                KeyIdentity::normalize(RawKey::Modifier(m, Side::Right)),
            );
        }
    }

    #[test]
    fn printable_keys_lowercase() {
        assert_eq!(KeyIdentity::normalize(RawKey::Char('A')), KeyIdentity::Char('a'));
        assert_eq!(KeyIdentity::normalize(RawKey::Char('a')), KeyIdentity::Char('a'));
        assert_eq!(KeyIdentity::normalize(RawKey::Char('7')), KeyIdentity::Char('7'));
    }

    #[test]
    fn normalize_is_idempotent_on_identities() {
        let once = KeyIdentity::normalize(RawKey::Char('Q'));
        let KeyIdentity::Char(c) = once else {
            panic!("expected char identity");
        };
        assert_eq!(KeyIdentity::normalize(RawKey::Char(c)), once);
    }

    #[test]
    fn token_aliases() {
        assert_eq!(KeyIdentity::parse_token("Cmd"), Some(KeyIdentity::SUPER));
        assert_eq!(KeyIdentity::parse_token("meta"), Some(KeyIdentity::SUPER));
        assert_eq!(KeyIdentity::parse_token(" control "), Some(KeyIdentity::CTRL));
        assert_eq!(
            KeyIdentity::parse_token("Return"),
            Some(KeyIdentity::Named(NamedKey::Enter))
        );
        assert_eq!(
            KeyIdentity::parse_token("F12"),
            Some(KeyIdentity::Named(NamedKey::F(12)))
        );
        assert_eq!(KeyIdentity::parse_token("H"), Some(KeyIdentity::Char('h')));
    }

    #[test]
    fn token_rejects_garbage() {
        assert_eq!(KeyIdentity::parse_token("hyper"), None);
        assert_eq!(KeyIdentity::parse_token("f99"), None);
        assert_eq!(KeyIdentity::parse_token("+"), None);
        assert_eq!(KeyIdentity::parse_token(""), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(KeyIdentity::SUPER.to_string(), "Super");
        assert_eq!(KeyIdentity::Named(NamedKey::Left).to_string(), "Left");
        assert_eq!(KeyIdentity::Named(NamedKey::PageUp).to_string(), "PageUp");
        assert_eq!(KeyIdentity::Named(NamedKey::F(3)).to_string(), "F3");
        assert_eq!(KeyIdentity::Char('x').to_string(), "X");
    }

    #[test]
    fn modifiers_sort_first() {
        let mut keys = vec![
            KeyIdentity::Char('1'),
            KeyIdentity::Named(NamedKey::Left),
            KeyIdentity::ALT,
            KeyIdentity::SUPER,
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                KeyIdentity::SUPER,
                KeyIdentity::ALT,
                KeyIdentity::Named(NamedKey::Left),
                KeyIdentity::Char('1'),
            ]
        );
    }
}
