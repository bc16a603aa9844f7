//! Chord bindings: non-empty sets of keys held together.

use super::key::KeyIdentity;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Errors from building or parsing a chord.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChordError {
    #[error("a chord needs at least one key")]
    Empty,
    #[error("unknown key {token:?} in chord {chord:?}")]
    UnknownKey { token: String, chord: String },
}

/// An unordered, non-empty set of keys.
///
/// Duplicates collapse on construction, so `Super+Super+Left` and
/// `Left+Super` are the same binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChordBinding {
    keys: BTreeSet<KeyIdentity>,
}

impl ChordBinding {
    pub fn new(keys: impl IntoIterator<Item = KeyIdentity>) -> Result<Self, ChordError> {
        let keys: BTreeSet<_> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(ChordError::Empty);
        }
        Ok(Self { keys })
    }

    /// Parse a `+`-separated chord string such as `"Ctrl+Alt+Left"`.
    pub fn parse(s: &str) -> Result<Self, ChordError> {
        if s.trim().is_empty() {
            return Err(ChordError::Empty);
        }
        let keys = s
            .split('+')
            .map(|token| {
                KeyIdentity::parse_token(token).ok_or_else(|| ChordError::UnknownKey {
                    token: token.trim().to_string(),
                    chord: s.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(keys)
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeyIdentity> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always `false`; bindings are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether every key of this chord is in `held`.
    pub(crate) fn is_satisfied_by(&self, held: &BTreeSet<KeyIdentity>) -> bool {
        self.keys.is_subset(held)
    }
}

impl fmt::Display for ChordBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

impl FromStr for ChordBinding {
    type Err = ChordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ChordBinding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChordBinding {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(DeError::custom)
    }
}
