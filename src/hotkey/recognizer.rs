//! Multi-key chord recognition.
//!
//! [`ChordRecognizer`] owns the [`PressedKeySet`] and an insertion-ordered
//! binding table.  On every key-down it scans the table and reports the
//! **first** binding whose keys are all held.  It never invokes anything
//! itself: the caller receives the bound target and is responsible for
//! running it later on its own loop, off the listener thread.
//!
//! # Overlapping chords
//!
//! Matching is by subset and resolved by registration order, not by
//! specificity.  With `Super+Left` registered before `Super+Shift+Left`,
//! pressing all three keys fires `Super+Left`.  Register longer chords first
//! if the more specific one should win.

use super::chord::ChordBinding;
use super::key::{KeyIdentity, RawKey};
use log::debug;
use std::collections::BTreeSet;

/// The set of logical keys currently held down.
///
/// Mutated only through [`press`](Self::press) and
/// [`release`](Self::release); [`clear`](Self::clear) is for shutdown.
#[derive(Debug, Default, Clone)]
pub struct PressedKeySet {
    held: BTreeSet<KeyIdentity>,
}

impl PressedKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the key was not already held.
    pub fn press(&mut self, key: KeyIdentity) -> bool {
        self.held.insert(key)
    }

    /// Returns `true` if the key was held.
    pub fn release(&mut self, key: &KeyIdentity) -> bool {
        self.held.remove(key)
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn contains(&self, key: &KeyIdentity) -> bool {
        self.held.contains(key)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub(crate) fn as_set(&self) -> &BTreeSet<KeyIdentity> {
        &self.held
    }
}

/// Matches held keys against registered chords.
///
/// `T` is whatever the caller wants back when a chord fires, typically a
/// [`SnapAction`](crate::action::SnapAction).
#[derive(Debug)]
pub struct ChordRecognizer<T> {
    pressed: PressedKeySet,
    bindings: Vec<(ChordBinding, T)>,
}

impl<T> Default for ChordRecognizer<T> {
    fn default() -> Self {
        Self {
            pressed: PressedKeySet::new(),
            bindings: Vec::new(),
        }
    }
}

impl<T> ChordRecognizer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `chord` to `target`.
    ///
    /// If the same key set is already bound, its target is replaced in place
    /// (keeping its original position in the scan order) and the old target
    /// is returned.
    pub fn register(&mut self, chord: ChordBinding, target: T) -> Option<T> {
        if let Some((_, slot)) = self.bindings.iter_mut().find(|(c, _)| *c == chord) {
            return Some(std::mem::replace(slot, target));
        }
        self.bindings.push((chord, target));
        None
    }

    /// Remove the binding for exactly this key set.
    pub fn unregister(&mut self, chord: &ChordBinding) -> Option<T> {
        let idx = self.bindings.iter().position(|(c, _)| c == chord)?;
        Some(self.bindings.remove(idx).1)
    }

    /// Remove every binding whose target matches `pred`; returns how many
    /// were removed.
    pub fn unregister_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|(_, t)| !pred(t));
        before - self.bindings.len()
    }

    /// Drop all bindings.  Held keys are kept.
    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    /// Forget all held keys (listener stopped).
    pub fn reset(&mut self) {
        self.pressed.clear();
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&ChordBinding, &T)> {
        self.bindings.iter().map(|(c, t)| (c, t))
    }

    pub fn pressed(&self) -> &PressedKeySet {
        &self.pressed
    }

    /// Record a key release.  Never fires anything.
    pub fn on_key_up(&mut self, raw: RawKey) {
        let key = KeyIdentity::normalize(raw);
        self.pressed.release(&key);
    }
}

impl<T: Clone> ChordRecognizer<T> {
    /// Record a key press and return the target of the first satisfied
    /// binding, if any.  Auto-repeat of a key already held fires nothing.
    pub fn on_key_down(&mut self, raw: RawKey) -> Option<T> {
        let key = KeyIdentity::normalize(raw);
        if !self.pressed.press(key) {
            return None;
        }

        let held = self.pressed.as_set();
        let (chord, target) = self
            .bindings
            .iter()
            .find(|(chord, _)| chord.is_satisfied_by(held))?;
        debug!("chord {} matched", chord);
        Some(target.clone())
    }
}
