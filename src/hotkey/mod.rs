//! Global hotkey recognition.
//!
//! * [`key`]: physical keys and their normalized identities.
//! * [`chord`]: chord bindings and the `Ctrl+Alt+Left` string form.
//! * [`recognizer`]: the held-key set and binding table.

pub mod chord;
pub mod key;
pub mod recognizer;

pub use chord::{ChordBinding, ChordError};
pub use key::{KeyIdentity, Modifier, NamedKey, RawKey, Side};
pub use recognizer::{ChordRecognizer, PressedKeySet};
