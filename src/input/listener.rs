//! Global input hook backed by `rdev`.
//!
//! `rdev` installs one process-wide hook whose `listen` call blocks forever
//! and cannot be cancelled, so keyboard and mouse events share one hook
//! thread.  [`InputListener`] wraps it with a forwarding switch: stopping
//! the listener closes the switch (events are dropped on the hook thread)
//! and starting it again reopens the switch, spawning a new hook thread only
//! if the previous one has died.
//!
//! Events are pushed with `try_send` into a bounded channel.  When the main
//! loop falls behind, new events are dropped rather than stalling the hook.

use super::{InputEvent, MouseButton};
use crate::command::Event;
use crate::hotkey::{Modifier, NamedKey, RawKey, Side};
use crate::traits::EventSource;
use log::{debug, error, info, warn};
use rdev::{Button, EventType, Key};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::Arc;

/// Error from the global input hook.
#[derive(Debug, thiserror::Error)]
#[error("input hook error: {0}")]
pub struct InputError(String);

/// The blocking half: runs `rdev::listen` on the calling thread.
struct GlobalHook {
    forwarding: Arc<AtomicBool>,
}

impl EventSource for GlobalHook {
    type Error = InputError;

    fn run(&mut self, sink: mpsc::SyncSender<Event>) -> Result<(), Self::Error> {
        let forwarding = Arc::clone(&self.forwarding);
        let mut dropped: u64 = 0;
        rdev::listen(move |event| {
            if !forwarding.load(Ordering::Acquire) {
                return;
            }
            let Some(input) = translate(&event.event_type) else {
                return;
            };
            match sink.try_send(Event::Input(input)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    if dropped.is_power_of_two() {
                        warn!("input queue full, {} event(s) dropped so far", dropped);
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("event loop gone, muting hook");
                    forwarding.store(false, Ordering::Release);
                }
            }
        })
        .map_err(|e| InputError(format!("{:?}", e)))
    }
}

/// Handle to the global keyboard + mouse hook.
///
/// Start failures are reported (logged, and [`is_listening`](Self::is_listening)
/// stays `false`) but never fatal; calling [`start`](Self::start) again
/// retries.  Clones share the same hook.
#[derive(Clone)]
pub struct InputListener {
    sink: mpsc::SyncSender<Event>,
    forwarding: Arc<AtomicBool>,
    hooked: Arc<AtomicBool>,
}

impl InputListener {
    /// Create a stopped listener that will forward into `sink`.
    pub fn new(sink: mpsc::SyncSender<Event>) -> Self {
        Self {
            sink,
            forwarding: Arc::new(AtomicBool::new(false)),
            hooked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Begin forwarding events, installing the hook if none is running.
    pub fn start(&self) -> Result<(), InputError> {
        self.forwarding.store(true, Ordering::Release);
        if self.hooked.swap(true, Ordering::AcqRel) {
            debug!("input hook already installed, forwarding resumed");
            return Ok(());
        }

        let mut hook = GlobalHook {
            forwarding: Arc::clone(&self.forwarding),
        };
        let sink = self.sink.clone();
        let hooked = Arc::clone(&self.hooked);
        let forwarding = Arc::clone(&self.forwarding);
        let spawned = std::thread::Builder::new()
            .name("input-hook".into())
            .spawn(move || {
                info!("global input hook starting");
                if let Err(e) = hook.run(sink) {
                    error!("{} (hotkeys and drag-to-snap are disabled)", e);
                }
                hooked.store(false, Ordering::Release);
                forwarding.store(false, Ordering::Release);
            });

        if let Err(e) = spawned {
            self.hooked.store(false, Ordering::Release);
            self.forwarding.store(false, Ordering::Release);
            return Err(InputError(format!("spawn hook thread: {}", e)));
        }
        Ok(())
    }

    /// Stop forwarding.  Safe to call any number of times.
    pub fn stop(&self) {
        if self.forwarding.swap(false, Ordering::AcqRel) {
            info!("input listener stopped");
        }
    }

    pub fn is_listening(&self) -> bool {
        self.hooked.load(Ordering::Acquire) && self.forwarding.load(Ordering::Acquire)
    }
}

//  Translation

/// Map an `rdev` event to our vocabulary.  Scroll wheel events are dropped.
pub(crate) fn translate(event: &EventType) -> Option<InputEvent> {
    let input = match event {
        EventType::KeyPress(key) => InputEvent::KeyDown(raw_key(*key)),
        EventType::KeyRelease(key) => InputEvent::KeyUp(raw_key(*key)),
        EventType::ButtonPress(b) => InputEvent::ButtonDown(mouse_button(*b)),
        EventType::ButtonRelease(b) => InputEvent::ButtonUp(mouse_button(*b)),
        EventType::MouseMove { x, y } => InputEvent::Motion {
            x: x.round() as i32,
            y: y.round() as i32,
        },
        EventType::Wheel { .. } => return None,
    };
    Some(input)
}

fn mouse_button(b: Button) -> MouseButton {
    match b {
        Button::Left => MouseButton::Left,
        Button::Right => MouseButton::Right,
        Button::Middle => MouseButton::Middle,
        Button::Unknown(n) => MouseButton::Other(n),
    }
}

fn raw_key(key: Key) -> RawKey {
    use RawKey::{Char, Named};
    match key {
        Key::MetaLeft => RawKey::Modifier(Modifier::Super, Side::Left),
        Key::MetaRight => RawKey::Modifier(Modifier::Super, Side::Right),
        Key::ControlLeft => RawKey::Modifier(Modifier::Ctrl, Side::Left),
        Key::ControlRight => RawKey::Modifier(Modifier::Ctrl, Side::Right),
        Key::Alt => RawKey::Modifier(Modifier::Alt, Side::Left),
        Key::AltGr => RawKey::Modifier(Modifier::Alt, Side::Right),
        Key::ShiftLeft => RawKey::Modifier(Modifier::Shift, Side::Left),
        Key::ShiftRight => RawKey::Modifier(Modifier::Shift, Side::Right),

        Key::LeftArrow => Named(NamedKey::Left),
        Key::RightArrow => Named(NamedKey::Right),
        Key::UpArrow => Named(NamedKey::Up),
        Key::DownArrow => Named(NamedKey::Down),
        Key::Return | Key::KpReturn => Named(NamedKey::Enter),
        Key::Space => Named(NamedKey::Space),
        Key::Tab => Named(NamedKey::Tab),
        Key::Escape => Named(NamedKey::Escape),
        Key::Backspace => Named(NamedKey::Backspace),
        Key::Delete | Key::KpDelete => Named(NamedKey::Delete),
        Key::Insert => Named(NamedKey::Insert),
        Key::Home => Named(NamedKey::Home),
        Key::End => Named(NamedKey::End),
        Key::PageUp => Named(NamedKey::PageUp),
        Key::PageDown => Named(NamedKey::PageDown),
        Key::F1 => Named(NamedKey::F(1)),
        Key::F2 => Named(NamedKey::F(2)),
        Key::F3 => Named(NamedKey::F(3)),
        Key::F4 => Named(NamedKey::F(4)),
        Key::F5 => Named(NamedKey::F(5)),
        Key::F6 => Named(NamedKey::F(6)),
        Key::F7 => Named(NamedKey::F(7)),
        Key::F8 => Named(NamedKey::F(8)),
        Key::F9 => Named(NamedKey::F(9)),
        Key::F10 => Named(NamedKey::F(10)),
        Key::F11 => Named(NamedKey::F(11)),
        Key::F12 => Named(NamedKey::F(12)),

        Key::KeyA => Char('a'),
        Key::KeyB => Char('b'),
        Key::KeyC => Char('c'),
        Key::KeyD => Char('d'),
        Key::KeyE => Char('e'),
        Key::KeyF => Char('f'),
        Key::KeyG => Char('g'),
        Key::KeyH => Char('h'),
        Key::KeyI => Char('i'),
        Key::KeyJ => Char('j'),
        Key::KeyK => Char('k'),
        Key::KeyL => Char('l'),
        Key::KeyM => Char('m'),
        Key::KeyN => Char('n'),
        Key::KeyO => Char('o'),
        Key::KeyP => Char('p'),
        Key::KeyQ => Char('q'),
        Key::KeyR => Char('r'),
        Key::KeyS => Char('s'),
        Key::KeyT => Char('t'),
        Key::KeyU => Char('u'),
        Key::KeyV => Char('v'),
        Key::KeyW => Char('w'),
        Key::KeyX => Char('x'),
        Key::KeyY => Char('y'),
        Key::KeyZ => Char('z'),
        Key::Num0 | Key::Kp0 => Char('0'),
        Key::Num1 | Key::Kp1 => Char('1'),
        Key::Num2 | Key::Kp2 => Char('2'),
        Key::Num3 | Key::Kp3 => Char('3'),
        Key::Num4 | Key::Kp4 => Char('4'),
        Key::Num5 | Key::Kp5 => Char('5'),
        Key::Num6 | Key::Kp6 => Char('6'),
        Key::Num7 | Key::Kp7 => Char('7'),
        Key::Num8 | Key::Kp8 => Char('8'),
        Key::Num9 | Key::Kp9 => Char('9'),
        Key::Minus | Key::KpMinus => Char('-'),
        Key::Equal => Char('='),
        Key::Comma => Char(','),
        Key::Dot => Char('.'),
        Key::Slash | Key::KpDivide => Char('/'),
        Key::SemiColon => Char(';'),
        Key::Quote => Char('\''),
        Key::BackSlash | Key::IntlBackslash => Char('\\'),
        Key::LeftBracket => Char('['),
        Key::RightBracket => Char(']'),
        Key::BackQuote => Char('`'),
        Key::KpPlus => Char('+'),
        Key::KpMultiply => Char('*'),

        Key::Unknown(code) => RawKey::Unknown(code),
        // Lock keys, PrintScreen, Pause, Fn: no chord string can name them.
        other => RawKey::Unknown(unnamed_code(other)),
    }
}

/// A per-variant code for keys `rdev` names but chords cannot.  The high
/// bit keeps it apart from native `Key::Unknown` scan codes.
fn unnamed_code(key: Key) -> u32 {
    let mut hasher = DefaultHasher::new();
    format!("{:?}", key).hash(&mut hasher);
    UNNAMED_BIT | (hasher.finish() as u32 & !UNNAMED_BIT)
}

const UNNAMED_BIT: u32 = 1 << 31;
