//! Commands and events shared by every component.
//!
//! [`Event`] is what travels from the background threads to the main loop:
//! raw input from the global hook, [`Command`]s from the control socket, or
//! a shutdown request.  [`Command`] is the external control vocabulary the
//! tray menu and settings layer use to drive the daemon.

use crate::action::SnapAction;
use crate::hotkey::ChordBinding;
use crate::input::InputEvent;
use serde::{Deserialize, Serialize};

/// Every request the control socket accepts.
///
/// # Wire format
///
/// ```json
/// {"Dispatch":"snap_left"}
/// {"Bind":{"chord":"Super+H","action":"snap_left"}}
/// {"Unbind":"snap_left"}
/// "ClearBindings"
/// {"EnableDragSnap":false}
/// "LogGeometry"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Run an action once against the focused window ("test fire").
    Dispatch(SnapAction),

    /// Bind a chord to an action.  A chord already bound to another action
    /// is rebound.
    Bind { chord: ChordBinding, action: SnapAction },

    /// Remove every chord bound to the action.
    Unbind(SnapAction),

    /// Remove all chord bindings.
    ClearBindings,

    /// Construct (`true`) or tear down (`false`) the drag-to-snap
    /// controller.
    EnableDragSnap(bool),

    /// Log the current screen geometry and backend name.
    LogGeometry,
}

/// Everything the main loop consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Raw keyboard or mouse input from the global hook.
    Input(InputEvent),
    /// A control request.
    Command(Command),
    /// Stop listening and leave the loop.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wire_examples() {
        let cases = [
            (r#"{"Dispatch":"snap_left"}"#, Command::Dispatch(SnapAction::SnapLeft)),
            (
                r#"{"Bind":{"chord":"Super+H","action":"snap_left"}}"#,
                Command::Bind {
                    chord: ChordBinding::parse("Super+H").unwrap(),
                    action: SnapAction::SnapLeft,
                },
            ),
            (r#"{"Unbind":"third-top"}"#, Command::Unbind(SnapAction::ThirdTop)),
            (r#""ClearBindings""#, Command::ClearBindings),
            (r#"{"EnableDragSnap":false}"#, Command::EnableDragSnap(false)),
            (r#""LogGeometry""#, Command::LogGeometry),
        ];
        for (json, expected) in cases {
            let got: Command = serde_json::from_str(json).unwrap();
            assert_eq!(got, expected, "parsing {json}");
        }
    }

    #[test]
    fn bad_chord_in_bind_is_rejected() {
        let json = r#"{"Bind":{"chord":"Super+Nope","action":"maximize"}}"#;
        assert!(serde_json::from_str::<Command>(json).is_err());
    }

    #[test]
    fn bind_serializes_with_canonical_chord() {
        let cmd = Command::Bind {
            chord: ChordBinding::parse("left+ctrl+alt").unwrap(),
            action: SnapAction::ThirdLeft,
        };
        assert_eq!(
            serde_json::to_string(&cmd).unwrap(),
            r#"{"Bind":{"chord":"Ctrl+Alt+Left","action":"third_left"}}"#
        );
    }
}
