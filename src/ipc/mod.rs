//! Control socket for the settings and tray layers.
//!
//! External tools connect to the socket and send newline-delimited JSON
//! [`Command`](crate::command::Command)s.

pub mod listener;
