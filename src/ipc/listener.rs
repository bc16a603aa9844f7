//! Unix-socket [`EventSource`] implementation.
//!
//! Binds a Unix stream socket and accepts one connection at a time.
//! Each line received is parsed as a JSON-encoded [`Command`] and forwarded
//! as [`Event::Command`].
//!
//! # Wire format
//!
//! Every message is a single line of JSON followed by `\n`:
//!
//! ```json
//! {"Dispatch":"snap_left"}
//! {"Bind":{"chord":"Super+H","action":"snap_left"}}
//! {"Unbind":"snap_left"}
//! "ClearBindings"
//! {"EnableDragSnap":false}
//! "LogGeometry"
//! ```

use crate::command::{Command, Event};
use crate::traits::EventSource;
use log::{debug, error, info};
use std::io::{BufRead, BufReader};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// An [`EventSource`] that listens on a Unix stream socket for
/// JSON-encoded commands.
///
/// Each accepted connection can send multiple newline-delimited JSON
/// commands.  When the connection closes, the listener waits for the
/// next one.
pub struct UnixSocketListener {
    path: PathBuf,
}

/// Errors produced by the Unix socket listener.
#[derive(Debug, thiserror::Error)]
pub enum UnixSocketError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Another instance is already answering on the socket.
    #[error("{} is in use by a running instance", .0.display())]
    InUse(PathBuf),
}

impl UnixSocketListener {
    /// Create a new listener bound to `path`.
    ///
    /// The socket file is created when [`run`](EventSource::run) is called.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `$XDG_RUNTIME_DIR/themis.sock`, or `/tmp/themis.sock`.
    pub fn default_path() -> PathBuf {
        let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(runtime).join("themis.sock")
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether something is already accepting connections on the socket.
    /// A leftover file from a crashed instance does not count.
    pub fn in_use(&self) -> bool {
        UnixStream::connect(&self.path).is_ok()
    }
}

impl EventSource for UnixSocketListener {
    type Error = UnixSocketError;

    /// Bind the socket and start accepting connections.
    ///
    /// This method **blocks** until the event loop goes away.  Run it on a
    /// dedicated thread.
    fn run(&mut self, sink: mpsc::SyncSender<Event>) -> Result<(), Self::Error> {
        if self.in_use() {
            return Err(UnixSocketError::InUse(self.path.clone()));
        }
        // Remove stale socket if present.
        let _ = std::fs::remove_file(&self.path);

        let listener = UnixListener::bind(&self.path)?;
        info!("control socket listening on {}", self.path.display());

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("accept error: {}", e);
                    continue;
                }
            };
            debug!("client connected");
            for line in BufReader::new(stream).lines() {
                let text = match line {
                    Ok(text) => text,
                    Err(e) => {
                        error!("read error: {}", e);
                        break;
                    }
                };
                if text.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Command>(&text) {
                    Ok(cmd) => {
                        debug!("received {:?}", cmd);
                        if sink.send(Event::Command(cmd)).is_err() {
                            info!("event loop closed, control socket shutting down");
                            let _ = std::fs::remove_file(&self.path);
                            return Ok(());
                        }
                    }
                    Err(e) => error!("bad command {:?}: {}", text, e),
                }
            }
            debug!("client disconnected");
        }
        Ok(())
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::SnapAction;
    use crate::hotkey::ChordBinding;
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("themis-test-{}-{}.sock", std::process::id(), id))
    }

    fn spawn_listener(path: &Path) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::sync_channel(16);
        let path = path.to_path_buf();
        std::thread::spawn(move || {
            let mut listener = UnixSocketListener::new(&path);
            let _ = listener.run(tx);
        });
        // Give the listener a moment to bind.
        std::thread::sleep(std::time::Duration::from_millis(150));
        rx
    }

    #[test]
    fn commands_arrive_as_events() {
        let path = tmp_socket_path();
        let rx = spawn_listener(&path);

        {
            let mut stream = UnixStream::connect(&path).expect("connect");
            writeln!(stream, r#"{{"Dispatch":"quarter_top_left"}}"#).unwrap();
            writeln!(stream, r#"{{"Bind":{{"chord":"Super+H","action":"snap_left"}}}}"#).unwrap();
            writeln!(stream).unwrap();
            writeln!(stream, r#""ClearBindings""#).unwrap();
            stream.shutdown(std::net::Shutdown::Write).unwrap();
        }

        std::thread::sleep(std::time::Duration::from_millis(150));
        let events: Vec<Event> = rx.try_iter().collect();

        assert_eq!(
            events,
            vec![
                Event::Command(Command::Dispatch(SnapAction::QuarterTopLeft)),
                Event::Command(Command::Bind {
                    chord: ChordBinding::parse("Super+H").unwrap(),
                    action: SnapAction::SnapLeft,
                }),
                Event::Command(Command::ClearBindings),
            ]
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_json_does_not_crash() {
        let path = tmp_socket_path();
        let rx = spawn_listener(&path);

        {
            let mut stream = UnixStream::connect(&path).expect("connect");
            writeln!(stream, "not json at all").unwrap();
            writeln!(stream, r#"{{"Dispatch":"no_such_action"}}"#).unwrap();
            writeln!(stream, r#"{{"EnableDragSnap":false}}"#).unwrap();
            stream.shutdown(std::net::Shutdown::Write).unwrap();
        }

        std::thread::sleep(std::time::Duration::from_millis(150));
        let events: Vec<Event> = rx.try_iter().collect();
        // Only the valid command should have arrived.
        assert_eq!(events, vec![Event::Command(Command::EnableDragSnap(false))]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn second_connection_is_served() {
        let path = tmp_socket_path();
        let rx = spawn_listener(&path);

        for _ in 0..2 {
            let mut stream = UnixStream::connect(&path).expect("connect");
            writeln!(stream, r#""LogGeometry""#).unwrap();
            stream.shutdown(std::net::Shutdown::Write).unwrap();
            drop(stream);
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        std::thread::sleep(std::time::Duration::from_millis(150));
        assert_eq!(rx.try_iter().count(), 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn live_socket_is_not_taken_over() {
        let path = tmp_socket_path();
        let rx = spawn_listener(&path);

        let (tx2, _rx2) = mpsc::sync_channel(16);
        let err = UnixSocketListener::new(&path).run(tx2).unwrap_err();
        assert!(matches!(err, UnixSocketError::InUse(ref p) if *p == path));

        // The first instance still owns the socket.
        {
            let mut stream = UnixStream::connect(&path).expect("connect");
            writeln!(stream, r#""LogGeometry""#).unwrap();
            stream.shutdown(std::net::Shutdown::Write).unwrap();
        }
        std::thread::sleep(std::time::Duration::from_millis(150));
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![Event::Command(Command::LogGeometry)]
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn stale_socket_file_is_replaced() {
        let path = tmp_socket_path();
        drop(UnixListener::bind(&path).unwrap());
        assert!(path.exists());
        assert!(!UnixSocketListener::new(&path).in_use());

        let rx = spawn_listener(&path);
        {
            let mut stream = UnixStream::connect(&path).expect("connect");
            writeln!(stream, r#""ClearBindings""#).unwrap();
            stream.shutdown(std::net::Shutdown::Write).unwrap();
        }
        std::thread::sleep(std::time::Duration::from_millis(150));
        assert_eq!(rx.try_iter().count(), 1);

        let _ = std::fs::remove_file(&path);
    }
}
