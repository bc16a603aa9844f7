//! [`DisplayBackend`] implementation backed by sway IPC.
//!
//! Talks to sway directly through the i3-compatible IPC socket named by
//! `$SWAYSOCK`.  Every request opens a short-lived connection with 1 s
//! read/write timeouts; no `swaymsg` child process is spawned.
//!
//! Moving a window takes three `RUN_COMMAND` round-trips (enable floating,
//! resize, reposition).  They are not transactional: the sequence stops at
//! the first failure and the [`MoveResizeReport`] says how far it got.

use super::{MoveResizeReport, MoveResizeStep, WindowHandle, WindowInfo};
use crate::geometry::ScreenRect;
use crate::traits::DisplayBackend;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

const MAGIC: &[u8; 6] = b"i3-ipc";
const HEADER_LEN: usize = 14;

const RUN_COMMAND: u32 = 0;
const GET_OUTPUTS: u32 = 3;
const GET_TREE: u32 = 4;

const IPC_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors that can occur when talking to sway.
#[derive(Debug, thiserror::Error)]
#[error("sway IPC error: {0}")]
pub struct SwayError(String);

/// sway-backed display backend.
pub struct SwayBackend {
    socket: PathBuf,
}

impl SwayBackend {
    /// Resolve `$SWAYSOCK` and check that sway answers on it.
    pub fn connect() -> Result<Self, SwayError> {
        let socket = std::env::var_os("SWAYSOCK")
            .map(PathBuf::from)
            .ok_or_else(|| SwayError("SWAYSOCK not set".into()))?;
        let backend = Self::with_socket(socket);
        backend.outputs()?;
        Ok(backend)
    }

    /// Use an explicit socket path.  No connection is opened eagerly.
    pub fn with_socket(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    fn outputs(&self) -> Result<Vec<OutputJson>, SwayError> {
        self.ipc_json(GET_OUTPUTS)
    }

    fn tree(&self) -> Result<NodeJson, SwayError> {
        self.ipc_json(GET_TREE)
    }

    //  Raw IPC

    fn ipc_request(&self, kind: u32, payload: &str) -> Result<String, SwayError> {
        let mut stream = UnixStream::connect(&self.socket)
            .map_err(|e| SwayError(format!("connect to {}: {}", self.socket.display(), e)))?;
        stream
            .set_read_timeout(Some(IPC_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(IPC_TIMEOUT)))
            .map_err(|e| SwayError(format!("set timeout: {}", e)))?;

        stream
            .write_all(&encode_message(kind, payload.as_bytes()))
            .map_err(|e| io_error("write", e))?;

        let mut header = [0u8; HEADER_LEN];
        stream
            .read_exact(&mut header)
            .map_err(|e| io_error("read header", e))?;
        let (len, reply_kind) = decode_header(&header)?;
        if reply_kind != kind {
            return Err(SwayError(format!(
                "reply type {} does not match request type {}",
                reply_kind, kind
            )));
        }

        let mut body = vec![0u8; len as usize];
        stream
            .read_exact(&mut body)
            .map_err(|e| io_error("read body", e))?;
        String::from_utf8(body).map_err(|e| SwayError(format!("utf-8: {}", e)))
    }

    fn ipc_json<T: DeserializeOwned>(&self, kind: u32) -> Result<T, SwayError> {
        let json = self.ipc_request(kind, "")?;
        serde_json::from_str(&json).map_err(|e| SwayError(format!("parse: {}", e)))
    }

    /// Run one command and check every reply entry for success.
    fn run_command(&self, command: &str) -> Result<(), SwayError> {
        debug!("sway: {}", command);
        let json = self.ipc_request(RUN_COMMAND, command)?;
        let replies: Vec<CommandReplyJson> =
            serde_json::from_str(&json).map_err(|e| SwayError(format!("parse: {}", e)))?;
        match replies.into_iter().find(|r| !r.success) {
            None => Ok(()),
            Some(r) => Err(SwayError(format!(
                "command `{}` failed: {}",
                command,
                r.error.unwrap_or_else(|| "unknown error".into())
            ))),
        }
    }
}

fn io_error(what: &str, e: io::Error) -> SwayError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            SwayError(format!("{}: timed out after {:?}", what, IPC_TIMEOUT))
        }
        _ => SwayError(format!("{}: {}", what, e)),
    }
}

fn encode_message(kind: u32, payload: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(HEADER_LEN + payload.len());
    msg.extend_from_slice(MAGIC);
    msg.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
    msg.extend_from_slice(&kind.to_ne_bytes());
    msg.extend_from_slice(payload);
    msg
}

fn decode_header(header: &[u8; HEADER_LEN]) -> Result<(u32, u32), SwayError> {
    if &header[..6] != MAGIC {
        return Err(SwayError("bad reply magic".into()));
    }
    let len = u32::from_ne_bytes([header[6], header[7], header[8], header[9]]);
    let kind = u32::from_ne_bytes([header[10], header[11], header[12], header[13]]);
    Ok((len, kind))
}

//  Minimal serde structs for the JSON we care about

#[derive(Debug, Clone, Copy, Deserialize)]
struct RectJson {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl From<RectJson> for ScreenRect {
    fn from(r: RectJson) -> Self {
        ScreenRect::new(r.x, r.y, r.width, r.height)
    }
}

/// Subset of a `GET_TREE` node.
#[derive(Debug, Deserialize)]
struct NodeJson {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    focused: bool,
    rect: RectJson,
    #[serde(default)]
    nodes: Vec<NodeJson>,
    #[serde(default)]
    floating_nodes: Vec<NodeJson>,
}

impl NodeJson {
    fn is_window(&self) -> bool {
        self.kind == "con" || self.kind == "floating_con"
    }

    fn children(&self) -> impl Iterator<Item = &NodeJson> {
        self.nodes.iter().chain(self.floating_nodes.iter())
    }
}

/// Subset of a `GET_OUTPUTS` entry.
#[derive(Debug, Deserialize)]
struct OutputJson {
    name: String,
    active: bool,
    #[serde(default)]
    focused: bool,
    rect: RectJson,
}

#[derive(Debug, Deserialize)]
struct CommandReplyJson {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Depth-first search for the first focused node, tiled children before
/// floating ones.  A focused workspace or output means no window has focus.
fn find_focused(node: &NodeJson) -> Option<&NodeJson> {
    if node.focused {
        return node.is_window().then_some(node);
    }
    node.children().find_map(find_focused)
}

fn collect_windows(node: &NodeJson, out: &mut Vec<WindowInfo>) {
    if node.is_window() {
        if let Some(name) = node.name.as_deref().filter(|n| !n.is_empty()) {
            out.push(WindowInfo {
                handle: WindowHandle::new(node.id as u64),
                title: name.to_string(),
                rect: Some(node.rect.into()),
            });
        }
    }
    for child in node.children() {
        collect_windows(child, out);
    }
}

fn pick_output(outputs: &[OutputJson]) -> Option<&OutputJson> {
    outputs
        .iter()
        .find(|o| o.active && o.focused)
        .or_else(|| outputs.iter().find(|o| o.active))
}

//  DisplayBackend implementation

impl DisplayBackend for SwayBackend {
    type Error = SwayError;

    fn name(&self) -> &'static str {
        "sway"
    }

    fn screen_geometry(&self) -> Result<ScreenRect, Self::Error> {
        let outputs = self.outputs()?;
        let output = pick_output(&outputs).ok_or_else(|| SwayError("no active output".into()))?;
        debug!("sway: using output {}", output.name);
        Ok(output.rect.into())
    }

    fn focused_window(&self) -> Result<Option<WindowHandle>, Self::Error> {
        let tree = self.tree()?;
        Ok(find_focused(&tree).map(|n| WindowHandle::new(n.id as u64)))
    }

    fn move_resize_window(
        &self,
        window: WindowHandle,
        rect: ScreenRect,
    ) -> Result<MoveResizeReport, Self::Error> {
        let criteria = format!("[con_id={}]", window.raw());
        let steps = [
            (
                MoveResizeStep::EnableFloating,
                format!("{} floating enable", criteria),
            ),
            (
                MoveResizeStep::Resize,
                format!("{} resize set {} px {} px", criteria, rect.width, rect.height),
            ),
            (
                MoveResizeStep::Reposition,
                // Output rects are in global layout coordinates; plain
                // `move position` would be workspace-relative.
                format!("{} move absolute position {} {}", criteria, rect.x, rect.y),
            ),
        ];

        let planned: Vec<MoveResizeStep> = steps.iter().map(|(s, _)| *s).collect();
        let mut report = MoveResizeReport::new(&planned);
        for (step, command) in &steps {
            if !report.record(*step, self.run_command(command)) {
                break;
            }
        }
        Ok(report)
    }

    fn maximize_window(&self, window: WindowHandle) -> Result<(), Self::Error> {
        self.run_command(&format!("[con_id={}] fullscreen enable", window.raw()))
    }

    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error> {
        let tree = self.tree()?;
        let mut out = Vec::new();
        collect_windows(&tree, &mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    const TREE: &str = r#"{
        "id": 1, "name": "root", "type": "root", "focused": false,
        "rect": {"x": 0, "y": 0, "width": 1920, "height": 1080},
        "nodes": [{
            "id": 3, "name": "eDP-1", "type": "output",
            "rect": {"x": 0, "y": 0, "width": 1920, "height": 1080},
            "nodes": [{
                "id": 4, "name": "1", "type": "workspace",
                "rect": {"x": 0, "y": 30, "width": 1920, "height": 1050},
                "nodes": [
                    {"id": 7, "name": "Terminal", "type": "con", "focused": false,
                     "rect": {"x": 0, "y": 30, "width": 960, "height": 1050}},
                    {"id": 8, "name": null, "type": "con", "focused": false,
                     "rect": {"x": 960, "y": 30, "width": 960, "height": 1050},
                     "nodes": [
                        {"id": 9, "name": "Editor", "type": "con", "focused": false,
                         "rect": {"x": 960, "y": 30, "width": 960, "height": 1050}}
                     ]}
                ],
                "floating_nodes": [
                    {"id": 12, "name": "Calculator", "type": "floating_con", "focused": true,
                     "rect": {"x": 100, "y": 100, "width": 300, "height": 400}}
                ]
            }]
        }]
    }"#;

    fn parse_tree(json: &str) -> NodeJson {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn focused_floating_window_is_found() {
        let tree = parse_tree(TREE);
        assert_eq!(find_focused(&tree).map(|n| n.id), Some(12));
    }

    #[test]
    fn focused_workspace_means_no_window() {
        let json = r#"{
            "id": 1, "type": "root", "rect": {"x": 0, "y": 0, "width": 10, "height": 10},
            "nodes": [{"id": 4, "name": "1", "type": "workspace", "focused": true,
                       "rect": {"x": 0, "y": 0, "width": 10, "height": 10}}]
        }"#;
        assert!(find_focused(&parse_tree(json)).is_none());
    }

    #[test]
    fn collects_named_windows_in_tree_order() {
        let mut out = Vec::new();
        collect_windows(&parse_tree(TREE), &mut out);
        let titles: Vec<&str> = out.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(titles, vec!["Terminal", "Editor", "Calculator"]);
        assert_eq!(out[2].handle, WindowHandle::new(12));
        assert_eq!(out[2].rect, Some(ScreenRect::new(100, 100, 300, 400)));
    }

    #[test]
    fn prefers_focused_active_output() {
        let outputs: Vec<OutputJson> = serde_json::from_str(
            r#"[
                {"name": "HDMI-A-1", "active": true, "focused": false,
                 "rect": {"x": 0, "y": 0, "width": 2560, "height": 1440}},
                {"name": "eDP-1", "active": true, "focused": true,
                 "rect": {"x": 2560, "y": 0, "width": 1920, "height": 1080}}
            ]"#,
        )
        .unwrap();
        assert_eq!(pick_output(&outputs).map(|o| o.name.as_str()), Some("eDP-1"));
        assert!(pick_output(&[]).is_none());
    }

    #[test]
    fn message_framing() {
        let msg = encode_message(RUN_COMMAND, b"nop");
        assert_eq!(&msg[..6], b"i3-ipc");
        assert_eq!(msg.len(), HEADER_LEN + 3);
        let header: [u8; HEADER_LEN] = msg[..HEADER_LEN].try_into().unwrap();
        assert_eq!(decode_header(&header).unwrap(), (3, RUN_COMMAND));

        let mut bad = header;
        bad[0] = b'x';
        assert!(decode_header(&bad).is_err());
    }

    //  Fake sway server

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn tmp_socket_path() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("themis-sway-test-{}-{}.sock", std::process::id(), n))
    }

    /// Serve one reply per connection, recording every RUN_COMMAND payload.
    fn spawn_server(replies: Vec<String>) -> (PathBuf, Arc<Mutex<Vec<String>>>) {
        let path = tmp_socket_path();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_srv = Arc::clone(&seen);
        thread::spawn(move || {
            for reply in replies {
                let (mut stream, _) = listener.accept().unwrap();
                let mut header = [0u8; HEADER_LEN];
                stream.read_exact(&mut header).unwrap();
                let (len, kind) = decode_header(&header).unwrap();
                let mut body = vec![0u8; len as usize];
                stream.read_exact(&mut body).unwrap();
                seen_srv
                    .lock()
                    .unwrap()
                    .push(String::from_utf8(body).unwrap());
                stream
                    .write_all(&encode_message(kind, reply.as_bytes()))
                    .unwrap();
            }
        });
        (path, seen)
    }

    #[test]
    fn move_resize_runs_three_commands() {
        let ok = r#"[{"success": true}]"#.to_string();
        let (path, seen) = spawn_server(vec![ok.clone(), ok.clone(), ok]);
        let backend = SwayBackend::with_socket(&path);

        let report = backend
            .move_resize_window(WindowHandle::new(12), ScreenRect::new(5, 5, 950, 1070))
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "[con_id=12] floating enable",
                "[con_id=12] resize set 950 px 1070 px",
                "[con_id=12] move absolute position 5 5",
            ]
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn move_uses_global_coordinates_on_offset_output() {
        let ok = r#"[{"success": true}]"#.to_string();
        let (path, seen) = spawn_server(vec![ok.clone(), ok.clone(), ok]);
        let backend = SwayBackend::with_socket(&path);

        let output = ScreenRect::new(2560, 0, 1920, 1080);
        let target = crate::geometry::compute(output, 5, crate::action::SnapAction::SnapLeft);
        backend.move_resize_window(WindowHandle::new(12), target).unwrap();
        assert_eq!(
            seen.lock().unwrap().last().map(String::as_str),
            Some("[con_id=12] move absolute position 2565 5")
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn move_resize_stops_after_failed_step() {
        let (path, seen) = spawn_server(vec![
            r#"[{"success": true}]"#.to_string(),
            r#"[{"success": false, "error": "Cannot resize"}]"#.to_string(),
        ]);
        let backend = SwayBackend::with_socket(&path);

        let report = backend
            .move_resize_window(WindowHandle::new(7), ScreenRect::new(0, 0, 100, 100))
            .unwrap();
        assert!(!report.is_complete());
        let failed = report.failed_step().unwrap();
        assert_eq!(failed.step, MoveResizeStep::Resize);
        assert!(failed.error.as_deref().unwrap().contains("Cannot resize"));
        assert_eq!(report.skipped(), &[MoveResizeStep::Reposition]);
        assert_eq!(seen.lock().unwrap().len(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn focused_window_over_socket() {
        let (path, _seen) = spawn_server(vec![TREE.to_string()]);
        let backend = SwayBackend::with_socket(&path);
        assert_eq!(backend.focused_window().unwrap(), Some(WindowHandle::new(12)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn silent_server_times_out() {
        let path = tmp_socket_path();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();
        thread::spawn(move || {
            // Accept and hold the connection without ever replying.
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(3));
        });
        let backend = SwayBackend::with_socket(&path);

        let started = std::time::Instant::now();
        let err = backend.focused_window().unwrap_err();
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);
        assert!(err.to_string().contains("timed out"), "{}", err);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_socket_is_an_error() {
        let backend = SwayBackend::with_socket(tmp_socket_path());
        assert!(backend.screen_geometry().is_err());
    }
}
