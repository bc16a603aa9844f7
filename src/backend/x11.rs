//! [`DisplayBackend`] implementation for X11 window managers.
//!
//! Speaks the core protocol plus the EWMH hints every mainstream X11 window
//! manager supports: `_NET_ACTIVE_WINDOW` for focus, `_NET_CLIENT_LIST` for
//! enumeration, `_NET_WORKAREA` for the panel-aware screen rectangle and
//! `_NET_MOVERESIZE_WINDOW` / `_NET_WM_STATE` client messages for placement.
//! Requests go to the window manager through the root window, so reparenting
//! and decorations are its business, not ours.
//!
//! The connection lives on its own thread and every call waits at most
//! one second for it, so a stalled server surfaces as
//! [`X11Error::TimedOut`] instead of freezing the event loop.

use super::{MoveResizeReport, MoveResizeStep, WindowHandle, WindowInfo};
use crate::geometry::ScreenRect;
use crate::traits::DisplayBackend;
use log::debug;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ClientMessageEvent, ConnectionExt as _, EventMask, Window};
use x11rb::rust_connection::RustConnection;

x11rb::atom_manager! {
    /// EWMH atoms interned once at connect time.
    pub Atoms: AtomsCookie {
        _NET_ACTIVE_WINDOW,
        _NET_CLIENT_LIST,
        _NET_CURRENT_DESKTOP,
        _NET_WORKAREA,
        _NET_WM_STATE,
        _NET_WM_STATE_MAXIMIZED_VERT,
        _NET_WM_STATE_MAXIMIZED_HORZ,
        _NET_MOVERESIZE_WINDOW,
        _NET_WM_NAME,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_NORMAL,
        UTF8_STRING,
    }
}

/// `_NET_WM_STATE` actions.
const STATE_REMOVE: u32 = 0;
const STATE_ADD: u32 = 1;

/// Source indication "pager": tells the WM the request comes from a tool
/// acting on the user's behalf, so it is not subject to focus-stealing or
/// application placement policies.
const SOURCE_PAGER: u32 = 2;

/// Errors that can occur when talking to the X server.
#[derive(Debug, thiserror::Error)]
pub enum X11Error {
    #[error("X11 error: {0}")]
    Protocol(String),
    /// The server did not answer in time.  The call is abandoned; later
    /// calls may succeed once the server recovers.
    #[error("X11 {0} timed out after {1:?}")]
    TimedOut(&'static str, Duration),
}

fn x11_err(what: &str, e: impl std::fmt::Display) -> X11Error {
    X11Error::Protocol(format!("{}: {}", what, e))
}

/// The connection and interned atoms.  Lives on the worker thread.
struct Session {
    conn: RustConnection,
    root: Window,
    root_size: (u16, u16),
    atoms: Atoms,
}

impl Session {
    /// Connect to `$DISPLAY` and intern the EWMH atoms.
    fn connect() -> Result<Self, X11Error> {
        let (conn, screen_num) = x11rb::connect(None).map_err(|e| x11_err("connect", e))?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| X11Error::Protocol(format!("no screen {}", screen_num)))?;
        let root = screen.root;
        let root_size = (screen.width_in_pixels, screen.height_in_pixels);
        let atoms = Atoms::new(&conn)
            .map_err(|e| x11_err("intern atoms", e))?
            .reply()
            .map_err(|e| x11_err("intern atoms", e))?;
        debug!("x11: root {:#x}, {}x{}", root, root_size.0, root_size.1);
        Ok(Self {
            conn,
            root,
            root_size,
            atoms,
        })
    }

    /// Read a 32-bit-format property.  Missing properties read as empty.
    fn property32(
        &self,
        window: Window,
        property: u32,
        kind: impl Into<u32>,
    ) -> Result<Vec<u32>, X11Error> {
        let reply = self
            .conn
            .get_property(false, window, property, kind, 0, u32::MAX / 4)
            .map_err(|e| x11_err("get_property", e))?
            .reply()
            .map_err(|e| x11_err("get_property", e))?;
        Ok(reply.value32().map(|v| v.collect()).unwrap_or_default())
    }

    fn property_string(&self, window: Window, property: u32, kind: impl Into<u32>) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, property, kind, 0, 1024)
            .ok()?
            .reply()
            .ok()?;
        if reply.value.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&reply.value).into_owned())
    }

    fn title(&self, window: Window) -> String {
        self.property_string(window, self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING)
            .or_else(|| self.property_string(window, AtomEnum::WM_NAME.into(), AtomEnum::STRING))
            .unwrap_or_default()
    }

    fn is_normal(&self, window: Window) -> bool {
        match self.property32(window, self.atoms._NET_WM_WINDOW_TYPE, AtomEnum::ATOM) {
            Ok(types) => types.is_empty() || types.contains(&self.atoms._NET_WM_WINDOW_TYPE_NORMAL),
            Err(_) => false,
        }
    }

    /// Window geometry in root coordinates.
    fn frame_rect(&self, window: Window) -> Result<ScreenRect, X11Error> {
        let geom = self
            .conn
            .get_geometry(window)
            .map_err(|e| x11_err("get_geometry", e))?
            .reply()
            .map_err(|e| x11_err("get_geometry", e))?;
        let origin = self
            .conn
            .translate_coordinates(window, self.root, 0, 0)
            .map_err(|e| x11_err("translate_coordinates", e))?
            .reply()
            .map_err(|e| x11_err("translate_coordinates", e))?;
        Ok(ScreenRect::new(
            i32::from(origin.dst_x),
            i32::from(origin.dst_y),
            i32::from(geom.width),
            i32::from(geom.height),
        ))
    }

    /// Send an EWMH client message to the window manager.
    fn send_client_message(&self, window: Window, kind: u32, data: [u32; 5]) -> Result<(), X11Error> {
        let event = ClientMessageEvent::new(32, window, kind, data);
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                event,
            )
            .map_err(|e| x11_err("send_event", e))?;
        self.conn.flush().map_err(|e| x11_err("flush", e))
    }

    fn window_id(handle: WindowHandle) -> Result<Window, X11Error> {
        Window::try_from(handle.raw()).map_err(|_| X11Error::Protocol(format!("invalid window {}", handle)))
    }

    //  Requests

    fn screen_geometry(&self) -> Result<ScreenRect, X11Error> {
        let desktop = self
            .property32(self.root, self.atoms._NET_CURRENT_DESKTOP, AtomEnum::CARDINAL)?
            .first()
            .copied()
            .unwrap_or(0) as usize;
        let workarea = self.property32(self.root, self.atoms._NET_WORKAREA, AtomEnum::CARDINAL)?;
        if let Some(rect) = workarea_for(&workarea, desktop) {
            return Ok(rect);
        }
        debug!("x11: no _NET_WORKAREA, using root window size");
        Ok(ScreenRect::new(
            0,
            0,
            i32::from(self.root_size.0),
            i32::from(self.root_size.1),
        ))
    }

    fn focused_window(&self) -> Result<Option<WindowHandle>, X11Error> {
        let active = self.property32(self.root, self.atoms._NET_ACTIVE_WINDOW, AtomEnum::WINDOW)?;
        Ok(active
            .first()
            .copied()
            .filter(|&w| w != 0 && w != self.root)
            .map(|w| WindowHandle::new(u64::from(w))))
    }

    fn move_resize_window(
        &self,
        window: WindowHandle,
        rect: ScreenRect,
    ) -> Result<MoveResizeReport, X11Error> {
        let win = Session::window_id(window)?;
        let mut report =
            MoveResizeReport::new(&[MoveResizeStep::Unmaximize, MoveResizeStep::MoveResize]);

        let unmaximize = self.send_client_message(
            win,
            self.atoms._NET_WM_STATE,
            wm_state_data(
                STATE_REMOVE,
                self.atoms._NET_WM_STATE_MAXIMIZED_VERT,
                self.atoms._NET_WM_STATE_MAXIMIZED_HORZ,
            ),
        );
        if report.record(MoveResizeStep::Unmaximize, unmaximize) {
            let moved =
                self.send_client_message(win, self.atoms._NET_MOVERESIZE_WINDOW, moveresize_data(rect));
            report.record(MoveResizeStep::MoveResize, moved);
        }
        Ok(report)
    }

    fn maximize_window(&self, window: WindowHandle) -> Result<(), X11Error> {
        let win = Session::window_id(window)?;
        self.send_client_message(
            win,
            self.atoms._NET_WM_STATE,
            wm_state_data(
                STATE_ADD,
                self.atoms._NET_WM_STATE_MAXIMIZED_VERT,
                self.atoms._NET_WM_STATE_MAXIMIZED_HORZ,
            ),
        )
    }

    fn windows(&self) -> Result<Vec<WindowInfo>, X11Error> {
        let clients = self.property32(self.root, self.atoms._NET_CLIENT_LIST, AtomEnum::WINDOW)?;
        Ok(clients
            .into_iter()
            .filter(|&w| self.is_normal(w))
            .map(|w| WindowInfo {
                handle: WindowHandle::new(u64::from(w)),
                title: self.title(w),
                // Stale handles are common here; report them without geometry.
                rect: self.frame_rect(w).ok(),
            })
            .collect())
    }
}

//  Worker

/// Upper bound on one backend call, including queueing behind a stalled one.
const X11_TIMEOUT: Duration = Duration::from_secs(1);

type Job<S> = Box<dyn FnOnce(&S) + Send>;

/// Owns `state` on a dedicated thread and runs calls against it with a
/// deadline.  `x11rb` replies cannot be awaited with a timeout, so the wait
/// happens here instead; a call that misses the deadline keeps running on
/// the worker and its result is discarded.
struct Worker<S> {
    jobs: mpsc::Sender<Job<S>>,
    timeout: Duration,
}

impl<S: Send + 'static> Worker<S> {
    fn spawn(state: S, timeout: Duration) -> Result<Self, X11Error> {
        let (jobs, rx) = mpsc::channel::<Job<S>>();
        thread::Builder::new()
            .name("x11".into())
            .spawn(move || {
                for job in rx {
                    job(&state);
                }
            })
            .map_err(|e| x11_err("spawn worker", e))?;
        Ok(Self { jobs, timeout })
    }

    fn call<T, F>(&self, what: &'static str, f: F) -> Result<T, X11Error>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, X11Error> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        self.jobs
            .send(Box::new(move |state: &S| {
                let _ = tx.send(f(state));
            }))
            .map_err(|_| X11Error::Protocol("worker thread has exited".into()))?;
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(X11Error::TimedOut(what, self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(X11Error::Protocol("worker thread has exited".into()))
            }
        }
    }
}

/// X11-backed display backend.
pub struct X11Backend {
    worker: Worker<Session>,
}

impl X11Backend {
    /// Connect to `$DISPLAY`, intern the EWMH atoms and start the worker.
    pub fn connect() -> Result<Self, X11Error> {
        let session = Session::connect()?;
        Ok(Self {
            worker: Worker::spawn(session, X11_TIMEOUT)?,
        })
    }
}

//  Pure helpers

/// `_NET_MOVERESIZE_WINDOW` payload: north-west gravity, all four fields
/// present, pager source.
fn moveresize_data(rect: ScreenRect) -> [u32; 5] {
    let flags = 1 | (0xF << 8) | (SOURCE_PAGER << 12);
    [
        flags,
        rect.x as u32,
        rect.y as u32,
        rect.width.max(1) as u32,
        rect.height.max(1) as u32,
    ]
}

fn wm_state_data(action: u32, vert: u32, horz: u32) -> [u32; 5] {
    [action, vert, horz, SOURCE_PAGER, 0]
}

/// Pick the work area of `desktop` out of `_NET_WORKAREA`'s flat
/// `x, y, w, h` quadruples.
fn workarea_for(values: &[u32], desktop: usize) -> Option<ScreenRect> {
    let quad = values.chunks_exact(4).nth(desktop)?;
    let rect = ScreenRect::new(quad[0] as i32, quad[1] as i32, quad[2] as i32, quad[3] as i32);
    (!rect.is_degenerate()).then_some(rect)
}

//  DisplayBackend implementation

impl DisplayBackend for X11Backend {
    type Error = X11Error;

    fn name(&self) -> &'static str {
        "x11"
    }

    fn screen_geometry(&self) -> Result<ScreenRect, Self::Error> {
        self.worker.call("screen_geometry", |s| s.screen_geometry())
    }

    fn focused_window(&self) -> Result<Option<WindowHandle>, Self::Error> {
        self.worker.call("focused_window", |s| s.focused_window())
    }

    fn move_resize_window(
        &self,
        window: WindowHandle,
        rect: ScreenRect,
    ) -> Result<MoveResizeReport, Self::Error> {
        self.worker
            .call("move_resize_window", move |s| s.move_resize_window(window, rect))
    }

    fn maximize_window(&self, window: WindowHandle) -> Result<(), Self::Error> {
        self.worker.call("maximize_window", move |s| s.maximize_window(window))
    }

    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error> {
        self.worker.call("windows", |s| s.windows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moveresize_payload() {
        let data = moveresize_data(ScreenRect::new(5, 5, 950, 1070));
        assert_eq!(data[0], 0x2F01);
        assert_eq!(&data[1..], &[5, 5, 950, 1070]);
    }

    #[test]
    fn moveresize_never_sends_zero_size() {
        let data = moveresize_data(ScreenRect::new(0, 0, 0, -3));
        assert_eq!(&data[3..], &[1, 1]);
    }

    #[test]
    fn wm_state_payload_uses_pager_source() {
        assert_eq!(wm_state_data(STATE_ADD, 10, 11), [1, 10, 11, 2, 0]);
        assert_eq!(wm_state_data(STATE_REMOVE, 10, 11)[0], 0);
    }

    #[test]
    fn workarea_picks_current_desktop() {
        let values = [0, 32, 1920, 1048, 0, 0, 1920, 1080];
        assert_eq!(workarea_for(&values, 0), Some(ScreenRect::new(0, 32, 1920, 1048)));
        assert_eq!(workarea_for(&values, 1), Some(ScreenRect::new(0, 0, 1920, 1080)));
        assert_eq!(workarea_for(&values, 2), None);
    }

    #[test]
    fn empty_workarea_is_ignored() {
        assert_eq!(workarea_for(&[], 0), None);
        assert_eq!(workarea_for(&[0, 0, 0, 0], 0), None);
    }

    #[test]
    fn worker_returns_results() {
        let worker = Worker::spawn(21u32, Duration::from_millis(500)).unwrap();
        assert_eq!(worker.call("double", |n| Ok(*n * 2)).unwrap(), 42);
        let err = worker
            .call::<(), _>("fail", |_| Err(X11Error::Protocol("BadWindow".into())))
            .unwrap_err();
        assert!(err.to_string().contains("BadWindow"));
    }

    #[test]
    fn stalled_call_times_out_and_worker_recovers() {
        let worker = Worker::spawn((), Duration::from_millis(100)).unwrap();

        let started = std::time::Instant::now();
        let err = worker
            .call("focused_window", |_| {
                thread::sleep(Duration::from_millis(400));
                Ok(())
            })
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(matches!(err, X11Error::TimedOut("focused_window", _)));

        // Queued behind the stall: also bounded.
        assert!(matches!(
            worker.call("windows", |_| Ok(())),
            Err(X11Error::TimedOut("windows", _))
        ));

        thread::sleep(Duration::from_millis(400));
        assert_eq!(worker.call("screen_geometry", |_| Ok(7)).unwrap(), 7);
    }
}
