//! Entry point for the **themis** daemon.
//!
//! Spawns the input hook, the control socket and the signal watcher on
//! background threads; all of them feed one bounded channel that is drained
//! on the main thread.
//!
//! When the `visualizer-gtk` feature is enabled and GTK initialises, the
//! main thread runs the GLib main loop and pumps the channel from there.
//! Otherwise a plain receive loop is used and overlay events are logged.

use log::{debug, error, info, warn};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use themis::action::SnapAction;
use themis::backend::{detect_session, AnyBackend};
use themis::command::Event;
use themis::config::Config;
use themis::dispatch::{ActionDispatcher, DispatchOutcome};
use themis::input::listener::InputListener;
use themis::ipc::listener::UnixSocketListener;
use themis::snapper::{LoopControl, Snapper};
use themis::traits::{DisplayBackend, EventSource, OverlayEvent};

/// Capacity of the shared event channel.  The input hook drops events
/// rather than block when it is full.
const EVENT_QUEUE: usize = 1024;

/// Try to load the config from `$XDG_CONFIG_HOME/themis/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = Config::dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

fn connect_backend() -> AnyBackend {
    let kind = detect_session(|k| std::env::var(k).ok());
    debug!("detected session {:?}", kind);
    AnyBackend::connect(kind)
}

//  Main

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => run_daemon(),
        Some("--list-actions") => list_actions(),
        Some("--print-geometry") => print_geometry(),
        Some("--fire") => match args.get(1) {
            Some(name) => fire(name),
            None => {
                eprintln!("usage: themis --fire <action>");
                std::process::exit(2);
            }
        },
        Some(other) => {
            eprintln!("unknown argument: {}", other);
            eprintln!("usage: themis [--list-actions | --print-geometry | --fire <action>]");
            std::process::exit(2);
        }
    }
}

//  Diagnostics

fn list_actions() {
    for action in SnapAction::ALL {
        println!("{:<22} {}", action.name(), action.label());
    }
}

fn print_geometry() {
    let config = load_config();
    let dispatcher = ActionDispatcher::new(connect_backend(), config.window_margin);
    let backend = dispatcher.backend();
    println!("backend: {}", backend.name());
    println!("screen:  {}", dispatcher.screen_geometry());
    match dispatcher.focused_window() {
        Some(window) => println!("focused: {}", window),
        None => println!("focused: none"),
    }
    for info in backend.windows() {
        match info.rect {
            Some(rect) => println!("  {} {} {:?}", info.handle, rect, info.title),
            None => println!("  {} ? {:?}", info.handle, info.title),
        }
    }
}

fn fire(name: &str) {
    let config = load_config();
    let dispatcher = ActionDispatcher::new(connect_backend(), config.window_margin);
    match dispatcher.dispatch_named(name) {
        Ok(DispatchOutcome::Failed { window }) => {
            error!("could not place {}", window);
            std::process::exit(1);
        }
        Ok(outcome) => info!("{:?}", outcome),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    }
}

//  Daemon

fn run_daemon() {
    let socket = UnixSocketListener::new(UnixSocketListener::default_path());
    if socket.in_use() {
        error!("{} is answering; is themis already running?", socket.path().display());
        std::process::exit(1);
    }

    let config = load_config();

    let mut snapper = Snapper::new(connect_backend(), &config);
    snapper.load_hotkeys(&config);

    let (tx, rx) = mpsc::sync_channel::<Event>(EVENT_QUEUE);

    let listener = InputListener::new(tx.clone());
    if let Err(e) = listener.start() {
        error!("{}; hotkeys and drag-to-snap are unavailable", e);
    }

    spawn_socket_listener(socket, tx.clone());
    spawn_signal_watcher(tx);

    start_event_loop(snapper, rx, &listener, config);

    listener.stop();
    let socket = UnixSocketListener::default_path();
    if let Err(e) = std::fs::remove_file(&socket) {
        debug!("could not remove {}: {}", socket.display(), e);
    }
    info!("themis stopped");
}

//  Event loops

#[cfg(feature = "visualizer-gtk")]
fn start_event_loop<B: DisplayBackend + 'static>(
    snapper: Snapper<B>,
    rx: mpsc::Receiver<Event>,
    listener: &InputListener,
    config: Config,
) {
    match themis::visualizer::gtk::init() {
        Ok(()) => themis::visualizer::gtk::run_main_loop(
            snapper,
            rx,
            listener.clone(),
            Some(Config::dir().join("style.css")),
            config.visualizer,
        ),
        Err(e) => {
            warn!("{}; running without overlay", e);
            plain_loop(snapper, rx);
        }
    }
}

#[cfg(not(feature = "visualizer-gtk"))]
fn start_event_loop<B: DisplayBackend>(
    snapper: Snapper<B>,
    rx: mpsc::Receiver<Event>,
    _listener: &InputListener,
    _config: Config,
) {
    plain_loop(snapper, rx);
}

/// Blocking receive loop used without the GTK overlay.
fn plain_loop<B: DisplayBackend>(mut snapper: Snapper<B>, rx: mpsc::Receiver<Event>) {
    let (overlay_tx, overlay_rx) = mpsc::channel::<OverlayEvent>();
    snapper.set_overlay(overlay_tx);

    info!("themis running");
    loop {
        // Wake at least every frame so the drag delay can elapse.
        match rx.recv_timeout(Duration::from_millis(16)) {
            Ok(event) => {
                if snapper.handle(event, Instant::now()) == LoopControl::Exit {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("all event sources closed, exiting");
                snapper.shutdown();
                break;
            }
        }
        let control = snapper.pump(&rx);
        while let Ok(event) = overlay_rx.try_recv() {
            debug!("overlay: {:?}", event);
        }
        if control == LoopControl::Exit {
            break;
        }
    }
}

//  Helpers

fn spawn_socket_listener(mut source: UnixSocketListener, tx: mpsc::SyncSender<Event>) {
    std::thread::spawn(move || {
        if let Err(e) = source.run(tx) {
            error!("socket listener error: {}", e);
        }
    });
}

fn spawn_signal_watcher(tx: mpsc::SyncSender<Event>) {
    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(s) => s,
        Err(e) => {
            warn!("cannot watch signals: {}", e);
            return;
        }
    };
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("received signal {}", sig);
            let _ = tx.send(Event::Shutdown);
        }
    });
}
