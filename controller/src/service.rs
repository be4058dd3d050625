//! Service: stream threads, control socket, signal handling.
//!
//! The main thread runs a calloop event loop for the control socket and
//! supervises the stream threads.  Gesture processing happens entirely on
//! the stream threads; the main thread only toggles the shared gate and
//! reads published snapshots.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use calloop::EventLoop;
use tracing::{error, info, warn};

use crate::config::{ControllerConfig, PipelineConfig};
use crate::control::HeadlessInjector;
use crate::ipc::IpcServer;
use crate::mapping::FileMappingStore;
use crate::pipeline::{
    LandmarkSnapshot, ProcessingGate, RecordedDetector, ReplaySource, Stream, StreamHandle, StreamStatus,
};

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Service startup options.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub controller: ControllerConfig,
    pub pipeline: PipelineConfig,
    /// One stream per replay file.
    pub replays: Vec<PathBuf>,
    /// Replay pacing; 0 replays as fast as possible.
    pub replay_fps: u32,
    /// Control socket path; `None` uses the default.
    pub ipc_socket: Option<PathBuf>,
    /// Log every IPC message.
    pub ipc_trace: bool,
    /// Event loop poll interval.
    pub poll_interval: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            pipeline: PipelineConfig::default(),
            replays: Vec::new(),
            replay_fps: 30,
            ipc_socket: None,
            ipc_trace: false,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Read-only view of a running stream.
pub struct StreamView {
    pub name: String,
    pub snapshot: LandmarkSnapshot,
    pub status: StreamStatus,
}

/// State owned by the main thread's event loop.
pub struct ServiceState {
    pub ipc_server: IpcServer,
    pub gate: ProcessingGate,
    pub mapping: FileMappingStore,
    pub controller_config: ControllerConfig,
    pub pipeline_config: PipelineConfig,
    pub streams: Vec<StreamView>,
    pub started: Instant,
    pub running: bool,
}

impl ServiceState {
    pub fn new(
        ipc_server: IpcServer,
        gate: ProcessingGate,
        mapping: FileMappingStore,
        controller_config: ControllerConfig,
        pipeline_config: PipelineConfig,
    ) -> Self {
        Self {
            ipc_server,
            gate,
            mapping,
            controller_config,
            pipeline_config,
            streams: Vec::new(),
            started: Instant::now(),
            running: true,
        }
    }

    /// True once every stream has finished.  False with no streams.
    pub fn all_streams_finished(&self) -> bool {
        !self.streams.is_empty() && self.streams.iter().all(|s| s.status.get().finished)
    }
}

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Open one replay source per path.  Fails on the first unreadable file.
fn open_replays(paths: &[PathBuf], fps: u32) -> anyhow::Result<Vec<ReplaySource<BufReader<File>>>> {
    paths
        .iter()
        .map(|path| Ok(ReplaySource::open(path)?.with_fps(fps)))
        .collect()
}

/// Signal every stream to stop and wait for its thread.
fn stop_streams(shutdown: &AtomicBool, handles: Vec<StreamHandle>) {
    shutdown.store(true, Ordering::SeqCst);
    for handle in handles {
        match handle.thread.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(stream = %handle.name, "stream ended with error: {e:#}"),
            Err(_) => error!(stream = %handle.name, "stream thread panicked"),
        }
    }
}

/// Run until a signal arrives or every stream has finished.
pub fn run(opts: ServiceOptions) -> anyhow::Result<()> {
    let mapping = FileMappingStore::new(opts.pipeline.mapping_path.clone());
    // Validate once; problems are warnings and the per-frame path skips them.
    if let Err(e) = mapping.check() {
        warn!("{}; gestures will be skipped until it is fixed", e);
    }

    // Open every replay before binding or starting any thread.
    let sources = open_replays(&opts.replays, opts.replay_fps)?;

    let mut event_loop = EventLoop::<ServiceState>::try_new().context("creating event loop")?;
    let gate = ProcessingGate::new(opts.pipeline.start_enabled);
    let socket_path = opts.ipc_socket.clone().unwrap_or_else(IpcServer::default_socket_path);
    let mut ipc_server = IpcServer::new(socket_path.clone());
    ipc_server.ipc_trace = opts.ipc_trace;

    let mut state = ServiceState::new(
        ipc_server,
        gate.clone(),
        mapping,
        opts.controller,
        opts.pipeline.clone(),
    );
    IpcServer::bind(&socket_path, &event_loop.handle())
        .with_context(|| format!("binding control socket {}", socket_path.display()))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut handles: Vec<StreamHandle> = Vec::new();
    for (i, (path, source)) in opts.replays.iter().zip(sources).enumerate() {
        let name = format!("replay-{i}");
        let stream = Stream::new(
            name.clone(),
            Box::new(source),
            Box::new(RecordedDetector),
            Box::new(FileMappingStore::new(opts.pipeline.mapping_path.clone())),
            Box::new(HeadlessInjector::new(opts.pipeline.screen.0, opts.pipeline.screen.1)),
            &opts.controller,
            &opts.pipeline,
            gate.clone(),
            shutdown.clone(),
        );
        let handle = match stream.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                stop_streams(&shutdown, handles);
                let _ = std::fs::remove_file(&socket_path);
                return Err(e);
            }
        };
        info!(stream = %name, path = %path.display(), "stream spawned");
        state.streams.push(StreamView {
            name,
            snapshot: handle.snapshot.clone(),
            status: handle.status.clone(),
        });
        handles.push(handle);
    }

    install_signal_handlers();

    let status_interval = Duration::from_secs(60);
    let mut last_status_log = Instant::now();
    info!(
        streams = state.streams.len(),
        enabled = gate.is_enabled(),
        "gesture-pointer running"
    );

    while state.running {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("Shutdown signal received, exiting");
            state.running = false;
            break;
        }
        if state.all_streams_finished() {
            info!("all streams finished");
            state.running = false;
            break;
        }

        if last_status_log.elapsed() >= status_interval {
            for s in &state.streams {
                let st = s.status.get();
                info!(
                    stream = %s.name,
                    frames = st.frames,
                    processed = st.processed,
                    major = %st.major,
                    minor = %st.minor,
                    "stream status"
                );
            }
            last_status_log = Instant::now();
        }

        IpcServer::poll_clients(&mut state);
        event_loop
            .dispatch(Some(opts.poll_interval), &mut state)
            .context("event loop dispatch")?;
    }

    stop_streams(&shutdown, handles);

    let _ = std::fs::remove_file(&state.ipc_server.socket_path);
    info!(
        uptime_secs = state.started.elapsed().as_secs(),
        clients = state.ipc_server.clients.len(),
        "gesture-pointer shutting down"
    );
    Ok(())
}
