//! IPC server: Unix socket listener + per-client state + message framing.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Instant;

use calloop::generic::Generic;
use calloop::{Interest, LoopHandle, Mode, PostAction};
use tracing::{debug, error, info, warn};

use super::dispatch;
use crate::service::ServiceState;

/// Maximum message payload size (1 MiB).
const MAX_MESSAGE_SIZE: u32 = 1_048_576;

/// Maximum write buffer before dropping events (64 KiB).
const MAX_WRITE_BUFFER: usize = 65_536;

/// Messages per second per client.
const DEFAULT_RATE_LIMIT: u32 = 100;

const RATE_LIMIT_WINDOW_SECS: u64 = 1;

/// Per-client rate limiter.
pub struct RateLimiter {
    window_start: Instant,
    message_count: u32,
    pub max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            window_start: Instant::now(),
            message_count: 0,
            max_per_second,
        }
    }

    /// Count one message; false once the window's budget is spent.
    fn check(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.window_start).as_secs() >= RATE_LIMIT_WINDOW_SECS {
            self.window_start = now;
            self.message_count = 1;
            return true;
        }
        self.message_count += 1;
        self.message_count <= self.max_per_second
    }
}

/// Peer (uid, pid) via SO_PEERCRED.
#[cfg(target_os = "linux")]
fn peer_credentials(stream: &UnixStream) -> Option<(u32, i32)> {
    let fd = stream.as_raw_fd();
    let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
    let ret = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            &mut cred as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    (ret == 0).then_some((cred.uid, cred.pid))
}

#[cfg(not(target_os = "linux"))]
fn peer_credentials(_stream: &UnixStream) -> Option<(u32, i32)> {
    None
}

/// Per-client connection state.
pub struct IpcClient {
    pub stream: UnixStream,
    pub read_buf: Vec<u8>,
    pub write_buf: Vec<u8>,
    pub authenticated: bool,
    pub id: u64,
    pub peer_uid: Option<u32>,
    pub peer_pid: Option<i32>,
    pub rate_limiter: RateLimiter,
}

impl IpcClient {
    fn new(stream: UnixStream, id: u64) -> Self {
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(id, "cannot make client socket non-blocking: {}", e);
        }
        let (peer_uid, peer_pid) = match peer_credentials(&stream) {
            Some((uid, pid)) => {
                debug!(id, peer_uid = uid, peer_pid = pid, "peer credentials");
                (Some(uid), Some(pid))
            }
            None => (None, None),
        };

        Self {
            stream,
            read_buf: Vec::with_capacity(4096),
            write_buf: Vec::new(),
            authenticated: false,
            id,
            peer_uid,
            peer_pid,
            rate_limiter: RateLimiter::new(DEFAULT_RATE_LIMIT),
        }
    }

    /// Attempt to flush pending writes.
    pub fn flush_writes(&mut self) -> io::Result<()> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "write zero")),
                Ok(n) => {
                    self.write_buf.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Enqueue a framed message (u32 BE length + payload).
    pub fn enqueue_message(&mut self, payload: &str) {
        self.write_buf.extend_from_slice(&encode_frame(payload));
    }

    /// Enqueue an event unless the client has fallen too far behind.
    pub fn enqueue_event(&mut self, payload: &str) {
        if self.write_buf.len() > MAX_WRITE_BUFFER {
            warn!(client_id = self.id, "write buffer overflow, dropping event");
            return;
        }
        self.enqueue_message(payload);
    }

    /// Pull complete framed messages out of the read buffer.
    pub fn extract_messages(&mut self) -> Vec<String> {
        extract_frames(&mut self.read_buf, self.id)
    }
}

/// Length-prefix a payload.
pub fn encode_frame(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(4 + bytes.len());
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
    out
}

/// Split complete frames off the front of `buf`.  An oversized length
/// prefix discards the buffer.
fn extract_frames(buf: &mut Vec<u8>, client_id: u64) -> Vec<String> {
    let mut messages = Vec::new();
    while buf.len() >= 4 {
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if len > MAX_MESSAGE_SIZE {
            error!(client_id, len, "message exceeds maximum size");
            buf.clear();
            break;
        }
        let total = 4 + len as usize;
        if buf.len() < total {
            break;
        }
        messages.push(String::from_utf8_lossy(&buf[4..total]).into_owned());
        buf.drain(..total);
    }
    messages
}

/// Listener socket and connected clients.
pub struct IpcServer {
    pub socket_path: PathBuf,
    pub clients: HashMap<u64, IpcClient>,
    next_client_id: u64,
    pub ipc_trace: bool,
}

impl IpcServer {
    /// Create the server state; `bind` starts listening.
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            clients: HashMap::new(),
            next_client_id: 1,
            ipc_trace: false,
        }
    }

    /// `$XDG_RUNTIME_DIR/gesture-pointer.sock`.
    pub fn default_socket_path() -> PathBuf {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .unwrap_or_else(|_| format!("/tmp/gesture-pointer-{}", unsafe { libc::getuid() }));
        PathBuf::from(runtime_dir).join("gesture-pointer.sock")
    }

    /// Bind the listener socket and register it with calloop.
    pub fn bind(socket_path: &Path, loop_handle: &LoopHandle<'static, ServiceState>) -> anyhow::Result<()> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;

        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o700))?;
        }

        info!(?socket_path, "IPC server listening");

        let source = Generic::new(listener, Interest::READ, Mode::Level);
        loop_handle
            .insert_source(source, |_event, listener, state| {
                loop {
                    match listener.accept() {
                        Ok((stream, _addr)) => {
                            let client_id = state.ipc_server.next_client_id;
                            state.ipc_server.next_client_id += 1;
                            info!(client_id, "IPC client connected");
                            state
                                .ipc_server
                                .clients
                                .insert(client_id, IpcClient::new(stream, client_id));
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            error!("accept error: {}", e);
                            break;
                        }
                    }
                }
                Ok(PostAction::Continue)
            })
            .map_err(|e| anyhow::anyhow!("registering IPC listener: {}", e.error))?;

        Ok(())
    }

    /// Read, dispatch and flush every client.  Called once per loop
    /// iteration.
    pub fn poll_clients(state: &mut ServiceState) {
        let client_ids: Vec<u64> = state.ipc_server.clients.keys().copied().collect();
        let mut disconnected = Vec::new();

        for client_id in client_ids {
            let Some(client) = state.ipc_server.clients.get_mut(&client_id) else {
                continue;
            };
            let mut buf = [0u8; 4096];
            let read_result = match client.stream.read(&mut buf) {
                Ok(0) => Err(io::Error::new(io::ErrorKind::ConnectionReset, "eof")),
                Ok(n) => {
                    client.read_buf.extend_from_slice(&buf[..n]);
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = read_result {
                debug!(client_id, "client disconnected: {}", e);
                disconnected.push(client_id);
                continue;
            }

            for msg in client.extract_messages() {
                let rate_ok = state
                    .ipc_server
                    .clients
                    .get_mut(&client_id)
                    .is_some_and(|c| c.rate_limiter.check());
                if !rate_ok {
                    warn!(client_id, "rate limit exceeded, dropping message");
                    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
                        client.enqueue_message(&dispatch::error_response(0, "rate limit exceeded"));
                    }
                    continue;
                }

                if state.ipc_server.ipc_trace {
                    info!(client_id, "<< {}", msg);
                }
                let response = dispatch::handle_message(state, client_id, &msg);
                if let Some(resp) = response {
                    if state.ipc_server.ipc_trace {
                        info!(client_id, ">> {}", resp);
                    }
                    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
                        client.enqueue_message(&resp);
                    }
                }
            }

            if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
                if let Err(e) = client.flush_writes() {
                    debug!(client_id, "write error: {}", e);
                    disconnected.push(client_id);
                }
            }
        }

        for id in disconnected {
            info!(client_id = id, "removing disconnected IPC client");
            state.ipc_server.clients.remove(&id);
        }
    }

    /// Register one end of a socket pair as a client.
    #[cfg(test)]
    pub(crate) fn add_test_client(&mut self) -> u64 {
        let (ours, _theirs) = UnixStream::pair().expect("socket pair");
        let id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(id, IpcClient::new(ours, id));
        id
    }

    /// Send an event to every authenticated client.
    pub fn broadcast_event(&mut self, event: &str) {
        if self.ipc_trace {
            info!("broadcast >> {}", event);
        }
        for client in self.clients.values_mut() {
            if client.authenticated {
                client.enqueue_event(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_complete_frames() {
        let mut buf = encode_frame("(:type :ping)");
        buf.extend_from_slice(&encode_frame("(:type :hello)"));
        let msgs = extract_frames(&mut buf, 1);
        assert_eq!(msgs, vec!["(:type :ping)", "(:type :hello)"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_extract_partial_frame() {
        let full = encode_frame("(:type :ping)");
        let mut buf = full[..6].to_vec();
        assert!(extract_frames(&mut buf, 1).is_empty());
        assert_eq!(buf.len(), 6);
        buf.extend_from_slice(&full[6..]);
        assert_eq!(extract_frames(&mut buf, 1), vec!["(:type :ping)"]);
    }

    #[test]
    fn test_oversized_frame_discarded() {
        let mut buf = (MAX_MESSAGE_SIZE + 1).to_be_bytes().to_vec();
        buf.extend_from_slice(b"junk");
        assert!(extract_frames(&mut buf, 1).is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_rate_limiter() {
        let mut limiter = RateLimiter::new(3);
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }

    #[test]
    fn test_default_socket_path_name() {
        assert!(IpcServer::default_socket_path().ends_with("gesture-pointer.sock"));
    }
}
