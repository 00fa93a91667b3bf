//! Producer-facing Unix socket and the per-connection serving loop.

use nix::sys::socket::{getsockopt, sockopt::PeerCredentials as SoPeerCred};
use nix::sys::stat::{stat, umask, Mode, SFlag};
use nix::unistd::{Gid, Uid};
use std::fmt;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

use flinger_core::config::BinderConfig;
use flinger_core::utils::{ensure_dir_exists, paths};
use flinger_gui::{BufferQueue, TransportError};

use crate::error::BinderError;
use crate::parcel::Parcel;
use crate::protocol::{encode_transport_failure, REPLY_OK};
use crate::session::ProducerSession;
use crate::stub::ProducerStub;
use crate::transport::{read_frame, write_frame};

const SOCKET_PERMISSIONS: u32 = 0o700;

fn is_socket(path: &Path) -> bool {
    match stat(path) {
        Ok(st) => SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT == SFlag::S_IFSOCK,
        Err(_) => false,
    }
}

/// Listening socket plus its lock file. Both are removed on drop.
#[derive(Debug)]
pub struct ProducerSocket {
    listener: UnixListener,
    socket_path: PathBuf,
    lock_path: PathBuf,
}

impl ProducerSocket {
    /// Binds `config.socket_name` inside the configured runtime directory,
    /// falling back to `$XDG_RUNTIME_DIR`.
    pub fn bind(config: &BinderConfig) -> Result<Self, BinderError> {
        let runtime_dir = match &config.runtime_dir {
            Some(dir) => dir.clone(),
            None => paths::get_runtime_dir()?,
        };
        Self::bind_in(&runtime_dir, &config.socket_name)
    }

    pub fn bind_in(runtime_dir: &Path, socket_name: &str) -> Result<Self, BinderError> {
        if !runtime_dir.exists() {
            debug!("Runtime dir {} does not exist, creating it.", runtime_dir.display());
            ensure_dir_exists(runtime_dir)?;
            fs::set_permissions(runtime_dir, fs::Permissions::from_mode(0o700)).map_err(|e| {
                BinderError::SocketCreation(format!(
                    "Failed to set permissions on runtime dir {}: {}",
                    runtime_dir.display(),
                    e
                ))
            })?;
        }

        let socket_path = runtime_dir.join(socket_name);
        let lock_path = runtime_dir.join(format!("{}.lock", socket_name));
        Self::handle_existing_socket_and_lock(&socket_path, &lock_path)?;

        fs::File::create(&lock_path).map_err(|e| {
            BinderError::SocketCreation(format!("Failed to create lock file {}: {}", lock_path.display(), e))
        })?;
        fs::set_permissions(&lock_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
            BinderError::SocketCreation(format!(
                "Failed to set permissions for lock file {}: {}",
                lock_path.display(),
                e
            ))
        })?;

        let original_umask = umask(Mode::S_IRWXG | Mode::S_IRWXO);
        let bound = UnixListener::bind(&socket_path);
        umask(original_umask);
        let listener = match bound {
            Ok(listener) => listener,
            Err(e) => {
                let _ = fs::remove_file(&lock_path);
                return Err(BinderError::SocketCreation(format!(
                    "Failed to bind socket {}: {}",
                    socket_path.display(),
                    e
                )));
            }
        };

        if let Err(e) = fs::set_permissions(&socket_path, fs::Permissions::from_mode(SOCKET_PERMISSIONS)) {
            let _ = fs::remove_file(&socket_path);
            let _ = fs::remove_file(&lock_path);
            return Err(BinderError::SocketCreation(format!(
                "Failed to set permissions for socket {}: {}",
                socket_path.display(),
                e
            )));
        }

        info!("Producer socket listening on {}", socket_path.display());
        Ok(ProducerSocket {
            listener,
            socket_path,
            lock_path,
        })
    }

    fn handle_existing_socket_and_lock(socket_path: &Path, lock_path: &Path) -> Result<(), BinderError> {
        if lock_path.exists() {
            if is_socket(socket_path) {
                return Err(BinderError::SocketCreation(format!(
                    "Socket {} may already be in use (socket and lock file {} exist).",
                    socket_path.display(),
                    lock_path.display()
                )));
            }
            warn!("Removing stale lock file {}.", lock_path.display());
            fs::remove_file(lock_path).map_err(|e| {
                BinderError::SocketCreation(format!(
                    "Failed to remove stale lock file {}: {}",
                    lock_path.display(),
                    e
                ))
            })?;
        }

        if socket_path.exists() {
            if !is_socket(socket_path) {
                return Err(BinderError::SocketCreation(format!(
                    "Path {} exists and is not a socket.",
                    socket_path.display()
                )));
            }
            warn!("Removing stale socket at {} (no lock file).", socket_path.display());
            fs::remove_file(socket_path).map_err(|e| {
                BinderError::SocketCreation(format!("Failed to remove stale socket {}: {}", socket_path.display(), e))
            })?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    pub fn accept(&self) -> Result<(UnixStream, ProducerPeer), BinderError> {
        let (stream, _addr) = self.listener.accept().map_err(|e| {
            BinderError::ClientConnection(format!("Failed to accept new producer connection: {}", e))
        })?;
        let peer = ProducerPeer::from_stream(&stream);
        info!("Accepted producer {} ({:?})", peer.id, peer.credentials);
        Ok((stream, peer))
    }
}

impl Drop for ProducerSocket {
    fn drop(&mut self) {
        info!(
            "Cleaning up producer socket: {} and lock: {}",
            self.socket_path.display(),
            self.lock_path.display()
        );
        for path in [&self.socket_path, &self.lock_path] {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    error!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn new() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "producer-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    pub uid: Uid,
    pub gid: Gid,
    pub pid: i32,
}

/// A connected producer process.
#[derive(Debug, Clone)]
pub struct ProducerPeer {
    pub id: ConnectionId,
    /// `None` when `SO_PEERCRED` is unavailable.
    pub credentials: Option<PeerCredentials>,
}

impl ProducerPeer {
    pub fn from_stream(stream: &UnixStream) -> Self {
        let credentials = match getsockopt(stream, SoPeerCred) {
            Ok(cred) => Some(PeerCredentials {
                uid: Uid::from_raw(cred.uid()),
                gid: Gid::from_raw(cred.gid()),
                pid: cred.pid(),
            }),
            Err(errno) => {
                warn!("Failed to get SO_PEERCRED for producer: {}", errno);
                None
            }
        };
        ProducerPeer {
            id: ConnectionId::new(),
            credentials,
        }
    }
}

/// Serves transactions from one producer until it hangs up.
///
/// The peer gets its own [`ProducerSession`]. When the stream ends, for any
/// reason, the session releases what this peer owned: the whole queue if it
/// was the connected producer, otherwise only the slots it still held.
pub fn serve_connection(stream: UnixStream, peer: &ProducerPeer, queue: &Arc<BufferQueue>) -> Result<(), BinderError> {
    let session = Arc::new(ProducerSession::new(Arc::clone(queue)));
    let stub = ProducerStub::new(session.clone());
    let result = dispatch_frames(stream, peer, &stub);
    debug!(
        "{} closed (connected: {:?}, held slots: {:?})",
        peer.id,
        session.connected_api(),
        session.dequeued_slots()
    );
    session.release();
    result
}

fn dispatch_frames(stream: UnixStream, peer: &ProducerPeer, stub: &ProducerStub) -> Result<(), BinderError> {
    let mut reader = stream.try_clone()?;
    let mut writer = stream;
    loop {
        let (code, payload) = match read_frame(&mut reader) {
            Ok(Some(frame)) => frame,
            Ok(None) | Err(TransportError::Disconnected) => {
                debug!("{} closed its connection", peer.id);
                return Ok(());
            }
            Err(e) => {
                warn!("{} sent an unreadable frame: {}", peer.id, e);
                return Err(e.into());
            }
        };
        let mut data = Parcel::from_bytes(payload);
        match stub.on_transact(code, &mut data) {
            Ok(reply) => write_frame(&mut writer, REPLY_OK, reply.as_bytes())?,
            Err(e) => {
                warn!("{}: transaction {} rejected: {}", peer.id, code, e);
                let (reply_code, reply) = encode_transport_failure(&e);
                write_frame(&mut writer, reply_code, reply.as_bytes())?;
            }
        }
    }
}

/// Accepts producers on a [`ProducerSocket`] and serves them against one queue.
pub struct ProducerServer {
    socket: ProducerSocket,
    queue: Arc<BufferQueue>,
}

impl ProducerServer {
    pub fn new(socket: ProducerSocket, queue: Arc<BufferQueue>) -> Self {
        ProducerServer { socket, queue }
    }

    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    /// Accepts one producer and serves it on the calling thread.
    pub fn serve_next(&self) -> Result<(), BinderError> {
        let (stream, peer) = self.socket.accept()?;
        serve_connection(stream, &peer, &self.queue)
    }

    /// Accept loop; each producer is served on its own thread.
    pub fn run(&self) -> Result<(), BinderError> {
        loop {
            let (stream, peer) = match self.socket.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("{}", e);
                    continue;
                }
            };
            let queue = Arc::clone(&self.queue);
            thread::Builder::new()
                .name(format!("{}", peer.id))
                .spawn(move || {
                    if let Err(e) = serve_connection(stream, &peer, &queue) {
                        warn!("{} ended with error: {}", peer.id, e);
                    }
                })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_socket_creation_and_cleanup() {
        let dir = tempdir().unwrap();
        let socket_path;
        {
            let socket = ProducerSocket::bind_in(dir.path(), "surface-test").unwrap();
            socket_path = socket.path().to_path_buf();
            assert!(is_socket(&socket_path));
            assert!(dir.path().join("surface-test.lock").exists());
        }
        assert!(!socket_path.exists());
        assert!(!dir.path().join("surface-test.lock").exists());
    }

    #[test]
    fn test_socket_in_use_is_refused() {
        let dir = tempdir().unwrap();
        let _socket = ProducerSocket::bind_in(dir.path(), "busy").unwrap();
        assert!(matches!(
            ProducerSocket::bind_in(dir.path(), "busy"),
            Err(BinderError::SocketCreation(_))
        ));
    }

    #[test]
    fn test_stale_lock_is_removed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("stale.lock"), b"").unwrap();
        let socket = ProducerSocket::bind_in(dir.path(), "stale").unwrap();
        assert!(is_socket(socket.path()));
    }

    #[test]
    fn test_regular_file_in_the_way() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("taken"), b"data").unwrap();
        assert!(matches!(
            ProducerSocket::bind_in(dir.path(), "taken"),
            Err(BinderError::SocketCreation(_))
        ));
    }

    #[test]
    fn test_peer_credentials_match_current_process() {
        let (a, _b) = UnixStream::pair().unwrap();
        let peer = ProducerPeer::from_stream(&a);
        let creds = peer.credentials.unwrap();
        assert_eq!(creds.uid, nix::unistd::getuid());
        assert_eq!(creds.pid, std::process::id() as i32);
        let other = ProducerPeer::from_stream(&a);
        assert_ne!(peer.id, other.id);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "producer-7");
    }
}
