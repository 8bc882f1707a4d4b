use socket2::{Domain, SockAddr, Socket, Type};
use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::{UnixListener, UnixStream};
use weave_core::{Result, WeaveError};

/// A bound, listening worker socket, plus the bookkeeping needed to shut it
/// down cooperatively and unlink its path exactly once.
pub struct WeaveListener {
    inner: UnixListener,
    path: PathBuf,
    shutdown: Arc<AtomicBool>,
}

impl WeaveListener {
    /// Binds `path`. If a socket file already exists there, probes it: a
    /// live listener is left alone and binding fails; a dead one (crashed
    /// previous instance) is unlinked and the bind retried once.
    pub fn bind(path: &Path) -> Result<Self> {
        if path.exists() {
            if is_stale(path) {
                std::fs::remove_file(path).map_err(|e| WeaveError::UnlinkFailed(e.to_string()))?;
            } else {
                return Err(WeaveError::BindFailed(format!(
                    "{} is already in use by a live listener",
                    path.display()
                )));
            }
        }

        let socket =
            Socket::new(Domain::UNIX, Type::STREAM, None).map_err(|e| WeaveError::BindFailed(e.to_string()))?;
        let addr = SockAddr::unix(path).map_err(|e| WeaveError::BindFailed(e.to_string()))?;
        match socket.bind(&addr) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && is_stale(path) => {
                std::fs::remove_file(path).map_err(|e| WeaveError::UnlinkFailed(e.to_string()))?;
                socket.bind(&addr).map_err(|e| WeaveError::BindFailed(e.to_string()))?;
            }
            Err(e) => return Err(WeaveError::BindFailed(e.to_string())),
        }
        // Serial processing is assumed downstream; a small backlog is enough.
        socket.listen(5).map_err(|e| WeaveError::ListenFailed(e.to_string()))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| WeaveError::ListenFailed(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| WeaveError::ChmodFailed(e.to_string()))?;
        }

        let std_listener: StdUnixListener = socket.into();
        let inner =
            UnixListener::from_std(std_listener).map_err(|e| WeaveError::ListenFailed(e.to_string()))?;

        Ok(Self {
            inner,
            path: path.to_path_buf(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A shared handle to the shutdown flag. Setting it causes the next
    /// loop iteration of [`WeaveListener::accept`] to return `Ok(None)`
    /// instead of blocking for another connection.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts one connection and authenticates its peer UID. Transparently
    /// retries on `EINTR`. Returns `Ok(None)` once shutdown has been
    /// requested, never returning an unauthenticated stream to the caller.
    /// A failed authentication is per-connection: the fd is dropped and the
    /// loop keeps accepting, rather than surfacing as an error to the
    /// caller. Only a genuine accept-syscall failure is returned as `Err`.
    pub async fn accept(&self) -> Result<Option<(UnixStream, u32)>> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(None);
            }
            match self.inner.accept().await {
                Ok((stream, _addr)) => match crate::auth::authenticate_peer(&stream) {
                    Ok(peer_uid) => return Ok(Some((stream, peer_uid))),
                    Err(e) => {
                        tracing::debug!(error = %e, "dropping connection: authentication failed");
                        continue;
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(WeaveError::AcceptFailed(e.to_string())),
            }
        }
    }

    /// Unlinks the socket path. Safe to call more than once and safe to
    /// call after the path has already been removed.
    pub fn cleanup(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to unlink socket on cleanup");
            }
        }
    }
}

impl Drop for WeaveListener {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Connects to `path; a live peer accepts (or the OS queues) the connection,
/// a dead one refuses it outright.
fn is_stale(path: &Path) -> bool {
    let probe = match Socket::new(Domain::UNIX, Type::STREAM, None) {
        Ok(s) => s,
        Err(_) => return true,
    };
    let addr = match SockAddr::unix(path) {
        Ok(a) => a,
        Err(_) => return true,
    };
    match probe.connect(&addr) {
        Ok(()) => false,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => true,
        Err(_) => true,
    }
}
