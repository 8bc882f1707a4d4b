use std::os::unix::io::AsRawFd;
use tokio::net::UnixStream;
use weave_core::{Result, WeaveError};

/// Authenticates a freshly accepted connection against this process's own
/// UID, the only access-control rule the worker applies: anyone who can
/// reach the socket path but isn't running as the same user is rejected.
/// Returns the peer's UID on success.
pub fn authenticate_peer(stream: &UnixStream) -> Result<u32> {
    let server_uid = nix::unistd::getuid().as_raw();
    let (peer_uid, _peer_gid) =
        nix::unistd::getpeereid(stream.as_raw_fd()).map_err(|_| WeaveError::AuthFailed)?;
    let peer_uid = peer_uid.as_raw();

    if peer_uid != server_uid {
        tracing::debug!(peer_uid, server_uid, "rejecting connection: peer uid mismatch");
        return Err(WeaveError::AuthUidMismatch {
            peer: peer_uid,
            server: server_uid,
        });
    }
    Ok(peer_uid)
}
