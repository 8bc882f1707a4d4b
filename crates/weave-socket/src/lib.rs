//! # weave-socket
//!
//! Unix domain socket lifecycle shared by the worker (listens) and the
//! orchestrator (connects): path derivation under `XDG_RUNTIME_DIR`,
//! directory and socket permissions, stale-socket recovery, peer-UID
//! authentication, and per-direction I/O timeouts.
//!
//! This crate owns no wire format; it only gets bytes across a trusted,
//! same-user boundary. See `weave-wire` for what travels over it.

mod auth;
mod listener;
mod path;
mod timeout;

pub use auth::authenticate_peer;
pub use listener::WeaveListener;
pub use path::{socket_path, socket_path_in};
pub use timeout::{RECV_TIMEOUT, SEND_TIMEOUT, recv_with_timeout, send_with_timeout, with_timeout_secs};
