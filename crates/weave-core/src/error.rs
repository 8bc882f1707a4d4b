use thiserror::Error;

/// Unified error type for the weave workspace, grouped by subsystem:
/// transport, protocol decode, metadata parse, socket, resource, and a
/// catch-all.
#[derive(Error, Debug)]
pub enum WeaveError {
    // ── Transport (C3) ─────────────────────────────────────────
    #[error("local model server is not running")]
    NotRunning,

    #[error("connection to model server timed out")]
    ConnectionTimeout,

    #[error("connection to model server failed: {0}")]
    ConnectionFailed(String),

    #[error("model server request failed with status {0}")]
    RequestFailed(u16),

    #[error("model {0:?} not found on server")]
    ModelNotFound(String),

    #[error("operation canceled")]
    Canceled,

    // ── Protocol decode (C1) ───────────────────────────────────
    #[error("frame truncated: need more bytes")]
    Truncated,

    #[error("invalid magic number")]
    InvalidMagic,

    #[error("unsupported wire version")]
    UnsupportedVersion,

    #[error("unknown model id")]
    InvalidModelId,

    #[error("invalid width/height/steps")]
    InvalidDimensions,

    #[error("invalid steps value")]
    InvalidSteps,

    #[error("invalid cfg_scale value")]
    InvalidCfg,

    #[error("invalid prompt slice")]
    InvalidPrompt,

    #[error("payload exceeds maximum message size")]
    TooLarge,

    // ── Metadata parse (C3) ────────────────────────────────────
    #[error("failed to parse metadata JSON: {0}")]
    ParseError(String),

    #[error("metadata is missing required field(s): {0:?}")]
    MissingFields(Vec<&'static str>),

    #[error("tool call named {found:?}, expected {expected:?}")]
    WrongFunction { expected: &'static str, found: String },

    #[error("no tool calls present in response")]
    NoToolCalls,

    // ── Socket (C2) ─────────────────────────────────────────────
    #[error("XDG_RUNTIME_DIR is not set or is empty")]
    XdgNotSet,

    #[error("socket path exceeds sockaddr_un capacity")]
    PathTooLong,

    #[error("failed to create socket directory: {0}")]
    MkdirFailed(String),

    #[error("failed to bind socket: {0}")]
    BindFailed(String),

    #[error("failed to listen on socket: {0}")]
    ListenFailed(String),

    #[error("failed to chmod socket: {0}")]
    ChmodFailed(String),

    #[error("failed to unlink socket: {0}")]
    UnlinkFailed(String),

    #[error("peer authentication failed")]
    AuthFailed,

    #[error("peer uid {peer} does not match server uid {server}")]
    AuthUidMismatch { peer: u32, server: u32 },

    #[error("accept() failed: {0}")]
    AcceptFailed(String),

    #[error("connect() failed: {0}")]
    ConnectFailed(String),

    #[error("failed to set socket timeout: {0}")]
    TimeoutFailed(String),

    #[error("socket operation timed out")]
    OperationTimedOut,

    // ── Resource ────────────────────────────────────────────────
    #[error("out of memory")]
    OutOfMemory,

    // ── Config ──────────────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WeaveError {
    /// Maps an error to the MSG_ERROR frame's `status` field: OOM, timeout,
    /// and internal failures are server errors (500); everything else is a
    /// client-side validation failure (400).
    pub fn wire_status(&self) -> u32 {
        match self {
            WeaveError::OutOfMemory
            | WeaveError::ConnectionTimeout
            | WeaveError::OperationTimedOut
            | WeaveError::Internal(_)
            | WeaveError::Io(_) => 500,
            _ => 400,
        }
    }
}

pub type Result<T> = std::result::Result<T, WeaveError>;
