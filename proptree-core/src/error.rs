//! Error types for the property engine.
//!
//! Most tree operations degrade to silent no-ops (dead nodes, missing
//! children). The errors here cover the few calls a caller must check:
//! subscribing, decoding exports and loading configuration.

/// Errors returned by the property engine.
#[derive(Debug, thiserror::Error)]
pub enum PropError {
    /// A subscription named neither a path nor a root.
    #[error("subscription has no root")]
    NoRoot,

    /// The first path segment matched no declared root.
    #[error("unknown root: {0}")]
    UnknownRoot(String),

    /// A declared root was already destroyed.
    #[error("subscription root is dead")]
    DeadRoot,

    /// No callback was supplied.
    #[error("subscription has no callback")]
    MissingCallback,

    /// A singleton subscription with this callback already exists.
    #[error("singleton subscription already registered")]
    AlreadySubscribed,

    /// A path string could not be parsed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A courier thread could not be started.
    #[error("failed to spawn courier thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding failed.
    #[error("msgpack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("msgpack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for property engine operations.
pub type Result<T> = std::result::Result<T, PropError>;
