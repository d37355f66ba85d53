//! Crate-wide error type.

use crate::protocol::{ConnectStatus, TransportError};

/// Every way a [`crate::Client`] operation can fail.
#[derive(Debug, thiserror::Error)]
pub enum HsiError {
    /// Connect/Disconnect/KeepAlive failed; the session has moved to `Broken`.
    #[error("connection error: {0:?}")]
    Connection(ConnectStatus),

    /// The waveform stream was out of order, truncated, or had a chunk-size
    /// mismatch.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// `get_data` was called for a symbol absent from the committed bundle.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// `get_data` was called outside an open `access_data` scope.
    #[error("get_data called outside an access_data scope")]
    NoAccessScope,

    /// `access_data` exceeded its configured wait bound.
    #[error("access_data timed out waiting for data")]
    Timeout,

    /// The session has transitioned to `Broken` (keep-alive failures
    /// exhausted the retry budget).
    #[error("session is broken")]
    SessionBroken,

    /// `close()` was already called; the session is permanently shut down.
    #[error("session is closed")]
    SessionClosed,

    /// `access_data` was called re-entrantly from the acquisition callback.
    #[error("access_data called re-entrantly from the acquisition callback")]
    ReentrantAccess,

    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Convenience alias used throughout the public surface.
pub type Result<T> = std::result::Result<T, HsiError>;
