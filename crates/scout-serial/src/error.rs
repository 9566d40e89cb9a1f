//! Error types for serial sessions and probing

use thiserror::Error;

/// Errors surfaced by the serial layer.
#[derive(Debug, Error)]
pub enum SerialError {
    /// The OS refused the port (in use, permission denied, absent).
    #[error("failed to open {port}: {source}")]
    OpenFailed {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// An OS-level write fault.
    #[error("serial write failed: {0}")]
    WriteFailed(String),

    /// An OS-level read fault delivered on the error channel.
    #[error("serial read error: {0}")]
    ReadIo(String),

    /// `read_until` exhausted its deadline; partial content preserved.
    #[error("read timed out after {waited_ms}ms")]
    ReadTimeout { partial: String, waited_ms: u64 },

    /// The operation lost a race with `close()`; partial content
    /// preserved.
    #[error("session closed")]
    SessionClosed { partial: String },

    /// BREAK emulation could not restore the original mode; the port is
    /// left at the temporary baud and the session is degraded.
    #[error("break emulation failed: {0}")]
    BreakFailed(String),

    /// Port enumeration failed.
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Every configured baud failed the probe heuristic.
    #[error("no response at configured baud rates {bauds:?}")]
    NoBaudResponded { bauds: Vec<u32> },

    /// Transcript file setup failed.
    #[error("failed to initialize transcript logging: {0}")]
    LogSetup(#[from] std::io::Error),
}
