//! Error types for the UPDI stack

use thiserror::Error;

/// Errors surfaced by the UPDI stack.
///
/// Operations are all-or-nothing at page/command granularity; errors
/// propagate up the layers unchanged. The only retries performed internally
/// are the documented single double-break recovery after a failed SIB read
/// and the best-effort interface disable in `leave_progmode`.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed SIB, missing ACK, echo mismatch or an otherwise ill-formed
    /// exchange on the wire.
    #[error("UPDI protocol error: {0}")]
    Protocol(String),

    /// An NVM controller busy-wait exhausted its budget.
    #[error("NVM timeout {0}")]
    NvmTimeout(&'static str),

    /// The NVM controller flagged a write error in its STATUS register.
    #[error("NVM controller error (code {code})")]
    Nvm {
        /// Decoded error field from the STATUS register.
        code: u8,
    },

    /// The device is locked; programming mode cannot be entered without a
    /// chip erase (or a keyed user-row write).
    #[error("device is locked")]
    Locked,

    /// Device identification failed or the target stopped responding.
    #[error("session error: {0}")]
    Session(String),

    /// The operation is not available, e.g. before the NVM variant has been
    /// resolved from the SIB.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),

    /// Transport read/write failure, including receive timeouts.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port configuration failure.
    #[cfg(feature = "serialport")]
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
}
