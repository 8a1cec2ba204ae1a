//! Session engine error types.

use ropkit_protocol::ProtocolError;
use thiserror::Error;

/// Errors from the session-buffer engine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A handle index referenced a slot that was never allocated. This is
    /// caller misuse and aborts the call.
    #[error("unknown handle index: {0:#06x}")]
    UnknownHandleIndex(u16),

    /// The ambient sentinel was used where a concrete slot is required.
    #[error("the ambient handle index cannot be allocated or released")]
    ReservedHandleIndex,

    /// The negotiated buffer size cannot hold even a truncation marker.
    #[error("response size limit {0} is too small for any response")]
    SizeLimitTooSmall(u32),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
