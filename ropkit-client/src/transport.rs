//! Transport abstraction for packed buffers.

use thiserror::Error;

/// Transport-level failures, distinct from protocol-level faults.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote endpoint rejected the call with a transport status code.
    #[error("call failed with transport status {0:#010x}")]
    Call(u32),

    #[error("connection closed")]
    Closed,
}

/// Carries one packed request buffer and returns the raw response buffer.
///
/// `pcb_out` is the negotiated maximum size of the response buffer the
/// caller is willing to receive. Implementations exchange opaque bytes;
/// framing and operation semantics live above this trait.
pub trait Transport {
    fn send_buffer(&mut self, request: &[u8], pcb_out: u32) -> Result<Vec<u8>, TransportError>;
}
