//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding wire data.
///
/// A non-zero operation return code is not an error at this layer: it decodes
/// to a typed [`RopFault`](crate::rop::RopFault) value so callers can branch
/// on the raw code.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed value: {reason}")]
    MalformedValue { reason: &'static str },

    #[error("unexpected end of buffer: need {needed} more bytes")]
    UnexpectedEof { needed: usize },

    #[error("unknown operation id: {0:#04x}")]
    UnknownOpId(u8),

    #[error("unknown property type: {0:#06x}")]
    UnknownPropertyType(u16),

    #[error("unknown row operation flag: {0:#04x}")]
    UnknownRowOp(u8),

    #[error("unsupported buffer version: {0}")]
    UnsupportedVersion(u16),

    #[error("invalid flags: {0:#06x}")]
    InvalidFlags(u16),

    #[error("buffer too large: {size} bytes (max {max})")]
    BufferTooLarge { size: usize, max: usize },

    #[error("request/handle-index count mismatch: {requests} requests, {handles} indices")]
    HandleCountMismatch { requests: usize, handles: usize },
}
