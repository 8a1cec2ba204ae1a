//! Client error types.

use crate::transport::TransportError;
use ropkit_protocol::{ProtocolError, RopKind};
use thiserror::Error;

/// Client errors.
///
/// Transport failures stay opaque: the client neither interprets nor
/// retries them. Operation faults preserve the raw return code.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("operation {kind:?} failed with return code {code:#010x}")]
    Operation { kind: RopKind, code: u32 },

    #[error("truncated response answered no requests")]
    NoProgress,
}

impl ClientError {
    /// Returns whether the failure came from the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}
