//! Operation dispatch: the handler trait and its execution context.

use ropkit_protocol::{ObjectHandle, RopRequest, RopResponse};
use uuid::Uuid;

/// Context for one operation, threaded explicitly through the dispatcher.
///
/// Carries the resolved input handle; handlers never touch the handle
/// table or any other session state directly.
#[derive(Debug, Clone, Copy)]
pub struct OpContext {
    /// Session the operation executes in.
    pub session_id: Uuid,
    /// Logon the request targets.
    pub logon_id: u8,
    /// Position of the operation within its buffer.
    pub op_index: usize,
    input: ObjectHandle,
}

impl OpContext {
    pub(crate) fn new(
        session_id: Uuid,
        logon_id: u8,
        op_index: usize,
        input: ObjectHandle,
    ) -> Self {
        Self {
            session_id,
            logon_id,
            op_index,
            input,
        }
    }

    /// Returns the resolved input object handle.
    pub fn input_handle(&self) -> ObjectHandle {
        self.input
    }
}

/// What a handler produced for one operation.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// A response, with no object opened.
    Reply(RopResponse),
    /// A response plus a newly opened object to bind to the request's
    /// output slot.
    Open {
        response: RopResponse,
        handle: ObjectHandle,
    },
    /// The operation failed with this non-zero return code.
    Fault(u32),
}

/// Executes operations against some object store.
///
/// The session dispatcher resolves handles and assembles buffers; the
/// handler supplies the per-operation semantics. Operations within one
/// buffer arrive strictly in order.
pub trait RopHandler {
    fn handle(&mut self, request: &RopRequest, ctx: &OpContext) -> HandlerOutcome;
}
