//! Session dispatch: strictly ordered execution of packed buffers.

use crate::assembler::{AssembledBuffer, ResponseAssembler};
use crate::config::SessionConfig;
use crate::dispatch::{HandlerOutcome, OpContext, RopHandler};
use crate::error::SessionError;
use crate::handle::HandleTable;
use crate::queue::NotificationQueue;
use bytes::Bytes;
use ropkit_protocol::rop::{NotifyResponse, RopFault};
use ropkit_protocol::{unpack_requests, HandleIndex, ObjectHandle, RopRequest, RopResponse};
use std::time::Instant;
use uuid::Uuid;

/// One logical session over a serialized request/response channel.
///
/// Operations within a buffer execute in listed order, never reordered:
/// a later operation may reference a handle slot populated by an earlier
/// operation in the same buffer. The notification queue is the only state
/// an external event source may touch concurrently.
pub struct Session {
    id: Uuid,
    handles: HandleTable,
    queue: NotificationQueue,
    assembler: ResponseAssembler,
    request_count: u64,
    created_at: Instant,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            handles: HandleTable::new(),
            queue: NotificationQueue::new(config.queue.max_depth),
            assembler: ResponseAssembler::new(config.pcb_out, config.pending_policy),
            request_count: 0,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the notification queue, for external event sources.
    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Enqueues a change notification for opportunistic delivery.
    pub fn enqueue_notification(&self, notify: NotifyResponse) -> bool {
        self.queue.enqueue(notify)
    }

    /// Returns the number of operations executed so far.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Returns the session age.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Executes decoded requests in order against `handler`.
    ///
    /// Referencing a slot that no earlier operation (or prior call)
    /// populated aborts the whole call with `UnknownHandleIndex`.
    pub fn execute(
        &mut self,
        requests: &[(HandleIndex, RopRequest)],
        ambient: ObjectHandle,
        handler: &mut dyn RopHandler,
    ) -> Result<Vec<RopResponse>, SessionError> {
        let mut responses = Vec::with_capacity(requests.len());
        for (op_index, (index, request)) in requests.iter().enumerate() {
            let input = self.handles.resolve(*index, ambient)?;
            let ctx = OpContext::new(self.id, request.logon_id(), op_index, input);

            tracing::trace!(
                session = %self.id,
                op = ?request.kind(),
                op_index,
                input = input.0,
                "executing operation"
            );

            let response = match handler.handle(request, &ctx) {
                HandlerOutcome::Reply(response) => response,
                HandlerOutcome::Open { response, handle } => {
                    if let Some(slot) = request.output_handle_index() {
                        self.handles.allocate(slot, handle);
                    }
                    response
                }
                HandlerOutcome::Fault(code) => RopResponse::Fault(RopFault {
                    kind: request.kind(),
                    handle_index: request.input_handle_index(),
                    code,
                }),
            };

            if matches!(request, RopRequest::Release(_)) {
                if let Some(slot) = index.as_slot() {
                    self.handles.release(slot);
                }
            }

            self.request_count += 1;
            responses.push(response);
        }
        Ok(responses)
    }

    /// Processes one packed request buffer end to end: decode, execute,
    /// assemble the response buffer with queued notifications and the
    /// handle-table snapshot.
    pub fn process_buffer(
        &mut self,
        buffer: &[u8],
        ambient: ObjectHandle,
        handler: &mut dyn RopHandler,
    ) -> Result<Bytes, SessionError> {
        let requests = unpack_requests(buffer)?;
        tracing::debug!(
            session = %self.id,
            count = requests.len(),
            "processing request buffer"
        );

        let responses = self.execute(&requests, ambient, handler)?;
        let snapshot = self.handles.snapshot();
        let assembled = self.assemble(&responses, &snapshot)?;
        Ok(assembled.bytes)
    }

    /// Assembles responses into a framed buffer, draining the queue.
    pub fn assemble(
        &self,
        responses: &[RopResponse],
        handle_table: &[ObjectHandle],
    ) -> Result<AssembledBuffer, SessionError> {
        self.assembler
            .assemble(responses, &self.queue, handle_table, 0)
    }
}
