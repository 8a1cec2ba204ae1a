//! High-level client API over a [`Transport`].

use crate::error::ClientError;
use crate::transport::Transport;
use ropkit_protocol::rop::NotifyResponse;
use ropkit_protocol::{
    pack, unpack, HandleIndex, ObjectHandle, RopKind, RopRequest, RopResponse, DEFAULT_PCB_OUT,
};

/// Result of one buffer exchange.
#[derive(Debug, Clone)]
pub struct RopCall {
    /// Responses in buffer order, including out-of-band entries.
    pub responses: Vec<RopResponse>,
    /// Whether the server cut the response sequence short.
    pub truncated: bool,
    /// Object-handle table snapshot from the response buffer.
    pub handle_table: Vec<ObjectHandle>,
}

impl RopCall {
    /// Responses answering packed requests, skipping out-of-band entries.
    pub fn operation_responses(&self) -> impl Iterator<Item = &RopResponse> {
        self.responses.iter().filter(|r| !r.kind().is_out_of_band())
    }

    /// Notifications delivered alongside the responses.
    pub fn notifications(&self) -> Vec<&NotifyResponse> {
        self.responses
            .iter()
            .filter_map(|r| match r {
                RopResponse::Notify(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Whether a Pending marker signalled further queued notifications.
    pub fn has_pending(&self) -> bool {
        self.responses
            .iter()
            .any(|r| r.kind() == RopKind::Pending)
    }

    /// Fails on the first operation response with a non-zero return code,
    /// preserving it.
    pub fn expect_success(&self) -> Result<(), ClientError> {
        for response in self.operation_responses() {
            if let Some(code) = response.return_code() {
                if code != 0 {
                    return Err(ClientError::Operation {
                        kind: response.kind(),
                        code,
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolves a slot from the returned handle table.
    pub fn handle_at(&self, slot: u8) -> Option<ObjectHandle> {
        self.handle_table
            .get(slot as usize)
            .copied()
            .filter(|h| *h != ObjectHandle::NONE)
    }
}

/// Packs requests, carries them over the transport, splits the response.
pub struct RopClient<T: Transport> {
    transport: T,
    pcb_out: u32,
}

impl<T: Transport> RopClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pcb_out: DEFAULT_PCB_OUT,
        }
    }

    /// Sets the negotiated maximum response buffer size.
    pub fn with_pcb_out(mut self, pcb_out: u32) -> Self {
        self.pcb_out = pcb_out;
        self
    }

    pub fn pcb_out(&self) -> u32 {
        self.pcb_out
    }

    /// Sends one packed buffer and splits the response.
    ///
    /// A truncated response is normal flow, reported via
    /// [`RopCall::truncated`]; callers resubmit the unanswered tail or use
    /// [`call_draining`](Self::call_draining).
    pub fn call(
        &mut self,
        requests: &[RopRequest],
        handle_indices: &[HandleIndex],
    ) -> Result<RopCall, ClientError> {
        let buffer = pack(requests, handle_indices)?;
        tracing::debug!(
            requests = requests.len(),
            bytes = buffer.len(),
            "sending request buffer"
        );
        tracing::trace!(buffer = %hex::encode(&buffer), "request bytes");

        let raw = self.transport.send_buffer(&buffer, self.pcb_out)?;
        tracing::trace!(buffer = %hex::encode(&raw), "response bytes");

        let unpacked = unpack(&raw, requests.len(), self.pcb_out)?;
        Ok(RopCall {
            responses: unpacked.responses,
            truncated: unpacked.truncated,
            handle_table: unpacked.handle_table,
        })
    }

    /// Like [`call`](Self::call), but resubmits the unanswered tail after
    /// each truncated response until every request is answered. The
    /// returned call never reports truncation.
    pub fn call_draining(
        &mut self,
        requests: &[RopRequest],
        handle_indices: &[HandleIndex],
    ) -> Result<RopCall, ClientError> {
        let mut remaining_requests = requests.to_vec();
        let mut remaining_indices = handle_indices.to_vec();
        let mut responses = Vec::with_capacity(requests.len());
        let mut handle_table = Vec::new();

        loop {
            let call = self.call(&remaining_requests, &remaining_indices)?;
            let answered = call.operation_responses().count();
            let truncated = call.truncated;
            handle_table = call.handle_table;
            responses.extend(
                call.responses
                    .into_iter()
                    .filter(|r| r.kind() != RopKind::BufferTooSmall),
            );

            if !truncated {
                break;
            }
            if answered == 0 {
                return Err(ClientError::NoProgress);
            }

            remaining_requests = remaining_requests.split_off(answered);
            remaining_indices = remaining_indices.split_off(answered);
            if remaining_requests.is_empty() {
                break;
            }
            tracing::debug!(
                remaining = remaining_requests.len(),
                "resubmitting after truncated response"
            );
        }

        Ok(RopCall {
            responses,
            truncated: false,
            handle_table,
        })
    }
}
