//! Response-buffer assembly under a size limit.

use crate::config::PendingPolicy;
use crate::error::SessionError;
use crate::queue::NotificationQueue;
use bytes::{Bytes, BytesMut};
use ropkit_protocol::rop::{BufferTooSmallResponse, PendingResponse};
use ropkit_protocol::{frame_responses, ObjectHandle, RopResponse, BUFFER_HEADER_LEN};

/// Packs executed responses and queued notifications into one outbound
/// buffer that never exceeds the negotiated size.
///
/// Overflow is truncation, not failure: as many whole responses as fit are
/// emitted, followed by a `BufferTooSmall` marker, and the caller is
/// expected to resubmit the unanswered requests. Notifications are only
/// drained into buffers with spare capacity; every flushed `Notify`
/// precedes any trailing `Pending`.
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    max_size: u32,
    policy: PendingPolicy,
}

/// An assembled response buffer.
#[derive(Debug, Clone)]
pub struct AssembledBuffer {
    pub bytes: Bytes,
    /// Whether the response sequence was cut short by the size limit.
    pub truncated: bool,
    /// Notifications flushed into this buffer.
    pub notify_count: usize,
    /// Whether a Pending marker was appended.
    pub pending_emitted: bool,
}

impl ResponseAssembler {
    pub fn new(max_size: u32, policy: PendingPolicy) -> Self {
        Self { max_size, policy }
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn policy(&self) -> PendingPolicy {
        self.policy
    }

    /// Assembles `responses` plus any queued notifications into a framed
    /// buffer carrying `handle_table`.
    pub fn assemble(
        &self,
        responses: &[RopResponse],
        queue: &NotificationQueue,
        handle_table: &[ObjectHandle],
        session_index: u16,
    ) -> Result<AssembledBuffer, SessionError> {
        let overhead = BUFFER_HEADER_LEN + 2 + handle_table.len() * 4;
        let marker_len = BufferTooSmallResponse::ENCODED_LEN;
        let budget = (self.max_size as usize)
            .checked_sub(overhead)
            .filter(|b| *b >= marker_len)
            .ok_or(SessionError::SizeLimitTooSmall(self.max_size))?;

        let mut rops = BytesMut::new();
        let mut truncated = false;

        for response in responses {
            let encoded = response.to_bytes().map_err(SessionError::Protocol)?;
            // Keep room for the truncation marker so it always fits.
            if rops.len() + encoded.len() > budget - marker_len {
                let marker = RopResponse::BufferTooSmall(BufferTooSmallResponse {
                    size_needed: encoded.len().min(u16::MAX as usize) as u16,
                });
                marker.encode(&mut rops).map_err(SessionError::Protocol)?;
                truncated = true;
                tracing::debug!(
                    emitted = rops.len(),
                    needed = encoded.len(),
                    max = self.max_size,
                    "response buffer full, truncating"
                );
                break;
            }
            rops.extend_from_slice(&encoded);
        }

        let mut notify_count = 0;
        let mut pending_emitted = false;
        if !truncated {
            let queued_before = queue.len();
            if queued_before > 0 {
                // Reserve room for a trailing Pending before flushing.
                let capacity = (budget - rops.len()).saturating_sub(PendingResponse::ENCODED_LEN);
                let outcome = queue.drain(capacity);
                for notify in &outcome.flushed {
                    RopResponse::Notify(notify.clone())
                        .encode(&mut rops)
                        .map_err(SessionError::Protocol)?;
                }
                notify_count = outcome.flushed.len();

                let emit_pending = match self.policy {
                    PendingPolicy::WhenBacklogRemains => outcome.remaining > 0,
                    PendingPolicy::WheneverQueued => true,
                };
                if emit_pending {
                    RopResponse::Pending(PendingResponse { session_index })
                        .encode(&mut rops)
                        .map_err(SessionError::Protocol)?;
                    pending_emitted = true;
                }
                tracing::debug!(
                    flushed = notify_count,
                    remaining = outcome.remaining,
                    pending = pending_emitted,
                    "drained notification queue"
                );
            }
        }

        let bytes = frame_responses(&rops, handle_table).map_err(SessionError::Protocol)?;
        Ok(AssembledBuffer {
            bytes,
            truncated,
            notify_count,
            pending_emitted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ropkit_protocol::rop::{NotifyResponse, ReleaseResponse};
    use ropkit_protocol::{unpack, EventMask, NotificationData, RopKind};

    fn release() -> RopResponse {
        RopResponse::Release(ReleaseResponse { handle_index: 0 })
    }

    fn notify(folder_id: u64) -> NotifyResponse {
        NotifyResponse {
            notification_handle: 0x200,
            logon_id: 0,
            data: NotificationData {
                event_mask: EventMask::new().with(EventMask::OBJECT_CREATED),
                folder_id,
                message_id: 0,
            },
        }
    }

    fn kinds(buffer: &[u8], expected: usize) -> Vec<RopKind> {
        unpack(buffer, expected, u32::MAX)
            .unwrap()
            .responses
            .iter()
            .map(|r| r.kind())
            .collect()
    }

    #[test]
    fn test_assemble_within_limit() {
        let assembler = ResponseAssembler::new(4096, PendingPolicy::WhenBacklogRemains);
        let queue = NotificationQueue::new(0);
        let out = assembler
            .assemble(&[release(), release()], &queue, &[], 0)
            .unwrap();

        assert!(!out.truncated);
        assert_eq!(out.notify_count, 0);
        assert!(!out.pending_emitted);
        assert_eq!(
            kinds(&out.bytes, 2),
            vec![RopKind::Release, RopKind::Release]
        );
    }

    #[test]
    fn test_assemble_truncates_on_overflow() {
        // One Release response is 6 bytes; leave room for two plus the marker.
        let max = (BUFFER_HEADER_LEN + 2 + 6 * 2 + BufferTooSmallResponse::ENCODED_LEN) as u32;
        let assembler = ResponseAssembler::new(max, PendingPolicy::WhenBacklogRemains);
        let queue = NotificationQueue::new(0);
        let responses = vec![release(), release(), release(), release()];

        let out = assembler.assemble(&responses, &queue, &[], 0).unwrap();
        assert!(out.truncated);
        assert!(out.bytes.len() <= max as usize);
        assert_eq!(
            kinds(&out.bytes, 4),
            vec![RopKind::Release, RopKind::Release, RopKind::BufferTooSmall]
        );
    }

    #[test]
    fn test_notifications_flushed_before_pending() {
        let assembler = ResponseAssembler::new(4096, PendingPolicy::WheneverQueued);
        let queue = NotificationQueue::new(0);
        queue.enqueue(notify(1));
        queue.enqueue(notify(2));

        let out = assembler.assemble(&[release()], &queue, &[], 7).unwrap();
        assert_eq!(out.notify_count, 2);
        assert!(out.pending_emitted);
        assert_eq!(
            kinds(&out.bytes, 1),
            vec![
                RopKind::Release,
                RopKind::Notify,
                RopKind::Notify,
                RopKind::Pending
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pending_only_when_backlog_remains() {
        let assembler = ResponseAssembler::new(4096, PendingPolicy::WhenBacklogRemains);
        let queue = NotificationQueue::new(0);
        queue.enqueue(notify(1));

        // Everything fits, so no Pending under this policy.
        let out = assembler.assemble(&[release()], &queue, &[], 0).unwrap();
        assert_eq!(out.notify_count, 1);
        assert!(!out.pending_emitted);
    }

    #[test]
    fn test_pending_emitted_for_leftover_backlog() {
        // Room for the Release plus exactly one Notify and the Pending.
        let max = (BUFFER_HEADER_LEN
            + 2
            + 6
            + NotifyResponse::ENCODED_LEN
            + PendingResponse::ENCODED_LEN) as u32;
        let assembler = ResponseAssembler::new(max, PendingPolicy::WhenBacklogRemains);
        let queue = NotificationQueue::new(0);
        queue.enqueue(notify(1));
        queue.enqueue(notify(2));
        queue.enqueue(notify(3));

        let out = assembler.assemble(&[release()], &queue, &[], 0).unwrap();
        assert_eq!(out.notify_count, 1);
        assert!(out.pending_emitted);
        assert_eq!(queue.len(), 2);
        assert_eq!(
            kinds(&out.bytes, 1),
            vec![RopKind::Release, RopKind::Notify, RopKind::Pending]
        );
    }

    #[test]
    fn test_whenever_queued_policy_with_ample_capacity() {
        let assembler = ResponseAssembler::new(4096, PendingPolicy::WheneverQueued);
        let queue = NotificationQueue::new(0);
        queue.enqueue(notify(1));

        // Same single-notification drain as above, other policy variant.
        let out = assembler.assemble(&[release()], &queue, &[], 0).unwrap();
        assert_eq!(out.notify_count, 1);
        assert!(out.pending_emitted);
    }

    #[test]
    fn test_truncated_buffer_skips_drain() {
        let max = (BUFFER_HEADER_LEN + 2 + BufferTooSmallResponse::ENCODED_LEN) as u32;
        let assembler = ResponseAssembler::new(max, PendingPolicy::WheneverQueued);
        let queue = NotificationQueue::new(0);
        queue.enqueue(notify(1));

        let out = assembler.assemble(&[release()], &queue, &[], 0).unwrap();
        assert!(out.truncated);
        assert_eq!(out.notify_count, 0);
        assert!(!out.pending_emitted);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_size_limit_too_small() {
        let assembler = ResponseAssembler::new(4, PendingPolicy::WhenBacklogRemains);
        let queue = NotificationQueue::new(0);
        assert!(matches!(
            assembler.assemble(&[], &queue, &[], 0),
            Err(SessionError::SizeLimitTooSmall(4))
        ));
    }

    #[test]
    fn test_handle_table_carried() {
        let assembler = ResponseAssembler::new(4096, PendingPolicy::WhenBacklogRemains);
        let queue = NotificationQueue::new(0);
        let handles = vec![ObjectHandle(0x11), ObjectHandle(0x22)];

        let out = assembler.assemble(&[release()], &queue, &handles, 0).unwrap();
        let unpacked = unpack(&out.bytes, 1, u32::MAX).unwrap();
        assert_eq!(unpacked.handle_table, handles);
    }
}
