//! Multi-operation buffer framing: packing requests, splitting responses.
//!
//! Buffer layout (8-byte header + payload):
//!
//! ```text
//! +---------+-------+------+-------------+----------+----------+---------+
//! | version | flags | size | size_actual | rop_size | rops ... | handles |
//! | 2 bytes |2 bytes|2 byte|   2 bytes   | 2 bytes  |          | u32 ... |
//! +---------+-------+------+-------------+----------+----------+---------+
//! ```
//!
//! `size` covers everything after the header; `rop_size` includes its own
//! two bytes. Request buffers prefix each operation with its 16-bit
//! handle index and carry no handle table; response buffers append the
//! session's object-handle table after the operations.

use crate::error::ProtocolError;
use crate::rop::{BufferTooSmallResponse, RopKind, RopRequest, RopResponse};
use crate::value::ensure;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;

/// Size of the fixed buffer header in bytes.
pub const BUFFER_HEADER_LEN: usize = 8;

/// Buffer format version emitted and accepted by this implementation.
pub const BUFFER_VERSION: u16 = 0;

/// Maximum payload covered by the 16-bit size field.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Default negotiated maximum response buffer size (`pcb_out`).
pub const DEFAULT_PCB_OUT: u32 = 0x8000;

/// Buffer flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferFlags(u16);

impl BufferFlags {
    /// Payload is compressed (not emitted by this implementation).
    pub const COMPRESSED: u16 = 0x0001;
    /// Payload is obfuscated (not emitted by this implementation).
    pub const OBFUSCATED: u16 = 0x0002;
    /// No further buffer follows this one.
    pub const LAST: u16 = 0x0004;

    const VALID_MASK: u16 = 0x0007;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_last(mut self) -> Self {
        self.0 |= Self::LAST;
        self
    }

    pub fn is_last(&self) -> bool {
        self.0 & Self::LAST != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }

    pub fn is_obfuscated(&self) -> bool {
        self.0 & Self::OBFUSCATED != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Result<Self, ProtocolError> {
        if bits & !Self::VALID_MASK != 0 {
            return Err(ProtocolError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }
}

/// Parsed buffer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferHeader {
    pub version: u16,
    pub flags: BufferFlags,
    /// Payload length following the header.
    pub size: u16,
    /// Payload length after decompression; equals `size` here since
    /// compression is never emitted.
    pub size_actual: u16,
}

impl BufferHeader {
    fn new(size: u16) -> Self {
        Self {
            version: BUFFER_VERSION,
            flags: BufferFlags::new().with_last(),
            size,
            size_actual: size,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.flags.bits());
        buf.put_u16_le(self.size);
        buf.put_u16_le(self.size_actual);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(buf, BUFFER_HEADER_LEN)?;
        let version = buf.get_u16_le();
        if version != BUFFER_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let flags = BufferFlags::from_bits(buf.get_u16_le())?;
        if !flags.is_last() {
            return Err(ProtocolError::MalformedValue {
                reason: "chained buffers are not supported",
            });
        }
        if flags.is_compressed() || flags.is_obfuscated() {
            return Err(ProtocolError::MalformedValue {
                reason: "compressed or obfuscated buffers are not supported",
            });
        }
        let size = buf.get_u16_le();
        let size_actual = buf.get_u16_le();
        if size != size_actual {
            return Err(ProtocolError::MalformedValue {
                reason: "size and size_actual disagree on an uncompressed buffer",
            });
        }
        Ok(Self {
            version,
            flags,
            size,
            size_actual,
        })
    }
}

/// Index of a slot in the session object-handle table.
///
/// Valid slots are 0–255; [`HandleIndex::AMBIENT`] is reserved and resolves
/// to the default handle supplied with the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HandleIndex(pub u16);

impl HandleIndex {
    /// Reserved sentinel: use the call's ambient handle.
    pub const AMBIENT: HandleIndex = HandleIndex(0xFFFF);

    pub const fn slot(slot: u8) -> Self {
        HandleIndex(slot as u16)
    }

    pub fn is_ambient(&self) -> bool {
        *self == Self::AMBIENT
    }

    /// Returns the table slot, or `None` for the ambient sentinel and
    /// other out-of-range values.
    pub fn as_slot(&self) -> Option<u8> {
        u8::try_from(self.0).ok()
    }
}

/// An opaque server object handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectHandle(pub u32);

impl ObjectHandle {
    /// Placeholder for slots that hold no handle.
    pub const NONE: ObjectHandle = ObjectHandle(0xFFFF_FFFF);
}

/// Packs requests and their handle indices into one outbound buffer.
///
/// `handle_indices[i]` names the slot that resolves request `i`'s input
/// handle, or [`HandleIndex::AMBIENT`]. The two sequences must be the same
/// length.
pub fn pack(
    requests: &[RopRequest],
    handle_indices: &[HandleIndex],
) -> Result<Bytes, ProtocolError> {
    if requests.len() != handle_indices.len() {
        return Err(ProtocolError::HandleCountMismatch {
            requests: requests.len(),
            handles: handle_indices.len(),
        });
    }

    let mut rops = BytesMut::new();
    for (request, index) in requests.iter().zip(handle_indices) {
        rops.put_u16_le(index.0);
        request.encode(&mut rops)?;
    }

    let payload_len = 2 + rops.len();
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::BufferTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(BUFFER_HEADER_LEN + payload_len);
    BufferHeader::new(payload_len as u16).encode(&mut buf);
    buf.put_u16_le(payload_len as u16);
    buf.put_slice(&rops);
    Ok(buf.freeze())
}

/// Frames already-encoded response operations and the session handle table
/// into one buffer.
pub fn frame_responses(
    encoded_rops: &[u8],
    handle_table: &[ObjectHandle],
) -> Result<Bytes, ProtocolError> {
    let rop_size = 2 + encoded_rops.len();
    let payload_len = rop_size + handle_table.len() * 4;
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::BufferTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(BUFFER_HEADER_LEN + payload_len);
    BufferHeader::new(payload_len as u16).encode(&mut buf);
    buf.put_u16_le(rop_size as u16);
    buf.put_slice(encoded_rops);
    for handle in handle_table {
        buf.put_u32_le(handle.0);
    }
    Ok(buf.freeze())
}

/// Result of splitting a response buffer.
#[derive(Debug, Clone)]
pub struct UnpackedResponses {
    /// Decoded responses in buffer order, including out-of-band entries.
    pub responses: Vec<RopResponse>,
    /// Whether the response sequence was cut short by the size limit;
    /// the last entry is then a `BufferTooSmall` marker.
    pub truncated: bool,
    /// Object-handle table snapshot carried by the buffer.
    pub handle_table: Vec<ObjectHandle>,
}

/// Splits a response buffer into its responses.
///
/// Responses are decoded in order until the buffer is exhausted or the next
/// response would extend past `max_size` bytes of buffer; in the latter
/// case decoding stops, a synthetic `BufferTooSmall` marker is appended and
/// `truncated` is set. Receiving fewer than `expected_count` responses with
/// `truncated` set is normal flow; callers resubmit the unanswered tail.
pub fn unpack(
    buffer: &[u8],
    expected_count: usize,
    max_size: u32,
) -> Result<UnpackedResponses, ProtocolError> {
    let (rop_region, handle_table) = split_payload(buffer)?;

    let budget = max_size as usize;
    // Overhead charged against the budget alongside the operations.
    let overhead = BUFFER_HEADER_LEN + 2 + handle_table.len() * 4;

    let mut responses = Vec::with_capacity(expected_count);
    let mut truncated = false;
    let mut cursor = rop_region;
    let mut consumed = overhead;

    while !cursor.is_empty() {
        let before = cursor.len();
        let response = RopResponse::decode(&mut cursor)?;
        let encoded_len = before - cursor.len();

        if consumed + encoded_len > budget {
            truncated = true;
            responses.push(RopResponse::BufferTooSmall(BufferTooSmallResponse {
                size_needed: encoded_len.min(u16::MAX as usize) as u16,
            }));
            tracing::debug!(
                dropped = encoded_len,
                budget,
                "response exceeded size limit, truncating"
            );
            break;
        }
        consumed += encoded_len;

        if response.kind() == RopKind::BufferTooSmall {
            truncated = true;
        }
        responses.push(response);
    }

    let answered = responses
        .iter()
        .filter(|r| !r.kind().is_out_of_band())
        .count();
    if answered != expected_count {
        tracing::debug!(
            expected = expected_count,
            answered,
            truncated,
            "response count differs from request count"
        );
    }

    Ok(UnpackedResponses {
        responses,
        truncated,
        handle_table,
    })
}

/// Splits a request buffer back into (handle index, request) pairs.
pub fn unpack_requests(buffer: &[u8]) -> Result<Vec<(HandleIndex, RopRequest)>, ProtocolError> {
    let (rop_region, handle_table) = split_payload(buffer)?;
    if !handle_table.is_empty() {
        return Err(ProtocolError::MalformedValue {
            reason: "request buffer carries a handle table",
        });
    }

    let mut requests = Vec::new();
    let mut cursor = rop_region;
    while !cursor.is_empty() {
        ensure(cursor, 2)?;
        let index = HandleIndex(cursor.get_u16_le());
        let request = RopRequest::decode(&mut cursor)?;
        requests.push((index, request));
    }
    Ok(requests)
}

/// Validates the header and splits the payload into the operation region
/// and the trailing handle table.
fn split_payload(buffer: &[u8]) -> Result<(&[u8], Vec<ObjectHandle>), ProtocolError> {
    let mut cursor = buffer;
    let header = BufferHeader::decode(&mut cursor)?;
    ensure(cursor, header.size as usize)?;
    let payload = &cursor[..header.size as usize];

    let mut p = payload;
    ensure(p, 2)?;
    let rop_size = p.get_u16_le() as usize;
    if rop_size < 2 || rop_size > payload.len() {
        return Err(ProtocolError::MalformedValue {
            reason: "operation size field out of range",
        });
    }

    let rop_region = &payload[2..rop_size];
    let handle_region = &payload[rop_size..];
    if handle_region.len() % 4 != 0 {
        return Err(ProtocolError::MalformedValue {
            reason: "handle table is not a whole number of 32-bit entries",
        });
    }

    let mut handles = Vec::with_capacity(handle_region.len() / 4);
    let mut h = handle_region;
    while !h.is_empty() {
        handles.push(ObjectHandle(h.get_u32_le()));
    }
    Ok((rop_region, handles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::{
        GetPermissionsTableRequest, QueryRowsRequest, ReleaseResponse, SetColumnsRequest,
        SetColumnsResponse,
    };
    use crate::tags;

    fn sample_requests() -> Vec<RopRequest> {
        vec![
            RopRequest::GetPermissionsTable(GetPermissionsTableRequest {
                logon_id: 0,
                input_handle_index: 0,
                output_handle_index: 1,
                table_flags: 0,
            }),
            RopRequest::SetColumns(SetColumnsRequest {
                logon_id: 0,
                input_handle_index: 1,
                flags: 0,
                columns: vec![tags::PID_TAG_MEMBER_ID, tags::PID_TAG_MEMBER_RIGHTS],
            }),
            RopRequest::QueryRows(QueryRowsRequest {
                logon_id: 0,
                input_handle_index: 1,
                flags: 0,
                forward_read: true,
                row_count: 20,
            }),
        ]
    }

    #[test]
    fn test_pack_unpack_requests_roundtrip() {
        let requests = sample_requests();
        let indices = vec![HandleIndex::AMBIENT, HandleIndex::slot(1), HandleIndex::slot(1)];

        let buffer = pack(&requests, &indices).unwrap();
        let decoded = unpack_requests(&buffer).unwrap();

        assert_eq!(decoded.len(), 3);
        for ((index, request), (expected_index, expected_request)) in
            decoded.iter().zip(indices.iter().zip(&requests))
        {
            assert_eq!(index, expected_index);
            assert_eq!(request, expected_request);
        }
    }

    #[test]
    fn test_pack_count_mismatch() {
        let requests = sample_requests();
        let result = pack(&requests, &[HandleIndex::AMBIENT]);
        assert!(matches!(
            result,
            Err(ProtocolError::HandleCountMismatch {
                requests: 3,
                handles: 1
            })
        ));
    }

    fn frame(responses: &[RopResponse], handles: &[ObjectHandle]) -> Bytes {
        let mut rops = BytesMut::new();
        for response in responses {
            response.encode(&mut rops).unwrap();
        }
        frame_responses(&rops, handles).unwrap()
    }

    #[test]
    fn test_unpack_order_and_handle_table() {
        let responses = vec![
            RopResponse::SetColumns(SetColumnsResponse { handle_index: 1 }),
            RopResponse::Release(ReleaseResponse { handle_index: 0 }),
        ];
        let handles = vec![ObjectHandle(0x10), ObjectHandle(0x20)];
        let buffer = frame(&responses, &handles);

        let unpacked = unpack(&buffer, 2, DEFAULT_PCB_OUT).unwrap();
        assert!(!unpacked.truncated);
        assert_eq!(unpacked.handle_table, handles);
        let kinds: Vec<RopKind> = unpacked.responses.iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec![RopKind::SetColumns, RopKind::Release]);
    }

    #[test]
    fn test_unpack_truncates_at_size_limit() {
        // Ten identical fixed-size responses, budget for roughly half.
        let responses: Vec<RopResponse> = (0..10)
            .map(|_| RopResponse::Release(ReleaseResponse { handle_index: 0 }))
            .collect();
        let buffer = frame(&responses, &[]);

        let one = RopResponse::Release(ReleaseResponse { handle_index: 0 })
            .to_bytes()
            .unwrap()
            .len();
        let budget = (BUFFER_HEADER_LEN + 2 + one * 5) as u32;

        let unpacked = unpack(&buffer, 10, budget).unwrap();
        assert!(unpacked.truncated);
        assert!(unpacked.responses.len() < 10);
        assert_eq!(unpacked.responses.len(), 6); // five decoded plus the marker
        assert_eq!(
            unpacked.responses.last().map(|r| r.kind()),
            Some(RopKind::BufferTooSmall)
        );
    }

    #[test]
    fn test_unpack_server_emitted_marker() {
        let responses = vec![
            RopResponse::Release(ReleaseResponse { handle_index: 0 }),
            RopResponse::BufferTooSmall(BufferTooSmallResponse { size_needed: 128 }),
        ];
        let buffer = frame(&responses, &[]);

        let unpacked = unpack(&buffer, 2, DEFAULT_PCB_OUT).unwrap();
        assert!(unpacked.truncated);
        assert_eq!(unpacked.responses.len(), 2);
    }

    #[test]
    fn test_request_buffer_layout() {
        let requests = vec![RopRequest::Release(crate::rop::ReleaseRequest {
            logon_id: 0,
            input_handle_index: 0,
        })];
        let buffer = pack(&requests, &[HandleIndex::slot(0)]).unwrap();

        // Header: version 0, LAST flag, size twice.
        assert_eq!(&buffer[0..2], &[0x00, 0x00]);
        assert_eq!(&buffer[2..4], &[0x04, 0x00]);
        // Payload: rop_size (2 + 2-byte index + 3-byte release), index, rop.
        assert_eq!(&buffer[8..10], &[0x07, 0x00]);
        assert_eq!(&buffer[10..12], &[0x00, 0x00]);
        assert_eq!(buffer[12], 0x01);
    }

    #[test]
    fn test_unsupported_version() {
        let mut raw = BytesMut::new();
        raw.put_u16_le(9);
        raw.put_u16_le(BufferFlags::LAST);
        raw.put_u16_le(2);
        raw.put_u16_le(2);
        raw.put_u16_le(2);
        assert!(matches!(
            unpack(&raw, 0, DEFAULT_PCB_OUT),
            Err(ProtocolError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_chained_buffer_rejected() {
        let mut raw = BytesMut::new();
        raw.put_u16_le(BUFFER_VERSION);
        raw.put_u16_le(0); // LAST not set
        raw.put_u16_le(2);
        raw.put_u16_le(2);
        raw.put_u16_le(2);
        assert!(matches!(
            unpack(&raw, 0, DEFAULT_PCB_OUT),
            Err(ProtocolError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let requests = vec![RopRequest::Release(crate::rop::ReleaseRequest {
            logon_id: 0,
            input_handle_index: 0,
        })];
        let buffer = pack(&requests, &[HandleIndex::slot(0)]).unwrap();
        let cut = &buffer[..buffer.len() - 2];
        assert!(matches!(
            unpack_requests(cut),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_misaligned_handle_table() {
        let mut raw = BytesMut::new();
        raw.put_u16_le(BUFFER_VERSION);
        raw.put_u16_le(BufferFlags::LAST);
        raw.put_u16_le(5);
        raw.put_u16_le(5);
        raw.put_u16_le(2); // empty rop region
        raw.put_slice(&[0xAA, 0xBB, 0xCC]); // 3 stray bytes
        assert!(matches!(
            unpack(&raw, 0, DEFAULT_PCB_OUT),
            Err(ProtocolError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_handle_index_sentinel() {
        assert!(HandleIndex::AMBIENT.is_ambient());
        assert_eq!(HandleIndex::AMBIENT.as_slot(), None);
        assert_eq!(HandleIndex::slot(7).as_slot(), Some(7));
        assert!(!HandleIndex::slot(7).is_ambient());
    }
}
