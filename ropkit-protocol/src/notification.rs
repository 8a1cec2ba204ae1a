//! Change-notification payloads carried by Notify responses.

use crate::error::ProtocolError;
use crate::value::ensure;
use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

/// Event-type bitmask of a change notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventMask(u16);

impl EventMask {
    /// A new message arrived.
    pub const NEW_MAIL: u16 = 0x0002;
    /// An object was created.
    pub const OBJECT_CREATED: u16 = 0x0004;
    /// An object was deleted.
    pub const OBJECT_DELETED: u16 = 0x0008;
    /// An object was modified.
    pub const OBJECT_MODIFIED: u16 = 0x0010;
    /// An object was moved.
    pub const OBJECT_MOVED: u16 = 0x0020;
    /// An object was copied.
    pub const OBJECT_COPIED: u16 = 0x0040;
    /// A search finished populating.
    pub const SEARCH_COMPLETED: u16 = 0x0080;
    /// A table's contents changed.
    pub const TABLE_MODIFIED: u16 = 0x0100;

    const VALID_MASK: u16 = 0x01FE;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with(mut self, event: u16) -> Self {
        self.0 |= event;
        self
    }

    pub fn contains(&self, event: u16) -> bool {
        self.0 & event != 0
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

/// Payload of one change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationData {
    /// Event types this notification reports.
    pub event_mask: EventMask,
    /// Folder the event applies to.
    pub folder_id: u64,
    /// Message the event applies to, 0 for folder-level events.
    pub message_id: u64,
}

impl NotificationData {
    pub const ENCODED_LEN: usize = 2 + 8 + 8;

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.event_mask.bits());
        buf.put_u64_le(self.folder_id);
        buf.put_u64_le(self.message_id);
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(buf, Self::ENCODED_LEN)?;
        let event_mask = EventMask::from_bits(buf.get_u16_le())?;
        let folder_id = buf.get_u64_le();
        let message_id = buf.get_u64_le();
        Ok(Self {
            event_mask,
            folder_id,
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_mask_bits() {
        let mask = EventMask::new()
            .with(EventMask::NEW_MAIL)
            .with(EventMask::OBJECT_CREATED);
        assert!(mask.contains(EventMask::NEW_MAIL));
        assert!(mask.contains(EventMask::OBJECT_CREATED));
        assert!(!mask.contains(EventMask::OBJECT_DELETED));
        assert_eq!(mask.bits(), 0x0006);
    }

    #[test]
    fn test_invalid_event_mask() {
        assert!(matches!(
            EventMask::from_bits(0x0200),
            Err(ProtocolError::InvalidFlags(0x0200))
        ));
    }

    #[test]
    fn test_notification_roundtrip() {
        let data = NotificationData {
            event_mask: EventMask::new().with(EventMask::OBJECT_MODIFIED),
            folder_id: 0x0102_0304_0506_0708,
            message_id: 42,
        };

        let mut buf = BytesMut::new();
        data.encode(&mut buf);
        assert_eq!(buf.len(), NotificationData::ENCODED_LEN);

        let mut slice = &buf[..];
        let decoded = NotificationData::decode(&mut slice).unwrap();
        assert!(slice.is_empty());
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_notification_truncated() {
        let raw = [0x02, 0x00, 0x01];
        let mut slice = &raw[..];
        assert!(matches!(
            NotificationData::decode(&mut slice),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }
}
