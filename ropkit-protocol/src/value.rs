//! Tagged property values and their binary encoding.
//!
//! All multi-byte quantities are little-endian. Fixed-width types encode as
//! their raw bytes; strings are null-terminated (UTF-16LE for [`Unicode`],
//! one byte per character for [`String8`]); binary blobs carry a 16-bit
//! length prefix.
//!
//! [`Unicode`]: PropertyType::Unicode
//! [`String8`]: PropertyType::String8

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

/// Wire type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyType {
    /// 16-bit signed integer.
    Integer16,
    /// 32-bit signed integer.
    Integer32,
    /// Single byte, 0 or 1.
    Boolean,
    /// 64-bit signed integer.
    Integer64,
    /// Null-terminated single-byte string.
    String8,
    /// Null-terminated UTF-16LE string.
    Unicode,
    /// 16-byte GUID.
    Guid,
    /// Length-prefixed byte blob.
    Binary,
}

impl PropertyType {
    /// Returns the wire code for this type.
    pub const fn code(&self) -> u16 {
        match self {
            PropertyType::Integer16 => 0x0002,
            PropertyType::Integer32 => 0x0003,
            PropertyType::Boolean => 0x000B,
            PropertyType::Integer64 => 0x0014,
            PropertyType::String8 => 0x001E,
            PropertyType::Unicode => 0x001F,
            PropertyType::Guid => 0x0048,
            PropertyType::Binary => 0x0102,
        }
    }

    /// Looks up a type by its wire code.
    pub fn from_code(code: u16) -> Result<Self, ProtocolError> {
        match code {
            0x0002 => Ok(PropertyType::Integer16),
            0x0003 => Ok(PropertyType::Integer32),
            0x000B => Ok(PropertyType::Boolean),
            0x0014 => Ok(PropertyType::Integer64),
            0x001E => Ok(PropertyType::String8),
            0x001F => Ok(PropertyType::Unicode),
            0x0048 => Ok(PropertyType::Guid),
            0x0102 => Ok(PropertyType::Binary),
            other => Err(ProtocolError::UnknownPropertyType(other)),
        }
    }

    /// Returns whether values of this type have a fixed wire width.
    pub fn is_fixed_width(&self) -> bool {
        !matches!(
            self,
            PropertyType::String8 | PropertyType::Unicode | PropertyType::Binary
        )
    }
}

/// A property tag: the (id, type) pair identifying a property's encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PropertyTag {
    /// Property id.
    pub id: u16,
    /// Wire type of the property's value.
    pub kind: PropertyType,
}

impl PropertyTag {
    /// Encoded size of a tag: id and type code, two bytes each.
    pub const ENCODED_LEN: usize = 4;

    pub const fn new(id: u16, kind: PropertyType) -> Self {
        Self { id, kind }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.id);
        buf.put_u16_le(self.kind.code());
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(buf, Self::ENCODED_LEN)?;
        let id = buf.get_u16_le();
        let kind = PropertyType::from_code(buf.get_u16_le())?;
        Ok(Self { id, kind })
    }
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PropertyValue {
    Integer16(i16),
    Integer32(i32),
    Boolean(bool),
    Integer64(i64),
    /// Single-byte string; must not contain an interior NUL.
    String8(String),
    /// UTF-16 string; must not contain an interior NUL.
    Unicode(String),
    Guid([u8; 16]),
    Binary(Vec<u8>),
}

impl PropertyValue {
    /// Returns the wire type of this value.
    pub fn kind(&self) -> PropertyType {
        match self {
            PropertyValue::Integer16(_) => PropertyType::Integer16,
            PropertyValue::Integer32(_) => PropertyType::Integer32,
            PropertyValue::Boolean(_) => PropertyType::Boolean,
            PropertyValue::Integer64(_) => PropertyType::Integer64,
            PropertyValue::String8(_) => PropertyType::String8,
            PropertyValue::Unicode(_) => PropertyType::Unicode,
            PropertyValue::Guid(_) => PropertyType::Guid,
            PropertyValue::Binary(_) => PropertyType::Binary,
        }
    }

    /// Returns the encoded size of this value in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            PropertyValue::Integer16(_) => 2,
            PropertyValue::Integer32(_) => 4,
            PropertyValue::Boolean(_) => 1,
            PropertyValue::Integer64(_) => 8,
            PropertyValue::String8(s) => s.len() + 1,
            PropertyValue::Unicode(s) => s.encode_utf16().count() * 2 + 2,
            PropertyValue::Guid(_) => 16,
            PropertyValue::Binary(b) => 2 + b.len(),
        }
    }

    /// Encodes the value into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            PropertyValue::Integer16(v) => buf.put_i16_le(*v),
            PropertyValue::Integer32(v) => buf.put_i32_le(*v),
            PropertyValue::Boolean(v) => buf.put_u8(*v as u8),
            PropertyValue::Integer64(v) => buf.put_i64_le(*v),
            PropertyValue::String8(s) => {
                if s.as_bytes().contains(&0) {
                    return Err(ProtocolError::MalformedValue {
                        reason: "interior NUL in string value",
                    });
                }
                buf.put_slice(s.as_bytes());
                buf.put_u8(0);
            }
            PropertyValue::Unicode(s) => {
                if s.contains('\0') {
                    return Err(ProtocolError::MalformedValue {
                        reason: "interior NUL in string value",
                    });
                }
                for unit in s.encode_utf16() {
                    buf.put_u16_le(unit);
                }
                buf.put_u16_le(0);
            }
            PropertyValue::Guid(g) => buf.put_slice(g),
            PropertyValue::Binary(b) => {
                if b.len() > u16::MAX as usize {
                    return Err(ProtocolError::MalformedValue {
                        reason: "binary value exceeds 16-bit length prefix",
                    });
                }
                buf.put_u16_le(b.len() as u16);
                buf.put_slice(b);
            }
        }
        Ok(())
    }

    /// Decodes a value of the given type from `buf`, advancing it.
    pub fn decode(kind: PropertyType, buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        match kind {
            PropertyType::Integer16 => {
                ensure(buf, 2)?;
                Ok(PropertyValue::Integer16(buf.get_i16_le()))
            }
            PropertyType::Integer32 => {
                ensure(buf, 4)?;
                Ok(PropertyValue::Integer32(buf.get_i32_le()))
            }
            PropertyType::Boolean => {
                ensure(buf, 1)?;
                match buf.get_u8() {
                    0 => Ok(PropertyValue::Boolean(false)),
                    1 => Ok(PropertyValue::Boolean(true)),
                    _ => Err(ProtocolError::MalformedValue {
                        reason: "boolean byte is neither 0 nor 1",
                    }),
                }
            }
            PropertyType::Integer64 => {
                ensure(buf, 8)?;
                Ok(PropertyValue::Integer64(buf.get_i64_le()))
            }
            PropertyType::String8 => {
                let Some(end) = buf.iter().position(|&b| b == 0) else {
                    return Err(ProtocolError::MalformedValue {
                        reason: "unterminated string value",
                    });
                };
                let s = std::str::from_utf8(&buf[..end])
                    .map_err(|_| ProtocolError::MalformedValue {
                        reason: "string value is not valid UTF-8",
                    })?
                    .to_string();
                buf.advance(end + 1);
                Ok(PropertyValue::String8(s))
            }
            PropertyType::Unicode => {
                let mut units = Vec::new();
                loop {
                    ensure(buf, 2)?;
                    let unit = buf.get_u16_le();
                    if unit == 0 {
                        break;
                    }
                    units.push(unit);
                }
                let s = String::from_utf16(&units).map_err(|_| ProtocolError::MalformedValue {
                    reason: "string value is not valid UTF-16",
                })?;
                Ok(PropertyValue::Unicode(s))
            }
            PropertyType::Guid => {
                ensure(buf, 16)?;
                let mut g = [0u8; 16];
                buf.copy_to_slice(&mut g);
                Ok(PropertyValue::Guid(g))
            }
            PropertyType::Binary => {
                ensure(buf, 2)?;
                let len = buf.get_u16_le() as usize;
                if buf.remaining() < len {
                    return Err(ProtocolError::MalformedValue {
                        reason: "declared length exceeds remaining buffer",
                    });
                }
                let mut b = vec![0u8; len];
                buf.copy_to_slice(&mut b);
                Ok(PropertyValue::Binary(b))
            }
        }
    }
}

/// A property tag paired with its value; self-describing on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedPropertyValue {
    pub tag: PropertyTag,
    pub value: PropertyValue,
}

impl TaggedPropertyValue {
    pub fn new(tag: PropertyTag, value: PropertyValue) -> Self {
        Self { tag, value }
    }

    /// Returns the encoded size: tag plus value.
    pub fn encoded_len(&self) -> usize {
        PropertyTag::ENCODED_LEN + self.value.encoded_len()
    }

    /// Encodes the tag followed by the value.
    ///
    /// Fails if the value's type does not match the tag's declared type.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if self.tag.kind != self.value.kind() {
            return Err(ProtocolError::MalformedValue {
                reason: "value type does not match tag type",
            });
        }
        self.tag.encode(buf);
        self.value.encode(buf)
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        let tag = PropertyTag::decode(buf)?;
        let value = PropertyValue::decode(tag.kind, buf)?;
        Ok(Self { tag, value })
    }
}

pub(crate) fn ensure(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::UnexpectedEof {
            needed: needed - buf.len(),
        })
    } else {
        Ok(())
    }
}
