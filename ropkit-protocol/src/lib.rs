//! # ropkit-protocol
//!
//! Wire protocol implementation for ropkit (ROP - Remote Operations).
//!
//! This crate provides:
//! - Tagged property value encoding/decoding (little-endian throughout)
//! - Per-operation request/response schemas over a closed operation set
//! - Multi-operation buffer packing and response splitting with
//!   overflow truncation
//! - Change-notification payloads and the out-of-band Notify/Pending/
//!   BufferTooSmall responses

pub mod buffer;
pub mod error;
pub mod notification;
pub mod rop;
pub mod tags;
pub mod value;

pub use buffer::{
    frame_responses, pack, unpack, unpack_requests, BufferFlags, BufferHeader, HandleIndex,
    ObjectHandle, UnpackedResponses, BUFFER_HEADER_LEN, BUFFER_VERSION, DEFAULT_PCB_OUT,
    MAX_PAYLOAD_SIZE,
};
pub use error::ProtocolError;
pub use notification::{EventMask, NotificationData};
pub use rop::{RopFault, RopKind, RopRequest, RopResponse, RowChange, RowOp};
pub use value::{PropertyTag, PropertyType, PropertyValue, TaggedPropertyValue};
