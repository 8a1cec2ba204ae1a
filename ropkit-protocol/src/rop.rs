//! Operation request/response schemas and their binary codec.
//!
//! Every operation is a variant of the closed [`RopRequest`]/[`RopResponse`]
//! unions; adding an operation means adding a variant and its schema arms
//! here. Requests open with the operation id and logon id; responses echo
//! the operation id and handle index followed by a 32-bit return code, where
//! 0 is success and anything else decodes to [`RopResponse::Fault`] carrying
//! the raw code.
//!
//! Three response kinds are out-of-band: `Notify`, `Pending` and
//! `BufferTooSmall` consume no request slot and carry no return code.

use crate::error::ProtocolError;
use crate::notification::{EventMask, NotificationData};
use crate::value::{ensure, PropertyTag, TaggedPropertyValue};
use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

/// Operation kinds, one per operation id byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RopKind {
    Release,
    CreateMessage,
    GetPropertiesAll,
    SaveChangesMessage,
    SetColumns,
    QueryRows,
    RegisterNotification,
    Notify,
    OpenStream,
    WriteStream,
    GetPermissionsTable,
    GetRulesTable,
    ModifyPermissions,
    ModifyRules,
    UpdateDeferredActionMessages,
    Pending,
    BufferTooSmall,
}

impl RopKind {
    /// Returns the operation id byte.
    pub const fn op_id(&self) -> u8 {
        match self {
            RopKind::Release => 0x01,
            RopKind::CreateMessage => 0x06,
            RopKind::GetPropertiesAll => 0x08,
            RopKind::SaveChangesMessage => 0x0C,
            RopKind::SetColumns => 0x12,
            RopKind::QueryRows => 0x15,
            RopKind::RegisterNotification => 0x29,
            RopKind::Notify => 0x2A,
            RopKind::OpenStream => 0x2B,
            RopKind::WriteStream => 0x2D,
            RopKind::GetPermissionsTable => 0x3E,
            RopKind::GetRulesTable => 0x3F,
            RopKind::ModifyPermissions => 0x40,
            RopKind::ModifyRules => 0x41,
            RopKind::UpdateDeferredActionMessages => 0x57,
            RopKind::Pending => 0x6E,
            RopKind::BufferTooSmall => 0xFF,
        }
    }

    /// Looks up a kind by its operation id byte.
    pub fn from_op_id(id: u8) -> Result<Self, ProtocolError> {
        match id {
            0x01 => Ok(RopKind::Release),
            0x06 => Ok(RopKind::CreateMessage),
            0x08 => Ok(RopKind::GetPropertiesAll),
            0x0C => Ok(RopKind::SaveChangesMessage),
            0x12 => Ok(RopKind::SetColumns),
            0x15 => Ok(RopKind::QueryRows),
            0x29 => Ok(RopKind::RegisterNotification),
            0x2A => Ok(RopKind::Notify),
            0x2B => Ok(RopKind::OpenStream),
            0x2D => Ok(RopKind::WriteStream),
            0x3E => Ok(RopKind::GetPermissionsTable),
            0x3F => Ok(RopKind::GetRulesTable),
            0x40 => Ok(RopKind::ModifyPermissions),
            0x41 => Ok(RopKind::ModifyRules),
            0x57 => Ok(RopKind::UpdateDeferredActionMessages),
            0x6E => Ok(RopKind::Pending),
            0xFF => Ok(RopKind::BufferTooSmall),
            other => Err(ProtocolError::UnknownOpId(other)),
        }
    }

    /// Returns whether this kind only appears out-of-band in response
    /// buffers, without a corresponding request slot.
    pub fn is_out_of_band(&self) -> bool {
        matches!(
            self,
            RopKind::Notify | RopKind::Pending | RopKind::BufferTooSmall
        )
    }
}

/// What a row change does to a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowOp {
    Add,
    Modify,
    Remove,
}

impl RowOp {
    pub const fn flag(&self) -> u8 {
        match self {
            RowOp::Add => 0x01,
            RowOp::Modify => 0x02,
            RowOp::Remove => 0x04,
        }
    }

    pub fn from_flag(flag: u8) -> Result<Self, ProtocolError> {
        match flag {
            0x01 => Ok(RowOp::Add),
            0x02 => Ok(RowOp::Modify),
            0x04 => Ok(RowOp::Remove),
            other => Err(ProtocolError::UnknownRowOp(other)),
        }
    }
}

/// One permission/rule row change: the row operation plus its properties.
///
/// Row order within a request is significant and preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowChange {
    pub op: RowOp,
    pub values: Vec<TaggedPropertyValue>,
}

impl RowChange {
    pub fn new(op: RowOp, values: Vec<TaggedPropertyValue>) -> Self {
        Self { op, values }
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.op.flag());
        encode_value_list(&self.values, buf)
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(buf, 1)?;
        let op = RowOp::from_flag(buf.get_u8())?;
        let values = decode_value_list(buf)?;
        Ok(Self { op, values })
    }
}

/// One self-describing table row in a QueryRows response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertyRow {
    pub values: Vec<TaggedPropertyValue>,
}

impl PropertyRow {
    pub fn new(values: Vec<TaggedPropertyValue>) -> Self {
        Self { values }
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        encode_value_list(&self.values, buf)
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            values: decode_value_list(buf)?,
        })
    }
}

fn encode_value_list(
    values: &[TaggedPropertyValue],
    buf: &mut BytesMut,
) -> Result<(), ProtocolError> {
    if values.len() > u16::MAX as usize {
        return Err(ProtocolError::MalformedValue {
            reason: "property value count exceeds 16-bit prefix",
        });
    }
    buf.put_u16_le(values.len() as u16);
    for value in values {
        value.encode(buf)?;
    }
    Ok(())
}

fn decode_value_list(buf: &mut &[u8]) -> Result<Vec<TaggedPropertyValue>, ProtocolError> {
    ensure(buf, 2)?;
    let count = buf.get_u16_le() as usize;
    let mut values = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        values.push(TaggedPropertyValue::decode(buf)?);
    }
    Ok(values)
}

fn decode_blob(buf: &mut &[u8]) -> Result<Vec<u8>, ProtocolError> {
    ensure(buf, 2)?;
    let len = buf.get_u16_le() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::MalformedValue {
            reason: "declared length exceeds remaining buffer",
        });
    }
    let mut data = vec![0u8; len];
    buf.copy_to_slice(&mut data);
    Ok(data)
}

fn encode_blob(data: &[u8], buf: &mut BytesMut) -> Result<(), ProtocolError> {
    if data.len() > u16::MAX as usize {
        return Err(ProtocolError::MalformedValue {
            reason: "blob exceeds 16-bit length prefix",
        });
    }
    buf.put_u16_le(data.len() as u16);
    buf.put_slice(data);
    Ok(())
}

fn decode_bool(buf: &mut &[u8]) -> Result<bool, ProtocolError> {
    ensure(buf, 1)?;
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ProtocolError::MalformedValue {
            reason: "boolean byte is neither 0 nor 1",
        }),
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateMessageRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub code_page_id: u16,
    pub folder_id: u64,
    pub associated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetPropertiesAllRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub property_size_limit: u16,
    pub want_unicode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveChangesMessageRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub response_handle_index: u8,
    pub save_flags: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetColumnsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub flags: u8,
    pub columns: Vec<PropertyTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRowsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub flags: u8,
    pub forward_read: bool,
    pub row_count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterNotificationRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub event_mask: EventMask,
    pub whole_store: bool,
    pub folder_id: u64,
    pub message_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenStreamRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub tag: PropertyTag,
    pub open_mode: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteStreamRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetPermissionsTableRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub table_flags: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetRulesTableRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub table_flags: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifyPermissionsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub modify_flags: u8,
    pub rows: Vec<RowChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifyRulesRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub modify_flags: u8,
    pub rows: Vec<RowChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateDeferredActionMessagesRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub server_entry_id: Vec<u8>,
    pub client_entry_id: Vec<u8>,
}

/// An operation request, ready for packing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RopRequest {
    Release(ReleaseRequest),
    CreateMessage(CreateMessageRequest),
    GetPropertiesAll(GetPropertiesAllRequest),
    SaveChangesMessage(SaveChangesMessageRequest),
    SetColumns(SetColumnsRequest),
    QueryRows(QueryRowsRequest),
    RegisterNotification(RegisterNotificationRequest),
    OpenStream(OpenStreamRequest),
    WriteStream(WriteStreamRequest),
    GetPermissionsTable(GetPermissionsTableRequest),
    GetRulesTable(GetRulesTableRequest),
    ModifyPermissions(ModifyPermissionsRequest),
    ModifyRules(ModifyRulesRequest),
    UpdateDeferredActionMessages(UpdateDeferredActionMessagesRequest),
}

impl RopRequest {
    /// Returns the operation kind.
    pub fn kind(&self) -> RopKind {
        match self {
            RopRequest::Release(_) => RopKind::Release,
            RopRequest::CreateMessage(_) => RopKind::CreateMessage,
            RopRequest::GetPropertiesAll(_) => RopKind::GetPropertiesAll,
            RopRequest::SaveChangesMessage(_) => RopKind::SaveChangesMessage,
            RopRequest::SetColumns(_) => RopKind::SetColumns,
            RopRequest::QueryRows(_) => RopKind::QueryRows,
            RopRequest::RegisterNotification(_) => RopKind::RegisterNotification,
            RopRequest::OpenStream(_) => RopKind::OpenStream,
            RopRequest::WriteStream(_) => RopKind::WriteStream,
            RopRequest::GetPermissionsTable(_) => RopKind::GetPermissionsTable,
            RopRequest::GetRulesTable(_) => RopKind::GetRulesTable,
            RopRequest::ModifyPermissions(_) => RopKind::ModifyPermissions,
            RopRequest::ModifyRules(_) => RopKind::ModifyRules,
            RopRequest::UpdateDeferredActionMessages(_) => RopKind::UpdateDeferredActionMessages,
        }
    }

    /// Returns the logon id the request targets.
    pub fn logon_id(&self) -> u8 {
        match self {
            RopRequest::Release(r) => r.logon_id,
            RopRequest::CreateMessage(r) => r.logon_id,
            RopRequest::GetPropertiesAll(r) => r.logon_id,
            RopRequest::SaveChangesMessage(r) => r.logon_id,
            RopRequest::SetColumns(r) => r.logon_id,
            RopRequest::QueryRows(r) => r.logon_id,
            RopRequest::RegisterNotification(r) => r.logon_id,
            RopRequest::OpenStream(r) => r.logon_id,
            RopRequest::WriteStream(r) => r.logon_id,
            RopRequest::GetPermissionsTable(r) => r.logon_id,
            RopRequest::GetRulesTable(r) => r.logon_id,
            RopRequest::ModifyPermissions(r) => r.logon_id,
            RopRequest::ModifyRules(r) => r.logon_id,
            RopRequest::UpdateDeferredActionMessages(r) => r.logon_id,
        }
    }

    /// Returns the input handle slot.
    pub fn input_handle_index(&self) -> u8 {
        match self {
            RopRequest::Release(r) => r.input_handle_index,
            RopRequest::CreateMessage(r) => r.input_handle_index,
            RopRequest::GetPropertiesAll(r) => r.input_handle_index,
            RopRequest::SaveChangesMessage(r) => r.input_handle_index,
            RopRequest::SetColumns(r) => r.input_handle_index,
            RopRequest::QueryRows(r) => r.input_handle_index,
            RopRequest::RegisterNotification(r) => r.input_handle_index,
            RopRequest::OpenStream(r) => r.input_handle_index,
            RopRequest::WriteStream(r) => r.input_handle_index,
            RopRequest::GetPermissionsTable(r) => r.input_handle_index,
            RopRequest::GetRulesTable(r) => r.input_handle_index,
            RopRequest::ModifyPermissions(r) => r.input_handle_index,
            RopRequest::ModifyRules(r) => r.input_handle_index,
            RopRequest::UpdateDeferredActionMessages(r) => r.input_handle_index,
        }
    }

    /// Returns the output handle slot for operations that open an object.
    pub fn output_handle_index(&self) -> Option<u8> {
        match self {
            RopRequest::CreateMessage(r) => Some(r.output_handle_index),
            RopRequest::RegisterNotification(r) => Some(r.output_handle_index),
            RopRequest::OpenStream(r) => Some(r.output_handle_index),
            RopRequest::GetPermissionsTable(r) => Some(r.output_handle_index),
            RopRequest::GetRulesTable(r) => Some(r.output_handle_index),
            _ => None,
        }
    }

    /// Encodes the request into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.kind().op_id());
        buf.put_u8(self.logon_id());
        match self {
            RopRequest::Release(r) => {
                buf.put_u8(r.input_handle_index);
            }
            RopRequest::CreateMessage(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.output_handle_index);
                buf.put_u16_le(r.code_page_id);
                buf.put_u64_le(r.folder_id);
                buf.put_u8(r.associated as u8);
            }
            RopRequest::GetPropertiesAll(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u16_le(r.property_size_limit);
                buf.put_u8(r.want_unicode as u8);
            }
            RopRequest::SaveChangesMessage(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.response_handle_index);
                buf.put_u8(r.save_flags);
            }
            RopRequest::SetColumns(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.flags);
                if r.columns.len() > u16::MAX as usize {
                    return Err(ProtocolError::MalformedValue {
                        reason: "column count exceeds 16-bit prefix",
                    });
                }
                buf.put_u16_le(r.columns.len() as u16);
                for column in &r.columns {
                    column.encode(buf);
                }
            }
            RopRequest::QueryRows(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.flags);
                buf.put_u8(r.forward_read as u8);
                buf.put_u16_le(r.row_count);
            }
            RopRequest::RegisterNotification(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.output_handle_index);
                buf.put_u16_le(r.event_mask.bits());
                buf.put_u8(r.whole_store as u8);
                buf.put_u64_le(r.folder_id);
                buf.put_u64_le(r.message_id);
            }
            RopRequest::OpenStream(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.output_handle_index);
                r.tag.encode(buf);
                buf.put_u8(r.open_mode);
            }
            RopRequest::WriteStream(r) => {
                buf.put_u8(r.input_handle_index);
                encode_blob(&r.data, buf)?;
            }
            RopRequest::GetPermissionsTable(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.output_handle_index);
                buf.put_u8(r.table_flags);
            }
            RopRequest::GetRulesTable(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.output_handle_index);
                buf.put_u8(r.table_flags);
            }
            RopRequest::ModifyPermissions(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.modify_flags);
                encode_row_changes(&r.rows, buf)?;
            }
            RopRequest::ModifyRules(r) => {
                buf.put_u8(r.input_handle_index);
                buf.put_u8(r.modify_flags);
                encode_row_changes(&r.rows, buf)?;
            }
            RopRequest::UpdateDeferredActionMessages(r) => {
                buf.put_u8(r.input_handle_index);
                encode_blob(&r.server_entry_id, buf)?;
                encode_blob(&r.client_entry_id, buf)?;
            }
        }
        Ok(())
    }

    /// Decodes one request from `buf`, advancing it.
    pub fn decode(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(buf, 2)?;
        let kind = RopKind::from_op_id(buf.get_u8())?;
        let logon_id = buf.get_u8();
        match kind {
            RopKind::Release => {
                ensure(buf, 1)?;
                Ok(RopRequest::Release(ReleaseRequest {
                    logon_id,
                    input_handle_index: buf.get_u8(),
                }))
            }
            RopKind::CreateMessage => {
                ensure(buf, 2 + 2 + 8)?;
                let input_handle_index = buf.get_u8();
                let output_handle_index = buf.get_u8();
                let code_page_id = buf.get_u16_le();
                let folder_id = buf.get_u64_le();
                let associated = decode_bool(buf)?;
                Ok(RopRequest::CreateMessage(CreateMessageRequest {
                    logon_id,
                    input_handle_index,
                    output_handle_index,
                    code_page_id,
                    folder_id,
                    associated,
                }))
            }
            RopKind::GetPropertiesAll => {
                ensure(buf, 1 + 2)?;
                let input_handle_index = buf.get_u8();
                let property_size_limit = buf.get_u16_le();
                let want_unicode = decode_bool(buf)?;
                Ok(RopRequest::GetPropertiesAll(GetPropertiesAllRequest {
                    logon_id,
                    input_handle_index,
                    property_size_limit,
                    want_unicode,
                }))
            }
            RopKind::SaveChangesMessage => {
                ensure(buf, 3)?;
                Ok(RopRequest::SaveChangesMessage(SaveChangesMessageRequest {
                    logon_id,
                    input_handle_index: buf.get_u8(),
                    response_handle_index: buf.get_u8(),
                    save_flags: buf.get_u8(),
                }))
            }
            RopKind::SetColumns => {
                ensure(buf, 2 + 2)?;
                let input_handle_index = buf.get_u8();
                let flags = buf.get_u8();
                let count = buf.get_u16_le() as usize;
                let mut columns = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    columns.push(PropertyTag::decode(buf)?);
                }
                Ok(RopRequest::SetColumns(SetColumnsRequest {
                    logon_id,
                    input_handle_index,
                    flags,
                    columns,
                }))
            }
            RopKind::QueryRows => {
                ensure(buf, 2)?;
                let input_handle_index = buf.get_u8();
                let flags = buf.get_u8();
                let forward_read = decode_bool(buf)?;
                ensure(buf, 2)?;
                let row_count = buf.get_u16_le();
                Ok(RopRequest::QueryRows(QueryRowsRequest {
                    logon_id,
                    input_handle_index,
                    flags,
                    forward_read,
                    row_count,
                }))
            }
            RopKind::RegisterNotification => {
                ensure(buf, 2 + 2)?;
                let input_handle_index = buf.get_u8();
                let output_handle_index = buf.get_u8();
                let event_mask = EventMask::from_bits(buf.get_u16_le())?;
                let whole_store = decode_bool(buf)?;
                ensure(buf, 16)?;
                let folder_id = buf.get_u64_le();
                let message_id = buf.get_u64_le();
                Ok(RopRequest::RegisterNotification(
                    RegisterNotificationRequest {
                        logon_id,
                        input_handle_index,
                        output_handle_index,
                        event_mask,
                        whole_store,
                        folder_id,
                        message_id,
                    },
                ))
            }
            RopKind::OpenStream => {
                ensure(buf, 2)?;
                let input_handle_index = buf.get_u8();
                let output_handle_index = buf.get_u8();
                let tag = PropertyTag::decode(buf)?;
                ensure(buf, 1)?;
                let open_mode = buf.get_u8();
                Ok(RopRequest::OpenStream(OpenStreamRequest {
                    logon_id,
                    input_handle_index,
                    output_handle_index,
                    tag,
                    open_mode,
                }))
            }
            RopKind::WriteStream => {
                ensure(buf, 1)?;
                let input_handle_index = buf.get_u8();
                let data = decode_blob(buf)?;
                Ok(RopRequest::WriteStream(WriteStreamRequest {
                    logon_id,
                    input_handle_index,
                    data,
                }))
            }
            RopKind::GetPermissionsTable => {
                ensure(buf, 3)?;
                Ok(RopRequest::GetPermissionsTable(GetPermissionsTableRequest {
                    logon_id,
                    input_handle_index: buf.get_u8(),
                    output_handle_index: buf.get_u8(),
                    table_flags: buf.get_u8(),
                }))
            }
            RopKind::GetRulesTable => {
                ensure(buf, 3)?;
                Ok(RopRequest::GetRulesTable(GetRulesTableRequest {
                    logon_id,
                    input_handle_index: buf.get_u8(),
                    output_handle_index: buf.get_u8(),
                    table_flags: buf.get_u8(),
                }))
            }
            RopKind::ModifyPermissions => {
                ensure(buf, 2)?;
                let input_handle_index = buf.get_u8();
                let modify_flags = buf.get_u8();
                let rows = decode_row_changes(buf)?;
                Ok(RopRequest::ModifyPermissions(ModifyPermissionsRequest {
                    logon_id,
                    input_handle_index,
                    modify_flags,
                    rows,
                }))
            }
            RopKind::ModifyRules => {
                ensure(buf, 2)?;
                let input_handle_index = buf.get_u8();
                let modify_flags = buf.get_u8();
                let rows = decode_row_changes(buf)?;
                Ok(RopRequest::ModifyRules(ModifyRulesRequest {
                    logon_id,
                    input_handle_index,
                    modify_flags,
                    rows,
                }))
            }
            RopKind::UpdateDeferredActionMessages => {
                ensure(buf, 1)?;
                let input_handle_index = buf.get_u8();
                let server_entry_id = decode_blob(buf)?;
                let client_entry_id = decode_blob(buf)?;
                Ok(RopRequest::UpdateDeferredActionMessages(
                    UpdateDeferredActionMessagesRequest {
                        logon_id,
                        input_handle_index,
                        server_entry_id,
                        client_entry_id,
                    },
                ))
            }
            RopKind::Notify | RopKind::Pending | RopKind::BufferTooSmall => {
                Err(ProtocolError::MalformedValue {
                    reason: "out-of-band operation id in request buffer",
                })
            }
        }
    }
}

fn encode_row_changes(rows: &[RowChange], buf: &mut BytesMut) -> Result<(), ProtocolError> {
    if rows.len() > u16::MAX as usize {
        return Err(ProtocolError::MalformedValue {
            reason: "row count exceeds 16-bit prefix",
        });
    }
    buf.put_u16_le(rows.len() as u16);
    for row in rows {
        row.encode(buf)?;
    }
    Ok(())
}

fn decode_row_changes(buf: &mut &[u8]) -> Result<Vec<RowChange>, ProtocolError> {
    ensure(buf, 2)?;
    let count = buf.get_u16_le() as usize;
    let mut rows = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        rows.push(RowChange::decode(buf)?);
    }
    Ok(rows)
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseResponse {
    pub handle_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateMessageResponse {
    pub handle_index: u8,
    /// Id assigned to the new message, when the server reports one.
    pub message_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetPropertiesAllResponse {
    pub handle_index: u8,
    pub values: Vec<TaggedPropertyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveChangesMessageResponse {
    pub handle_index: u8,
    pub message_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetColumnsResponse {
    pub handle_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRowsResponse {
    pub handle_index: u8,
    /// Cursor position after the read: 0 at start, 1 inside, 2 at end.
    pub origin: u8,
    pub rows: Vec<PropertyRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterNotificationResponse {
    pub handle_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenStreamResponse {
    pub handle_index: u8,
    pub stream_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteStreamResponse {
    pub handle_index: u8,
    pub written: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetPermissionsTableResponse {
    pub handle_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetRulesTableResponse {
    pub handle_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifyPermissionsResponse {
    pub handle_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifyRulesResponse {
    pub handle_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateDeferredActionMessagesResponse {
    pub handle_index: u8,
}

/// Out-of-band response carrying one queued change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyResponse {
    pub notification_handle: u32,
    pub logon_id: u8,
    pub data: NotificationData,
}

impl NotifyResponse {
    /// Fixed encoded size: op id, handle, logon id, payload.
    pub const ENCODED_LEN: usize = 1 + 4 + 1 + NotificationData::ENCODED_LEN;
}

/// Out-of-band marker: notifications remain queued beyond buffer capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingResponse {
    pub session_index: u16,
}

impl PendingResponse {
    pub const ENCODED_LEN: usize = 1 + 2;
}

/// Out-of-band marker: the response buffer could not hold further responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferTooSmallResponse {
    /// Encoded size of the first response that did not fit.
    pub size_needed: u16,
}

impl BufferTooSmallResponse {
    pub const ENCODED_LEN: usize = 1 + 2;
}

/// A response that carried a non-zero return code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RopFault {
    pub kind: RopKind,
    pub handle_index: u8,
    /// Raw return code, never 0.
    pub code: u32,
}

/// A decoded operation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RopResponse {
    Release(ReleaseResponse),
    CreateMessage(CreateMessageResponse),
    GetPropertiesAll(GetPropertiesAllResponse),
    SaveChangesMessage(SaveChangesMessageResponse),
    SetColumns(SetColumnsResponse),
    QueryRows(QueryRowsResponse),
    RegisterNotification(RegisterNotificationResponse),
    Notify(NotifyResponse),
    OpenStream(OpenStreamResponse),
    WriteStream(WriteStreamResponse),
    GetPermissionsTable(GetPermissionsTableResponse),
    GetRulesTable(GetRulesTableResponse),
    ModifyPermissions(ModifyPermissionsResponse),
    ModifyRules(ModifyRulesResponse),
    UpdateDeferredActionMessages(UpdateDeferredActionMessagesResponse),
    Pending(PendingResponse),
    BufferTooSmall(BufferTooSmallResponse),
    Fault(RopFault),
}

impl RopResponse {
    /// Returns the operation kind this response answers (or reports).
    pub fn kind(&self) -> RopKind {
        match self {
            RopResponse::Release(_) => RopKind::Release,
            RopResponse::CreateMessage(_) => RopKind::CreateMessage,
            RopResponse::GetPropertiesAll(_) => RopKind::GetPropertiesAll,
            RopResponse::SaveChangesMessage(_) => RopKind::SaveChangesMessage,
            RopResponse::SetColumns(_) => RopKind::SetColumns,
            RopResponse::QueryRows(_) => RopKind::QueryRows,
            RopResponse::RegisterNotification(_) => RopKind::RegisterNotification,
            RopResponse::Notify(_) => RopKind::Notify,
            RopResponse::OpenStream(_) => RopKind::OpenStream,
            RopResponse::WriteStream(_) => RopKind::WriteStream,
            RopResponse::GetPermissionsTable(_) => RopKind::GetPermissionsTable,
            RopResponse::GetRulesTable(_) => RopKind::GetRulesTable,
            RopResponse::ModifyPermissions(_) => RopKind::ModifyPermissions,
            RopResponse::ModifyRules(_) => RopKind::ModifyRules,
            RopResponse::UpdateDeferredActionMessages(_) => RopKind::UpdateDeferredActionMessages,
            RopResponse::Pending(_) => RopKind::Pending,
            RopResponse::BufferTooSmall(_) => RopKind::BufferTooSmall,
            RopResponse::Fault(f) => f.kind,
        }
    }

    /// Returns the return code: `Some(0)` for successful operation
    /// responses, the raw code for faults, `None` for out-of-band responses.
    pub fn return_code(&self) -> Option<u32> {
        match self {
            RopResponse::Notify(_) | RopResponse::Pending(_) | RopResponse::BufferTooSmall(_) => {
                None
            }
            RopResponse::Fault(f) => Some(f.code),
            _ => Some(0),
        }
    }

    /// Returns whether this is a successful operation response.
    pub fn is_success(&self) -> bool {
        matches!(self.return_code(), Some(0))
    }

    /// Returns the echoed handle index for operation responses.
    pub fn handle_index(&self) -> Option<u8> {
        match self {
            RopResponse::Release(r) => Some(r.handle_index),
            RopResponse::CreateMessage(r) => Some(r.handle_index),
            RopResponse::GetPropertiesAll(r) => Some(r.handle_index),
            RopResponse::SaveChangesMessage(r) => Some(r.handle_index),
            RopResponse::SetColumns(r) => Some(r.handle_index),
            RopResponse::QueryRows(r) => Some(r.handle_index),
            RopResponse::RegisterNotification(r) => Some(r.handle_index),
            RopResponse::OpenStream(r) => Some(r.handle_index),
            RopResponse::WriteStream(r) => Some(r.handle_index),
            RopResponse::GetPermissionsTable(r) => Some(r.handle_index),
            RopResponse::GetRulesTable(r) => Some(r.handle_index),
            RopResponse::ModifyPermissions(r) => Some(r.handle_index),
            RopResponse::ModifyRules(r) => Some(r.handle_index),
            RopResponse::UpdateDeferredActionMessages(r) => Some(r.handle_index),
            RopResponse::Fault(f) => Some(f.handle_index),
            RopResponse::Notify(_) | RopResponse::Pending(_) | RopResponse::BufferTooSmall(_) => {
                None
            }
        }
    }

    /// Encodes the response into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            RopResponse::Notify(r) => {
                buf.put_u8(RopKind::Notify.op_id());
                buf.put_u32_le(r.notification_handle);
                buf.put_u8(r.logon_id);
                r.data.encode(buf);
                return Ok(());
            }
            RopResponse::Pending(r) => {
                buf.put_u8(RopKind::Pending.op_id());
                buf.put_u16_le(r.session_index);
                return Ok(());
            }
            RopResponse::BufferTooSmall(r) => {
                buf.put_u8(RopKind::BufferTooSmall.op_id());
                buf.put_u16_le(r.size_needed);
                return Ok(());
            }
            RopResponse::Fault(f) => {
                if f.code == 0 {
                    return Err(ProtocolError::MalformedValue {
                        reason: "fault return code must be non-zero",
                    });
                }
                if f.kind.is_out_of_band() {
                    return Err(ProtocolError::MalformedValue {
                        reason: "out-of-band responses carry no return code",
                    });
                }
                buf.put_u8(f.kind.op_id());
                buf.put_u8(f.handle_index);
                buf.put_u32_le(f.code);
                return Ok(());
            }
            _ => {}
        }

        buf.put_u8(self.kind().op_id());
        match self {
            RopResponse::Release(r) => {
                put_success_header(buf, r.handle_index);
            }
            RopResponse::CreateMessage(r) => {
                put_success_header(buf, r.handle_index);
                match r.message_id {
                    Some(id) => {
                        buf.put_u8(1);
                        buf.put_u64_le(id);
                    }
                    None => buf.put_u8(0),
                }
            }
            RopResponse::GetPropertiesAll(r) => {
                put_success_header(buf, r.handle_index);
                encode_value_list(&r.values, buf)?;
            }
            RopResponse::SaveChangesMessage(r) => {
                put_success_header(buf, r.handle_index);
                buf.put_u64_le(r.message_id);
            }
            RopResponse::SetColumns(r) => {
                put_success_header(buf, r.handle_index);
            }
            RopResponse::QueryRows(r) => {
                put_success_header(buf, r.handle_index);
                buf.put_u8(r.origin);
                if r.rows.len() > u16::MAX as usize {
                    return Err(ProtocolError::MalformedValue {
                        reason: "row count exceeds 16-bit prefix",
                    });
                }
                buf.put_u16_le(r.rows.len() as u16);
                for row in &r.rows {
                    row.encode(buf)?;
                }
            }
            RopResponse::RegisterNotification(r) => {
                put_success_header(buf, r.handle_index);
            }
            RopResponse::OpenStream(r) => {
                put_success_header(buf, r.handle_index);
                buf.put_u32_le(r.stream_size);
            }
            RopResponse::WriteStream(r) => {
                put_success_header(buf, r.handle_index);
                buf.put_u16_le(r.written);
            }
            RopResponse::GetPermissionsTable(r) => {
                put_success_header(buf, r.handle_index);
            }
            RopResponse::GetRulesTable(r) => {
                put_success_header(buf, r.handle_index);
            }
            RopResponse::ModifyPermissions(r) => {
                put_success_header(buf, r.handle_index);
            }
            RopResponse::ModifyRules(r) => {
                put_success_header(buf, r.handle_index);
            }
            RopResponse::UpdateDeferredActionMessages(r) => {
                put_success_header(buf, r.handle_index);
            }
            RopResponse::Notify(_)
            | RopResponse::Pending(_)
            | RopResponse::BufferTooSmall(_)
            | RopResponse::Fault(_) => {}
        }
        Ok(())
    }

    /// Encodes the response into a fresh buffer.
    pub fn to_bytes(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decodes one response from `buf`, advancing it.
    pub fn decode(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(buf, 1)?;
        let kind = RopKind::from_op_id(buf.get_u8())?;
        match kind {
            RopKind::Notify => {
                ensure(buf, 5)?;
                let notification_handle = buf.get_u32_le();
                let logon_id = buf.get_u8();
                let data = NotificationData::decode(buf)?;
                Ok(RopResponse::Notify(NotifyResponse {
                    notification_handle,
                    logon_id,
                    data,
                }))
            }
            RopKind::Pending => {
                ensure(buf, 2)?;
                Ok(RopResponse::Pending(PendingResponse {
                    session_index: buf.get_u16_le(),
                }))
            }
            RopKind::BufferTooSmall => {
                ensure(buf, 2)?;
                Ok(RopResponse::BufferTooSmall(BufferTooSmallResponse {
                    size_needed: buf.get_u16_le(),
                }))
            }
            _ => {
                ensure(buf, 5)?;
                let handle_index = buf.get_u8();
                let code = buf.get_u32_le();
                if code != 0 {
                    return Ok(RopResponse::Fault(RopFault {
                        kind,
                        handle_index,
                        code,
                    }));
                }
                decode_success(kind, handle_index, buf)
            }
        }
    }
}

fn put_success_header(buf: &mut BytesMut, handle_index: u8) {
    buf.put_u8(handle_index);
    buf.put_u32_le(0);
}

fn decode_success(
    kind: RopKind,
    handle_index: u8,
    buf: &mut &[u8],
) -> Result<RopResponse, ProtocolError> {
    match kind {
        RopKind::Release => Ok(RopResponse::Release(ReleaseResponse { handle_index })),
        RopKind::CreateMessage => {
            let message_id = if decode_bool(buf)? {
                ensure(buf, 8)?;
                Some(buf.get_u64_le())
            } else {
                None
            };
            Ok(RopResponse::CreateMessage(CreateMessageResponse {
                handle_index,
                message_id,
            }))
        }
        RopKind::GetPropertiesAll => Ok(RopResponse::GetPropertiesAll(GetPropertiesAllResponse {
            handle_index,
            values: decode_value_list(buf)?,
        })),
        RopKind::SaveChangesMessage => {
            ensure(buf, 8)?;
            Ok(RopResponse::SaveChangesMessage(SaveChangesMessageResponse {
                handle_index,
                message_id: buf.get_u64_le(),
            }))
        }
        RopKind::SetColumns => Ok(RopResponse::SetColumns(SetColumnsResponse { handle_index })),
        RopKind::QueryRows => {
            ensure(buf, 1 + 2)?;
            let origin = buf.get_u8();
            let count = buf.get_u16_le() as usize;
            let mut rows = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                rows.push(PropertyRow::decode(buf)?);
            }
            Ok(RopResponse::QueryRows(QueryRowsResponse {
                handle_index,
                origin,
                rows,
            }))
        }
        RopKind::RegisterNotification => Ok(RopResponse::RegisterNotification(
            RegisterNotificationResponse { handle_index },
        )),
        RopKind::OpenStream => {
            ensure(buf, 4)?;
            Ok(RopResponse::OpenStream(OpenStreamResponse {
                handle_index,
                stream_size: buf.get_u32_le(),
            }))
        }
        RopKind::WriteStream => {
            ensure(buf, 2)?;
            Ok(RopResponse::WriteStream(WriteStreamResponse {
                handle_index,
                written: buf.get_u16_le(),
            }))
        }
        RopKind::GetPermissionsTable => Ok(RopResponse::GetPermissionsTable(
            GetPermissionsTableResponse { handle_index },
        )),
        RopKind::GetRulesTable => Ok(RopResponse::GetRulesTable(GetRulesTableResponse {
            handle_index,
        })),
        RopKind::ModifyPermissions => Ok(RopResponse::ModifyPermissions(
            ModifyPermissionsResponse { handle_index },
        )),
        RopKind::ModifyRules => Ok(RopResponse::ModifyRules(ModifyRulesResponse {
            handle_index,
        })),
        RopKind::UpdateDeferredActionMessages => Ok(RopResponse::UpdateDeferredActionMessages(
            UpdateDeferredActionMessagesResponse { handle_index },
        )),
        RopKind::Notify | RopKind::Pending | RopKind::BufferTooSmall => {
            Err(ProtocolError::MalformedValue {
                reason: "out-of-band operation id in operation response position",
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;
    use crate::value::PropertyValue;

    fn roundtrip_request(request: RopRequest) -> RopRequest {
        let mut buf = BytesMut::new();
        request.encode(&mut buf).unwrap();
        let mut slice = &buf[..];
        let decoded = RopRequest::decode(&mut slice).unwrap();
        assert!(slice.is_empty());
        decoded
    }

    fn roundtrip_response(response: RopResponse) -> RopResponse {
        let buf = response.to_bytes().unwrap();
        let mut slice = &buf[..];
        let decoded = RopResponse::decode(&mut slice).unwrap();
        assert!(slice.is_empty());
        decoded
    }

    #[test]
    fn test_get_permissions_table_request_layout() {
        let request = RopRequest::GetPermissionsTable(GetPermissionsTableRequest {
            logon_id: 0,
            input_handle_index: 0,
            output_handle_index: 1,
            table_flags: 0x02,
        });
        let mut buf = BytesMut::new();
        request.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x3E, 0x00, 0x00, 0x01, 0x02]);
        assert_eq!(roundtrip_request(request.clone()), request);
    }

    #[test]
    fn test_modify_permissions_roundtrip() {
        let request = RopRequest::ModifyPermissions(ModifyPermissionsRequest {
            logon_id: 0,
            input_handle_index: 0,
            modify_flags: 0x01,
            rows: vec![
                RowChange::new(
                    RowOp::Add,
                    vec![
                        TaggedPropertyValue::new(
                            tags::PID_TAG_ENTRY_ID,
                            PropertyValue::Binary(vec![1, 2, 3]),
                        ),
                        TaggedPropertyValue::new(
                            tags::PID_TAG_MEMBER_RIGHTS,
                            PropertyValue::Integer32(0x0800),
                        ),
                    ],
                ),
                RowChange::new(
                    RowOp::Remove,
                    vec![TaggedPropertyValue::new(
                        tags::PID_TAG_MEMBER_ID,
                        PropertyValue::Integer64(7),
                    )],
                ),
            ],
        });
        let decoded = roundtrip_request(request.clone());
        assert_eq!(decoded, request);
        // Row order is load-bearing for the server-applied order.
        if let RopRequest::ModifyPermissions(r) = decoded {
            assert_eq!(r.rows[0].op, RowOp::Add);
            assert_eq!(r.rows[1].op, RowOp::Remove);
        }
    }

    #[test]
    fn test_set_columns_and_query_rows_roundtrip() {
        let request = RopRequest::SetColumns(SetColumnsRequest {
            logon_id: 0,
            input_handle_index: 1,
            flags: 0,
            columns: vec![
                tags::PID_TAG_MEMBER_ID,
                tags::PID_TAG_MEMBER_NAME,
                tags::PID_TAG_MEMBER_RIGHTS,
                tags::PID_TAG_ENTRY_ID,
            ],
        });
        assert_eq!(roundtrip_request(request.clone()), request);

        let request = RopRequest::QueryRows(QueryRowsRequest {
            logon_id: 0,
            input_handle_index: 1,
            flags: 0,
            forward_read: true,
            row_count: 20,
        });
        assert_eq!(roundtrip_request(request.clone()), request);
    }

    #[test]
    fn test_remaining_request_roundtrips() {
        let requests = vec![
            RopRequest::Release(ReleaseRequest {
                logon_id: 0,
                input_handle_index: 2,
            }),
            RopRequest::CreateMessage(CreateMessageRequest {
                logon_id: 0,
                input_handle_index: 0,
                output_handle_index: 1,
                code_page_id: 0x0FFF,
                folder_id: 0xDEAD_BEEF,
                associated: false,
            }),
            RopRequest::GetPropertiesAll(GetPropertiesAllRequest {
                logon_id: 0,
                input_handle_index: 0,
                property_size_limit: 0,
                want_unicode: true,
            }),
            RopRequest::SaveChangesMessage(SaveChangesMessageRequest {
                logon_id: 0,
                input_handle_index: 0,
                response_handle_index: 1,
                save_flags: 0x0C,
            }),
            RopRequest::RegisterNotification(RegisterNotificationRequest {
                logon_id: 0,
                input_handle_index: 0,
                output_handle_index: 1,
                event_mask: EventMask::new().with(EventMask::NEW_MAIL),
                whole_store: true,
                folder_id: 0,
                message_id: 0,
            }),
            RopRequest::OpenStream(OpenStreamRequest {
                logon_id: 0,
                input_handle_index: 0,
                output_handle_index: 1,
                tag: tags::PID_TAG_BODY,
                open_mode: 0x01,
            }),
            RopRequest::WriteStream(WriteStreamRequest {
                logon_id: 0,
                input_handle_index: 0,
                data: b"stream payload".to_vec(),
            }),
            RopRequest::GetRulesTable(GetRulesTableRequest {
                logon_id: 0,
                input_handle_index: 0,
                output_handle_index: 1,
                table_flags: 0x40,
            }),
            RopRequest::ModifyRules(ModifyRulesRequest {
                logon_id: 0,
                input_handle_index: 0,
                modify_flags: 0,
                rows: vec![RowChange::new(
                    RowOp::Modify,
                    vec![TaggedPropertyValue::new(
                        tags::PID_TAG_RULE_ID,
                        PropertyValue::Integer64(10),
                    )],
                )],
            }),
            RopRequest::UpdateDeferredActionMessages(UpdateDeferredActionMessagesRequest {
                logon_id: 0,
                input_handle_index: 0,
                server_entry_id: vec![0xAA; 8],
                client_entry_id: vec![0xBB; 8],
            }),
        ];
        for request in requests {
            assert_eq!(roundtrip_request(request.clone()), request);
        }
    }

    #[test]
    fn test_success_response_roundtrips() {
        let responses = vec![
            RopResponse::Release(ReleaseResponse { handle_index: 0 }),
            RopResponse::CreateMessage(CreateMessageResponse {
                handle_index: 1,
                message_id: Some(0x1234),
            }),
            RopResponse::CreateMessage(CreateMessageResponse {
                handle_index: 1,
                message_id: None,
            }),
            RopResponse::GetPropertiesAll(GetPropertiesAllResponse {
                handle_index: 0,
                values: vec![TaggedPropertyValue::new(
                    tags::PID_TAG_SUBJECT,
                    PropertyValue::Unicode("hello".to_string()),
                )],
            }),
            RopResponse::SaveChangesMessage(SaveChangesMessageResponse {
                handle_index: 0,
                message_id: 99,
            }),
            RopResponse::SetColumns(SetColumnsResponse { handle_index: 1 }),
            RopResponse::QueryRows(QueryRowsResponse {
                handle_index: 1,
                origin: 2,
                rows: vec![PropertyRow::new(vec![TaggedPropertyValue::new(
                    tags::PID_TAG_MEMBER_ID,
                    PropertyValue::Integer64(5),
                )])],
            }),
            RopResponse::RegisterNotification(RegisterNotificationResponse { handle_index: 1 }),
            RopResponse::OpenStream(OpenStreamResponse {
                handle_index: 1,
                stream_size: 512,
            }),
            RopResponse::WriteStream(WriteStreamResponse {
                handle_index: 0,
                written: 14,
            }),
            RopResponse::GetPermissionsTable(GetPermissionsTableResponse { handle_index: 1 }),
            RopResponse::GetRulesTable(GetRulesTableResponse { handle_index: 1 }),
            RopResponse::ModifyPermissions(ModifyPermissionsResponse { handle_index: 0 }),
            RopResponse::ModifyRules(ModifyRulesResponse { handle_index: 0 }),
            RopResponse::UpdateDeferredActionMessages(UpdateDeferredActionMessagesResponse {
                handle_index: 0,
            }),
        ];
        for response in responses {
            let decoded = roundtrip_response(response.clone());
            assert_eq!(decoded, response);
            assert_eq!(decoded.return_code(), Some(0));
            assert!(decoded.is_success());
        }
    }

    #[test]
    fn test_fault_preserves_raw_code() {
        let buf = RopResponse::Fault(RopFault {
            kind: RopKind::ModifyPermissions,
            handle_index: 0,
            code: 0x0000_04B6,
        })
        .to_bytes()
        .unwrap();

        let mut slice = &buf[..];
        let decoded = RopResponse::decode(&mut slice).unwrap();
        assert_eq!(decoded.kind(), RopKind::ModifyPermissions);
        assert_eq!(decoded.return_code(), Some(0x04B6));
        assert!(!decoded.is_success());
    }

    #[test]
    fn test_fault_with_zero_code_rejected() {
        let fault = RopResponse::Fault(RopFault {
            kind: RopKind::Release,
            handle_index: 0,
            code: 0,
        });
        assert!(matches!(
            fault.to_bytes(),
            Err(ProtocolError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_out_of_band_responses() {
        let notify = RopResponse::Notify(NotifyResponse {
            notification_handle: 0xCAFE,
            logon_id: 0,
            data: NotificationData {
                event_mask: EventMask::new().with(EventMask::NEW_MAIL),
                folder_id: 1,
                message_id: 2,
            },
        });
        let buf = notify.to_bytes().unwrap();
        assert_eq!(buf.len(), NotifyResponse::ENCODED_LEN);
        assert_eq!(roundtrip_response(notify.clone()), notify);
        assert_eq!(notify.return_code(), None);

        let pending = RopResponse::Pending(PendingResponse { session_index: 3 });
        assert_eq!(
            pending.to_bytes().unwrap().len(),
            PendingResponse::ENCODED_LEN
        );
        assert_eq!(roundtrip_response(pending.clone()), pending);

        let too_small = RopResponse::BufferTooSmall(BufferTooSmallResponse { size_needed: 64 });
        assert_eq!(roundtrip_response(too_small.clone()), too_small);
    }

    #[test]
    fn test_out_of_band_id_rejected_in_requests() {
        let raw = [RopKind::Notify.op_id(), 0x00, 0x00];
        let mut slice = &raw[..];
        assert!(matches!(
            RopRequest::decode(&mut slice),
            Err(ProtocolError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_unknown_op_id() {
        let raw = [0xAB, 0x00];
        let mut slice = &raw[..];
        assert!(matches!(
            RopRequest::decode(&mut slice),
            Err(ProtocolError::UnknownOpId(0xAB))
        ));
    }

    #[test]
    fn test_truncated_response_payload() {
        // QueryRows success header claiming one row, then nothing.
        let mut buf = BytesMut::new();
        buf.put_u8(RopKind::QueryRows.op_id());
        buf.put_u8(1);
        buf.put_u32_le(0);
        buf.put_u8(0);
        buf.put_u16_le(1);
        let mut slice = &buf[..];
        assert!(matches!(
            RopResponse::decode(&mut slice),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_row_op_flags() {
        assert_eq!(RowOp::Add.flag(), 0x01);
        assert_eq!(RowOp::from_flag(0x04).unwrap(), RowOp::Remove);
        assert!(matches!(
            RowOp::from_flag(0x03),
            Err(ProtocolError::UnknownRowOp(0x03))
        ));
    }
}
