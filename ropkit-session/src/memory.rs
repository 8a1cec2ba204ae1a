//! In-memory operation handler.
//!
//! Serves the full operation set from process-local state: permission and
//! rule stores, table cursors honoring SetColumns/QueryRows paging, message
//! objects and property streams. Used by integration tests and loopback
//! transports standing in for a real server.

use crate::dispatch::{HandlerOutcome, OpContext, RopHandler};
use ropkit_protocol::rop::{
    CreateMessageResponse, GetPermissionsTableResponse, GetPropertiesAllResponse,
    GetRulesTableResponse, ModifyPermissionsResponse, ModifyRulesResponse, OpenStreamResponse,
    PropertyRow, QueryRowsResponse, RegisterNotificationResponse, ReleaseResponse, RowChange,
    RowOp, SaveChangesMessageResponse, SetColumnsResponse, UpdateDeferredActionMessagesResponse,
    WriteStreamResponse,
};
use ropkit_protocol::{
    tags, EventMask, ObjectHandle, PropertyTag, PropertyValue, RopRequest, RopResponse,
    TaggedPropertyValue,
};
use std::collections::HashMap;

/// Object was not found or the handle does not refer to one.
const ERR_NOT_FOUND: u32 = 0x8004_010F;
/// The handle refers to an object of the wrong kind for this operation.
const ERR_WRONG_OBJECT: u32 = 0x0000_04B9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableSource {
    Permissions,
    Rules,
}

#[derive(Debug)]
struct TableCursor {
    source: TableSource,
    columns: Option<Vec<PropertyTag>>,
    position: usize,
}

#[derive(Debug)]
struct MessageObject {
    message_id: u64,
    properties: Vec<TaggedPropertyValue>,
}

#[derive(Debug)]
struct StreamObject {
    data: Vec<u8>,
}

/// In-memory mailbox state addressed by object handle.
#[derive(Debug, Default)]
pub struct MemoryHandler {
    next_handle: u32,
    next_message_id: u64,
    permissions: Vec<Vec<TaggedPropertyValue>>,
    rules: Vec<Vec<TaggedPropertyValue>>,
    tables: HashMap<u32, TableCursor>,
    messages: HashMap<u32, MessageObject>,
    streams: HashMap<u32, StreamObject>,
    subscriptions: HashMap<u32, EventMask>,
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one permissions-table row.
    pub fn seed_permission_row(&mut self, values: Vec<TaggedPropertyValue>) {
        self.permissions.push(values);
    }

    /// Seeds one rules-table row.
    pub fn seed_rule_row(&mut self, values: Vec<TaggedPropertyValue>) {
        self.rules.push(values);
    }

    pub fn permission_rows(&self) -> &[Vec<TaggedPropertyValue>] {
        &self.permissions
    }

    pub fn rule_rows(&self) -> &[Vec<TaggedPropertyValue>] {
        &self.rules
    }

    fn alloc_handle(&mut self) -> ObjectHandle {
        self.next_handle += 1;
        ObjectHandle(0x100 + self.next_handle)
    }

    fn alloc_message_id(&mut self) -> u64 {
        self.next_message_id += 1;
        self.next_message_id
    }

    fn apply_row_changes(
        rows: &mut Vec<Vec<TaggedPropertyValue>>,
        changes: &[RowChange],
        key: PropertyTag,
    ) -> Result<(), u32> {
        for change in changes {
            match change.op {
                RowOp::Add => rows.push(change.values.clone()),
                RowOp::Modify => {
                    let target = find_row(rows, change, key)?;
                    merge_row(&mut rows[target], &change.values);
                }
                RowOp::Remove => {
                    let target = find_row(rows, change, key)?;
                    rows.remove(target);
                }
            }
        }
        Ok(())
    }
}

fn key_value(values: &[TaggedPropertyValue], key: PropertyTag) -> Option<&PropertyValue> {
    values.iter().find(|v| v.tag == key).map(|v| &v.value)
}

fn find_row(
    rows: &[Vec<TaggedPropertyValue>],
    change: &RowChange,
    key: PropertyTag,
) -> Result<usize, u32> {
    let wanted = key_value(&change.values, key).ok_or(ERR_NOT_FOUND)?;
    rows.iter()
        .position(|row| key_value(row, key) == Some(wanted))
        .ok_or(ERR_NOT_FOUND)
}

/// Replaces or inserts each changed property, leaving the rest of the row.
fn merge_row(row: &mut Vec<TaggedPropertyValue>, changes: &[TaggedPropertyValue]) {
    for change in changes {
        match row.iter_mut().find(|v| v.tag == change.tag) {
            Some(existing) => existing.value = change.value.clone(),
            None => row.push(change.clone()),
        }
    }
}

/// Projects a stored row onto the cursor's column set.
fn project_row(row: &[TaggedPropertyValue], columns: Option<&Vec<PropertyTag>>) -> PropertyRow {
    match columns {
        Some(columns) => PropertyRow::new(
            columns
                .iter()
                .filter_map(|column| row.iter().find(|v| v.tag == *column).cloned())
                .collect(),
        ),
        None => PropertyRow::new(row.to_vec()),
    }
}

impl RopHandler for MemoryHandler {
    fn handle(&mut self, request: &RopRequest, ctx: &OpContext) -> HandlerOutcome {
        let input = ctx.input_handle().0;
        match request {
            RopRequest::GetPermissionsTable(r) => {
                let handle = self.alloc_handle();
                self.tables.insert(
                    handle.0,
                    TableCursor {
                        source: TableSource::Permissions,
                        columns: None,
                        position: 0,
                    },
                );
                HandlerOutcome::Open {
                    response: RopResponse::GetPermissionsTable(GetPermissionsTableResponse {
                        handle_index: r.output_handle_index,
                    }),
                    handle,
                }
            }
            RopRequest::GetRulesTable(r) => {
                let handle = self.alloc_handle();
                self.tables.insert(
                    handle.0,
                    TableCursor {
                        source: TableSource::Rules,
                        columns: None,
                        position: 0,
                    },
                );
                HandlerOutcome::Open {
                    response: RopResponse::GetRulesTable(GetRulesTableResponse {
                        handle_index: r.output_handle_index,
                    }),
                    handle,
                }
            }
            RopRequest::SetColumns(r) => match self.tables.get_mut(&input) {
                Some(cursor) => {
                    cursor.columns = Some(r.columns.clone());
                    cursor.position = 0;
                    HandlerOutcome::Reply(RopResponse::SetColumns(SetColumnsResponse {
                        handle_index: r.input_handle_index,
                    }))
                }
                None => HandlerOutcome::Fault(ERR_WRONG_OBJECT),
            },
            RopRequest::QueryRows(r) => {
                let Some(cursor) = self.tables.get_mut(&input) else {
                    return HandlerOutcome::Fault(ERR_WRONG_OBJECT);
                };
                let source = match cursor.source {
                    TableSource::Permissions => &self.permissions,
                    TableSource::Rules => &self.rules,
                };
                let wanted = r.row_count as usize;
                let rows: Vec<PropertyRow> = if r.forward_read {
                    let taken: Vec<_> = source
                        .iter()
                        .skip(cursor.position)
                        .take(wanted)
                        .map(|row| project_row(row, cursor.columns.as_ref()))
                        .collect();
                    cursor.position = (cursor.position + taken.len()).min(source.len());
                    taken
                } else {
                    // Backward read walks toward the table start.
                    let available = cursor.position.min(source.len());
                    let start = available.saturating_sub(wanted);
                    let taken: Vec<_> = source[start..available]
                        .iter()
                        .rev()
                        .map(|row| project_row(row, cursor.columns.as_ref()))
                        .collect();
                    cursor.position = start;
                    taken
                };
                let origin = if cursor.position >= source.len() { 2 } else { 1 };
                HandlerOutcome::Reply(RopResponse::QueryRows(QueryRowsResponse {
                    handle_index: r.input_handle_index,
                    origin,
                    rows,
                }))
            }
            RopRequest::ModifyPermissions(r) => {
                match Self::apply_row_changes(&mut self.permissions, &r.rows, tags::PID_TAG_MEMBER_ID)
                {
                    Ok(()) => {
                        HandlerOutcome::Reply(RopResponse::ModifyPermissions(
                            ModifyPermissionsResponse {
                                handle_index: r.input_handle_index,
                            },
                        ))
                    }
                    Err(code) => HandlerOutcome::Fault(code),
                }
            }
            RopRequest::ModifyRules(r) => {
                match Self::apply_row_changes(&mut self.rules, &r.rows, tags::PID_TAG_RULE_ID) {
                    Ok(()) => HandlerOutcome::Reply(RopResponse::ModifyRules(ModifyRulesResponse {
                        handle_index: r.input_handle_index,
                    })),
                    Err(code) => HandlerOutcome::Fault(code),
                }
            }
            RopRequest::CreateMessage(r) => {
                let handle = self.alloc_handle();
                self.messages.insert(
                    handle.0,
                    MessageObject {
                        message_id: 0,
                        properties: vec![TaggedPropertyValue::new(
                            tags::PID_TAG_FOLDER_ID,
                            PropertyValue::Integer64(r.folder_id as i64),
                        )],
                    },
                );
                HandlerOutcome::Open {
                    response: RopResponse::CreateMessage(CreateMessageResponse {
                        handle_index: r.output_handle_index,
                        message_id: None,
                    }),
                    handle,
                }
            }
            RopRequest::SaveChangesMessage(r) => {
                let needs_id = match self.messages.get(&input) {
                    Some(message) => message.message_id == 0,
                    None => return HandlerOutcome::Fault(ERR_WRONG_OBJECT),
                };
                let next_id = if needs_id { self.alloc_message_id() } else { 0 };
                let Some(message) = self.messages.get_mut(&input) else {
                    return HandlerOutcome::Fault(ERR_WRONG_OBJECT);
                };
                if needs_id {
                    message.message_id = next_id;
                }
                HandlerOutcome::Reply(RopResponse::SaveChangesMessage(SaveChangesMessageResponse {
                    handle_index: r.input_handle_index,
                    message_id: message.message_id,
                }))
            }
            RopRequest::GetPropertiesAll(r) => match self.messages.get(&input) {
                Some(message) => {
                    HandlerOutcome::Reply(RopResponse::GetPropertiesAll(GetPropertiesAllResponse {
                        handle_index: r.input_handle_index,
                        values: message.properties.clone(),
                    }))
                }
                None => HandlerOutcome::Fault(ERR_NOT_FOUND),
            },
            RopRequest::OpenStream(r) => {
                if !self.messages.contains_key(&input) {
                    return HandlerOutcome::Fault(ERR_NOT_FOUND);
                }
                let handle = self.alloc_handle();
                self.streams.insert(handle.0, StreamObject { data: Vec::new() });
                HandlerOutcome::Open {
                    response: RopResponse::OpenStream(OpenStreamResponse {
                        handle_index: r.output_handle_index,
                        stream_size: 0,
                    }),
                    handle,
                }
            }
            RopRequest::WriteStream(r) => match self.streams.get_mut(&input) {
                Some(stream) => {
                    stream.data.extend_from_slice(&r.data);
                    HandlerOutcome::Reply(RopResponse::WriteStream(WriteStreamResponse {
                        handle_index: r.input_handle_index,
                        written: r.data.len().min(u16::MAX as usize) as u16,
                    }))
                }
                None => HandlerOutcome::Fault(ERR_WRONG_OBJECT),
            },
            RopRequest::RegisterNotification(r) => {
                let handle = self.alloc_handle();
                self.subscriptions.insert(handle.0, r.event_mask);
                HandlerOutcome::Open {
                    response: RopResponse::RegisterNotification(RegisterNotificationResponse {
                        handle_index: r.output_handle_index,
                    }),
                    handle,
                }
            }
            RopRequest::UpdateDeferredActionMessages(r) => HandlerOutcome::Reply(
                RopResponse::UpdateDeferredActionMessages(UpdateDeferredActionMessagesResponse {
                    handle_index: r.input_handle_index,
                }),
            ),
            RopRequest::Release(r) => {
                self.tables.remove(&input);
                self.messages.remove(&input);
                self.streams.remove(&input);
                self.subscriptions.remove(&input);
                HandlerOutcome::Reply(RopResponse::Release(ReleaseResponse {
                    handle_index: r.input_handle_index,
                }))
            }
        }
    }
}
