//! Typed builders for well-known operation requests.
//!
//! Each builder returns a [`RopRequest`] ready for packing. Slot arguments
//! are handle-table slots; the pack-level handle-index list decides where
//! each operation's input handle actually comes from.

use ropkit_protocol::rop::{
    CreateMessageRequest, GetPermissionsTableRequest, GetPropertiesAllRequest,
    GetRulesTableRequest, ModifyPermissionsRequest, ModifyRulesRequest, OpenStreamRequest,
    QueryRowsRequest, RegisterNotificationRequest, ReleaseRequest, RowChange,
    SaveChangesMessageRequest, SetColumnsRequest, UpdateDeferredActionMessagesRequest,
    WriteStreamRequest,
};
use ropkit_protocol::{EventMask, PropertyTag, RopRequest};

/// Code page marker telling the server to use the logon's code page.
const USE_LOGON_CODE_PAGE: u16 = 0x0FFF;

pub fn release(logon_id: u8, input_slot: u8) -> RopRequest {
    RopRequest::Release(ReleaseRequest {
        logon_id,
        input_handle_index: input_slot,
    })
}

pub fn create_message(
    logon_id: u8,
    input_slot: u8,
    output_slot: u8,
    folder_id: u64,
    associated: bool,
) -> RopRequest {
    RopRequest::CreateMessage(CreateMessageRequest {
        logon_id,
        input_handle_index: input_slot,
        output_handle_index: output_slot,
        code_page_id: USE_LOGON_CODE_PAGE,
        folder_id,
        associated,
    })
}

pub fn get_properties_all(logon_id: u8, input_slot: u8, want_unicode: bool) -> RopRequest {
    RopRequest::GetPropertiesAll(GetPropertiesAllRequest {
        logon_id,
        input_handle_index: input_slot,
        property_size_limit: 0,
        want_unicode,
    })
}

pub fn save_changes_message(
    logon_id: u8,
    input_slot: u8,
    response_slot: u8,
    save_flags: u8,
) -> RopRequest {
    RopRequest::SaveChangesMessage(SaveChangesMessageRequest {
        logon_id,
        input_handle_index: input_slot,
        response_handle_index: response_slot,
        save_flags,
    })
}

pub fn set_columns(logon_id: u8, input_slot: u8, columns: Vec<PropertyTag>) -> RopRequest {
    RopRequest::SetColumns(SetColumnsRequest {
        logon_id,
        input_handle_index: input_slot,
        flags: 0,
        columns,
    })
}

pub fn query_rows(logon_id: u8, input_slot: u8, row_count: u16, forward_read: bool) -> RopRequest {
    RopRequest::QueryRows(QueryRowsRequest {
        logon_id,
        input_handle_index: input_slot,
        flags: 0,
        forward_read,
        row_count,
    })
}

pub fn register_notification(
    logon_id: u8,
    input_slot: u8,
    output_slot: u8,
    event_mask: EventMask,
    whole_store: bool,
    folder_id: u64,
    message_id: u64,
) -> RopRequest {
    RopRequest::RegisterNotification(RegisterNotificationRequest {
        logon_id,
        input_handle_index: input_slot,
        output_handle_index: output_slot,
        event_mask,
        whole_store,
        folder_id,
        message_id,
    })
}

pub fn open_stream(
    logon_id: u8,
    input_slot: u8,
    output_slot: u8,
    tag: PropertyTag,
    open_mode: u8,
) -> RopRequest {
    RopRequest::OpenStream(OpenStreamRequest {
        logon_id,
        input_handle_index: input_slot,
        output_handle_index: output_slot,
        tag,
        open_mode,
    })
}

pub fn write_stream(logon_id: u8, input_slot: u8, data: Vec<u8>) -> RopRequest {
    RopRequest::WriteStream(WriteStreamRequest {
        logon_id,
        input_handle_index: input_slot,
        data,
    })
}

pub fn get_permissions_table(logon_id: u8, output_slot: u8, table_flags: u8) -> RopRequest {
    RopRequest::GetPermissionsTable(GetPermissionsTableRequest {
        logon_id,
        input_handle_index: 0,
        output_handle_index: output_slot,
        table_flags,
    })
}

pub fn get_rules_table(logon_id: u8, output_slot: u8, table_flags: u8) -> RopRequest {
    RopRequest::GetRulesTable(GetRulesTableRequest {
        logon_id,
        input_handle_index: 0,
        output_handle_index: output_slot,
        table_flags,
    })
}

pub fn modify_permissions(
    logon_id: u8,
    input_slot: u8,
    modify_flags: u8,
    rows: Vec<RowChange>,
) -> RopRequest {
    RopRequest::ModifyPermissions(ModifyPermissionsRequest {
        logon_id,
        input_handle_index: input_slot,
        modify_flags,
        rows,
    })
}

pub fn modify_rules(
    logon_id: u8,
    input_slot: u8,
    modify_flags: u8,
    rows: Vec<RowChange>,
) -> RopRequest {
    RopRequest::ModifyRules(ModifyRulesRequest {
        logon_id,
        input_handle_index: input_slot,
        modify_flags,
        rows,
    })
}

pub fn update_deferred_action_messages(
    logon_id: u8,
    input_slot: u8,
    server_entry_id: Vec<u8>,
    client_entry_id: Vec<u8>,
) -> RopRequest {
    RopRequest::UpdateDeferredActionMessages(UpdateDeferredActionMessagesRequest {
        logon_id,
        input_handle_index: input_slot,
        server_entry_id,
        client_entry_id,
    })
}
