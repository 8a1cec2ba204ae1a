//! Subcommand implementations.

use colored::Colorize;
use ropkit_client::directory;
use ropkit_protocol::{unpack, unpack_requests, RopResponse};
use std::error::Error;
use std::io::Read;

type CommandResult = Result<(), Box<dyn Error>>;

/// Reads hex input: inline, `@file`, or `-` for stdin.
fn read_buffer(input: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let raw = if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else if let Some(path) = input.strip_prefix('@') {
        std::fs::read_to_string(path)?
    } else {
        input.to_string()
    };

    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(cleaned)?)
}

pub fn decode_request(input: &str, json: bool) -> CommandResult {
    let buffer = read_buffer(input)?;
    let requests = unpack_requests(&buffer)?;

    if json {
        let entries: Vec<serde_json::Value> = requests
            .iter()
            .map(|(index, request)| {
                serde_json::json!({
                    "handle_index": index.0,
                    "request": request,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!(
        "{} {} operation(s)",
        "request buffer:".bold(),
        requests.len()
    );
    for (i, (index, request)) in requests.iter().enumerate() {
        let slot = if index.is_ambient() {
            "ambient".to_string()
        } else {
            format!("slot {}", index.0)
        };
        println!(
            "  [{i}] {} ({}) {:?}",
            format!("{:?}", request.kind()).cyan(),
            slot.yellow(),
            request
        );
    }
    Ok(())
}

pub fn decode_response(input: &str, pcb_out: u32, expected: usize, json: bool) -> CommandResult {
    let buffer = read_buffer(input)?;
    let unpacked = unpack(&buffer, expected, pcb_out)?;

    if json {
        let value = serde_json::json!({
            "truncated": unpacked.truncated,
            "handle_table": unpacked.handle_table,
            "responses": unpacked.responses,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{} {} response(s){}",
        "response buffer:".bold(),
        unpacked.responses.len(),
        if unpacked.truncated {
            " (truncated)".red().to_string()
        } else {
            String::new()
        }
    );
    for (i, response) in unpacked.responses.iter().enumerate() {
        let status = match response.return_code() {
            Some(0) => "ok".green().to_string(),
            Some(code) => format!("{code:#010x}").red().to_string(),
            None => "oob".yellow().to_string(),
        };
        println!(
            "  [{i}] {} [{status}] {}",
            format!("{:?}", response.kind()).cyan(),
            summarize(response)
        );
    }
    if !unpacked.handle_table.is_empty() {
        let handles: Vec<String> = unpacked
            .handle_table
            .iter()
            .map(|h| format!("{:#010x}", h.0))
            .collect();
        println!("  {} [{}]", "handles:".bold(), handles.join(", "));
    }
    Ok(())
}

fn summarize(response: &RopResponse) -> String {
    match response {
        RopResponse::QueryRows(r) => format!("{} row(s), origin {}", r.rows.len(), r.origin),
        RopResponse::GetPropertiesAll(r) => format!("{} value(s)", r.values.len()),
        RopResponse::CreateMessage(r) => match r.message_id {
            Some(id) => format!("message id {id:#x}"),
            None => "no message id".to_string(),
        },
        RopResponse::SaveChangesMessage(r) => format!("message id {:#x}", r.message_id),
        RopResponse::WriteStream(r) => format!("{} byte(s) written", r.written),
        RopResponse::OpenStream(r) => format!("stream size {}", r.stream_size),
        RopResponse::Notify(r) => format!(
            "events {:#06x}, folder {:#x}, message {:#x}",
            r.data.event_mask.bits(),
            r.data.folder_id,
            r.data.message_id
        ),
        RopResponse::Pending(r) => format!("session index {}", r.session_index),
        RopResponse::BufferTooSmall(r) => format!("{} byte(s) needed", r.size_needed),
        _ => String::new(),
    }
}

pub fn list_tags(filter: Option<&str>, json: bool) -> CommandResult {
    let tags: Vec<_> = directory::known_tags()
        .iter()
        .filter(|(name, _)| {
            filter.map_or(true, |f| name.to_lowercase().contains(&f.to_lowercase()))
        })
        .collect();

    if json {
        let entries: Vec<serde_json::Value> = tags
            .iter()
            .map(|(name, tag)| {
                serde_json::json!({
                    "name": name,
                    "id": tag.id,
                    "type": tag.kind,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for (name, tag) in tags {
        println!(
            "{:<28} {:#06x} {:?}",
            name.cyan(),
            tag.id,
            tag.kind
        );
    }
    Ok(())
}
