//! Incremental decoder for the host's `text/event-stream` change feed.

use crate::dao::room_store::{CHANGE_EVENT, StoreChange};

/// Buffers raw body chunks and yields complete change events.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: String,
}

impl EventDecoder {
    /// Feed a chunk and drain every complete event it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StoreChange> {
        self.buffer
            .push_str(&String::from_utf8_lossy(chunk).replace("\r\n", "\n"));

        let mut changes = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(change) = parse_block(&block) {
                changes.push(change);
            }
        }
        changes
    }
}

fn parse_block(block: &str) -> Option<StoreChange> {
    let mut event = None;
    let mut data = String::new();
    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.trim_start());
        }
    }

    if event != Some(CHANGE_EVENT) {
        return None;
    }
    serde_json::from_str(&data).ok()
}
