use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name under which every stdin payload is pushed to clients.
pub const AVATAR_EVENT: &str = "avatar_json";

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Envelope written to WebSocket clients as a single text frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub event: String,
    pub data: Value,
}

impl Event {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn avatar(data: Value) -> Self {
        Self::new(AVATAR_EVENT, data)
    }

    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Parses one line of input. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &[u8]) -> serde_json::Result<Option<Value>> {
    // Bytes rather than &str so invalid UTF-8 surfaces as a parse error instead of an I/O error.
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(trimmed).map(Some)
}

/// Strips the trailing newline from a line for logging.
pub fn display_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_end_matches(LINE_ENDINGS)
        .to_string()
}
