//! History line parsing.
//!
//! The backend returns past messages as text lines:
//!
//! ```text
//! [2025-11-08 21:13:59] daniel -> user2: hola      (private)
//! [2025-11-08 14:28:55] daniel en unos: hola       (group)
//! ```
//!
//! Some backends already return objects. Both shapes end up as a
//! [`HistoryRecord`]. Parsing is total: anything unrecognised becomes an
//! `unknown` record holding the full original line.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::protocol::model::{HistoryRecord, UNKNOWN_SENDER};

static TIMESTAMPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\[([^\]]*)\]\s*(.*)$").expect("static regex"));

/// `sender -> recipient: text`. Neither sender nor recipient contains a colon.
static PRIVATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^([^:]*?)->([^:]*):(.*)$").expect("static regex"));

/// `sender en group: text`
static GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^([^:]*?)\sen\s([^:]*):(.*)$").expect("static regex"));

/// Parse one history entry as returned by the backend.
pub fn parse_entry(entry: &Value) -> HistoryRecord {
    match entry {
        Value::String(line) => parse_line(line),
        Value::Object(fields) => {
            let text = |key: &str| fields.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
            HistoryRecord {
                sender: text("sender").unwrap_or(UNKNOWN_SENDER).to_string(),
                content: text("message")
                    .or_else(|| text("content"))
                    .map(str::to_string)
                    .unwrap_or_else(|| entry.to_string()),
                timestamp: text("timestamp").unwrap_or_default().to_string(),
            }
        }
        other => parse_line(&other.to_string()),
    }
}

/// Parse one raw history line.
pub fn parse_line(line: &str) -> HistoryRecord {
    let Some(caps) = TIMESTAMPED.captures(line) else {
        return HistoryRecord::unknown(line);
    };
    let timestamp = caps[1].trim();
    let body = &caps[2];

    match split_body(body) {
        Some((sender, content)) => HistoryRecord {
            sender: sender.to_string(),
            content: content.to_string(),
            timestamp: timestamp.to_string(),
        },
        None => HistoryRecord::unknown(line),
    }
}

/// Sender and text of a timestamp-stripped body, private form first.
fn split_body(body: &str) -> Option<(&str, &str)> {
    [&*PRIVATE, &*GROUP].into_iter().find_map(|form| {
        let caps = form.captures(body)?;
        let sender = caps.get(1)?.as_str().trim();
        let content = caps.get(3)?.as_str().trim();
        (!sender.is_empty()).then_some((sender, content))
    })
}
