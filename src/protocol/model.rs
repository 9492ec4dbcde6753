//! Records exchanged with the browser client.

use serde::{Deserialize, Serialize};

/// One past message, recovered from a backend history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub sender: String,
    pub content: String,
    pub timestamp: String,
}

impl HistoryRecord {
    /// Record for an entry whose structure could not be recovered.
    pub fn unknown(content: impl Into<String>) -> Self {
        Self {
            sender: UNKNOWN_SENDER.to_string(),
            content: content.into(),
            timestamp: String::new(),
        }
    }

    /// Whether this record came from the unparseable-entry fallback.
    pub fn is_fallback(&self) -> bool {
        self.sender == UNKNOWN_SENDER && self.timestamp.is_empty()
    }
}

pub const UNKNOWN_SENDER: &str = "unknown";

/// A chat group and its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Group entries as the backend lists them: full objects or bare names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GroupEntry {
    Detailed(Group),
    Name(String),
}

impl From<GroupEntry> for Group {
    fn from(entry: GroupEntry) -> Self {
        match entry {
            GroupEntry::Detailed(group) => group,
            GroupEntry::Name(name) => Group {
                name,
                members: Vec::new(),
            },
        }
    }
}
