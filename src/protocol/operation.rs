//! Logical actions and their wire encoding.
//!
//! Every backend call goes through [`Action::request`], which checks the
//! required payload fields. A [`ChatRequest`] therefore always carries a
//! complete payload, and a missing field is reported before any socket is
//! opened.

use serde_json::{Map, Value};
use thiserror::Error;

/// A backend action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Register,
    PrivateMessage,
    CreateGroup,
    GroupMessage,
    DeleteGroup,
    PrivateHistory,
    GroupHistory,
    ConnectedUsers,
    ListGroups,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::Register,
        Action::PrivateMessage,
        Action::CreateGroup,
        Action::GroupMessage,
        Action::DeleteGroup,
        Action::PrivateHistory,
        Action::GroupHistory,
        Action::ConnectedUsers,
        Action::ListGroups,
    ];

    /// Opcode sent in the `action` field of the request line.
    pub fn opcode(self) -> &'static str {
        match self {
            Action::Register => "0",
            Action::PrivateMessage => "1",
            Action::CreateGroup => "2",
            Action::GroupMessage => "3",
            Action::DeleteGroup => "4",
            Action::PrivateHistory => "7",
            Action::GroupHistory => "8",
            Action::ConnectedUsers => "9",
            Action::ListGroups => "10",
        }
    }

    /// Stable name for logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            Action::Register => "register",
            Action::PrivateMessage => "private_message",
            Action::CreateGroup => "create_group",
            Action::GroupMessage => "group_message",
            Action::DeleteGroup => "delete_group",
            Action::PrivateHistory => "private_history",
            Action::GroupHistory => "group_history",
            Action::ConnectedUsers => "connected_users",
            Action::ListGroups => "list_groups",
        }
    }

    pub fn from_opcode(opcode: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.opcode() == opcode)
    }

    /// Payload fields the backend needs for this action.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Action::Register => &["username", "sessionId"],
            Action::PrivateMessage => &["sender", "recipient", "message"],
            Action::CreateGroup => &["groupName", "users"],
            Action::GroupMessage => &["sender", "groupName", "message"],
            Action::DeleteGroup => &["groupName"],
            Action::PrivateHistory => &["currentUser", "user"],
            Action::GroupHistory => &["groupName"],
            Action::ConnectedUsers | Action::ListGroups => &[],
        }
    }

    /// Reads degrade to empty results instead of surfacing errors.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Action::PrivateHistory | Action::GroupHistory | Action::ConnectedUsers | Action::ListGroups
        )
    }

    /// Validate `data` and build a request for this action.
    pub fn request(self, data: Map<String, Value>) -> Result<ChatRequest, ValidationError> {
        for &field in self.required_fields() {
            match data.get(field).and_then(Value::as_str) {
                // A given but blank member list is reported as such below.
                Some(_) if field == MEMBERS_FIELD => {}
                Some(s) if !s.trim().is_empty() => {}
                _ => return Err(ValidationError::MissingField { action: self.name(), field }),
            }
        }

        if let Some(users) = data.get(MEMBERS_FIELD).and_then(Value::as_str) {
            if self == Action::CreateGroup && split_members(users).next().is_none() {
                return Err(ValidationError::EmptyMemberList);
            }
        }

        Ok(ChatRequest { action: self, data })
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Comma-separated member list of a new group.
pub const MEMBERS_FIELD: &str = "users";

/// Member names of a comma-separated list, trimmed, blanks dropped.
pub fn split_members(users: &str) -> impl Iterator<Item = &str> {
    users.split(',').map(str::trim).filter(|u| !u.is_empty())
}

/// A validated backend request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    action: Action,
    data: Map<String, Value>,
}

impl ChatRequest {
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

/// A request that cannot be sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{action}: missing required field '{field}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("a group needs at least one member")]
    EmptyMemberList,
}
