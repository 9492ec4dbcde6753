//! REST handlers.
//!
//! Writes surface failures (`400`/`500`); reads answer `200` with an empty
//! list whenever the backend is unavailable or its reply has the wrong shape.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::gateway::GatewayError;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::protocol::operation::{split_members, MEMBERS_FIELD};
use crate::protocol::{parse_entry, Action, Group, GroupEntry, HistoryRecord};
use crate::security::identity::{Caller, Identity};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
    #[serde(rename = "groupName")]
    pub group_name: Option<String>,
    pub users: Option<MemberList>,
}

/// Members as the browser sends them: an array or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MemberList {
    List(Vec<String>),
    Joined(String),
}

impl MemberList {
    /// Comma-joined wire form.
    pub fn to_wire(&self) -> String {
        match self {
            MemberList::List(names) => names
                .iter()
                .flat_map(|n| split_members(n))
                .collect::<Vec<_>>()
                .join(","),
            MemberList::Joined(joined) => split_members(joined).collect::<Vec<_>>().join(","),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PrivateMessageBody {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupMessageBody {
    pub sender: Option<String>,
    #[serde(rename = "groupName")]
    pub group_name: Option<String>,
    pub message: Option<String>,
}

/// Payload from the fields that were supplied.
fn payload<const N: usize>(fields: [(&str, Option<String>); N]) -> Map<String, Value> {
    fields
        .into_iter()
        .filter_map(|(key, value)| Some((key.to_string(), Value::String(value?))))
        .collect()
}

/// Validate, call, and require `status: ok`.
async fn write(
    state: &AppState,
    caller: Identity,
    action: Action,
    data: Map<String, Value>,
) -> Result<Json<Value>, ApiError> {
    let request = action.request(data)?;
    let scope = state.scope(caller);

    let reply = state.gateway.call(&request, &scope.ctx).await?;
    let body = reply.confirm().map_err(GatewayError::rejected)?;

    Ok(Json(body))
}

/// Validate, call, and take the array under `key`. Anything but a
/// validation failure degrades to an empty list.
async fn read_list(
    state: &AppState,
    caller: Identity,
    action: Action,
    data: Map<String, Value>,
    key: &str,
) -> Result<Vec<Value>, ApiError> {
    let request = action.request(data)?;
    let scope = state.scope(caller);

    let reply = match state.gateway.call(&request, &scope.ctx).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(action = %action, error = %e, "Read degraded to empty result");
            return Ok(Vec::new());
        }
    };

    match reply.confirm() {
        Ok(Value::Object(mut body)) => match body.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            _ => {
                tracing::warn!(action = %action, key, "Reply has no list, returning empty result");
                Ok(Vec::new())
            }
        },
        Ok(_) => Ok(Vec::new()),
        Err(rejected) => {
            tracing::warn!(action = %action, message = ?rejected.message(), "Backend refused read");
            Ok(Vec::new())
        }
    }
}

fn history(entries: Vec<Value>) -> Vec<HistoryRecord> {
    let records: Vec<HistoryRecord> = entries.iter().map(parse_entry).collect();
    metrics::record_history_fallback(records.iter().filter(|r| r.is_fallback()).count());
    records
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "Chat gateway is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn register(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    tracing::info!(username = ?body.username, "Registering user");
    let data = payload([("username", body.username), ("sessionId", body.session_id)]);
    write(&state, caller, Action::Register, data).await
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<Json<Vec<String>>, ApiError> {
    let items = read_list(&state, caller, Action::ConnectedUsers, Map::new(), "users").await?;
    let users = items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(name) => Some(name),
            _ => None,
        })
        .collect();
    Ok(Json(users))
}

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let items = read_list(&state, caller, Action::ListGroups, Map::new(), "groups").await?;
    let groups = items
        .into_iter()
        .filter_map(|v| serde_json::from_value::<GroupEntry>(v).ok())
        .map(Group::from)
        .collect();
    Ok(Json(groups))
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    body: Result<Json<CreateGroupBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let users = body.users.as_ref().map(MemberList::to_wire);
    tracing::info!(group = ?body.group_name, users = ?users, "Creating group");
    let data = payload([("groupName", body.group_name), (MEMBERS_FIELD, users)]);
    write(&state, caller, Action::CreateGroup, data).await
}

pub async fn delete_group(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    tracing::info!(group = %name, "Deleting group");
    write(&state, caller, Action::DeleteGroup, payload([("groupName", Some(name))])).await
}

pub async fn send_private(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    body: Result<Json<PrivateMessageBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    tracing::debug!(sender = ?body.sender, recipient = ?body.recipient, "Sending private message");
    let data = payload([
        ("sender", body.sender),
        ("recipient", body.recipient),
        ("message", body.message),
    ]);
    write(&state, caller, Action::PrivateMessage, data).await
}

pub async fn send_group(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    body: Result<Json<GroupMessageBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    tracing::debug!(sender = ?body.sender, group = ?body.group_name, "Sending group message");
    let data = payload([
        ("sender", body.sender),
        ("groupName", body.group_name),
        ("message", body.message),
    ]);
    write(&state, caller, Action::GroupMessage, data).await
}

pub async fn private_history(
    State(state): State<AppState>,
    Path((current_user, user)): Path<(String, String)>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    let caller = Identity::new(current_user.clone());
    let data = payload([("currentUser", Some(current_user)), ("user", Some(user))]);
    let entries = read_list(&state, caller, Action::PrivateHistory, data, "history").await?;
    Ok(Json(history(entries)))
}

pub async fn group_history(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(name): Path<String>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    let data = payload([("groupName", Some(name))]);
    let entries = read_list(&state, caller, Action::GroupHistory, data, "history").await?;
    Ok(Json(history(entries)))
}
