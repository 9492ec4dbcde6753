//! Wire codec for the backend line protocol.
//!
//! Request: one JSON object terminated by `\n`:
//!
//! ```text
//! {"action":"1","currentUser":"daniel","data":{"sender":"daniel","recipient":"ana","message":"hola"}}
//! ```
//!
//! Response: one `\n`-terminated line, JSON when the backend is well behaved,
//! free text otherwise.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::protocol::operation::ChatRequest;
use crate::security::identity::Identity;

pub const LINE_DELIMITER: u8 = b'\n';

#[derive(Serialize)]
struct WireRequest<'a> {
    action: &'static str,
    #[serde(rename = "currentUser")]
    current_user: &'a str,
    data: &'a Map<String, Value>,
}

/// Encode a request as a single delimited line attributed to `identity`.
pub fn encode_request(request: &ChatRequest, identity: &Identity) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(&WireRequest {
        action: request.action().opcode(),
        current_user: identity.as_str(),
        data: request.data(),
    })?;
    line.push(LINE_DELIMITER);
    Ok(line)
}

/// A decoded backend response.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The line was valid JSON.
    Decoded(Value),
    /// The line was not JSON; kept verbatim.
    Raw(String),
}

impl Reply {
    /// Decode one response line. Never fails.
    pub fn decode(line: &str) -> Self {
        let line = line.trim();
        match serde_json::from_str(line) {
            Ok(value) => Reply::Decoded(value),
            Err(_) => Reply::Raw(line.to_string()),
        }
    }

    /// Backend-reported `status`, if any.
    pub fn status(&self) -> Option<&str> {
        self.field("status").and_then(Value::as_str)
    }

    pub fn is_ok(&self) -> bool {
        self.status() == Some("ok")
    }

    /// Backend-reported `message`, or the raw text.
    pub fn message(&self) -> Option<&str> {
        match self {
            Reply::Decoded(value) => value.get("message").and_then(Value::as_str),
            Reply::Raw(text) => Some(text),
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Reply::Decoded(value) => value.get(key),
            Reply::Raw(_) => None,
        }
    }

    /// The envelope of a successful reply, or the reply itself when the
    /// backend did not report `status: ok`.
    pub fn confirm(self) -> Result<Value, Reply> {
        if self.is_ok() {
            Ok(self.into_envelope())
        } else {
            Err(self)
        }
    }

    /// JSON body handed to HTTP callers. Non-object replies are wrapped as
    /// `{"message": ...}`.
    pub fn into_envelope(self) -> Value {
        match self {
            Reply::Decoded(value @ Value::Object(_)) => value,
            Reply::Decoded(Value::String(text)) | Reply::Raw(text) => json!({ "message": text }),
            Reply::Decoded(other) => json!({ "message": other }),
        }
    }
}
