//! Caller identity.
//!
//! Each inbound request resolves the user it acts for and carries it in its
//! own extensions. The identity is then handed to the gateway as an explicit
//! argument, so concurrent requests never see each other's caller.

use std::collections::HashMap;
use std::fmt;

use axum::{
    body::{self, Body},
    extract::{Query, State},
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

pub const X_USERNAME: &str = "x-username";

/// Body fields that name the caller, in priority order.
const BODY_FIELDS: [&str; 3] = ["username", "sender", "currentUser"];

/// The user a backend call is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identity used when a request names nobody.
    pub fn anonymous() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == "unknown"
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context attached to every request by [`identity_middleware`].
#[derive(Clone, Debug, Default)]
pub struct Caller(pub Identity);

/// Resolve the caller from a JSON body, query parameters and headers.
pub fn resolve_identity(body: &[u8], query: &HashMap<String, String>, headers: &HeaderMap) -> Identity {
    let from_body = serde_json::from_slice::<Value>(body).ok().and_then(|json| {
        BODY_FIELDS
            .iter()
            .find_map(|&key| non_blank(json.get(key)?.as_str()?))
    });

    from_body
        .or_else(|| non_blank(query.get("username")?))
        .or_else(|| non_blank(headers.get(X_USERNAME)?.to_str().ok()?))
        .map(Identity::new)
        .unwrap_or_default()
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Attach a [`Caller`] to the request.
///
/// JSON bodies are buffered (up to `max_body_size`) so their fields can be
/// inspected, then handed on unchanged.
pub async fn identity_middleware(
    State(max_body_size): State<usize>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();
    let query = query_params(&parts.uri);

    // Non-JSON bodies are passed through unread.
    if !is_json(&parts.headers) {
        let identity = resolve_identity(&[], &query, &parts.headers);
        parts.extensions.insert(Caller(identity));
        return next.run(Request::from_parts(parts, body)).await;
    }

    let bytes = match body::to_bytes(body, max_body_size).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let identity = resolve_identity(&bytes, &query, &parts.headers);
    tracing::trace!(caller = %identity, "Caller resolved");
    parts.extensions.insert(Caller(identity));

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn query_params(uri: &axum::http::Uri) -> HashMap<String, String> {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(q)| q)
        .unwrap_or_default()
}
