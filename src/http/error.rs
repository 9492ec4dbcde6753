//! Mapping of gateway failures to HTTP responses.
//!
//! | failure                          | status |
//! |----------------------------------|--------|
//! | missing/invalid request fields   | 400    |
//! | malformed or mistyped JSON body  | 400    |
//! | backend refused the operation    | 400    |
//! | call cancelled by shutdown       | 503    |
//! | connect, reset, timeout, framing | 500    |
//!
//! Read endpoints never get here for backend failures; they answer `200 []`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

use crate::gateway::GatewayError;
use crate::protocol::ValidationError;

/// Handler error.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    /// The body was not JSON or a field had the wrong type.
    Body(JsonRejection),
    Gateway(GatewayError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Validation(v) => ApiError::Validation(v),
            other => ApiError::Gateway(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(GatewayError::Protocol { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(GatewayError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Validation(e) => {
                tracing::debug!(error = %e, "Rejected invalid request");
                json!({ "error": e.to_string() })
            }
            ApiError::Body(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "Rejected malformed body");
                json!({ "error": rejection.body_text() })
            }
            ApiError::Gateway(GatewayError::Protocol { message, body }) => {
                tracing::info!(error = %message, "Backend refused operation");
                let mut out = Map::new();
                out.insert("error".to_string(), Value::String(message));
                // Keep backend details such as invalidUsers.
                if let Value::Object(fields) = body {
                    out.extend(fields.into_iter().filter(|(k, _)| k != "status" && k != "message"));
                }
                Value::Object(out)
            }
            ApiError::Gateway(e) => {
                tracing::error!(error = %e, "Backend call failed");
                json!({ "error": e.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}
