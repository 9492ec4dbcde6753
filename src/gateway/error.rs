//! Gateway call errors.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::protocol::{Reply, ValidationError};

/// Errors that can occur while calling the chat backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request was incomplete; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend could not be reached.
    #[error("cannot reach backend at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection failed mid-call.
    #[error("backend connection failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backend hung up before sending a full response line.
    #[error("backend closed the connection before a complete response line")]
    ClosedEarly,

    /// No response within the call deadline.
    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),

    /// The response line exceeded the configured size.
    #[error("backend response exceeded {limit} bytes without a line delimiter")]
    Framing { limit: u64 },

    /// The request could not be serialized.
    #[error("cannot encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backend refused the operation. `message` is the backend's own text.
    #[error("{message}")]
    Protocol { message: String, body: Value },

    /// The call was abandoned (shutdown or caller gone).
    #[error("backend call cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Turn a reply that did not report success into a protocol error.
    pub fn rejected(reply: Reply) -> Self {
        let message = reply
            .message()
            .or_else(|| reply.status())
            .unwrap_or("request rejected by backend")
            .to_string();
        GatewayError::Protocol {
            message,
            body: reply.into_envelope(),
        }
    }

    /// Metric label for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::Connect { .. } | GatewayError::Io(_) | GatewayError::ClosedEarly => "connection_error",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Framing { .. } => "framing_error",
            GatewayError::Encode(_) => "encode_error",
            GatewayError::Protocol { .. } => "protocol_error",
            GatewayError::Cancelled => "cancelled",
        }
    }

    /// Failures of the transport rather than of the request.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GatewayError::Connect { .. }
                | GatewayError::Io(_)
                | GatewayError::ClosedEarly
                | GatewayError::Timeout(_)
                | GatewayError::Framing { .. }
        )
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
