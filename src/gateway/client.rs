//! TCP client for the chat backend.
//!
//! # Responsibilities
//! - Open one fresh connection per call (no pooling, no reuse)
//! - Write one request line, read one response line
//! - Enforce connect and call deadlines, honour cancellation
//! - Release the socket on every exit path

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::GatewayConfig;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::net::ConnectionTracker;
use crate::observability::metrics;
use crate::protocol::frame::{encode_request, Reply, LINE_DELIMITER};
use crate::protocol::ChatRequest;
use crate::security::identity::Identity;

/// Per-call context, scoped to one inbound request.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Who the call is attributed to.
    pub identity: Identity,
    /// Cancelled when the call should be abandoned.
    pub cancel: CancellationToken,
}

impl CallContext {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(identity: Identity, cancel: CancellationToken) -> Self {
        Self { identity, cancel }
    }
}

/// Client for the backend line protocol.
#[derive(Clone)]
pub struct GatewayClient {
    config: Arc<ArcSwap<GatewayConfig>>,
    sockets: ConnectionTracker,
}

impl GatewayClient {
    /// Create a client reading its settings from a shared, swappable config.
    pub fn new(config: Arc<ArcSwap<GatewayConfig>>) -> Self {
        Self {
            config,
            sockets: ConnectionTracker::new(),
        }
    }

    pub fn from_config(config: GatewayConfig) -> Self {
        Self::new(Arc::new(ArcSwap::from_pointee(config)))
    }

    /// Backend socket counters.
    pub fn sockets(&self) -> &ConnectionTracker {
        &self.sockets
    }

    /// Send one request and wait for its reply.
    ///
    /// Resolves exactly once. A reply that is not JSON comes back as
    /// [`Reply::Raw`]; whether the backend accepted the operation is left to
    /// the caller (see [`Reply::confirm`]).
    pub async fn call(&self, request: &ChatRequest, ctx: &CallContext) -> GatewayResult<Reply> {
        let config = self.config.load_full();
        let action = request.action();
        let deadline = config.timeouts.call();
        let start = Instant::now();

        let span = tracing::debug_span!(
            "gateway_call",
            action = %action,
            caller = %ctx.identity,
            backend = %config.backend.address,
            connection_id = tracing::field::Empty,
        );

        let result: GatewayResult<Reply> = async {
            let line = encode_request(request, &ctx.identity)?;

            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => Err(GatewayError::Cancelled),
                outcome = time::timeout(deadline, self.exchange(&config, &line)) => {
                    outcome.unwrap_or(Err(GatewayError::Timeout(deadline)))
                }
            }
        }
        .instrument(span)
        .await;

        let outcome = match &result {
            Ok(reply) if reply.is_ok() => "ok",
            Ok(_) => "rejected",
            Err(e) => e.kind(),
        };
        metrics::record_call(action.name(), outcome, start);

        match &result {
            Ok(_) => tracing::debug!(action = %action, outcome, elapsed = ?start.elapsed(), "Backend call finished"),
            Err(e) => tracing::warn!(action = %action, error = %e, "Backend call failed"),
        }

        result
    }

    /// One connection, one line each way. The socket and its guard are
    /// dropped when this future completes or is dropped.
    async fn exchange(&self, config: &GatewayConfig, line: &[u8]) -> GatewayResult<Reply> {
        let addr = config.backend.address.as_str();

        let mut stream = match time::timeout(config.timeouts.connect(), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(GatewayError::Connect {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_) => return Err(GatewayError::Timeout(config.timeouts.connect())),
        };
        let guard = self.sockets.track();
        tracing::Span::current().record("connection_id", tracing::field::display(guard.id()));
        tracing::trace!("Connected to backend");

        stream.write_all(line).await?;
        stream.flush().await?;

        let limit = config.backend.max_response_bytes;
        let mut response = Vec::new();
        let read = BufReader::new((&mut stream).take(limit))
            .read_until(LINE_DELIMITER, &mut response)
            .await?;

        if response.last() != Some(&LINE_DELIMITER) {
            return Err(if read as u64 >= limit {
                GatewayError::Framing { limit }
            } else {
                GatewayError::ClosedEarly
            });
        }

        // Best effort; the socket is closed on drop either way.
        let _ = stream.shutdown().await;

        Ok(Reply::decode(&String::from_utf8_lossy(&response)))
    }
}
