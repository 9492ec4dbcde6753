//! Backend gateway subsystem.
//!
//! # Data Flow
//! ```text
//! ChatRequest + CallContext (identity, cancellation)
//!     → client.rs (connect, write one line, read one line, close)
//!     → Reply::Decoded | Reply::Raw
//!     → error.rs on failure (connection, timeout, framing, protocol)
//! ```
//!
//! # Design Decisions
//! - One TCP connection per call, closed on every path
//! - Strict newline framing; a close before the delimiter is an error
//! - No retries: every call is one-shot
//! - The caller's identity is an argument, never shared state

pub mod client;
pub mod error;

pub use client::{CallContext, GatewayClient};
pub use error::{GatewayError, GatewayResult};
