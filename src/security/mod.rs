//! Request attribution.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → identity.rs (body username/sender/currentUser, ?username, x-username)
//!     → Caller in request extensions
//!     → handler → CallContext.identity → "currentUser" on the wire
//! ```

pub mod identity;

pub use identity::{Caller, Identity};
