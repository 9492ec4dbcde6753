//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway call
//!     → tokio TcpStream::connect (one socket per call)
//!     → connection.rs (socket guard, connection id)
//!     → socket dropped, guard released
//! ```

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
