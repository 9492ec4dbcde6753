//! Backend protocol subsystem.
//!
//! # Data Flow
//! ```text
//! handler payload
//!     → operation.rs (action table, required-field validation)
//!     → frame.rs (encode one request line / decode one reply line)
//!     → [gateway client moves bytes]
//!     → history.rs (history entries → HistoryRecord)
//! ```
//!
//! Nothing in here performs I/O.

pub mod frame;
pub mod history;
pub mod model;
pub mod operation;

pub use frame::{encode_request, Reply};
pub use history::{parse_entry, parse_line};
pub use model::{Group, GroupEntry, HistoryRecord};
pub use operation::{Action, ChatRequest, ValidationError};
