//! HTTP/JSON gateway for a line-oriented TCP chat backend.

pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod security;

pub use config::schema::GatewayConfig;
pub use gateway::{CallContext, GatewayClient, GatewayError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
