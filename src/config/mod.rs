//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → held in an ArcSwap shared by the HTTP layer and gateway client
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<GatewayConfig>
//!     → next backend call sees the new address and timeouts
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Listener address changes only take effect on restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{apply_overrides, load_config, ConfigError, Overrides};
pub use schema::GatewayConfig;
pub use schema::{BackendConfig, ListenerConfig, LogFormat, ObservabilityConfig, SecurityConfig, TimeoutConfig};
