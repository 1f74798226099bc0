//! # Scribing Server
//!
//! Serves one collaborative document over HTTP. The document lives in a
//! [`scribing_sync::MemoryAuthority`]; clients talk to it through the JSON
//! form of the sync protocol.

pub mod config;
pub mod routes;

pub use config::{ServerConfig, DEFAULT_CONFIG_NAME};
pub use routes::{router, ApiError, AppState};
