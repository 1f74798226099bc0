//! # Scribing Sync
//!
//! Keeps an editor state in step with a remote document authority.
//!
//! ## Overview
//!
//! ```text
//! EditorController ──SyncReducer──► SyncClient ──SyncProtocol──► authority
//!        ▲                              │
//!        └──────── watch::Receiver ─────┘  (merged remote changes)
//! ```
//!
//! [`MemoryAuthority`] is an in-process authority used by tests and by the
//! HTTP server.

mod authority;
mod client;
mod config;
mod errors;
mod key_store;
mod protocol;

pub use authority::{MemoryAuthority, PRESENCE_TTL};
pub use client::{ConnectionStatus, PendingChange, SyncClient, SyncReducer};
pub use config::{
    SyncConfig, DIRTY_SYNC_DELAY, MAX_IDLE_SYNC_DELAY, MAX_SYNC_ATTEMPTS, MIN_BACKOFF_DELAY,
    MIN_IDLE_SYNC_DELAY, RANDOM_BACKOFF_DELAY,
};
pub use errors::{KeyStoreError, ProtocolError, SyncError};
pub use key_store::{client_key, ClientKeyStore, FileKeyStore, MemoryKeyStore, CLIENT_KEY_NAME};
pub use protocol::{Snapshot, SyncInput, SyncOutput, SyncProtocol};
