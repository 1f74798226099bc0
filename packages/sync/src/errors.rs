//! Error types for the sync client

use thiserror::Error;

/// Failure reported by a sync protocol implementation
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Network or transport failure; the round trip may be retried
    #[error("Transport error: {0}")]
    Transport(String),

    /// The authority refused the request; retrying cannot help
    #[error("Rejected by authority: {0}")]
    Rejected(String),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProtocolError::Transport(_))
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Document not found")]
    NotFound,

    #[error("Not connected")]
    NotConnected,

    #[error("Sync failed after {0} attempts")]
    Exhausted(u32),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
}

#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key file: {0}")]
    Json(#[from] serde_json::Error),
}
