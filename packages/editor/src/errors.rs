//! Error types for the editor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("No asset store configured")]
    NoAssetStore,

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Interaction error: {0}")]
    Interaction(#[from] InteractionError),

    #[error("Flow error: {0}")]
    Flow(#[from] scribing_flow::FlowError),
}

/// Failure reported by an asset store. The upload stays transient.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("Asset store rejected upload {id}: {reason}")]
    Rejected { id: String, reason: String },

    #[error("Asset store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InteractionError {
    #[error("No link resolver configured")]
    NoLinkResolver,

    #[error("No script host configured")]
    NoScriptHost,

    #[error("Cannot open link {url}: {reason}")]
    Link { url: String, reason: String },

    #[error("Script failed: {0}")]
    Script(String),
}
