//! # Sync Protocol
//!
//! Two-call contract with the document authority. Transport is up to the
//! implementation; the wire shape is the JSON form of these types.
//!
//! ```text
//! read()            → Snapshot { version, content, theme, presence } | None
//! sync(SyncInput)   → SyncOutput { merge, presence, version }        | None
//! ```
//!
//! `merge` is the operation that takes the client from its base content
//! plus the operation it sent to the authority's new content.

use crate::errors::ProtocolError;
use async_trait::async_trait;
use scribing_editor::Presence;
use scribing_flow::{FlowContent, FlowOperation, FlowSelection, FlowTheme};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u64,
    pub content: FlowContent,
    #[serde(default)]
    pub theme: FlowTheme,
    #[serde(default)]
    pub presence: Vec<Presence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInput {
    pub client: String,
    /// Version the operation was computed against
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<FlowOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<FlowSelection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<FlowOperation>,
    #[serde(default)]
    pub presence: Vec<Presence>,
    pub version: u64,
}

/// Remote document authority
#[async_trait]
pub trait SyncProtocol: Send + Sync {
    /// Current snapshot, `None` when the document does not exist
    async fn read(&self) -> Result<Option<Snapshot>, ProtocolError>;

    /// Submit a change and receive what happened concurrently. `None` when
    /// the document does not exist.
    async fn sync(&self, input: SyncInput) -> Result<Option<SyncOutput>, ProtocolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_wire_shape() {
        let input = SyncInput {
            client: "abc".to_string(),
            version: 3,
            operation: None,
            selection: Some(FlowSelection::caret(2)),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["client"], "abc");
        assert_eq!(json["version"], 3);
        assert!(json.get("operation").is_none());
        assert_eq!(json["selection"]["type"], "range");
    }
}
