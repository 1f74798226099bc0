//! # In-Memory Authority
//!
//! Reference [`SyncProtocol`] implementation holding one document.
//!
//! The authority keeps every committed operation. An incoming operation
//! computed against an older version is transformed over the operations
//! committed since; committed operations win ties, so the earlier sync goes
//! first. The client receives the same concurrent operations transformed
//! over its own as `merge`.

use crate::errors::ProtocolError;
use crate::protocol::{Snapshot, SyncInput, SyncOutput, SyncProtocol};
use async_trait::async_trait;
use scribing_editor::Presence;
use scribing_flow::{FlowContent, FlowOperation, FlowTheme, TieBreak};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Presence entries not refreshed for this long are dropped
pub const PRESENCE_TTL: Duration = Duration::from_secs(30);

struct PresenceEntry {
    presence: Presence,
    seen: Instant,
}

struct Document {
    content: FlowContent,
    theme: FlowTheme,
    history: Vec<FlowOperation>,
    presence: HashMap<String, PresenceEntry>,
}

impl Document {
    fn version(&self) -> u64 {
        self.history.len() as u64
    }

    fn expire_presence(&mut self, ttl: Duration) {
        let now = Instant::now();
        self.presence
            .retain(|_, entry| now.duration_since(entry.seen) <= ttl);
    }

    fn presence_except(&self, client: Option<&str>) -> Vec<Presence> {
        let mut presence: Vec<Presence> = self
            .presence
            .iter()
            .filter(|(key, _)| Some(key.as_str()) != client)
            .map(|(_, entry)| entry.presence.clone())
            .collect();
        presence.sort_by(|a, b| a.client.cmp(&b.client));
        presence
    }
}

pub struct MemoryAuthority {
    document: Mutex<Option<Document>>,
    presence_ttl: Duration,
}

impl MemoryAuthority {
    pub fn new(content: FlowContent, theme: FlowTheme) -> Self {
        Self {
            document: Mutex::new(Some(Document {
                content,
                theme,
                history: Vec::new(),
                presence: HashMap::new(),
            })),
            presence_ttl: PRESENCE_TTL,
        }
    }

    /// Authority for a document that does not exist
    pub fn missing() -> Self {
        Self {
            document: Mutex::new(None),
            presence_ttl: PRESENCE_TTL,
        }
    }

    pub fn with_presence_ttl(mut self, ttl: Duration) -> Self {
        self.presence_ttl = ttl;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Option<Document>> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn version(&self) -> Option<u64> {
        self.lock().as_ref().map(Document::version)
    }

    pub fn content(&self) -> Option<FlowContent> {
        self.lock().as_ref().map(|document| document.content.clone())
    }
}

#[async_trait]
impl SyncProtocol for MemoryAuthority {
    async fn read(&self) -> Result<Option<Snapshot>, ProtocolError> {
        let mut guard = self.lock();
        let Some(document) = guard.as_mut() else {
            return Ok(None);
        };
        document.expire_presence(self.presence_ttl);
        Ok(Some(Snapshot {
            version: document.version(),
            content: document.content.clone(),
            theme: document.theme.clone(),
            presence: document.presence_except(None),
        }))
    }

    async fn sync(&self, input: SyncInput) -> Result<Option<SyncOutput>, ProtocolError> {
        let mut guard = self.lock();
        let Some(document) = guard.as_mut() else {
            return Ok(None);
        };
        if input.version > document.version() {
            return Err(ProtocolError::Rejected(format!(
                "version {} is ahead of {}",
                input.version,
                document.version()
            )));
        }

        let concurrent = FlowOperation::batch(
            document.history[input.version as usize..].iter().cloned(),
        );
        let merge = match &input.operation {
            Some(operation) => {
                let (committed, merge) = match &concurrent {
                    Some(concurrent) => (
                        concurrent.transform(operation),
                        operation.transform_with(concurrent, TieBreak::OtherFirst),
                    ),
                    None => (Some(operation.clone()), None),
                };
                if let Some(committed) = committed {
                    document.content = committed.apply_to(&document.content, &document.theme);
                    document.history.push(committed);
                    info!(
                        client = %input.client,
                        version = document.version(),
                        "Committed operation"
                    );
                }
                merge
            }
            None => concurrent,
        };

        document.presence.insert(
            input.client.clone(),
            PresenceEntry {
                presence: Presence {
                    user: input.client.clone(),
                    client: input.client.clone(),
                    selection: input.selection,
                },
                seen: Instant::now(),
            },
        );
        document.expire_presence(self.presence_ttl);

        debug!(client = %input.client, from = input.version, "Sync round trip");
        Ok(Some(SyncOutput {
            merge,
            presence: document.presence_except(Some(&input.client)),
            version: document.version(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribing_flow::FlowSelection;

    fn input(client: &str, version: u64, operation: Option<FlowOperation>) -> SyncInput {
        SyncInput {
            client: client.to_string(),
            version,
            operation,
            selection: Some(FlowSelection::caret(0)),
        }
    }

    #[tokio::test]
    async fn test_concurrent_insert_goes_after_committed() {
        let authority = MemoryAuthority::new(FlowContent::empty(), FlowTheme::default());
        let x = FlowOperation::insert(0, FlowContent::from_text("X"));
        let y = FlowOperation::insert(0, FlowContent::from_text("Y"));

        let first = authority.sync(input("a", 0, Some(x))).await.unwrap().unwrap();
        assert_eq!(first.merge, None);
        assert_eq!(first.version, 1);

        let second = authority.sync(input("b", 0, Some(y))).await.unwrap().unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(authority.content().unwrap().text(), "XY");
        assert_eq!(
            second.merge,
            Some(FlowOperation::insert(0, FlowContent::from_text("X")))
        );
    }

    #[tokio::test]
    async fn test_future_version_is_rejected() {
        let authority = MemoryAuthority::new(FlowContent::empty(), FlowTheme::default());
        let result = authority.sync(input("a", 5, None)).await;
        assert!(matches!(result, Err(ProtocolError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_missing_document() {
        let authority = MemoryAuthority::missing();
        assert!(authority.read().await.unwrap().is_none());
        assert!(authority.sync(input("a", 0, None)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_expires() {
        let authority = MemoryAuthority::new(FlowContent::empty(), FlowTheme::default())
            .with_presence_ttl(Duration::from_secs(5));
        authority.sync(input("a", 0, None)).await.unwrap();

        let seen = authority.sync(input("b", 0, None)).await.unwrap().unwrap();
        assert_eq!(seen.presence.len(), 1);
        assert_eq!(seen.presence[0].client, "a");

        tokio::time::advance(Duration::from_secs(6)).await;
        let later = authority.sync(input("b", 0, None)).await.unwrap().unwrap();
        assert!(later.presence.is_empty());
    }
}
