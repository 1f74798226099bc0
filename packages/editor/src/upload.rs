//! # Asset Uploads
//!
//! Images and videos are inserted before their bytes reach a server. The
//! blob is kept in memory under an upload id so the pending node can render,
//! the host's [`AssetStore`] runs on the tokio runtime, and completions are
//! drained back on the editor side where they become `CompleteUpload`
//! operations.
//!
//! A store failure or a result without a url leaves the upload `Failed`:
//! the node stays transient and nothing retries it.
//!
//! Settled statuses and kept blobs stay until the host calls
//! [`UploadManager::forget`]. A forgotten upload that is still running is
//! ignored when it finishes.

use crate::errors::UploadError;
use async_trait::async_trait;
use scribing_flow::FlowOperation;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type UploadId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl Blob {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Pending { progress: f32 },
    Completed { url: String },
    Failed { reason: String },
}

type StatusTable = Arc<Mutex<HashMap<UploadId, UploadStatus>>>;

fn lock(statuses: &StatusTable) -> MutexGuard<'_, HashMap<UploadId, UploadStatus>> {
    statuses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handed to the asset store so it can report transfer progress
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    id: UploadId,
    statuses: StatusTable,
}

impl ProgressReporter {
    /// Report progress as a fraction between 0 and 1
    pub fn report(&self, progress: f32) {
        if let Some(UploadStatus::Pending { progress: current }) = lock(&self.statuses).get_mut(&self.id) {
            *current = progress.clamp(0.0, 1.0);
        }
    }
}

#[derive(Debug)]
pub struct UploadRequest {
    pub id: UploadId,
    pub blob: Blob,
    /// Extra named blobs stored alongside, e.g. a video's poster frame
    pub supplementary: BTreeMap<String, Blob>,
    pub progress: ProgressReporter,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadResult {
    pub url: Option<String>,
    pub supplementary: BTreeMap<String, String>,
}

/// Host hook that persists blobs and returns their public urls
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn store(&self, request: UploadRequest) -> Result<UploadResult, UploadError>;
}

#[derive(Debug)]
pub struct UploadCompletion {
    pub id: UploadId,
    pub result: Result<UploadResult, UploadError>,
}

pub struct UploadManager {
    store: Arc<dyn AssetStore>,
    blobs: HashMap<UploadId, Blob>,
    statuses: StatusTable,
    sender: mpsc::UnboundedSender<UploadCompletion>,
    receiver: mpsc::UnboundedReceiver<UploadCompletion>,
    cancel: CancellationToken,
}

impl UploadManager {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            store,
            blobs: HashMap::new(),
            statuses: Arc::default(),
            sender,
            receiver,
            cancel: CancellationToken::new(),
        }
    }

    /// Keep the blob and start storing it. Must be called from within a
    /// tokio runtime.
    pub fn upload(&mut self, blob: Blob, supplementary: BTreeMap<String, Blob>) -> UploadId {
        let id = Uuid::new_v4().to_string();
        self.blobs.insert(id.clone(), blob.clone());
        lock(&self.statuses).insert(id.clone(), UploadStatus::Pending { progress: 0.0 });

        let request = UploadRequest {
            id: id.clone(),
            blob,
            supplementary,
            progress: ProgressReporter {
                id: id.clone(),
                statuses: self.statuses.clone(),
            },
        };
        let store = self.store.clone();
        let sender = self.sender.clone();
        let cancel = self.cancel.clone();
        let upload_id = id.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = store.store(request) => result,
            };
            if cancel.is_cancelled() {
                return;
            }
            if sender.send(UploadCompletion { id: upload_id, result }).is_err() {
                debug!("Upload finished after its manager was dropped");
            }
        });

        debug!(id = %id, "Upload started");
        id
    }

    /// Locally held blob of a pending upload
    pub fn blob(&self, id: &str) -> Option<&Blob> {
        self.blobs.get(id)
    }

    pub fn status(&self, id: &str) -> Option<UploadStatus> {
        lock(&self.statuses).get(id).cloned()
    }

    pub fn try_next(&mut self) -> Option<UploadCompletion> {
        self.receiver.try_recv().ok()
    }

    pub async fn next(&mut self) -> Option<UploadCompletion> {
        self.receiver.recv().await
    }

    /// Drop everything held for `id`. Returns `false` for an unknown id.
    pub fn forget(&mut self, id: &str) -> bool {
        let blob = self.blobs.remove(id).is_some();
        let status = lock(&self.statuses).remove(id).is_some();
        if status {
            debug!(id = %id, "Upload forgotten");
        }
        blob || status
    }

    /// Number of uploads with a status still held
    pub fn len(&self) -> usize {
        lock(&self.statuses).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a completion; returns the operation that swaps in the url
    pub fn complete(&mut self, completion: UploadCompletion) -> Option<FlowOperation> {
        let UploadCompletion { id, result } = completion;
        if !lock(&self.statuses).contains_key(&id) {
            debug!(id = %id, "Ignoring completion of a forgotten upload");
            return None;
        }
        let (status, operation) = match result {
            Ok(UploadResult {
                url: Some(url),
                supplementary,
            }) => {
                info!(id = %id, url = %url, "Upload completed");
                self.blobs.remove(&id);
                (
                    UploadStatus::Completed { url: url.clone() },
                    Some(FlowOperation::CompleteUpload {
                        id: id.clone(),
                        url,
                        supplementary,
                    }),
                )
            }
            Ok(UploadResult { url: None, .. }) => {
                warn!(id = %id, "Asset store returned no url; upload stays transient");
                (
                    UploadStatus::Failed {
                        reason: "no url".to_string(),
                    },
                    None,
                )
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Upload failed; upload stays transient");
                (
                    UploadStatus::Failed {
                        reason: e.to_string(),
                    },
                    None,
                )
            }
        };
        lock(&self.statuses).insert(id, status);
        operation
    }
}

impl Drop for UploadManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoStore;

    #[async_trait]
    impl AssetStore for EchoStore {
        async fn store(&self, request: UploadRequest) -> Result<UploadResult, UploadError> {
            request.progress.report(0.5);
            Ok(UploadResult {
                url: Some(format!("https://cdn/{}", request.id)),
                supplementary: BTreeMap::new(),
            })
        }
    }

    struct FailingStore;

    #[async_trait]
    impl AssetStore for FailingStore {
        async fn store(&self, request: UploadRequest) -> Result<UploadResult, UploadError> {
            Err(UploadError::Rejected {
                id: request.id,
                reason: "too large".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_completed_upload_evicts_blob() {
        let mut uploads = UploadManager::new(Arc::new(EchoStore));
        let id = uploads.upload(Blob::new("image/png", vec![1, 2, 3]), BTreeMap::new());
        assert!(uploads.blob(&id).is_some());

        let completion = uploads.next().await.unwrap();
        let operation = uploads.complete(completion).unwrap();
        assert!(matches!(operation, FlowOperation::CompleteUpload { .. }));
        assert!(uploads.blob(&id).is_none());
        assert_eq!(
            uploads.status(&id),
            Some(UploadStatus::Completed {
                url: format!("https://cdn/{}", id)
            })
        );
    }

    #[tokio::test]
    async fn test_failed_upload_stays_transient() {
        let mut uploads = UploadManager::new(Arc::new(FailingStore));
        let id = uploads.upload(Blob::new("image/png", vec![0]), BTreeMap::new());
        let completion = uploads.next().await.unwrap();
        assert!(uploads.complete(completion).is_none());
        assert!(matches!(uploads.status(&id), Some(UploadStatus::Failed { .. })));
        // Still renderable from the local blob
        assert!(uploads.blob(&id).is_some());

        assert!(uploads.forget(&id));
        assert!(uploads.blob(&id).is_none());
        assert_eq!(uploads.status(&id), None);
        assert!(uploads.is_empty());
        assert!(!uploads.forget(&id));
    }

    /// Never finishes until the test lets it
    struct HeldStore(tokio::sync::Notify);

    #[async_trait]
    impl AssetStore for HeldStore {
        async fn store(&self, request: UploadRequest) -> Result<UploadResult, UploadError> {
            self.0.notified().await;
            Ok(UploadResult {
                url: Some(format!("https://cdn/{}", request.id)),
                supplementary: BTreeMap::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_forgotten_upload_completion_is_ignored() {
        let store = Arc::new(HeldStore(tokio::sync::Notify::new()));
        let mut uploads = UploadManager::new(store.clone());
        let id = uploads.upload(Blob::new("image/png", vec![1]), BTreeMap::new());
        assert_eq!(uploads.len(), 1);

        assert!(uploads.forget(&id));
        store.0.notify_one();
        let completion = uploads.next().await.unwrap();
        assert!(uploads.complete(completion).is_none());
        assert_eq!(uploads.status(&id), None);
        assert!(uploads.is_empty());
    }
}
