//! Sync client tests against in-memory authorities

use async_trait::async_trait;
use scribing_editor::{ApplyOptions, EditorController, EditorState};
use scribing_flow::{FlowContent, FlowOperation, FlowTheme};
use scribing_sync::{
    ConnectionStatus, FileKeyStore, MemoryAuthority, MemoryKeyStore, ProtocolError, Snapshot,
    SyncClient, SyncConfig, SyncError, SyncInput, SyncOutput, SyncProtocol, SyncReducer,
    MAX_SYNC_ATTEMPTS,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn client(protocol: Arc<dyn SyncProtocol>) -> SyncClient {
    SyncClient::new(protocol, SyncConfig::default(), &MemoryKeyStore::default()).unwrap()
}

fn insert(position: usize, text: &str) -> FlowOperation {
    FlowOperation::insert(position, FlowContent::from_text(text))
}

/// Apply `operation` on top of the client's current state
fn edit(client: &SyncClient, operation: FlowOperation) {
    let before = client.state();
    let after = before.apply_mine(&operation, ApplyOptions::default());
    assert!(client.apply(&before, &after, Some(&operation)));
}

fn empty_authority() -> Arc<MemoryAuthority> {
    Arc::new(MemoryAuthority::new(FlowContent::empty(), FlowTheme::default()))
}

#[tokio::test]
async fn test_concurrent_inserts_converge() {
    let authority = empty_authority();
    let a = client(authority.clone());
    let b = client(authority.clone());
    a.connect().await.unwrap();
    b.connect().await.unwrap();

    edit(&a, insert(0, "X"));
    edit(&b, insert(0, "Y"));
    assert_eq!(a.status(), ConnectionStatus::Dirty);

    a.sync().await.unwrap();
    assert_eq!(authority.content().unwrap().text(), "X");
    assert_eq!(a.version(), 1);

    b.sync().await.unwrap();
    assert_eq!(b.state().content().text(), "XY");
    assert_eq!(authority.content().unwrap().text(), "XY");

    a.sync().await.unwrap();
    assert_eq!(a.state().content().text(), "XY");
    assert_eq!(a.version(), b.version());
    assert_eq!(a.status(), ConnectionStatus::Clean);
}

#[tokio::test]
async fn test_sync_without_changes_stays_clean() {
    let authority = empty_authority();
    let a = client(authority);
    a.connect().await.unwrap();
    a.sync().await.unwrap();
    assert_eq!(a.status(), ConnectionStatus::Clean);
    assert!(a.pending().is_none());
}

#[tokio::test]
async fn test_stale_change_is_rejected() {
    let authority = empty_authority();
    let a = client(authority);
    a.connect().await.unwrap();

    let stale = EditorState::new(FlowContent::from_text("old"), FlowTheme::default());
    let operation = insert(0, "!");
    let after = stale.apply_mine(&operation, ApplyOptions::default());
    assert!(!a.apply(&stale, &after, Some(&operation)));
    assert!(a.pending().is_none());
    assert_eq!(a.status(), ConnectionStatus::Clean);
}

#[tokio::test]
async fn test_stale_history_with_same_content_is_rejected() {
    let authority = Arc::new(MemoryAuthority::new(
        FlowContent::from_text("Hello"),
        FlowTheme::default(),
    ));
    let a = client(authority);
    a.connect().await.unwrap();

    let before = a.state();
    let moved = before.with_selection(scribing_flow::FlowSelection::caret(3));
    assert!(a.apply(&before, &moved, None));

    // Same content, older selection
    let replayed = before.with_selection(scribing_flow::FlowSelection::caret(1));
    assert!(!a.apply(&before, &replayed, None));
    assert_eq!(a.state().selection(), &scribing_flow::FlowSelection::caret(3));
}

#[tokio::test]
async fn test_selection_only_change_is_recorded() {
    let authority = Arc::new(MemoryAuthority::new(
        FlowContent::from_text("Hello"),
        FlowTheme::default(),
    ));
    let a = client(authority.clone());
    a.connect().await.unwrap();

    let before = a.state();
    let after = before.with_selection(scribing_flow::FlowSelection::caret(3));
    assert!(a.apply(&before, &after, None));
    assert_eq!(a.status(), ConnectionStatus::Clean);
    assert_eq!(a.next_sync_delay(), Some(Duration::from_millis(500)));

    a.sync().await.unwrap();
    let snapshot = authority.read().await.unwrap().unwrap();
    assert_eq!(snapshot.presence.len(), 1);
    assert_eq!(snapshot.presence[0].client, a.key());
}

/// Authority that holds every sync until released
struct Gated {
    inner: Arc<MemoryAuthority>,
    gate: Notify,
}

#[async_trait]
impl SyncProtocol for Gated {
    async fn read(&self) -> Result<Option<Snapshot>, ProtocolError> {
        self.inner.read().await
    }

    async fn sync(&self, input: SyncInput) -> Result<Option<SyncOutput>, ProtocolError> {
        self.gate.notified().await;
        self.inner.sync(input).await
    }
}

#[tokio::test]
async fn test_edit_during_round_trip_is_rebased() {
    let authority = empty_authority();
    let gated = Arc::new(Gated {
        inner: authority.clone(),
        gate: Notify::new(),
    });
    let a = Arc::new(client(gated.clone()));
    a.connect().await.unwrap();

    // Someone else commits first
    authority
        .sync(SyncInput {
            client: "other".to_string(),
            version: 0,
            operation: Some(insert(0, "X")),
            selection: None,
        })
        .await
        .unwrap();

    edit(&a, insert(0, "A"));
    let syncing = {
        let a = a.clone();
        tokio::spawn(async move { a.sync().await })
    };
    while a.status() != ConnectionStatus::Syncing {
        tokio::task::yield_now().await;
    }

    edit(&a, insert(1, "B"));
    assert_eq!(a.state().content().text(), "AB");

    gated.gate.notify_one();
    syncing.await.unwrap().unwrap();

    assert_eq!(a.state().content().text(), "XAB");
    assert_eq!(a.status(), ConnectionStatus::Dirty);
    assert_eq!(authority.content().unwrap().text(), "XA");

    gated.gate.notify_one();
    a.sync().await.unwrap();
    assert_eq!(authority.content().unwrap().text(), "XAB");
    assert_eq!(a.status(), ConnectionStatus::Clean);
}

/// Reads succeed, every sync fails with a transport error
struct Unreachable {
    attempts: AtomicU32,
}

#[async_trait]
impl SyncProtocol for Unreachable {
    async fn read(&self) -> Result<Option<Snapshot>, ProtocolError> {
        Ok(Some(Snapshot {
            version: 0,
            content: FlowContent::empty(),
            theme: FlowTheme::default(),
            presence: Vec::new(),
        }))
    }

    async fn sync(&self, _input: SyncInput) -> Result<Option<SyncOutput>, ProtocolError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ProtocolError::Transport("connection refused".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_broken_after_exactly_max_attempts() {
    let protocol = Arc::new(Unreachable {
        attempts: AtomicU32::new(0),
    });
    let a = client(protocol.clone());
    a.connect().await.unwrap();
    edit(&a, insert(0, "lost"));

    let result = a.sync().await;
    assert!(matches!(result, Err(SyncError::Exhausted(MAX_SYNC_ATTEMPTS))));
    assert_eq!(protocol.attempts.load(Ordering::SeqCst), MAX_SYNC_ATTEMPTS);
    assert_eq!(a.status(), ConnectionStatus::Broken);

    // The unsent change is kept, and nothing is retried automatically
    assert!(a.pending().is_some());
    assert_eq!(a.next_sync_delay(), None);
    assert!(matches!(a.sync().await, Err(SyncError::NotConnected)));
    assert_eq!(protocol.attempts.load(Ordering::SeqCst), MAX_SYNC_ATTEMPTS);
}

struct Refusing;

#[async_trait]
impl SyncProtocol for Refusing {
    async fn read(&self) -> Result<Option<Snapshot>, ProtocolError> {
        Unreachable {
            attempts: AtomicU32::new(0),
        }
        .read()
        .await
    }

    async fn sync(&self, _input: SyncInput) -> Result<Option<SyncOutput>, ProtocolError> {
        Err(ProtocolError::Rejected("forbidden".to_string()))
    }
}

#[tokio::test]
async fn test_rejection_breaks_without_retry() {
    let a = client(Arc::new(Refusing));
    a.connect().await.unwrap();
    assert!(matches!(a.sync().await, Err(SyncError::Protocol(ProtocolError::Rejected(_)))));
    assert_eq!(a.status(), ConnectionStatus::Broken);

    a.reconnect().await.unwrap();
    assert_eq!(a.status(), ConnectionStatus::Clean);
}

#[tokio::test]
async fn test_missing_document_is_broken() {
    let a = client(Arc::new(MemoryAuthority::missing()));
    assert!(matches!(a.connect().await, Err(SyncError::NotFound)));
    assert_eq!(a.status(), ConnectionStatus::Broken);
}

#[tokio::test(start_paused = true)]
async fn test_auto_sync_pushes_local_edits() {
    let authority = empty_authority();
    let a = Arc::new(client(authority.clone()));
    let cancel = CancellationToken::new();
    let running = {
        let a = a.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { a.run(cancel).await })
    };

    while a.status() != ConnectionStatus::Clean {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    edit(&a, insert(0, "auto"));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(authority.content().unwrap().text(), "auto");
    assert_eq!(a.status(), ConnectionStatus::Clean);

    cancel.cancel();
    running.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_round_trip_commits_result() {
    let authority = empty_authority();
    let gated = Arc::new(Gated {
        inner: authority.clone(),
        gate: Notify::new(),
    });
    let a = Arc::new(client(gated.clone()));
    a.connect().await.unwrap();
    edit(&a, insert(0, "A"));

    let cancel = CancellationToken::new();
    let running = {
        let a = a.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { a.run(cancel).await })
    };
    while a.status() != ConnectionStatus::Syncing {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    gated.gate.notify_one();
    running.await.unwrap();

    assert_eq!(authority.content().unwrap().text(), "A");
    assert_eq!(a.status(), ConnectionStatus::Clean);
    assert!(a.pending().is_none());
    assert_eq!(a.version(), 1);
}

#[tokio::test]
async fn test_controller_edits_flow_through_client() {
    let authority = empty_authority();
    let a = Arc::new(client(authority.clone()));
    a.connect().await.unwrap();

    let mut editor = EditorController::with_reducer(a.state(), SyncReducer::new(a.clone()));
    editor.insert_text("typed");
    assert_eq!(a.state().content().text(), "typed");
    assert_eq!(a.status(), ConnectionStatus::Dirty);

    a.sync().await.unwrap();
    assert_eq!(authority.content().unwrap().text(), "typed");
    editor.replace_state(a.state());
    assert_eq!(editor.state().content().text(), "typed");
}

#[test]
fn test_client_key_is_persisted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let keys = FileKeyStore::new(dir.path().join("storage.json"));
    let authority: Arc<dyn SyncProtocol> = empty_authority();

    let first = SyncClient::new(authority.clone(), SyncConfig::default(), &keys)?;
    let second = SyncClient::new(authority.clone(), SyncConfig::default(), &keys)?;
    assert_eq!(first.key(), second.key());

    let explicit = SyncClient::new(
        authority,
        SyncConfig {
            client_key: Some("explicit".to_string()),
            ..SyncConfig::default()
        },
        &keys,
    )?;
    assert_eq!(explicit.key(), "explicit");
    Ok(())
}
