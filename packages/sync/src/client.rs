//! # Sync Client
//!
//! Optimistic concurrency against a [`SyncProtocol`] authority.
//!
//! ## Connection states
//!
//! ```text
//! Disconnected → Connecting → Clean ⇄ Dirty → Syncing → Clean | Dirty | Broken
//! ```
//!
//! `Broken` and `Disconnected` stay put until [`SyncClient::reconnect`].
//!
//! ## Round trips
//!
//! At most one round trip is in flight. Local edits made meanwhile queue up
//! in the pending change and are rebased over the authority's merge when
//! the round trip completes, so a client never sends an edit computed
//! against stale content.
//!
//! State lives behind a mutex that is never held across an await.

use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::key_store::{client_key, ClientKeyStore};
use crate::protocol::{SyncInput, SyncOutput, SyncProtocol};
use scribing_editor::{same_presence, EditorState, LocalReducer, StateChange, StateReducer};
use scribing_flow::{FlowContent, FlowOperation, FlowSelection, TieBreak};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// Connected with nothing left to send
    Clean,
    /// Connected with a local change waiting to be sent
    Dirty,
    Syncing,
    Broken,
}

/// Local operations not yet sent, and the content they apply to
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub operation: FlowOperation,
    pub base_content: FlowContent,
}

struct ClientState {
    status: ConnectionStatus,
    version: u64,
    /// Authority content at `version`
    base_content: FlowContent,
    local: EditorState,
    pending: Option<PendingChange>,
    selection: Option<FlowSelection>,
    synced_selection: Option<FlowSelection>,
    last_remote_change: Instant,
}

pub struct SyncClient {
    protocol: Arc<dyn SyncProtocol>,
    config: SyncConfig,
    key: String,
    state: Mutex<ClientState>,
    changes: watch::Sender<EditorState>,
}

impl SyncClient {
    /// Create a disconnected client. The client key comes from the config
    /// or else from `keys`.
    pub fn new(
        protocol: Arc<dyn SyncProtocol>,
        config: SyncConfig,
        keys: &dyn ClientKeyStore,
    ) -> Result<Self, SyncError> {
        let key = match &config.client_key {
            Some(key) => key.clone(),
            None => client_key(keys)?,
        };
        let (changes, _) = watch::channel(EditorState::default());
        Ok(Self {
            protocol,
            config,
            key,
            state: Mutex::new(ClientState {
                status: ConnectionStatus::Disconnected,
                version: 0,
                base_content: FlowContent::empty(),
                local: EditorState::default(),
                pending: None,
                selection: None,
                synced_selection: None,
                last_remote_change: Instant::now(),
            }),
            changes,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lock().status
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Latest local editor state
    pub fn state(&self) -> EditorState {
        self.lock().local.clone()
    }

    pub fn pending(&self) -> Option<PendingChange> {
        self.lock().pending.clone()
    }

    /// Receiver that observes every local state the client produces
    pub fn subscribe(&self) -> watch::Receiver<EditorState> {
        self.changes.subscribe()
    }

    fn publish(&self, state: &EditorState) {
        self.changes.send_replace(state.clone());
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.lock().status = status;
    }

    /// Fetch the authoritative snapshot and adopt it, dropping any local
    /// pending change
    pub async fn connect(&self) -> Result<(), SyncError> {
        {
            let mut state = self.lock();
            if matches!(state.status, ConnectionStatus::Connecting | ConnectionStatus::Syncing) {
                return Ok(());
            }
            state.status = ConnectionStatus::Connecting;
        }

        match self.protocol.read().await {
            Ok(Some(snapshot)) => {
                let local = EditorState::new(snapshot.content.clone(), snapshot.theme)
                    .with_presence(snapshot.presence);
                {
                    let mut state = self.lock();
                    state.version = snapshot.version;
                    state.base_content = snapshot.content;
                    state.local = local.clone();
                    state.pending = None;
                    state.selection = None;
                    state.synced_selection = None;
                    state.last_remote_change = Instant::now();
                    state.status = ConnectionStatus::Clean;
                }
                info!(client = %self.key, version = snapshot.version, "Connected");
                self.publish(&local);
                Ok(())
            }
            Ok(None) => {
                error!(client = %self.key, "Document not found");
                self.set_status(ConnectionStatus::Broken);
                Err(SyncError::NotFound)
            }
            Err(e) => {
                error!(client = %self.key, error = %e, "Failed to read snapshot");
                self.set_status(ConnectionStatus::Broken);
                Err(e.into())
            }
        }
    }

    /// Leave `Broken` or `Disconnected` by connecting again
    pub async fn reconnect(&self) -> Result<(), SyncError> {
        info!(client = %self.key, "Reconnecting");
        self.set_status(ConnectionStatus::Disconnected);
        self.connect().await
    }

    /// Record a local transition. Returns `false` when `before` is not the
    /// state this client last produced; the caller's state is stale and the
    /// change is not taken.
    pub fn apply(
        &self,
        before: &EditorState,
        after: &EditorState,
        operation: Option<&FlowOperation>,
    ) -> bool {
        let mut state = self.lock();
        if before != &state.local {
            warn!(client = %self.key, "Rejected change computed against stale state");
            return false;
        }

        if let Some(operation) = operation {
            state.pending = match state.pending.take() {
                Some(pending) => Some(PendingChange {
                    operation: FlowOperation::batch([pending.operation.clone(), operation.clone()])
                        .unwrap_or(pending.operation),
                    base_content: pending.base_content,
                }),
                None => Some(PendingChange {
                    operation: operation.clone(),
                    base_content: before.content().clone(),
                }),
            };
            if state.status == ConnectionStatus::Clean {
                state.status = ConnectionStatus::Dirty;
            }
        }

        state.selection = Some(after.selection().clone());
        state.local = after.clone();
        drop(state);
        self.publish(after);
        true
    }

    /// Push the pending change and selection, and pull concurrent changes.
    /// Retries transient failures with randomized backoff.
    pub async fn sync(&self) -> Result<(), SyncError> {
        let (input, sent) = {
            let mut state = self.lock();
            match state.status {
                ConnectionStatus::Clean | ConnectionStatus::Dirty => {}
                ConnectionStatus::Connecting | ConnectionStatus::Syncing => return Ok(()),
                ConnectionStatus::Disconnected | ConnectionStatus::Broken => {
                    return Err(SyncError::NotConnected)
                }
            }
            state.status = ConnectionStatus::Syncing;
            let sent = state.pending.take();
            let input = SyncInput {
                client: self.key.clone(),
                version: state.version,
                operation: sent.as_ref().map(|pending| pending.operation.clone()),
                selection: state.selection.clone(),
            };
            (input, sent)
        };

        let attempts = self.config.max_sync_attempts.max(1);
        for attempt in 1..=attempts {
            let delay = self.config.backoff_delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.protocol.sync(input.clone()).await {
                Ok(Some(output)) => {
                    self.complete(&input, output);
                    return Ok(());
                }
                Ok(None) => {
                    error!(client = %self.key, "Document not found during sync");
                    self.fail(sent);
                    return Err(SyncError::NotFound);
                }
                Err(e) if !e.is_retryable() => {
                    error!(client = %self.key, error = %e, "Sync rejected");
                    self.fail(sent);
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(client = %self.key, attempt, error = %e, "Sync attempt failed");
                }
            }
        }

        error!(client = %self.key, attempts, "Sync attempts exhausted");
        self.fail(sent);
        Err(SyncError::Exhausted(attempts))
    }

    /// Give up on a round trip. The unsent change is kept in front of
    /// anything queued meanwhile.
    fn fail(&self, sent: Option<PendingChange>) {
        let mut state = self.lock();
        state.pending = match (sent, state.pending.take()) {
            (Some(sent), Some(queued)) => Some(PendingChange {
                operation: FlowOperation::batch([sent.operation.clone(), queued.operation])
                    .unwrap_or(sent.operation),
                base_content: sent.base_content,
            }),
            (sent, queued) => sent.or(queued),
        };
        state.status = ConnectionStatus::Broken;
    }

    fn complete(&self, input: &SyncInput, output: SyncOutput) {
        let mut state = self.lock();
        let theme = state.local.theme().clone();

        let mut base = state.base_content.clone();
        if let Some(sent) = &input.operation {
            base = sent.apply_to(&base, &theme);
        }
        if let Some(merge) = &output.merge {
            base = merge.apply_to(&base, &theme);
        }
        state.base_content = base;
        state.version = output.version;

        let base_content = state.base_content.clone();
        let queued = state.pending.take();
        let mut remote_change = output.merge.is_some();
        match (&output.merge, queued) {
            (Some(merge), Some(queued)) => {
                // Authority merge first, then the edits queued meanwhile
                if let Some(local_merge) = queued.operation.transform_with(merge, TieBreak::OtherFirst) {
                    state.local = state.local.apply_theirs(&local_merge);
                }
                state.pending = merge
                    .transform(&queued.operation)
                    .map(|operation| PendingChange {
                        operation,
                        base_content,
                    });
            }
            (Some(merge), None) => {
                state.local = state.local.apply_theirs(merge);
            }
            (None, queued) => {
                state.pending = queued.map(|queued| PendingChange {
                    operation: queued.operation,
                    base_content,
                });
            }
        }

        if !same_presence(state.local.presence(), &output.presence) {
            state.local = state.local.with_presence(output.presence);
            remote_change = true;
        }
        if remote_change {
            state.last_remote_change = Instant::now();
        }

        state.selection = Some(state.local.selection().clone());
        state.synced_selection = input.selection.clone();
        state.status = if state.pending.is_some() {
            ConnectionStatus::Dirty
        } else {
            ConnectionStatus::Clean
        };
        debug!(
            client = %self.key,
            version = state.version,
            status = ?state.status,
            "Sync completed"
        );
        let local = state.local.clone();
        drop(state);
        self.publish(&local);
    }

    /// Delay until the next scheduled round trip; `None` when nothing
    /// should be scheduled
    pub fn next_sync_delay(&self) -> Option<Duration> {
        let state = self.lock();
        match state.status {
            ConnectionStatus::Dirty | ConnectionStatus::Syncing | ConnectionStatus::Connecting => {
                Some(self.config.dirty_delay())
            }
            ConnectionStatus::Clean if state.selection != state.synced_selection => {
                Some(self.config.dirty_delay())
            }
            ConnectionStatus::Clean => Some(self.config.idle_delay(state.last_remote_change.elapsed())),
            ConnectionStatus::Disconnected | ConnectionStatus::Broken => None,
        }
    }

    /// Connect if needed, then sync on the schedule of
    /// [`next_sync_delay`](Self::next_sync_delay) until cancelled or broken.
    /// Returns right after connecting when auto sync is off.
    ///
    /// Cancellation only stops the schedule. A round trip already in flight
    /// runs to completion so its result is committed.
    pub async fn run(&self, cancel: CancellationToken) {
        if self.status() == ConnectionStatus::Disconnected {
            if let Err(e) = self.connect().await {
                warn!(client = %self.key, error = %e, "Auto sync stopped");
                return;
            }
        }
        if cancel.is_cancelled() || !self.config.auto_sync {
            return;
        }

        loop {
            let Some(delay) = self.next_sync_delay() else {
                debug!(client = %self.key, "Auto sync stopped");
                return;
            };
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if let Err(e) = self.sync().await {
                warn!(client = %self.key, error = %e, "Auto sync round failed");
            }
            if cancel.is_cancelled() {
                debug!(client = %self.key, "Auto sync cancelled");
                return;
            }
        }
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("key", &self.key)
            .field("status", &self.status())
            .finish()
    }
}

/// Routes editor changes through a [`SyncClient`]. A change based on stale
/// state is dropped and the client's current state is returned instead.
pub struct SyncReducer {
    client: Arc<SyncClient>,
}

impl SyncReducer {
    pub fn new(client: Arc<SyncClient>) -> Self {
        Self { client }
    }
}

impl StateReducer for SyncReducer {
    fn reduce(&mut self, before: &EditorState, change: StateChange) -> EditorState {
        let operation = match &change {
            StateChange::Operation { operation, .. } => Some(operation.clone()),
            StateChange::Replace(_) => None,
        };
        let after = LocalReducer.reduce(before, change);
        if self.client.apply(before, &after, operation.as_ref()) {
            after
        } else {
            self.client.state()
        }
    }
}
