//! # Scribing Editor
//!
//! Editing engine on top of the flow document model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ controller: user intents → operations       │
//! │  - toggle bold, insert table, merge cells…  │
//! │  - uniform style queries for toolbars       │
//! │  - asset uploads and interactions           │
//! └─────────────────────────────────────────────┘
//!                     ↓  StateReducer (host owned)
//! ┌─────────────────────────────────────────────┐
//! │ editor_state: immutable EditorState         │
//! │  - apply_mine / apply_theirs                │
//! │  - undo / redo with rebased history         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ scribing-flow: FlowContent + FlowOperation  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Immutable states**: every transition returns a new `EditorState`
//! 2. **Host owns application**: the controller never decides where an edit goes
//! 3. **History survives collaboration**: remote edits rebase undo/redo
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scribing_editor::{EditorController, EditorState};
//! use scribing_flow::{FlowContent, FlowSelection};
//!
//! let state = EditorState::new(FlowContent::from_text("Hello"), Default::default());
//! let mut editor = EditorController::new(state);
//!
//! editor.set_selection(FlowSelection::range(0, 5));
//! editor.toggle_bold();
//! editor.undo();
//! ```

mod controller;
mod editor_state;
mod errors;
mod interaction;
mod presence;
mod undo_stack;
mod upload;

pub use controller::{
    EditorController, LocalReducer, StateChange, StateReducer, SubscriptionId, MAX_LIST_LEVEL,
};
pub use editor_state::{ApplyOptions, EditorState, StateChangeEvent};
pub use errors::{EditorError, InteractionError, UploadError};
pub use interaction::{
    InteractionInvoker, InteractionOutcome, LinkResolver, ResolvedLink, ScriptHost,
};
pub use presence::{same_presence, Presence};
pub use undo_stack::{UndoStack, MAX_UNDO_LENGTH};
pub use upload::{
    AssetStore, Blob, ProgressReporter, UploadCompletion, UploadId, UploadManager, UploadRequest,
    UploadResult, UploadStatus,
};
