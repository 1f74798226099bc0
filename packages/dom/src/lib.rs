//! # Scribing DOM
//!
//! Bridge between the editable surface and the flow model.
//!
//! ## Architecture
//!
//! ```text
//! render_content(FlowContent)
//!     │
//!     ├── DomTree       arena of elements and text, generational ids
//!     └── FlowRegistry  DomNodeId → FlowNode / host FlowContent / FlowAxis
//!
//! beforeinput / selectionchange / keydown
//!     │
//!     ▼
//! mapper     (node, offset) ⇄ flow position within one editing host
//! selection  DomRange[] ⇄ FlowSelection, wrapping through axes
//! input      beforeinput → EditorController intent
//! keys       caret fixes for breaks, lists, tables, nested flows
//! ```
//!
//! Mapping never guesses: a position that cannot be resolved yields `None`
//! and the triggering event is dropped with a warning.

mod axis;
mod errors;
mod input;
mod keys;
mod mapper;
mod registry;
mod render;
mod selection;
mod tree;

pub use axis::FlowAxis;
pub use errors::DomError;
pub use input::{handle_before_input, BeforeInput, InputType};
pub use keys::{handle_key, CaretLayout, CaretRect, Key, KeyOutcome};
pub use mapper::{
    content_size, editing_host, flow_size, map_dom_position_to_flow, map_flow_position_to_dom,
    DomPosition,
};
pub use registry::{FlowRegistry, OwnerToken};
pub use render::{render_content, unmount, RenderedFlow};
pub use selection::{
    apply_flow_selection, map_dom_range_to_flow, map_dom_selection_to_flow,
    map_flow_selection_to_dom, reconcile, DomRange, SelectionMutation,
};
pub use tree::{DomKind, DomNode, DomNodeId, DomTree};
