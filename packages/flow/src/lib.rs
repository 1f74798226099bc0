//! # Scribing Flow
//!
//! The rich-text document model shared by every scribing crate.
//!
//! ## Overview
//!
//! ```text
//! FlowContent  (immutable node sequence, positions count characters/atoms)
//!     │
//!     ├── FlowNode       text runs, breaks, boxes, tables, media, markup…
//!     ├── FlowRange      anchor/focus pair, direction preserved
//!     └── FlowSelection  path into nested containers
//!
//! FlowOperation (invertible edit)
//!     apply_to / invert / transform / merge_next / apply_to_selection
//! ```
//!
//! Content and operations serialize to JSON and are the unit exchanged with
//! the sync authority.

pub mod content;
pub mod errors;
pub mod node;
pub mod operation;
pub mod range;
pub mod selection;
pub mod style;
pub mod table;
pub mod theme;
pub mod transform;

pub use content::{FlowContent, NodeCursor, StyledSegment};
pub use errors::FlowError;
pub use node::{
    DynamicText, FlowBox, FlowButton, FlowIcon, FlowImage, FlowNode, FlowVideo, ImageSource,
    TextRun, VideoSource, POSTER_UPLOAD,
};
pub use operation::FlowOperation;
pub use range::FlowRange;
pub use selection::FlowSelection;
pub use style::{
    Baseline, BoxStyle, BoxVariant, FlowColor, FontFamily, HorizontalAlignment, Interaction,
    ListMarker, ParagraphStyle, ParagraphVariant, TableStyle, TextStyle,
};
pub use table::{CellPosition, CellRange, FlowTable, TableAxis, TableCell};
pub use theme::{FlowTheme, ParagraphTheme};
pub use transform::TieBreak;
