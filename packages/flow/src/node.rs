//! # Flow Nodes
//!
//! The closed set of node kinds a [`FlowContent`](crate::FlowContent) is made
//! of. Text runs occupy one position per character; every other node is a
//! single unit, containers included (their content has its own coordinate
//! space).

use crate::content::FlowContent;
use crate::style::{BoxStyle, Interaction, ParagraphStyle, TextStyle};
use crate::table::FlowTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlowNode {
    Text(TextRun),
    LineBreak {
        #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
        style: TextStyle,
    },
    ParagraphBreak {
        #[serde(default, skip_serializing_if = "ParagraphStyle::is_empty")]
        style: ParagraphStyle,
    },
    Box(FlowBox),
    Table(FlowTable),
    Image(FlowImage),
    Video(FlowVideo),
    Icon(FlowIcon),
    StartMarkup {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attr: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
        style: TextStyle,
    },
    EndMarkup {
        tag: String,
        #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
        style: TextStyle,
    },
    EmptyMarkup {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attr: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
        style: TextStyle,
    },
    Dynamic(DynamicText),
    Button(FlowButton),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowBox {
    #[serde(default, skip_serializing_if = "BoxStyle::is_empty")]
    pub style: BoxStyle,
    pub content: FlowContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowButton {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Interaction>,
    pub content: FlowContent,
    #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
    pub style: TextStyle,
}

/// Image location; `upload` names a pending upload whose blob is kept
/// locally until a url is known
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(default)]
    pub url: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub poster: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowImage {
    pub source: ImageSource,
    #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowVideo {
    pub source: VideoSource,
    #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowIcon {
    /// Icon path data or a named icon
    pub data: String,
    #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
    pub style: TextStyle,
}

/// Text computed from a script expression at render time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicText {
    pub expression: String,
    #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
    pub style: TextStyle,
}

/// Name of the supplementary upload that carries a video's poster frame
pub const POSTER_UPLOAD: &str = "poster";

impl FlowNode {
    pub fn text(text: impl Into<String>) -> Self {
        FlowNode::Text(TextRun {
            text: text.into(),
            style: TextStyle::default(),
        })
    }

    pub fn styled_text(text: impl Into<String>, style: TextStyle) -> Self {
        FlowNode::Text(TextRun {
            text: text.into(),
            style,
        })
    }

    pub fn paragraph_break() -> Self {
        FlowNode::ParagraphBreak {
            style: ParagraphStyle::default(),
        }
    }

    pub fn line_break() -> Self {
        FlowNode::LineBreak {
            style: TextStyle::default(),
        }
    }

    /// Number of positions this node occupies in its content
    pub fn size(&self) -> usize {
        match self {
            FlowNode::Text(run) => run.text.chars().count(),
            _ => 1,
        }
    }

    /// Boxes, tables and buttons own nested content
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            FlowNode::Box(_) | FlowNode::Table(_) | FlowNode::Button(_)
        )
    }

    pub fn is_paragraph_break(&self) -> bool {
        matches!(self, FlowNode::ParagraphBreak { .. })
    }

    /// Inline style for nodes that carry one
    pub fn text_style(&self) -> Option<&TextStyle> {
        match self {
            FlowNode::Text(run) => Some(&run.style),
            FlowNode::LineBreak { style }
            | FlowNode::StartMarkup { style, .. }
            | FlowNode::EndMarkup { style, .. }
            | FlowNode::EmptyMarkup { style, .. } => Some(style),
            FlowNode::Image(image) => Some(&image.style),
            FlowNode::Video(video) => Some(&video.style),
            FlowNode::Icon(icon) => Some(&icon.style),
            FlowNode::Dynamic(dynamic) => Some(&dynamic.style),
            FlowNode::Button(button) => Some(&button.style),
            FlowNode::ParagraphBreak { .. } | FlowNode::Box(_) | FlowNode::Table(_) => None,
        }
    }

    /// Copy with a replaced inline style; nodes without one are unchanged
    pub fn with_text_style(&self, style: TextStyle) -> FlowNode {
        let mut node = self.clone();
        match &mut node {
            FlowNode::Text(run) => run.style = style,
            FlowNode::LineBreak { style: current }
            | FlowNode::StartMarkup { style: current, .. }
            | FlowNode::EndMarkup { style: current, .. }
            | FlowNode::EmptyMarkup { style: current, .. } => *current = style,
            FlowNode::Image(image) => image.style = style,
            FlowNode::Video(video) => video.style = style,
            FlowNode::Icon(icon) => icon.style = style,
            FlowNode::Dynamic(dynamic) => dynamic.style = style,
            FlowNode::Button(button) => button.style = style,
            FlowNode::ParagraphBreak { .. } | FlowNode::Box(_) | FlowNode::Table(_) => {}
        }
        node
    }

    pub fn paragraph_style(&self) -> Option<&ParagraphStyle> {
        match self {
            FlowNode::ParagraphBreak { style } => Some(style),
            _ => None,
        }
    }

    /// Upload id of a pending image or video
    pub fn upload_id(&self) -> Option<&str> {
        match self {
            FlowNode::Image(image) => image.source.upload.as_deref(),
            FlowNode::Video(video) => video.source.upload.as_deref(),
            _ => None,
        }
    }

    /// Resolve a pending upload, recursing into nested content.
    /// Returns `None` when nothing in this node referenced the upload.
    pub(crate) fn complete_upload(
        &self,
        id: &str,
        url: &str,
        supplementary: &BTreeMap<String, String>,
    ) -> Option<FlowNode> {
        match self {
            FlowNode::Image(image) if image.source.upload.as_deref() == Some(id) => {
                let mut image = image.clone();
                image.source.url = url.to_string();
                image.source.upload = None;
                Some(FlowNode::Image(image))
            }
            FlowNode::Video(video) if video.source.upload.as_deref() == Some(id) => {
                let mut video = video.clone();
                video.source.url = url.to_string();
                if let Some(poster) = supplementary.get(POSTER_UPLOAD) {
                    video.source.poster = poster.clone();
                }
                video.source.upload = None;
                Some(FlowNode::Video(video))
            }
            FlowNode::Box(flow_box) => flow_box
                .content
                .complete_upload(id, url, supplementary)
                .map(|content| {
                    FlowNode::Box(FlowBox {
                        style: flow_box.style.clone(),
                        content,
                    })
                }),
            FlowNode::Button(button) => button
                .content
                .complete_upload(id, url, supplementary)
                .map(|content| {
                    FlowNode::Button(FlowButton {
                        action: button.action.clone(),
                        content,
                        style: button.style.clone(),
                    })
                }),
            FlowNode::Table(table) => table
                .complete_upload(id, url, supplementary)
                .map(FlowNode::Table),
            _ => None,
        }
    }
}
