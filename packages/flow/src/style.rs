//! # Flow Styles
//!
//! Option-per-key style records. A missing key means "inherit from the
//! ambient theme" on a node and "indeterminate" on a uniform style query.
//!
//! Every record supports the same small algebra:
//!
//! - `merge`: keys from `other` override
//! - `unmerge`: drop every key present in `keys`
//! - `intersect`: keep keys with equal values in both records
//! - `pick`: keep only keys present in `keys`

use serde::{Deserialize, Serialize};

macro_rules! style_record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            $(
                $(#[$fmeta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $name {
            /// True when no key is set
            pub fn is_empty(&self) -> bool {
                true $( && self.$field.is_none() )*
            }

            /// Keys set in `other` override keys in `self`
            pub fn merge(&self, other: &Self) -> Self {
                Self {
                    $( $field: other.$field.clone().or_else(|| self.$field.clone()), )*
                }
            }

            /// Remove every key that is set in `keys`
            pub fn unmerge(&self, keys: &Self) -> Self {
                Self {
                    $( $field: if keys.$field.is_some() { None } else { self.$field.clone() }, )*
                }
            }

            /// Keep only keys that have the same value in both
            pub fn intersect(&self, other: &Self) -> Self {
                Self {
                    $(
                        $field: match (&self.$field, &other.$field) {
                            (Some(a), Some(b)) if a == b => Some(a.clone()),
                            _ => None,
                        },
                    )*
                }
            }

            /// Keep only keys that are set in `keys`
            pub fn pick(&self, keys: &Self) -> Self {
                Self {
                    $( $field: if keys.$field.is_some() { self.$field.clone() } else { None }, )*
                }
            }

            /// True when both records set at least one common key
            pub fn shares_keys_with(&self, other: &Self) -> bool {
                false $( || (self.$field.is_some() && other.$field.is_some()) )*
            }

            /// Drop the keys of `keys` whose value equals the one in `ambient`
            pub fn compact(&self, keys: &Self, ambient: &Self) -> Self {
                Self {
                    $(
                        $field: match (&self.$field, &ambient.$field) {
                            (Some(value), Some(base)) if keys.$field.is_some() && value == base => None,
                            (value, _) => value.clone(),
                        },
                    )*
                }
            }
        }
    };
}

/// Vertical text placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Baseline {
    Normal,
    Sub,
    Super,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FontFamily {
    Body,
    Heading,
    Monospace,
    Cursive,
}

/// Semantic color shared by text and boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowColor {
    Default,
    Primary,
    Secondary,
    Subtle,
    Information,
    Success,
    Warning,
    Error,
}

/// What happens when a link or button is activated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Interaction {
    OpenUrl { url: String },
    RunScript { script: String },
}

style_record! {
    /// Inline text formatting
    pub struct TextStyle {
        bold: bool,
        italic: bool,
        underline: bool,
        strike: bool,
        baseline: Baseline,
        font_family: FontFamily,
        /// Percentage of the theme's base size
        font_size: u32,
        color: FlowColor,
        link: Interaction,
        spellcheck: bool,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParagraphVariant {
    Normal,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Title,
    Subtitle,
    Preamble,
    Code,
}

impl ParagraphVariant {
    pub const ALL: [ParagraphVariant; 11] = [
        ParagraphVariant::Normal,
        ParagraphVariant::H1,
        ParagraphVariant::H2,
        ParagraphVariant::H3,
        ParagraphVariant::H4,
        ParagraphVariant::H5,
        ParagraphVariant::H6,
        ParagraphVariant::Title,
        ParagraphVariant::Subtitle,
        ParagraphVariant::Preamble,
        ParagraphVariant::Code,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HorizontalAlignment {
    Start,
    Center,
    End,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListMarker {
    Ordered,
    Unordered,
    Decimal,
    LowerAlpha,
    UpperAlpha,
    LowerRoman,
    UpperRoman,
    Disc,
    Circle,
    Square,
    Dash,
    Check,
}

style_record! {
    /// Paragraph formatting, carried by the paragraph break that ends it
    pub struct ParagraphStyle {
        variant: ParagraphVariant,
        alignment: HorizontalAlignment,
        /// Percentage of the normal line height
        line_spacing: u32,
        space_before: bool,
        space_after: bool,
        /// Zero means "not a list item"
        list_level: u32,
        list_marker: ListMarker,
        hide_list_marker: bool,
    }
}

impl ParagraphStyle {
    pub fn list_level(&self) -> u32 {
        self.list_level.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoxVariant {
    Basic,
    Outlined,
    Contained,
    Alert,
    Quote,
}

style_record! {
    pub struct BoxStyle {
        variant: BoxVariant,
        color: FlowColor,
        inline: bool,
        interaction: Interaction,
        /// Data source expression that repeats the box per item
        source: String,
        hidden: bool,
    }
}

style_record! {
    pub struct TableStyle {
        inline: bool,
        head_rows: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> TextStyle {
        TextStyle {
            bold: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_overrides_and_keeps() {
        let base = TextStyle {
            bold: Some(false),
            italic: Some(true),
            ..Default::default()
        };
        let merged = base.merge(&bold());
        assert_eq!(merged.bold, Some(true));
        assert_eq!(merged.italic, Some(true));
    }

    #[test]
    fn test_intersect_drops_disagreeing_keys() {
        let a = TextStyle {
            bold: Some(true),
            italic: Some(true),
            ..Default::default()
        };
        let b = TextStyle {
            bold: Some(true),
            italic: Some(false),
            ..Default::default()
        };
        let uniform = a.intersect(&b);
        assert_eq!(uniform.bold, Some(true));
        assert_eq!(uniform.italic, None);
    }

    #[test]
    fn test_unmerge_and_pick() {
        let style = TextStyle {
            bold: Some(true),
            color: Some(FlowColor::Primary),
            ..Default::default()
        };
        assert_eq!(style.unmerge(&bold()).bold, None);
        assert_eq!(style.unmerge(&bold()).color, Some(FlowColor::Primary));
        assert_eq!(style.pick(&bold()), bold());
        assert!(style.shares_keys_with(&bold()));
    }

    #[test]
    fn test_compact_only_touches_given_keys() {
        let ambient = TextStyle {
            bold: Some(false),
            italic: Some(false),
            ..Default::default()
        };
        let style = TextStyle {
            bold: Some(false),
            italic: Some(false),
            ..Default::default()
        };
        let keys = TextStyle {
            bold: Some(false),
            ..Default::default()
        };
        let compacted = style.compact(&keys, &ambient);
        assert_eq!(compacted.bold, None);
        assert_eq!(compacted.italic, Some(false));
    }

    #[test]
    fn test_empty_keys_are_not_serialized() {
        let json = serde_json::to_string(&bold()).unwrap();
        assert_eq!(json, r#"{"bold":true}"#);
        assert_eq!(serde_json::to_string(&TextStyle::default()).unwrap(), "{}");
    }
}
