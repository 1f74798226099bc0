//! # Flow Theme
//!
//! Ambient styles per paragraph variant. Node styles are stored relative to
//! the theme, so resolving a node's effective style means merging its own
//! keys on top of the theme's defaults for the paragraph it belongs to.

use crate::style::{
    Baseline, FlowColor, FontFamily, HorizontalAlignment, ParagraphStyle, ParagraphVariant,
    TextStyle,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Defaults applied to one paragraph variant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphTheme {
    #[serde(default, skip_serializing_if = "TextStyle::is_empty")]
    pub text: TextStyle,
    #[serde(default, skip_serializing_if = "ParagraphStyle::is_empty")]
    pub paragraph: ParagraphStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTheme {
    paragraphs: BTreeMap<ParagraphVariant, ParagraphTheme>,
}

impl FlowTheme {
    /// Theme with explicit variant definitions; missing variants fall back
    /// to `Normal`
    pub fn new(paragraphs: BTreeMap<ParagraphVariant, ParagraphTheme>) -> Self {
        Self { paragraphs }
    }

    /// Shared instance of the default theme
    pub fn standard() -> &'static FlowTheme {
        static STANDARD: OnceLock<FlowTheme> = OnceLock::new();
        STANDARD.get_or_init(FlowTheme::default)
    }

    pub fn paragraph_theme(&self, variant: ParagraphVariant) -> ParagraphTheme {
        match self.paragraphs.get(&variant) {
            Some(theme) => theme.clone(),
            None => self
                .paragraphs
                .get(&ParagraphVariant::Normal)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Ambient text style for a paragraph with the given style
    pub fn ambient_text_style(&self, paragraph: Option<&ParagraphStyle>) -> TextStyle {
        let variant = paragraph
            .and_then(|style| style.variant)
            .unwrap_or(ParagraphVariant::Normal);
        self.paragraph_theme(variant).text
    }

    /// Effective text style of a node inside a paragraph
    pub fn resolve_text_style(
        &self,
        style: &TextStyle,
        paragraph: Option<&ParagraphStyle>,
    ) -> TextStyle {
        self.ambient_text_style(paragraph).merge(style)
    }

    /// Effective paragraph style
    pub fn resolve_paragraph_style(&self, style: &ParagraphStyle) -> ParagraphStyle {
        let variant = style.variant.unwrap_or(ParagraphVariant::Normal);
        self.paragraph_theme(variant).paragraph.merge(style)
    }
}

impl Default for FlowTheme {
    fn default() -> Self {
        let body = TextStyle {
            bold: Some(false),
            italic: Some(false),
            underline: Some(false),
            strike: Some(false),
            baseline: Some(Baseline::Normal),
            font_family: Some(FontFamily::Body),
            font_size: Some(100),
            color: Some(FlowColor::Default),
            spellcheck: Some(true),
            link: None,
        };
        let normal_paragraph = ParagraphStyle {
            variant: Some(ParagraphVariant::Normal),
            alignment: Some(HorizontalAlignment::Start),
            line_spacing: Some(100),
            space_before: Some(false),
            space_after: Some(true),
            list_level: Some(0),
            ..Default::default()
        };

        let heading = |size: u32| TextStyle {
            bold: Some(true),
            font_family: Some(FontFamily::Heading),
            font_size: Some(size),
            ..Default::default()
        };

        let mut paragraphs = BTreeMap::new();
        for variant in ParagraphVariant::ALL {
            let text = match variant {
                ParagraphVariant::Normal => TextStyle::default(),
                ParagraphVariant::H1 => heading(200),
                ParagraphVariant::H2 => heading(175),
                ParagraphVariant::H3 => heading(150),
                ParagraphVariant::H4 => heading(125),
                ParagraphVariant::H5 => heading(110),
                ParagraphVariant::H6 => heading(100),
                ParagraphVariant::Title => heading(300),
                ParagraphVariant::Subtitle => TextStyle {
                    font_size: Some(150),
                    color: Some(FlowColor::Subtle),
                    ..Default::default()
                },
                ParagraphVariant::Preamble => TextStyle {
                    font_size: Some(125),
                    ..Default::default()
                },
                ParagraphVariant::Code => TextStyle {
                    font_family: Some(FontFamily::Monospace),
                    spellcheck: Some(false),
                    ..Default::default()
                },
            };
            paragraphs.insert(
                variant,
                ParagraphTheme {
                    text: body.merge(&text),
                    paragraph: normal_paragraph.merge(&ParagraphStyle {
                        variant: Some(variant),
                        ..Default::default()
                    }),
                },
            );
        }

        Self { paragraphs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_resolves_bold() {
        let theme = FlowTheme::default();
        let paragraph = ParagraphStyle {
            variant: Some(ParagraphVariant::H1),
            ..Default::default()
        };
        let resolved = theme.resolve_text_style(&TextStyle::default(), Some(&paragraph));
        assert_eq!(resolved.bold, Some(true));
        assert_eq!(resolved.italic, Some(false));
    }

    #[test]
    fn test_missing_variant_falls_back_to_normal() {
        let theme = FlowTheme::new(BTreeMap::from([(
            ParagraphVariant::Normal,
            ParagraphTheme {
                text: TextStyle {
                    italic: Some(true),
                    ..Default::default()
                },
                ..Default::default()
            },
        )]));
        assert_eq!(
            theme.paragraph_theme(ParagraphVariant::Code).text.italic,
            Some(true)
        );
    }
}
