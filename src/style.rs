//! Sparse style records and text attributes.
//!
//! A [`Style`] is a set of *overrides*: every field is optional, and unset
//! fields defer to whatever is beneath it (the layout defaults, or styles
//! deeper in the push stack). Preset styles registered under a name are
//! plain `Style` values resolved by `|style:name|` commands.

use crate::color::Rgba;
use bitflags::bitflags;

bitflags! {
    /// Face attributes toggled by `|b|` and `|i|`.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct TextAttributes: u8 {
        const BOLD = 0x01;
        const ITALIC = 0x02;
    }
}

/// Sparse style override record.
///
/// `None` means "inherit" rather than "off". Use [`Style::merge`] to
/// resolve an override against a base.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Style {
    /// Text color override.
    pub color: Option<Rgba>,
    /// Bold override.
    pub bold: Option<bool>,
    /// Italic override.
    pub italic: Option<bool>,
    /// Font family name override.
    pub font: Option<String>,
    /// Icon name attached to this style.
    pub icon: Option<String>,
    /// Name of a preset style supplying defaults beneath this record.
    pub base: Option<String>,
}

impl Style {
    /// Create a style builder.
    #[must_use]
    pub fn builder() -> StyleBuilder {
        StyleBuilder::default()
    }

    /// Style overriding only the color.
    #[must_use]
    pub fn colored(color: Rgba) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }

    /// Style overriding only the bold flag.
    #[must_use]
    pub fn bold() -> Self {
        Self {
            bold: Some(true),
            ..Self::default()
        }
    }

    /// Style overriding only the italic flag.
    #[must_use]
    pub fn italic() -> Self {
        Self {
            italic: Some(true),
            ..Self::default()
        }
    }

    /// Check whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.bold.is_none()
            && self.italic.is_none()
            && self.font.is_none()
            && self.icon.is_none()
            && self.base.is_none()
    }

    /// Merge two styles; set fields in `overlay` win.
    #[must_use]
    pub fn merge(&self, overlay: &Self) -> Self {
        Self {
            color: overlay.color.or(self.color),
            bold: overlay.bold.or(self.bold),
            italic: overlay.italic.or(self.italic),
            font: overlay.font.clone().or_else(|| self.font.clone()),
            icon: overlay.icon.clone().or_else(|| self.icon.clone()),
            base: overlay.base.clone().or_else(|| self.base.clone()),
        }
    }

    /// Resolved face attributes, treating unset flags as off.
    #[must_use]
    pub fn attributes(&self) -> TextAttributes {
        let mut attrs = TextAttributes::empty();
        if self.bold == Some(true) {
            attrs |= TextAttributes::BOLD;
        }
        if self.italic == Some(true) {
            attrs |= TextAttributes::ITALIC;
        }
        attrs
    }
}

/// Fluent builder for [`Style`].
#[derive(Clone, Debug, Default)]
pub struct StyleBuilder {
    style: Style,
}

impl StyleBuilder {
    #[must_use]
    pub fn color(mut self, color: Rgba) -> Self {
        self.style.color = Some(color);
        self
    }

    #[must_use]
    pub fn bold(mut self, bold: bool) -> Self {
        self.style.bold = Some(bold);
        self
    }

    #[must_use]
    pub fn italic(mut self, italic: bool) -> Self {
        self.style.italic = Some(italic);
        self
    }

    #[must_use]
    pub fn font(mut self, name: impl Into<String>) -> Self {
        self.style.font = Some(name.into());
        self
    }

    #[must_use]
    pub fn icon(mut self, name: impl Into<String>) -> Self {
        self.style.icon = Some(name.into());
        self
    }

    #[must_use]
    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.style.base = Some(name.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Style {
        self.style
    }
}
