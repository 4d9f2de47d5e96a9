//! Font metrics capability.
//!
//! The layout engine does not rasterize or shape; it only needs advance
//! widths, kerning pairs, and a line height. Real font backends implement
//! [`FontMetrics`]; [`MonospaceMetrics`] is the built-in reference
//! implementation, measuring in terminal-style cells.

use std::fmt;
use std::sync::Arc;

use unicode_width::UnicodeWidthStr;

use crate::style::TextAttributes;

/// Glyph measurement capability for a single font face.
///
/// Glyphs are extended grapheme clusters, passed as `&str` slices of the
/// source text.
pub trait FontMetrics: Send + Sync {
    /// Horizontal advance of one glyph, in layout units.
    fn advance(&self, glyph: &str) -> i32;

    /// Kerning adjustment between two adjacent glyphs. Zero by default.
    fn kerning(&self, _left: &str, _right: &str) -> i32 {
        0
    }

    /// Vertical advance between baselines.
    fn line_height(&self) -> i32;
}

/// Which face of a family to measure with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FaceStyle {
    #[default]
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FaceStyle {
    /// Face for a bold/italic flag pair.
    #[must_use]
    pub const fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => Self::Regular,
            (true, false) => Self::Bold,
            (false, true) => Self::Italic,
            (true, true) => Self::BoldItalic,
        }
    }

    /// Face for resolved [`TextAttributes`].
    #[must_use]
    pub fn from_attributes(attrs: TextAttributes) -> Self {
        Self::from_flags(
            attrs.contains(TextAttributes::BOLD),
            attrs.contains(TextAttributes::ITALIC),
        )
    }
}

/// A font family: a regular face plus optional bold/italic variants.
///
/// Missing variants fall back to the regular face, so a family built from
/// a single face still measures bold and italic text.
#[derive(Clone)]
pub struct FontFamily {
    regular: Arc<dyn FontMetrics>,
    bold: Option<Arc<dyn FontMetrics>>,
    italic: Option<Arc<dyn FontMetrics>>,
    bold_italic: Option<Arc<dyn FontMetrics>>,
}

impl FontFamily {
    /// Create a family from its regular face.
    #[must_use]
    pub fn new(regular: Arc<dyn FontMetrics>) -> Self {
        Self {
            regular,
            bold: None,
            italic: None,
            bold_italic: None,
        }
    }

    /// Attach a variant face.
    #[must_use]
    pub fn with_face(mut self, style: FaceStyle, face: Arc<dyn FontMetrics>) -> Self {
        match style {
            FaceStyle::Regular => self.regular = face,
            FaceStyle::Bold => self.bold = Some(face),
            FaceStyle::Italic => self.italic = Some(face),
            FaceStyle::BoldItalic => self.bold_italic = Some(face),
        }
        self
    }

    /// Look up a face, falling back to regular when the variant is absent.
    #[must_use]
    pub fn face(&self, style: FaceStyle) -> &Arc<dyn FontMetrics> {
        let variant = match style {
            FaceStyle::Regular => None,
            FaceStyle::Bold => self.bold.as_ref(),
            FaceStyle::Italic => self.italic.as_ref(),
            FaceStyle::BoldItalic => self.bold_italic.as_ref(),
        };
        variant.unwrap_or(&self.regular)
    }

    /// Line height of the regular face.
    #[must_use]
    pub fn line_height(&self) -> i32 {
        self.regular.line_height()
    }
}

impl fmt::Debug for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFamily")
            .field("bold", &self.bold.is_some())
            .field("italic", &self.italic.is_some())
            .field("bold_italic", &self.bold_italic.is_some())
            .finish()
    }
}

/// Cell-based metrics: every glyph advances by its terminal column width
/// times a fixed cell width. Used by tests and terminal-ish consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonospaceMetrics {
    cell_width: i32,
    line_height: i32,
}

impl MonospaceMetrics {
    /// Create metrics with the given cell width and line height.
    #[must_use]
    pub const fn new(cell_width: i32, line_height: i32) -> Self {
        Self {
            cell_width,
            line_height,
        }
    }

    /// 1x1 cells: advances equal column counts. Handy in tests.
    #[must_use]
    pub const fn unit() -> Self {
        Self::new(1, 1)
    }
}

impl FontMetrics for MonospaceMetrics {
    fn advance(&self, glyph: &str) -> i32 {
        // Control glyphs report zero columns; count them as one cell so
        // accounting never loses a glyph.
        let columns = glyph.width().max(1) as i32;
        columns * self.cell_width
    }

    fn line_height(&self) -> i32 {
        self.line_height
    }
}
