//! Source text abstraction and zero-copy segments.
//!
//! The pipeline never copies the text it formats. Lexer and parser output
//! reference [`Segment`] views into a [`SourceText`], which wraps either an
//! immutable shared string or a rope snapshot (ropes clone in O(1), so a
//! stream's source side-table can hold one per layout without copying the
//! document).

use ropey::Rope;
use std::borrow::Cow;
use std::ops::Range;
use std::sync::Arc;

/// Identity of a source text buffer.
///
/// Two segments are only comparable (contiguous, mergeable) when they view
/// the same source. Callers juggling multiple sources assign distinct ids
/// with [`SourceText::with_id`]; the default id is 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

#[derive(Clone, Debug)]
enum SourceContent {
    Plain(Arc<str>),
    Rope(Rope),
}

/// A text buffer the pipeline can lex, parse, and lay out.
#[derive(Clone, Debug)]
pub struct SourceText {
    id: SourceId,
    content: SourceContent,
}

impl SourceText {
    /// Wrap an immutable string.
    #[must_use]
    pub fn plain(text: impl Into<Arc<str>>) -> Self {
        Self {
            id: SourceId::default(),
            content: SourceContent::Plain(text.into()),
        }
    }

    /// Snapshot a rope. The snapshot is O(1) and stays valid while the
    /// caller keeps editing their copy.
    #[must_use]
    pub fn from_rope(rope: &Rope) -> Self {
        Self {
            id: SourceId::default(),
            content: SourceContent::Rope(rope.clone()),
        }
    }

    /// Assign an explicit source id.
    #[must_use]
    pub fn with_id(mut self, id: SourceId) -> Self {
        self.id = id;
        self
    }

    /// The source id segments carved from this text carry.
    #[must_use]
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Length in bytes.
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        match &self.content {
            SourceContent::Plain(s) => s.len(),
            SourceContent::Rope(r) => r.len_bytes(),
        }
    }

    /// Check if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len_bytes() == 0
    }

    /// The whole text. Borrowed for plain sources and single-chunk ropes.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        self.slice(0..self.len_bytes())
    }

    /// A byte range of the text.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds or splits a UTF-8 sequence,
    /// same as string slicing.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Cow<'_, str> {
        match &self.content {
            SourceContent::Plain(s) => Cow::Borrowed(&s[range]),
            SourceContent::Rope(r) => {
                let slice = r.byte_slice(range);
                slice
                    .as_str()
                    .map_or_else(|| Cow::Owned(slice.to_string()), Cow::Borrowed)
            }
        }
    }

    /// Carve a segment viewing `offset..offset + len`.
    #[must_use]
    pub fn segment(&self, offset: usize, len: usize) -> Segment {
        debug_assert!(offset + len <= self.len_bytes());
        Segment::new(self.id, offset as u32, len as u32)
    }

    /// Resolve a segment carved from this source back to text.
    #[must_use]
    pub fn segment_text(&self, segment: &Segment) -> Cow<'_, str> {
        debug_assert_eq!(segment.source, self.id);
        self.slice(segment.range())
    }
}

/// Zero-copy byte view into a [`SourceText`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Segment {
    /// Source this segment views.
    pub source: SourceId,
    /// Byte offset of the view.
    pub offset: u32,
    /// Byte length of the view.
    pub len: u32,
}

impl Segment {
    /// Create a segment.
    #[must_use]
    pub const fn new(source: SourceId, offset: u32, len: u32) -> Self {
        Self {
            source,
            offset,
            len,
        }
    }

    /// Byte range of the view.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.offset as usize..(self.offset + self.len) as usize
    }

    /// Byte offset one past the end.
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.offset + self.len
    }

    /// Check if zero length.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when `next` starts exactly where this segment ends, in the
    /// same source. Contiguous segments can merge into one run.
    #[must_use]
    pub fn is_contiguous_with(&self, next: &Self) -> bool {
        self.source == next.source && self.end() == next.offset
    }

    /// Extend this segment to cover a contiguous follower.
    #[must_use]
    pub fn joined(&self, next: &Self) -> Self {
        debug_assert!(self.is_contiguous_with(next));
        Self::new(self.source, self.offset, self.len + next.len)
    }
}
