//! Packed, seekable command stream.
//!
//! A [`CommandStream`] is the layout engine's output sink: a flat byte
//! arena of variable-size records plus an index table mapping object index
//! to byte offset. Records are addressable only by object index; the index
//! table is what makes seeking O(1) and structural splices bounded.
//!
//! Streams are long-lived. Relayout of the same text object clears the
//! records but keeps the resource side-tables, so interned handles stay
//! stable across calls.

mod record;
mod resources;

pub use record::{CommandRecord, IconRecord, LineInfo, Tag, TextRun};

use std::ops::Range;

use crate::error::{Error, Result};
use crate::font::FontFamily;
use crate::registry::IconSize;
use crate::source::SourceText;
use crate::style::Style;
use resources::ResourceTable;

/// Axis-aligned layout rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Handle to a `LineInfo` record inside a specific stream.
///
/// Minted by [`CommandStream::line_info`] and
/// [`CommandStream::next_line_info`]; using a handle against a stream (or
/// stream state) that did not mint it fails with
/// [`Error::ForeignLineInfo`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineInfoRef {
    index: usize,
    info: LineInfo,
}

impl LineInfoRef {
    /// Object index of the `LineInfo` record.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The decoded line info.
    #[must_use]
    pub const fn info(&self) -> LineInfo {
        self.info
    }
}

/// A custom command hit reported by [`CommandStream::custom_commands_in`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomCommand {
    pub id: u8,
    pub value: i32,
    /// Glyph offset at the record's position in the stream.
    pub glyph_offset: i32,
    /// Object index of the record.
    pub index: usize,
}

/// Packed heterogeneous record buffer with interned resource side-tables.
#[derive(Clone, Debug, Default)]
pub struct CommandStream {
    arena: Vec<u8>,
    index: Vec<u32>,
    cursor: usize,
    total_glyphs: i32,
    line_count: i32,
    actual_width: i32,
    actual_height: i32,
    bounds: Rect,
    has_multiple_styles: bool,
    resources: ResourceTable,
}

impl CommandStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the stream holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Current object index of the cursor.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Move the cursor to an object index.
    ///
    /// # Errors
    ///
    /// [`Error::CommandOutOfBounds`] when `index >= len`.
    pub fn seek(&mut self, index: usize) -> Result<()> {
        if index >= self.index.len() {
            return Err(self.out_of_bounds(index));
        }
        self.cursor = index;
        Ok(())
    }

    /// Advance the cursor by one record.
    pub fn seek_next(&mut self) -> Result<()> {
        let next = self.cursor + 1;
        self.seek(next)
    }

    /// Move the cursor back to the first record.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Decode the record under the cursor.
    pub fn read(&self) -> Result<CommandRecord> {
        self.read_at(self.cursor)
    }

    /// Decode the record at an object index.
    pub fn read_at(&self, index: usize) -> Result<CommandRecord> {
        let offset = *self.index.get(index).ok_or_else(|| self.out_of_bounds(index))? as usize;
        CommandRecord::decode(&self.arena[offset..]).map_err(|_| self.out_of_bounds(index))
    }

    /// Append a record, returning its object index.
    pub fn append(&mut self, record: CommandRecord) -> usize {
        let index = self.index.len();
        self.index.push(self.arena.len() as u32);
        record.encode(&mut self.arena);
        if record.tag().is_style_command() {
            self.has_multiple_styles = true;
        }
        index
    }

    /// Overwrite the record at `index` in place.
    ///
    /// The replacement must have the same tag as the existing record;
    /// records have fixed sizes, so a variant change would shift every
    /// following byte.
    pub fn patch(&mut self, index: usize, record: CommandRecord) -> Result<()> {
        let existing = self.read_at(index)?;
        if existing.tag() != record.tag() {
            return Err(Error::TagMismatch {
                expected: existing.tag().name(),
                found: record.tag().name(),
            });
        }
        let offset = self.index[index] as usize;
        let mut bytes = Vec::with_capacity(record.encoded_len());
        record.encode(&mut bytes);
        self.arena[offset..offset + bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// Splice records into the stream before `index` (`index == len`
    /// appends). Byte offsets of every following record are recomputed.
    pub fn insert(&mut self, index: usize, records: &[CommandRecord]) -> Result<()> {
        if index > self.index.len() {
            return Err(self.out_of_bounds(index));
        }
        let byte_at = self
            .index
            .get(index)
            .map_or(self.arena.len(), |&off| off as usize);

        let mut chunk = Vec::new();
        let mut offsets = Vec::with_capacity(records.len());
        for record in records {
            offsets.push((byte_at + chunk.len()) as u32);
            record.encode(&mut chunk);
            if record.tag().is_style_command() {
                self.has_multiple_styles = true;
            }
        }

        let shift = chunk.len() as u32;
        self.arena.splice(byte_at..byte_at, chunk);
        for offset in &mut self.index[index..] {
            *offset += shift;
        }
        self.index.splice(index..index, offsets);
        Ok(())
    }

    /// Remove a range of records.
    pub fn remove_range(&mut self, range: Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > self.index.len() {
            return Err(self.out_of_bounds(range.end));
        }
        if range.is_empty() {
            return Ok(());
        }
        let byte_start = self.index[range.start] as usize;
        let byte_end = self
            .index
            .get(range.end)
            .map_or(self.arena.len(), |&off| off as usize);
        let removed = (byte_end - byte_start) as u32;

        self.arena.drain(byte_start..byte_end);
        self.index.drain(range.clone());
        for offset in &mut self.index[range.start..] {
            *offset -= removed;
        }
        self.cursor = self.cursor.min(self.index.len().saturating_sub(1));
        Ok(())
    }

    /// Iterate over all records in object-index order.
    pub fn iter(&self) -> impl Iterator<Item = CommandRecord> + '_ {
        (0..self.len()).map_while(|i| self.read_at(i).ok())
    }

    /// Drop all records and aggregates, keeping the resource side-tables.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.index.clear();
        self.cursor = 0;
        self.total_glyphs = 0;
        self.line_count = 0;
        self.actual_width = 0;
        self.actual_height = 0;
        self.bounds = Rect::default();
        self.has_multiple_styles = false;
    }

    /// Drop everything, side-tables included.
    pub fn reset(&mut self) {
        self.clear();
        self.resources.clear();
    }

    // ----- line seeking -----

    /// Handle to the `LineInfo` record of a line.
    ///
    /// Walks the line chain from the front: O(line) hops.
    pub fn line_info(&self, line: usize) -> Result<LineInfoRef> {
        if line >= self.line_count as usize {
            return Err(Error::LineOutOfBounds {
                line,
                count: self.line_count as usize,
            });
        }
        let mut current = self.line_info_at(1)?;
        for _ in 0..line {
            current = self
                .next_line_info(&current)?
                .ok_or(Error::ForeignLineInfo)?;
        }
        Ok(current)
    }

    /// Handle to the line following `prev`: a single O(1) hop over
    /// `length_in_commands` records.
    ///
    /// # Errors
    ///
    /// [`Error::ForeignLineInfo`] when `prev` does not match this stream's
    /// current contents.
    pub fn next_line_info(&self, prev: &LineInfoRef) -> Result<Option<LineInfoRef>> {
        match self.read_at(prev.index) {
            Ok(CommandRecord::LineInfo(info)) if info == prev.info => {}
            _ => return Err(Error::ForeignLineInfo),
        }
        let next = prev.index + 1 + prev.info.length_in_commands as usize;
        if next == self.len() {
            return Ok(None);
        }
        self.line_info_at(next).map(Some)
    }

    /// Move the cursor to a line's `LineInfo` record.
    pub fn seek_line(&mut self, line: usize) -> Result<()> {
        let info = self.line_info(line)?;
        self.cursor = info.index;
        Ok(())
    }

    fn line_info_at(&self, index: usize) -> Result<LineInfoRef> {
        match self.read_at(index) {
            Ok(CommandRecord::LineInfo(info)) => Ok(LineInfoRef { index, info }),
            Ok(_) => Err(Error::ForeignLineInfo),
            Err(e) => Err(e),
        }
    }

    // ----- scans -----

    /// Invoke `f` for every `Custom` record whose glyph offset falls in
    /// `range`. Glyph offsets are reconstructed by walking the stream.
    pub fn custom_commands_in(&self, range: Range<i32>, mut f: impl FnMut(CustomCommand)) {
        let mut glyph_offset = 0;
        for (index, record) in self.iter().enumerate() {
            if let CommandRecord::Custom { id, value } = record {
                if range.contains(&glyph_offset) {
                    f(CustomCommand {
                        id,
                        value,
                        glyph_offset,
                        index,
                    });
                }
            }
            glyph_offset += record.glyph_count();
        }
    }

    // ----- aggregates -----

    /// Total glyphs across all lines.
    #[must_use]
    pub fn total_glyphs(&self) -> i32 {
        self.total_glyphs
    }

    /// Number of laid-out lines.
    #[must_use]
    pub fn line_count(&self) -> i32 {
        self.line_count
    }

    /// Measured extents before alignment: (max line width, total height).
    #[must_use]
    pub fn actual_size(&self) -> (i32, i32) {
        (self.actual_width, self.actual_height)
    }

    /// Alignment-adjusted bounding rectangle of the laid-out block.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// True when any style push/pop/toggle record is present.
    #[must_use]
    pub fn has_multiple_styles(&self) -> bool {
        self.has_multiple_styles
    }

    pub(crate) fn set_layout_metrics(
        &mut self,
        total_glyphs: i32,
        line_count: i32,
        actual_width: i32,
        actual_height: i32,
        bounds: Rect,
    ) {
        self.total_glyphs = total_glyphs;
        self.line_count = line_count;
        self.actual_width = actual_width;
        self.actual_height = actual_height;
        self.bounds = bounds;
    }

    // ----- resources -----

    /// Intern a source text, returning its handle. Sources dedup on id.
    pub fn intern_source(&mut self, source: &SourceText) -> Result<i16> {
        self.resources.intern_source(source)
    }

    /// Look up an interned source text.
    #[must_use]
    pub fn source_string(&self, handle: i16) -> Option<&SourceText> {
        self.resources.source(handle)
    }

    /// Intern a font family under a name.
    pub fn intern_font(&mut self, name: &str, family: &FontFamily) -> Result<i16> {
        self.resources.intern_font(name, family)
    }

    /// Look up an interned font family.
    #[must_use]
    pub fn font(&self, handle: i16) -> Option<&FontFamily> {
        self.resources.font(handle)
    }

    /// Handle of an interned font name.
    #[must_use]
    pub fn font_handle(&self, name: &str) -> Option<i16> {
        self.resources.font_handle(name)
    }

    /// Intern a preset style under a name.
    pub fn intern_style(&mut self, name: &str, style: &Style) -> Result<i16> {
        self.resources.intern_style(name, style)
    }

    /// Look up an interned preset style.
    #[must_use]
    pub fn style(&self, handle: i16) -> Option<&Style> {
        self.resources.style(handle)
    }

    /// Handle of an interned style name.
    #[must_use]
    pub fn style_handle(&self, name: &str) -> Option<i16> {
        self.resources.style_handle(name)
    }

    /// Intern an icon and its display size.
    pub fn intern_icon(&mut self, name: &str, size: IconSize) -> Result<i16> {
        self.resources.intern_icon(name, size)
    }

    /// Look up an interned icon.
    #[must_use]
    pub fn icon(&self, handle: i16) -> Option<(&str, IconSize)> {
        self.resources.icon(handle)
    }

    /// Intern a glyph shader name.
    pub fn intern_glyph_shader(&mut self, name: &str) -> Result<i16> {
        self.resources.intern_shader(name)
    }

    /// Look up an interned glyph shader name.
    #[must_use]
    pub fn glyph_shader_name(&self, handle: i16) -> Option<&str> {
        self.resources.shader_name(handle)
    }

    /// Intern a link target.
    pub fn intern_link(&mut self, target: &str) -> Result<i16> {
        self.resources.intern_link(target)
    }

    /// Look up an interned link target.
    #[must_use]
    pub fn link_target(&self, handle: i16) -> Option<&str> {
        self.resources.link_target(handle)
    }

    fn out_of_bounds(&self, index: usize) -> Error {
        Error::CommandOutOfBounds {
            index,
            len: self.index.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_record(text_length: i32) -> CommandRecord {
        CommandRecord::Text(TextRun {
            text_offset: 0,
            text_length,
            x: 0,
            y: 0,
            width: text_length as i16,
            height: 1,
        })
    }

    fn line_record(length_in_commands: i32, length_in_glyphs: i32) -> CommandRecord {
        CommandRecord::LineInfo(LineInfo {
            offset: 0,
            line_width: 0,
            line_height: 1,
            length_in_commands,
            length_in_glyphs,
            terminated_by_line_break: false,
        })
    }

    /// BlockInfo + two lines of records, line chain intact.
    fn sample_stream() -> CommandStream {
        let mut stream = CommandStream::new();
        stream.append(CommandRecord::BlockInfo {
            offset: 0,
            length_in_lines: 2,
        });
        stream.append(line_record(2, 4));
        stream.append(text_record(3));
        stream.append(CommandRecord::LineBreak { length: 1 });
        stream.append(line_record(3, 5));
        stream.append(CommandRecord::ToggleBold);
        stream.append(text_record(5));
        stream.append(CommandRecord::Custom { id: 2, value: 7 });
        stream.set_layout_metrics(9, 2, 5, 2, Rect::default());
        stream
    }

    #[test]
    fn test_append_read_seek() {
        let mut stream = sample_stream();
        assert_eq!(stream.len(), 8);
        assert_eq!(
            stream.read_at(0).unwrap(),
            CommandRecord::BlockInfo {
                offset: 0,
                length_in_lines: 2
            }
        );
        stream.seek(3).unwrap();
        assert_eq!(stream.read().unwrap(), CommandRecord::LineBreak { length: 1 });
        stream.seek_next().unwrap();
        assert_eq!(stream.position(), 4);
        assert!(stream.seek(8).is_err());
    }

    #[test]
    fn test_patch_same_tag() {
        let mut stream = sample_stream();
        stream.patch(2, text_record(2)).unwrap();
        assert_eq!(stream.read_at(2).unwrap(), text_record(2));
        // Neighbors untouched.
        assert_eq!(stream.read_at(3).unwrap(), CommandRecord::LineBreak { length: 1 });
    }

    #[test]
    fn test_patch_tag_mismatch() {
        let mut stream = sample_stream();
        let err = stream.patch(2, CommandRecord::Hyphen).unwrap_err();
        assert_eq!(
            err,
            Error::TagMismatch {
                expected: "Text",
                found: "Hyphen"
            }
        );
    }

    #[test]
    fn test_insert_shifts_following_records() {
        let mut stream = sample_stream();
        let before = stream.read_at(6).unwrap();
        stream
            .insert(6, &[CommandRecord::PushColor { rgba: 0xAA }, CommandRecord::Hyphen])
            .unwrap();
        assert_eq!(stream.len(), 10);
        assert_eq!(stream.read_at(6).unwrap(), CommandRecord::PushColor { rgba: 0xAA });
        assert_eq!(stream.read_at(7).unwrap(), CommandRecord::Hyphen);
        assert_eq!(stream.read_at(8).unwrap(), before);
    }

    #[test]
    fn test_insert_at_end_appends() {
        let mut stream = sample_stream();
        let len = stream.len();
        stream.insert(len, &[CommandRecord::Hyphen]).unwrap();
        assert_eq!(stream.read_at(len).unwrap(), CommandRecord::Hyphen);
        assert!(stream.insert(len + 2, &[]).is_err());
    }

    #[test]
    fn test_remove_range() {
        let mut stream = sample_stream();
        let tail = stream.read_at(7).unwrap();
        stream.remove_range(5..7).unwrap();
        assert_eq!(stream.len(), 6);
        assert_eq!(stream.read_at(5).unwrap(), tail);
    }

    #[test]
    fn test_line_chain() {
        let stream = sample_stream();
        let first = stream.line_info(0).unwrap();
        assert_eq!(first.index(), 1);
        assert_eq!(first.info().length_in_glyphs, 4);

        let second = stream.next_line_info(&first).unwrap().unwrap();
        assert_eq!(second.index(), 4);
        assert_eq!(second.info().length_in_glyphs, 5);
        assert!(stream.next_line_info(&second).unwrap().is_none());

        assert_eq!(stream.line_info(1).unwrap(), second);
        assert!(matches!(
            stream.line_info(2),
            Err(Error::LineOutOfBounds { line: 2, count: 2 })
        ));
    }

    #[test]
    fn test_foreign_line_info_rejected() {
        let stream = sample_stream();
        let mut other = sample_stream();
        other.patch(4, line_record(3, 6)).unwrap();
        // Handle minted by `other` no longer matches `stream`'s bytes at
        // that index... mint from other and use against stream.
        let foreign = other.line_info(1).unwrap();
        assert_eq!(stream.next_line_info(&foreign), Err(Error::ForeignLineInfo));
    }

    #[test]
    fn test_seek_line() {
        let mut stream = sample_stream();
        stream.seek_line(1).unwrap();
        assert_eq!(stream.position(), 4);
    }

    #[test]
    fn test_custom_scan_by_glyph_offset() {
        let stream = sample_stream();
        // Glyphs before the Custom record: 3 (text) + 1 (break) + 5 = 9.
        let mut hits = Vec::new();
        stream.custom_commands_in(0..100, |c| hits.push(c));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 2);
        assert_eq!(hits[0].value, 7);
        assert_eq!(hits[0].glyph_offset, 9);

        let mut hits = Vec::new();
        stream.custom_commands_in(0..9, |c| hits.push(c));
        assert!(hits.is_empty());
    }

    #[test]
    fn test_has_multiple_styles_tracking() {
        let mut stream = CommandStream::new();
        stream.append(text_record(1));
        assert!(!stream.has_multiple_styles());
        stream.append(CommandRecord::ToggleBold);
        assert!(stream.has_multiple_styles());
    }

    #[test]
    fn test_clear_keeps_resources() {
        let mut stream = sample_stream();
        let handle = stream.intern_link("https://example.com").unwrap();
        stream.clear();
        assert!(stream.is_empty());
        assert_eq!(stream.link_target(handle), Some("https://example.com"));
        stream.reset();
        assert_eq!(stream.link_target(handle), None);
    }
}
