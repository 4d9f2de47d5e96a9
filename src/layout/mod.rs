//! Layout engine: measurement, run accumulation, greedy wrapping, and
//! alignment.
//!
//! [`LayoutEngine::calculate_layout`] threads a transient `LayoutState`
//! through one pass over the semantic tokens, appending records to a
//! [`CommandStream`]. Lines open with a placeholder `LineInfo` record that
//! is patched once the line's extent is known; the single `BlockInfo` at
//! record 0 gets the same treatment at the end. When a break opportunity
//! turns out to sit inside an already-emitted record, the stream is
//! patched and re-walked in place (see [`reflow`]) instead of restarting
//! layout.

mod reflow;

use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;

use crate::color::Rgba;
use crate::error::{Error, Result};
use crate::event::{LogLevel, emit_log};
use crate::font::{FaceStyle, FontFamily};
use crate::parser::{ParseKind, ParseToken};
use crate::registry::{IconSize, ResourceRegistry};
use crate::source::{Segment, SourceText};
use crate::stream::{CommandRecord, CommandStream, IconRecord, LineInfo, Rect, TextRun};

bitflags! {
    /// Block alignment flags, one horizontal and one vertical bit.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    pub struct Alignment: u8 {
        const LEFT = 0x01;
        const CENTER = 0x02;
        const RIGHT = 0x04;
        const TOP = 0x10;
        const MIDDLE = 0x20;
        const BOTTOM = 0x40;
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self::LEFT | Self::TOP
    }
}

/// Settings for one layout pass.
#[derive(Clone, Debug)]
pub struct LayoutSettings {
    /// Name of the registered font used outside any `|font:...|` scope.
    pub default_font: String,
    /// Fixed width; lines wrap to stay inside it. `None` disables
    /// wrapping.
    pub width: Option<i32>,
    /// Fixed height; layout stops emitting once the next line would
    /// exceed it. `None` disables truncation.
    pub height: Option<i32>,
    pub alignment: Alignment,
}

impl LayoutSettings {
    /// Settings with the given default font, no size constraints, and
    /// top-left alignment.
    #[must_use]
    pub fn new(default_font: impl Into<String>) -> Self {
        Self {
            default_font: default_font.into(),
            width: None,
            height: None,
            alignment: Alignment::default(),
        }
    }

    #[must_use]
    pub fn with_width(mut self, width: i32) -> Self {
        self.width = Some(width);
        self
    }

    #[must_use]
    pub fn with_height(mut self, height: i32) -> Self {
        self.height = Some(height);
        self
    }

    #[must_use]
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }
}

/// The layout engine. Stateless between calls; safe to reuse for any
/// number of layouts.
#[derive(Clone, Copy, Debug, Default)]
pub struct LayoutEngine;

impl LayoutEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Lay out semantic tokens into `out`.
    ///
    /// `out` is cleared first (keeping its resource side-tables, so
    /// handles stay stable across relayouts). On error the stream is left
    /// empty; no partial output escapes.
    ///
    /// # Errors
    ///
    /// Fails when the default font, or a font/style/icon named by a
    /// token, is not registered.
    pub fn calculate_layout(
        &self,
        tokens: &[ParseToken],
        source: &SourceText,
        settings: &LayoutSettings,
        resources: &ResourceRegistry,
        out: &mut CommandStream,
    ) -> Result<()> {
        out.clear();
        let result =
            LayoutState::begin(tokens, source, settings, resources, out).and_then(LayoutState::run);
        if let Err(e) = result {
            out.clear();
            return Err(e);
        }
        Ok(())
    }
}

/// One measured slice of an accumulating run (one source token).
#[derive(Clone, Copy, Debug)]
struct RunPiece {
    bytes: u32,
    glyphs: i32,
    width: i32,
    breaking: bool,
}

/// Pending text run being merged from adjacent same-style tokens.
#[derive(Debug, Default)]
struct RunAcc {
    seg: Option<Segment>,
    pieces: Vec<RunPiece>,
    width: i32,
    glyphs: i32,
    height: i32,
    x0: i32,
    y0: i32,
}

impl RunAcc {
    fn is_active(&self) -> bool {
        self.seg.is_some()
    }

    fn clear(&mut self) {
        self.seg = None;
        self.pieces.clear();
        self.width = 0;
        self.glyphs = 0;
        self.height = 0;
    }
}

/// Where the most recent break opportunity sits.
#[derive(Clone, Copy, Debug)]
enum BreakSite {
    /// After `pieces[piece]` of the open accumulator.
    Accumulator { piece: usize },
    /// Inside the already-emitted record at `record`; breaking keeps the
    /// head portion of it on the current line.
    Emitted {
        record: usize,
        head_bytes: u32,
        head_glyphs: i32,
        head_width: i32,
        total_bytes: u32,
    },
}

/// Frame pushed by `|style:name|`, carrying the parts of the resolved
/// preset that affect measurement.
#[derive(Debug)]
struct StyleFrame {
    family: Option<FontFamily>,
    bold: Option<bool>,
    italic: Option<bool>,
}

/// Transient working state of one layout pass.
struct LayoutState<'a> {
    tokens: &'a [ParseToken],
    source: &'a SourceText,
    settings: &'a LayoutSettings,
    resources: &'a ResourceRegistry,
    out: &'a mut CommandStream,

    default_family: FontFamily,
    font_stack: Vec<FontFamily>,
    style_stack: Vec<StyleFrame>,
    bold_toggle: bool,
    italic_toggle: bool,

    x: i32,
    y: i32,
    line_start: usize,
    line_height: i32,
    line_glyphs: i32,
    line_open: bool,
    lines_done: i32,
    total_glyphs: i32,
    total_height: i32,
    max_line_width: i32,
    min_line_offset: i32,

    run: RunAcc,
    brk: Option<BreakSite>,
    truncated: bool,
}

impl<'a> LayoutState<'a> {
    fn begin(
        tokens: &'a [ParseToken],
        source: &'a SourceText,
        settings: &'a LayoutSettings,
        resources: &'a ResourceRegistry,
        out: &'a mut CommandStream,
    ) -> Result<Self> {
        if settings.default_font.is_empty() {
            return Err(Error::MissingDefaultFont);
        }
        let default_family = resources
            .font(&settings.default_font)
            .ok_or_else(|| Error::UnregisteredFont(settings.default_font.clone()))?
            .clone();
        out.intern_source(source)?;
        out.intern_font(&settings.default_font, &default_family)?;

        Ok(Self {
            tokens,
            source,
            settings,
            resources,
            out,
            default_family,
            font_stack: Vec::new(),
            style_stack: Vec::new(),
            bold_toggle: false,
            italic_toggle: false,
            x: 0,
            y: 0,
            line_start: 0,
            line_height: 0,
            line_glyphs: 0,
            line_open: false,
            lines_done: 0,
            total_glyphs: 0,
            total_height: 0,
            max_line_width: 0,
            min_line_offset: i32::MAX,
            run: RunAcc::default(),
            brk: None,
            truncated: false,
        })
    }

    fn run(mut self) -> Result<()> {
        self.out.append(CommandRecord::BlockInfo {
            offset: 0,
            length_in_lines: 0,
        });
        self.start_line();

        for i in 0..self.tokens.len() {
            if self.truncated {
                break;
            }
            let token = self.tokens[i];
            match token.kind {
                ParseKind::Text => self.handle_text(&token, i)?,
                ParseKind::Icon => self.handle_icon(&token)?,
                ParseKind::ToggleBold => {
                    self.flush_run();
                    self.bold_toggle = !self.bold_toggle;
                    self.out.append(CommandRecord::ToggleBold);
                }
                ParseKind::ToggleItalic => {
                    self.flush_run();
                    self.italic_toggle = !self.italic_toggle;
                    self.out.append(CommandRecord::ToggleItalic);
                }
                ParseKind::PushFont => self.handle_push_font(&token)?,
                ParseKind::PopFont => {
                    self.flush_run();
                    self.font_stack.pop();
                    self.out.append(CommandRecord::PopFont);
                }
                ParseKind::PushColor => {
                    self.flush_run();
                    let hex = self.source.segment_text(&token.text);
                    let color = Rgba::from_hex_rgba8(&hex)
                        .ok_or_else(|| Error::InvalidColor(hex.to_string()))?;
                    self.out.append(CommandRecord::PushColor {
                        rgba: color.to_bits(),
                    });
                }
                ParseKind::PopColor => {
                    self.flush_run();
                    self.out.append(CommandRecord::PopColor);
                }
                ParseKind::PushStyle => self.handle_push_style(&token)?,
                ParseKind::PopStyle => {
                    self.flush_run();
                    self.style_stack.pop();
                    self.out.append(CommandRecord::PopStyle);
                }
                ParseKind::PushGlyphShader => {
                    self.flush_run();
                    let name = self.source.segment_text(&token.text).into_owned();
                    let index = self.out.intern_glyph_shader(&name)?;
                    self.out.append(CommandRecord::PushGlyphShader { index });
                }
                ParseKind::PopGlyphShader => {
                    self.flush_run();
                    self.out.append(CommandRecord::PopGlyphShader);
                }
                ParseKind::PushLink => {
                    self.flush_run();
                    let target = self.source.segment_text(&token.text).into_owned();
                    let index = self.out.intern_link(&target)?;
                    self.out.append(CommandRecord::PushLink { index });
                }
                ParseKind::PopLink => {
                    self.flush_run();
                    self.out.append(CommandRecord::PopLink);
                }
                ParseKind::Custom(id) => {
                    self.flush_run();
                    let value = self
                        .source
                        .segment_text(&token.text)
                        .parse::<i32>()
                        .unwrap_or(0);
                    self.out.append(CommandRecord::Custom { id, value });
                }
            }
        }

        self.finish()
    }

    // ----- style resolution -----

    fn effective_family(&self) -> &FontFamily {
        if let Some(family) = self.font_stack.last() {
            return family;
        }
        for frame in self.style_stack.iter().rev() {
            if let Some(family) = &frame.family {
                return family;
            }
        }
        &self.default_family
    }

    fn effective_face(&self) -> FaceStyle {
        let mut preset_bold = None;
        let mut preset_italic = None;
        for frame in self.style_stack.iter().rev() {
            preset_bold = preset_bold.or(frame.bold);
            preset_italic = preset_italic.or(frame.italic);
        }
        FaceStyle::from_flags(
            preset_bold.unwrap_or(false) ^ self.bold_toggle,
            preset_italic.unwrap_or(false) ^ self.italic_toggle,
        )
    }

    fn handle_push_font(&mut self, token: &ParseToken) -> Result<()> {
        let name = self.source.segment_text(&token.text).into_owned();
        let family = self
            .resources
            .font(&name)
            .ok_or_else(|| Error::UnregisteredFont(name.clone()))?
            .clone();
        self.flush_run();
        let index = self.out.intern_font(&name, &family)?;
        self.font_stack.push(family);
        self.out.append(CommandRecord::PushFont { index });
        Ok(())
    }

    fn handle_push_style(&mut self, token: &ParseToken) -> Result<()> {
        let name = self.source.segment_text(&token.text).into_owned();
        let style = self.resolve_preset(&name)?;
        let family = match &style.font {
            Some(font_name) => Some(
                self.resources
                    .font(font_name)
                    .ok_or_else(|| Error::UnregisteredFont(font_name.clone()))?
                    .clone(),
            ),
            None => None,
        };
        self.flush_run();
        let index = self.out.intern_style(&name, &style)?;
        self.style_stack.push(StyleFrame {
            family,
            bold: style.bold,
            italic: style.italic,
        });
        self.out.append(CommandRecord::PushStyle { index });
        Ok(())
    }

    /// Resolve a preset style, folding in its `base` chain.
    fn resolve_preset(&self, name: &str) -> Result<crate::style::Style> {
        let mut style = self
            .resources
            .style(name)
            .ok_or_else(|| Error::UnregisteredStyle(name.to_string()))?
            .clone();
        // Base chains are expected shallow; the cap only guards cycles.
        for _ in 0..8 {
            let Some(base_name) = style.base.take() else {
                break;
            };
            let base = self
                .resources
                .style(&base_name)
                .ok_or(Error::UnregisteredStyle(base_name))?;
            let mut merged = base.merge(&style);
            merged.base = base.base.clone();
            style = merged;
        }
        style.base = None;
        Ok(style)
    }

    // ----- content -----

    fn handle_text(&mut self, token: &ParseToken, index: usize) -> Result<()> {
        let text = self.source.segment_text(&token.text);
        if text.starts_with(['\n', '\r']) {
            let glyphs = text.graphemes(true).count() as i32;
            self.handle_newline(glyphs)?;
            return Ok(());
        }

        let is_whitespace = text.starts_with(char::is_whitespace);
        let breaking = is_whitespace && !token.non_breaking;
        let next_first = self.next_text_grapheme(index);

        let face = self.effective_family().face(self.effective_face());
        let mut width = 0;
        let mut glyphs = 0;
        let graphemes: Vec<&str> = text.graphemes(true).collect();
        for (j, &g) in graphemes.iter().enumerate() {
            let mut advance = face.advance(g);
            if let Some(next) = graphemes.get(j + 1).copied().or(next_first.as_deref()) {
                advance += face.kerning(g, next);
            }
            width += advance;
            glyphs += 1;
        }
        let height = face.line_height();

        if !is_whitespace {
            self.make_room(width)?;
            if self.truncated {
                return Ok(());
            }
        }

        self.accumulate(token.text, width, glyphs, height, breaking);
        Ok(())
    }

    /// First grapheme of the next drawable token, for kerning across the
    /// token boundary. Style commands between two text tokens do not
    /// interrupt the pair; icons and newlines do.
    fn next_text_grapheme(&self, index: usize) -> Option<String> {
        for next in &self.tokens[index + 1..] {
            match next.kind {
                ParseKind::Text => {
                    let text = self.source.segment_text(&next.text);
                    if text.starts_with(['\n', '\r']) {
                        return None;
                    }
                    return text.graphemes(true).next().map(str::to_owned);
                }
                ParseKind::Icon => return None,
                _ => {}
            }
        }
        None
    }

    fn handle_icon(&mut self, token: &ParseToken) -> Result<()> {
        let name = self.source.segment_text(&token.text).into_owned();
        let entry = self
            .resources
            .icon(&name)
            .ok_or_else(|| Error::UnregisteredIcon(name.clone()))?;
        let size = entry.size.unwrap_or_else(|| {
            let native = self.effective_family().line_height();
            IconSize::new(native as i16, native as i16)
        });

        self.flush_run();
        self.make_room(i32::from(size.width))?;
        if self.truncated {
            return Ok(());
        }

        let index = self.out.intern_icon(&name, size)?;
        self.out.append(CommandRecord::Icon(IconRecord {
            icon_index: index,
            x: self.x,
            y: self.y,
            width: size.width,
            height: size.height,
        }));
        self.x += i32::from(size.width);
        self.line_glyphs += 1;
        self.line_height = self.line_height.max(i32::from(size.height));
        Ok(())
    }

    fn accumulate(&mut self, seg: Segment, width: i32, glyphs: i32, height: i32, breaking: bool) {
        if let Some(current) = self.run.seg {
            if !current.is_contiguous_with(&seg) {
                self.flush_run();
            }
        }
        match self.run.seg {
            Some(current) => self.run.seg = Some(current.joined(&seg)),
            None => {
                self.run.seg = Some(seg);
                self.run.x0 = self.x;
                self.run.y0 = self.y;
            }
        }
        self.run.pieces.push(RunPiece {
            bytes: seg.len,
            glyphs,
            width,
            breaking,
        });
        self.run.width += width;
        self.run.glyphs += glyphs;
        self.run.height = self.run.height.max(height);
        self.x += width;
        self.line_glyphs += glyphs;
        self.line_height = self.line_height.max(height);
        if breaking {
            self.brk = Some(BreakSite::Accumulator {
                piece: self.run.pieces.len() - 1,
            });
        }
    }

    /// Emit the pending run as one `Text` record. A break opportunity
    /// inside the accumulator is rebased onto the emitted record so a
    /// later overflow can still split there.
    fn flush_run(&mut self) -> Option<usize> {
        if !self.run.is_active() || self.run.glyphs == 0 {
            self.run.clear();
            return None;
        }
        let seg = self.run.seg?;
        let record = self.out.append(CommandRecord::Text(TextRun {
            text_offset: seg.offset as i32,
            text_length: self.run.glyphs,
            x: self.run.x0,
            y: self.run.y0,
            width: self.run.width as i16,
            height: self.run.height as i16,
        }));

        if let Some(BreakSite::Accumulator { piece }) = self.brk {
            let head = &self.run.pieces[..=piece];
            self.brk = Some(BreakSite::Emitted {
                record,
                head_bytes: head.iter().map(|p| p.bytes).sum(),
                head_glyphs: head.iter().map(|p| p.glyphs).sum(),
                head_width: head.iter().map(|p| p.width).sum(),
                total_bytes: seg.len,
            });
        }
        self.run.clear();
        Some(record)
    }

    // ----- wrapping -----

    /// Break lines until `width` more units fit, or nothing else can
    /// move. A single over-wide word on an empty line is left to
    /// overflow.
    fn make_room(&mut self, width: i32) -> Result<()> {
        let Some(max_width) = self.settings.width else {
            return Ok(());
        };
        while self.x + width > max_width && self.x > 0 && !self.truncated {
            match self.brk.take() {
                Some(BreakSite::Accumulator { piece }) => self.break_accumulator(piece)?,
                Some(BreakSite::Emitted {
                    record,
                    head_bytes,
                    head_glyphs,
                    head_width,
                    total_bytes,
                }) => {
                    self.break_emitted(record, head_bytes, head_glyphs, head_width, total_bytes)?;
                }
                None => {
                    // No break opportunity on this line: wrap at the
                    // token boundary.
                    self.flush_run();
                    self.out.append(CommandRecord::LineBreak { length: 0 });
                    self.close_line(true)?;
                    self.start_line();
                }
            }
        }
        Ok(())
    }

    /// Split the open accumulator after `piece`, close the line there,
    /// and carry the tail onto the next line.
    fn break_accumulator(&mut self, piece: usize) -> Result<()> {
        let Some(seg) = self.run.seg else {
            return Ok(());
        };
        let head_bytes: u32 = self.run.pieces[..=piece].iter().map(|p| p.bytes).sum();
        let head_glyphs: i32 = self.run.pieces[..=piece].iter().map(|p| p.glyphs).sum();
        let head_width: i32 = self.run.pieces[..=piece].iter().map(|p| p.width).sum();
        let tail: Vec<RunPiece> = self.run.pieces[piece + 1..].to_vec();
        let run_height = self.run.height;
        let tail_width = self.run.width - head_width;
        let tail_glyphs = self.run.glyphs - head_glyphs;

        self.out.append(CommandRecord::Text(TextRun {
            text_offset: seg.offset as i32,
            text_length: head_glyphs,
            x: self.run.x0,
            y: self.run.y0,
            width: head_width as i16,
            height: run_height as i16,
        }));
        self.run.clear();

        self.x -= tail_width;
        self.line_glyphs -= tail_glyphs;
        self.out.append(CommandRecord::LineBreak { length: 0 });
        self.close_line(true)?;
        self.start_line();
        if self.truncated || tail.is_empty() {
            return Ok(());
        }

        self.run.seg = Some(Segment::new(
            seg.source,
            seg.offset + head_bytes,
            seg.len - head_bytes,
        ));
        self.run.x0 = 0;
        self.run.y0 = self.y;
        self.run.width = tail_width;
        self.run.glyphs = tail_glyphs;
        self.run.height = run_height;
        self.run.pieces = tail;
        self.x = tail_width;
        self.line_glyphs = tail_glyphs;
        self.line_height = run_height;
        self.brk = self
            .run
            .pieces
            .iter()
            .rposition(|p| p.breaking)
            .map(|piece| BreakSite::Accumulator { piece });
        Ok(())
    }

    // ----- line management -----

    fn handle_newline(&mut self, glyphs: i32) -> Result<()> {
        self.flush_run();
        self.out.append(CommandRecord::LineBreak { length: glyphs });
        self.line_glyphs += glyphs;
        self.close_line(true)?;
        self.start_line();
        Ok(())
    }

    fn start_line(&mut self) {
        if let Some(max_height) = self.settings.height {
            // The first line always lays out; only subsequent lines are
            // subject to the height limit.
            let estimate = self.default_family.line_height();
            if self.lines_done > 0 && self.y + estimate > max_height {
                self.truncated = true;
                emit_log(
                    LogLevel::Debug,
                    &format!("layout truncated at fixed height {max_height}"),
                );
                return;
            }
        }
        self.line_start = self.out.append(CommandRecord::LineInfo(LineInfo::default()));
        self.line_open = true;
    }

    fn close_line(&mut self, terminated_by_line_break: bool) -> Result<()> {
        let commands = (self.out.len() - self.line_start - 1) as i32;
        let height = if self.line_height > 0 {
            self.line_height
        } else {
            self.default_family.line_height()
        };
        let width = self.x;
        let offset = self
            .settings
            .width
            .map_or(0, |w| horizontal_offset(self.settings.alignment, w, width));
        self.out.patch(
            self.line_start,
            CommandRecord::LineInfo(LineInfo {
                offset,
                line_width: width as i16,
                line_height: height as i16,
                length_in_commands: commands,
                length_in_glyphs: self.line_glyphs,
                terminated_by_line_break,
            }),
        )?;
        self.book_line(offset, width, height, self.line_glyphs);
        self.x = 0;
        self.line_glyphs = 0;
        self.line_height = 0;
        self.brk = None;
        self.line_open = false;
        Ok(())
    }

    /// Fold one finished line into the block aggregates.
    fn book_line(&mut self, offset: i32, width: i32, height: i32, glyphs: i32) {
        self.min_line_offset = self.min_line_offset.min(offset);
        self.lines_done += 1;
        self.total_glyphs += glyphs;
        self.total_height += height;
        self.max_line_width = self.max_line_width.max(width);
        self.y += height;
    }

    // ----- finalization -----

    fn finish(mut self) -> Result<()> {
        if self.line_open {
            self.flush_run();
            self.close_line(false)?;
        }

        // Without a fixed width the true extents are only known now;
        // center/right offsets are fixed up in a second pass.
        if self.settings.width.is_none()
            && self
                .settings
                .alignment
                .intersects(Alignment::CENTER | Alignment::RIGHT)
        {
            self.min_line_offset = i32::MAX;
            let mut index = 1;
            while index < self.out.len() {
                let CommandRecord::LineInfo(mut info) = self.out.read_at(index)? else {
                    break;
                };
                info.offset = horizontal_offset(
                    self.settings.alignment,
                    self.max_line_width,
                    i32::from(info.line_width),
                );
                self.min_line_offset = self.min_line_offset.min(info.offset);
                let next = index + 1 + info.length_in_commands as usize;
                self.out.patch(index, CommandRecord::LineInfo(info))?;
                index = next;
            }
        }

        let block_offset = self.settings.height.map_or(0, |h| {
            vertical_offset(self.settings.alignment, h, self.total_height)
        });
        self.out.patch(
            0,
            CommandRecord::BlockInfo {
                offset: block_offset,
                length_in_lines: self.lines_done,
            },
        )?;

        let min_offset = if self.min_line_offset == i32::MAX {
            0
        } else {
            self.min_line_offset
        };
        let bounds = Rect {
            x: min_offset,
            y: block_offset,
            width: self.max_line_width,
            height: self.total_height,
        };
        self.out.set_layout_metrics(
            self.total_glyphs,
            self.lines_done,
            self.max_line_width,
            self.total_height,
            bounds,
        );
        Ok(())
    }
}

fn horizontal_offset(alignment: Alignment, available: i32, line_width: i32) -> i32 {
    if alignment.contains(Alignment::CENTER) {
        (available - line_width) / 2
    } else if alignment.contains(Alignment::RIGHT) {
        available - line_width
    } else {
        0
    }
}

fn vertical_offset(alignment: Alignment, available: i32, total_height: i32) -> i32 {
    if alignment.contains(Alignment::MIDDLE) {
        (available - total_height) / 2
    } else if alignment.contains(Alignment::BOTTOM) {
        available - total_height
    } else {
        0
    }
}
