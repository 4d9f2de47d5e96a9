//! Late line-break insertion.
//!
//! When the last break opportunity on an overflowing line sits inside a
//! record that has already been written, layout cannot simply flush and
//! wrap: the emitted run must be truncated in place, a `LineBreak` and a
//! fresh `LineInfo` spliced in right after it, and every record that now
//! belongs to the new line re-walked to its new position. Only the
//! affected line is touched; nothing upstream of the split is rewritten.

use crate::error::Result;
use crate::event::{LogLevel, emit_log};
use crate::stream::{CommandRecord, LineInfo, TextRun};

use super::LayoutState;

impl LayoutState<'_> {
    /// Break the current line inside the emitted `Text` record at
    /// `record`, keeping its head portion on the line.
    pub(super) fn break_emitted(
        &mut self,
        record: usize,
        head_bytes: u32,
        head_glyphs: i32,
        head_width: i32,
        total_bytes: u32,
    ) -> Result<()> {
        // Anything still accumulating was measured after the break point;
        // it moves to the new line wholesale once it is a record.
        self.flush_run();

        let CommandRecord::Text(broken) = self.out.read_at(record)? else {
            debug_assert!(false, "break site is not a text record");
            return Ok(());
        };
        let x_split = broken.x + head_width;
        let tail_glyphs = broken.text_length - head_glyphs;
        let tail_width = i32::from(broken.width) - head_width;

        // Truncate the emitted run to its head.
        self.out.patch(
            record,
            CommandRecord::Text(TextRun {
                text_length: head_glyphs,
                width: head_width as i16,
                ..broken
            }),
        )?;

        // Splice the break, the new line's placeholder, and (when the
        // split is strictly inside the run) a continuation record.
        let mut spliced = vec![
            CommandRecord::LineBreak { length: 0 },
            CommandRecord::LineInfo(LineInfo::default()),
        ];
        if tail_glyphs > 0 {
            spliced.push(CommandRecord::Text(TextRun {
                text_offset: broken.text_offset + head_bytes as i32,
                text_length: tail_glyphs,
                x: x_split,
                y: broken.y,
                width: tail_width as i16,
                height: broken.height,
            }));
        }
        debug_assert!(tail_glyphs > 0 || head_bytes == total_bytes);
        self.out.insert(record + 1, &spliced)?;
        let line_break_at = record + 1;
        let new_line_start = record + 2;

        // Re-derive the finished line's aggregates by walking it.
        let mut finished_glyphs = 0;
        let mut finished_height = 0;
        for index in self.line_start + 1..=line_break_at {
            let rec = self.out.read_at(index)?;
            finished_glyphs += rec.glyph_count();
            finished_height = finished_height.max(record_height(&rec));
        }
        if finished_height == 0 {
            finished_height = self.default_family.line_height();
        }
        let finished_width = x_split;
        let offset = self.settings.width.map_or(0, |w| {
            super::horizontal_offset(self.settings.alignment, w, finished_width)
        });
        self.out.patch(
            self.line_start,
            CommandRecord::LineInfo(LineInfo {
                offset,
                line_width: finished_width as i16,
                line_height: finished_height as i16,
                length_in_commands: (line_break_at - self.line_start) as i32,
                length_in_glyphs: finished_glyphs,
                terminated_by_line_break: true,
            }),
        )?;
        self.book_line(offset, finished_width, finished_height, finished_glyphs);

        // The records past the split would start a line that no longer
        // fits a fixed height: drop them and stop.
        if let Some(max_height) = self.settings.height {
            let estimate = self.default_family.line_height();
            if self.y + estimate > max_height {
                self.out.remove_range(new_line_start..self.out.len())?;
                self.truncated = true;
                self.line_open = false;
                self.x = 0;
                self.line_glyphs = 0;
                self.line_height = 0;
                self.brk = None;
                emit_log(
                    LogLevel::Debug,
                    &format!("layout truncated at fixed height {max_height}"),
                );
                return Ok(());
            }
        }

        // Re-walk the new line: rebase positions and rebuild aggregates.
        self.line_start = new_line_start;
        self.line_open = true;
        let mut glyphs = 0;
        let mut height = 0;
        for index in new_line_start + 1..self.out.len() {
            match self.out.read_at(index)? {
                CommandRecord::Text(mut run) => {
                    run.x -= x_split;
                    run.y = self.y;
                    glyphs += run.text_length;
                    height = height.max(i32::from(run.height));
                    self.out.patch(index, CommandRecord::Text(run))?;
                }
                CommandRecord::Icon(mut icon) => {
                    icon.x -= x_split;
                    icon.y = self.y;
                    glyphs += 1;
                    height = height.max(i32::from(icon.height));
                    self.out.patch(index, CommandRecord::Icon(icon))?;
                }
                rec => glyphs += rec.glyph_count(),
            }
        }
        self.x -= x_split;
        self.line_glyphs = glyphs;
        self.line_height = height;
        self.brk = None;
        Ok(())
    }
}

fn record_height(record: &CommandRecord) -> i32 {
    match record {
        CommandRecord::Text(run) => i32::from(run.height),
        CommandRecord::Icon(icon) => i32::from(icon.height),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::super::{LayoutEngine, LayoutSettings};
    use crate::font::{FontFamily, MonospaceMetrics};
    use crate::parser::Parser;
    use crate::registry::{CommandRegistry, ResourceRegistry};
    use crate::source::SourceText;
    use crate::stream::{CommandRecord, CommandStream};
    use std::sync::Arc;

    fn layout(input: &str, settings: &LayoutSettings) -> CommandStream {
        let mut resources = ResourceRegistry::new();
        resources.register_font("mono", FontFamily::new(Arc::new(MonospaceMetrics::unit())));
        let commands = CommandRegistry::new();
        let source = SourceText::plain(input);
        let mut tokens = Vec::new();
        Parser::new().parse_source(&source, &commands, &mut tokens);
        let mut stream = CommandStream::new();
        LayoutEngine::new()
            .calculate_layout(&tokens, &source, settings, &resources, &mut stream)
            .expect("layout succeeds");
        stream
    }

    fn text_runs(stream: &CommandStream) -> Vec<crate::stream::TextRun> {
        stream
            .iter()
            .filter_map(|r| match r {
                CommandRecord::Text(run) => Some(run),
                _ => None,
            })
            .collect()
    }

    fn check_accounting(stream: &CommandStream, input_glyphs: i32) {
        let lines = stream.line_count() as usize;
        let mut commands = 0;
        let mut glyphs = 0;
        for i in 0..lines {
            let info = stream.line_info(i).unwrap().info();
            commands += info.length_in_commands as usize;
            glyphs += info.length_in_glyphs;
        }
        assert_eq!(commands + lines + 1, stream.len());
        assert_eq!(glyphs, stream.total_glyphs());
        assert_eq!(stream.total_glyphs(), input_glyphs);
    }

    #[test]
    fn test_break_inside_emitted_record() {
        // The run "hello wor" fits and is flushed by |b|; "ld" then
        // overflows, and the break point (after "hello ") is inside the
        // already-emitted record.
        let input = "hello wor|b|ld";
        let settings = LayoutSettings::new("mono").with_width(10);
        let stream = layout(input, &settings);

        assert_eq!(stream.line_count(), 2);
        let runs = text_runs(&stream);
        assert_eq!(runs.len(), 3);
        // Truncated head keeps "hello ".
        assert_eq!(runs[0].text_length, 6);
        assert_eq!(runs[0].width, 6);
        assert_eq!(runs[0].x, 0);
        // Continuation "wor" starts the new line.
        assert_eq!(runs[1].text_length, 3);
        assert_eq!(runs[1].x, 0);
        assert_eq!(runs[1].y, 1);
        assert_eq!(runs[1].text_offset, 6);
        // "ld" follows on the new line, after the toggle.
        assert_eq!(runs[2].text_length, 2);
        assert_eq!(runs[2].x, 3);
        assert_eq!(runs[2].y, 1);

        let first = stream.line_info(0).unwrap().info();
        assert!(first.terminated_by_line_break);
        assert_eq!(first.line_width, 6);
        assert_eq!(first.length_in_glyphs, 6);
        let second = stream.line_info(1).unwrap().info();
        assert_eq!(second.length_in_glyphs, 5);

        // The toggle record sits on the second line, before "ld".
        let tags: Vec<&str> = stream.iter().map(|r| r.tag().name()).collect();
        assert_eq!(
            tags,
            vec![
                "BlockInfo",
                "LineInfo",
                "Text",
                "LineBreak",
                "LineInfo",
                "Text",
                "ToggleBold",
                "Text",
            ]
        );
        check_accounting(&stream, 11);
    }

    #[test]
    fn test_break_at_end_of_emitted_record() {
        // Break point is exactly the end of the flushed run: no
        // truncation, no continuation record, the style command moves.
        let input = "aaa |b|bbb";
        let settings = LayoutSettings::new("mono").with_width(5);
        let stream = layout(input, &settings);

        assert_eq!(stream.line_count(), 2);
        let runs = text_runs(&stream);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text_length, 4);
        assert_eq!(runs[1].text_length, 3);
        assert_eq!(runs[1].x, 0);
        assert_eq!(runs[1].y, 1);

        let tags: Vec<&str> = stream.iter().map(|r| r.tag().name()).collect();
        assert_eq!(
            tags,
            vec![
                "BlockInfo",
                "LineInfo",
                "Text",
                "LineBreak",
                "LineInfo",
                "ToggleBold",
                "Text",
            ]
        );
        check_accounting(&stream, 7);
    }

    #[test]
    fn test_multiple_reflow_breaks() {
        // Three wraps, each discovered after a style boundary flushed the
        // run holding the break point.
        let input = "aa bb|b|cc dd|i|ee ff";
        let settings = LayoutSettings::new("mono").with_width(6);
        let stream = layout(input, &settings);
        check_accounting(&stream, 15);
        assert!(stream.line_count() >= 2);
        // No record may extend past the fixed width except an unbreakable
        // overflow, which this input does not contain.
        for i in 0..stream.line_count() as usize {
            let info = stream.line_info(i).unwrap().info();
            assert!(
                i32::from(info.line_width) <= 6,
                "line {i} width {} exceeds limit",
                info.line_width
            );
        }
    }

    #[test]
    fn test_reflow_preserves_idempotence() {
        let input = "hello wor|b|ld and more words here";
        let settings = LayoutSettings::new("mono").with_width(8);
        let a: Vec<CommandRecord> = layout(input, &settings).iter().collect();
        let b: Vec<CommandRecord> = layout(input, &settings).iter().collect();
        assert_eq!(a, b);
    }
}
