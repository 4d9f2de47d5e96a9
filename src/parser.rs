//! Semantic token production.
//!
//! The parser maps lexical tokens 1:1 onto semantic tokens: plain lexemes
//! become `Text`, and `|...|` commands are matched against the built-in
//! grammar and the caller's [`CommandRegistry`]. Unmatched command syntax
//! degrades to literal text; parsing never fails.
//!
//! [`Parser::parse_incremental`] splices a small window of fresh tokens
//! into a previous parse after an edit, producing output byte-identical to
//! a full re-parse of the new text.

use crate::color::Rgba;
use crate::event::{LogLevel, emit_log};
use crate::lexer::{LexKind, LexToken, Lexer, lex_one};
use crate::registry::CommandRegistry;
use crate::source::{Segment, SourceText};

const NBSP: char = '\u{A0}';

/// Semantic token kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseKind {
    /// Drawable text.
    Text,
    /// `|icon:name|`; payload is the icon name.
    Icon,
    /// `|b|`.
    ToggleBold,
    /// `|i|`.
    ToggleItalic,
    /// `|font:name|`; payload is the font name.
    PushFont,
    /// `|c:RRGGBBAA|`; payload is the 8-digit hex run.
    PushColor,
    /// `|style:name|`; payload is the preset style name.
    PushStyle,
    /// `|shader:name|`; payload is the shader name.
    PushGlyphShader,
    /// `|link:target|`; payload is the link target.
    PushLink,
    /// `|font|`.
    PopFont,
    /// `|c|`.
    PopColor,
    /// `|style|`.
    PopStyle,
    /// `|shader|`.
    PopGlyphShader,
    /// `|link|`.
    PopLink,
    /// A registered custom command; payload is its `:value` suffix, empty
    /// when absent.
    Custom(u8),
}

/// A semantic token. Exactly one per lexical token; `source_offset` and
/// `source_len` tile the source without gaps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseToken {
    pub kind: ParseKind,
    /// Drawable text, or the command payload (name, hex digits, value).
    pub text: Segment,
    /// Byte offset of the consumed source span.
    pub source_offset: u32,
    /// Byte length of the consumed source span.
    pub source_len: u32,
    /// Whitespace run that must not host a line break (U+00A0).
    pub non_breaking: bool,
}

impl ParseToken {
    /// Byte offset one past the consumed span.
    #[must_use]
    pub const fn source_end(&self) -> u32 {
        self.source_offset + self.source_len
    }
}

/// Markup parser with reusable scratch storage.
#[derive(Clone, Debug, Default)]
pub struct Parser {
    lexer: Lexer,
    lex_scratch: Vec<LexToken>,
    fresh_scratch: Vec<ParseToken>,
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert lexical tokens to semantic tokens, clearing `out` first.
    pub fn parse(
        &mut self,
        source: &SourceText,
        tokens: &[LexToken],
        registry: &CommandRegistry,
        out: &mut Vec<ParseToken>,
    ) {
        out.clear();
        out.reserve(tokens.len());
        for token in tokens {
            out.push(convert(source, token, registry));
        }
    }

    /// Lex and parse a whole source in one call.
    pub fn parse_source(
        &mut self,
        source: &SourceText,
        registry: &CommandRegistry,
        out: &mut Vec<ParseToken>,
    ) {
        let mut lex = std::mem::take(&mut self.lex_scratch);
        self.lexer.lex(source, &mut lex);
        self.parse(source, &lex, registry, out);
        self.lex_scratch = lex;
    }

    /// Re-parse only the region affected by an edit.
    ///
    /// `tokens` is the semantic stream of the text before the edit;
    /// `source` is the text after it. The edit replaced `old_len` bytes at
    /// `edit_start` with `new_len` bytes. On return `tokens` equals what a
    /// full re-parse of `source` would produce.
    ///
    /// The spliced window covers every previous token whose span touches
    /// the edit, then extends rightward until a freshly lexed token starts
    /// on an old token boundary past the edit; from there the old suffix
    /// is reused with shifted offsets.
    pub fn parse_incremental(
        &mut self,
        tokens: &mut Vec<ParseToken>,
        source: &SourceText,
        edit_start: usize,
        old_len: usize,
        new_len: usize,
        registry: &CommandRegistry,
    ) {
        let delta = new_len as i64 - old_len as i64;
        let edit_end_old = (edit_start + old_len) as u32;
        let edit_end_new = edit_start + new_len;

        // First token whose span contains the edit start (span ends are
        // strictly increasing, containment inclusive at both ends).
        let lo = tokens.partition_point(|t| t.source_end() < edit_start as u32);
        if tokens.is_empty() || lo == tokens.len() {
            let mut out = std::mem::take(tokens);
            self.parse_source(source, registry, &mut out);
            *tokens = out;
            return;
        }
        // Last token whose span contains the edit end.
        let hi = tokens.partition_point(|t| t.source_offset <= edit_end_old) - 1;

        let window_start = tokens[lo].source_offset as usize;
        let total = source.len_bytes();
        let tail = source.slice(window_start..total);
        let id = source.id();

        let mut fresh = std::mem::take(&mut self.fresh_scratch);
        fresh.clear();
        let mut pos = window_start;
        let mut resync = hi + 1;
        let mut splice_end = tokens.len();
        loop {
            if pos >= edit_end_new {
                let old_pos = (pos as i64 - delta) as u32;
                while resync < tokens.len() && tokens[resync].source_offset < old_pos {
                    resync += 1;
                }
                if resync < tokens.len() && tokens[resync].source_offset == old_pos {
                    splice_end = resync;
                    break;
                }
            }
            let Some(mut lex_token) = lex_one(&tail, pos - window_start, id) else {
                break;
            };
            lex_token.text.offset += window_start as u32;
            pos = lex_token.source_end() as usize;
            fresh.push(convert(source, &lex_token, registry));
        }

        for token in &mut tokens[splice_end..] {
            token.source_offset = (token.source_offset as i64 + delta) as u32;
            token.text.offset = (token.text.offset as i64 + delta) as u32;
        }
        tokens.splice(lo..splice_end, fresh.drain(..));
        self.fresh_scratch = fresh;
    }
}

fn convert(source: &SourceText, token: &LexToken, registry: &CommandRegistry) -> ParseToken {
    let (kind, text) = match token.kind {
        LexKind::Command => classify_command(source, token.text, registry),
        _ => (ParseKind::Text, token.text),
    };
    let non_breaking = token.kind == LexKind::WhiteSpace
        && source
            .segment_text(&token.text)
            .starts_with(NBSP);
    ParseToken {
        kind,
        text,
        source_offset: token.text.offset,
        source_len: token.source_len,
        non_breaking,
    }
}

/// Match a command's inner text against the grammar. Returns the semantic
/// kind and its payload segment; unmatched syntax degrades to literal
/// text covering the whole command.
fn classify_command(
    source: &SourceText,
    seg: Segment,
    registry: &CommandRegistry,
) -> (ParseKind, Segment) {
    let inner_seg = Segment::new(seg.source, seg.offset + 1, seg.len - 2);
    let inner = source.segment_text(&inner_seg);
    let empty = Segment::new(seg.source, seg.offset + 1, 0);
    let payload = |skip: u32| Segment::new(seg.source, inner_seg.offset + skip, inner_seg.len - skip);

    match &*inner {
        "b" => return (ParseKind::ToggleBold, empty),
        "i" => return (ParseKind::ToggleItalic, empty),
        "c" => return (ParseKind::PopColor, empty),
        "font" => return (ParseKind::PopFont, empty),
        "style" => return (ParseKind::PopStyle, empty),
        "shader" => return (ParseKind::PopGlyphShader, empty),
        "link" => return (ParseKind::PopLink, empty),
        _ => {}
    }

    let tagged = [
        ("c:", ParseKind::PushColor),
        ("font:", ParseKind::PushFont),
        ("style:", ParseKind::PushStyle),
        ("shader:", ParseKind::PushGlyphShader),
        ("link:", ParseKind::PushLink),
        ("icon:", ParseKind::Icon),
    ];
    for (prefix, kind) in tagged {
        let Some(rest) = inner.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            break;
        }
        if kind == ParseKind::PushColor && Rgba::from_hex_rgba8(rest).is_none() {
            // Color payloads are exactly 8 hex digits; anything shorter
            // (6-digit, no-alpha) or malformed is literal text.
            break;
        }
        return (kind, payload(prefix.len() as u32));
    }

    let name_len = inner.find(':').unwrap_or(inner.len());
    if let Some(id) = registry.id(&inner[..name_len]) {
        let value = if name_len < inner.len() {
            payload(name_len as u32 + 1)
        } else {
            Segment::new(seg.source, inner_seg.end(), 0)
        };
        return (ParseKind::Custom(id), value);
    }

    emit_log(
        LogLevel::Debug,
        &format!("unrecognized command degraded to text: |{inner}|"),
    );
    (ParseKind::Text, seg)
}
