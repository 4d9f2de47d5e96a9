//! Property-based tests for the lex -> parse -> layout pipeline.
//!
//! Uses proptest to verify invariants that must hold across all valid
//! inputs: lossless tokenization, incremental/full parse equivalence,
//! layout idempotence, and stream accounting.

mod common;

use common::{assert_accounting, layout_mono, mono_resources};
use pipetext::{
    CommandRecord, CommandRegistry, CommandStream, LayoutEngine, LayoutSettings, Lexer, Parser,
    SourceText,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Plain text with no markup characters.
fn plain_string() -> impl Strategy<Value = String> {
    "[a-z ]{0,40}"
}

/// Markup-heavy text assembled from grammar fragments, malformed pieces
/// included.
fn markup_string() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            "word",
            "longerword",
            " ",
            "  ",
            "\n",
            "\r\n",
            "\u{A0}",
            "|b|",
            "|i|",
            "|c:FF0000FF|",
            "|c|",
            "|font:mono|",
            "|font|",
            "|style|",
            "|shader:wave|",
            "|shader|",
            "|link:x|",
            "|link|",
            "||",
            "|",
            "|broken",
            "|c:FF0000|",
            "|quest|",
            "|quest:7|",
            "é",
            "漢字",
        ]),
        0..24,
    )
    .prop_map(|parts| parts.concat())
}

/// Snap a fraction to a char boundary of `s`.
fn boundary(s: &str, fraction: f64) -> usize {
    let mut at = (s.len() as f64 * fraction) as usize;
    at = at.min(s.len());
    while !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}

fn parse_all(source: &SourceText, registry: &CommandRegistry) -> Vec<pipetext::ParseToken> {
    let mut out = Vec::new();
    Parser::new().parse_source(source, registry, &mut out);
    out
}

fn quest_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register("quest").unwrap();
    registry
}

// ============================================================================
// Lexer properties
// ============================================================================

proptest! {
    /// Lexical tokens tile the source: no gaps, no overlaps, full cover.
    #[test]
    fn lex_tokens_tile_source(s in markup_string()) {
        let source = SourceText::plain(s.as_str());
        let mut tokens = Vec::new();
        Lexer::new().lex(&source, &mut tokens);
        let mut pos = 0u32;
        for token in &tokens {
            prop_assert_eq!(token.text.offset, pos);
            pos = token.source_end();
        }
        prop_assert_eq!(pos as usize, s.len());
    }

    /// Parse tokens stay 1:1 with lex tokens and keep their spans.
    #[test]
    fn parse_preserves_source_spans(s in markup_string()) {
        let source = SourceText::plain(s.as_str());
        let registry = quest_registry();
        let mut lex_tokens = Vec::new();
        Lexer::new().lex(&source, &mut lex_tokens);
        let mut parse_tokens = Vec::new();
        Parser::new().parse(&source, &lex_tokens, &registry, &mut parse_tokens);
        prop_assert_eq!(parse_tokens.len(), lex_tokens.len());
        for (p, l) in parse_tokens.iter().zip(&lex_tokens) {
            prop_assert_eq!(p.source_offset, l.text.offset);
            prop_assert_eq!(p.source_len, l.source_len);
        }
    }
}

// ============================================================================
// Incremental parse properties
// ============================================================================

proptest! {
    /// Incremental re-parse after an arbitrary splice edit equals a full
    /// re-parse of the edited text.
    #[test]
    fn incremental_equals_full_reparse(
        base in markup_string(),
        replacement in markup_string(),
        start_frac in 0.0f64..1.0,
        len_frac in 0.0f64..1.0,
    ) {
        let registry = quest_registry();
        let old_source = SourceText::plain(base.as_str());
        let mut tokens = parse_all(&old_source, &registry);

        let edit_start = boundary(&base, start_frac);
        let mut edit_end = boundary(&base, start_frac + (1.0 - start_frac) * len_frac);
        if edit_end < edit_start {
            edit_end = edit_start;
        }
        let old_len = edit_end - edit_start;

        let mut edited = String::new();
        edited.push_str(&base[..edit_start]);
        edited.push_str(&replacement);
        edited.push_str(&base[edit_end..]);
        let new_source = SourceText::plain(edited.as_str());

        Parser::new().parse_incremental(
            &mut tokens,
            &new_source,
            edit_start,
            old_len,
            replacement.len(),
            &registry,
        );
        let full = parse_all(&new_source, &registry);
        prop_assert_eq!(tokens, full);
    }
}

// ============================================================================
// Layout properties
// ============================================================================

fn layout_tokens(
    source: &SourceText,
    registry: &CommandRegistry,
    settings: &LayoutSettings,
) -> CommandStream {
    let tokens = parse_all(source, registry);
    let mut stream = CommandStream::new();
    LayoutEngine::new()
        .calculate_layout(&tokens, source, settings, &mono_resources(), &mut stream)
        .expect("mono fixture layout cannot fail");
    stream
}

proptest! {
    /// Plain text without markup survives the pipeline with every glyph
    /// accounted for, in a single run when nothing forces a split.
    #[test]
    fn plain_text_round_trip(s in plain_string()) {
        let stream = layout_mono(&s, &LayoutSettings::new("mono"));
        prop_assert_eq!(stream.total_glyphs() as usize, s.chars().count());
        let text_records = stream
            .iter()
            .filter(|r| matches!(r, CommandRecord::Text(_)))
            .count();
        prop_assert_eq!(text_records, usize::from(!s.is_empty()));
        prop_assert!(!stream.has_multiple_styles());
    }

    /// Line glyph and command counts always sum to the stream totals,
    /// wrapped or not.
    #[test]
    fn accounting_holds_for_any_markup(
        s in markup_string(),
        width in prop::option::of(1i32..24),
    ) {
        let mut settings = LayoutSettings::new("mono");
        settings.width = width;
        let registry = quest_registry();
        let source = SourceText::plain(s.as_str());
        let stream = layout_tokens(&source, &registry, &settings);
        assert_accounting(&stream);
    }

    /// Laying out the same tokens twice produces byte-identical streams.
    #[test]
    fn layout_is_idempotent(
        s in markup_string(),
        width in prop::option::of(1i32..24),
    ) {
        let mut settings = LayoutSettings::new("mono");
        settings.width = width;
        let registry = quest_registry();
        let source = SourceText::plain(s.as_str());
        let a: Vec<CommandRecord> =
            layout_tokens(&source, &registry, &settings).iter().collect();
        let b: Vec<CommandRecord> =
            layout_tokens(&source, &registry, &settings).iter().collect();
        prop_assert_eq!(a, b);
    }

    /// Glyph offsets reconstructed from the stream are monotonically
    /// non-decreasing.
    #[test]
    fn glyph_offsets_are_monotone(s in markup_string()) {
        let registry = quest_registry();
        let source = SourceText::plain(s.as_str());
        let stream = layout_tokens(&source, &registry, &LayoutSettings::new("mono"));
        let mut offset = 0;
        for record in stream.iter() {
            let glyphs = record.glyph_count();
            prop_assert!(glyphs >= 0);
            offset += glyphs;
        }
        prop_assert_eq!(offset, stream.total_glyphs());
    }
}
