//! Shared fixtures for integration tests.

#![allow(dead_code)] // Not every test binary uses every helper

use std::sync::Arc;

use pipetext::{
    CommandRegistry, CommandStream, FontFamily, FontMetrics, LayoutEngine, LayoutSettings,
    MonospaceMetrics, Parser, ResourceRegistry, SourceText,
};

/// Registry with a 1x1-cell monospace font registered as "mono".
pub fn mono_resources() -> ResourceRegistry {
    let mut resources = ResourceRegistry::new();
    resources.register_font("mono", FontFamily::new(Arc::new(MonospaceMetrics::unit())));
    resources
}

/// Run the whole pipeline over `input` with the given settings and
/// registries.
pub fn layout_with(
    input: &str,
    settings: &LayoutSettings,
    resources: &ResourceRegistry,
    commands: &CommandRegistry,
) -> pipetext::Result<CommandStream> {
    let source = SourceText::plain(input);
    let mut tokens = Vec::new();
    Parser::new().parse_source(&source, commands, &mut tokens);
    let mut stream = CommandStream::new();
    LayoutEngine::new().calculate_layout(&tokens, &source, settings, resources, &mut stream)?;
    Ok(stream)
}

/// Pipeline with the "mono" fixture registry and no custom commands.
pub fn layout_mono(input: &str, settings: &LayoutSettings) -> CommandStream {
    layout_with(
        input,
        settings,
        &mono_resources(),
        &CommandRegistry::new(),
    )
    .expect("layout succeeds")
}

/// Assert the stream's structural accounting invariants:
/// per-line glyph and command counts sum to the stream totals.
pub fn assert_accounting(stream: &CommandStream) {
    let lines = stream.line_count() as usize;
    let mut commands = 0;
    let mut glyphs = 0;
    let mut handle = stream.line_info(0).expect("at least one line");
    loop {
        commands += handle.info().length_in_commands as usize;
        glyphs += handle.info().length_in_glyphs;
        match stream.next_line_info(&handle).expect("valid chain") {
            Some(next) => handle = next,
            None => break,
        }
    }
    assert_eq!(commands + lines + 1, stream.len(), "command accounting");
    assert_eq!(glyphs, stream.total_glyphs(), "glyph accounting");
}

/// Fixed-advance font with one kerning pair ("A" before "V" tightens by
/// one unit) for exercising cross-token kerning.
#[derive(Debug)]
pub struct KerningFont;

impl FontMetrics for KerningFont {
    fn advance(&self, _glyph: &str) -> i32 {
        2
    }

    fn kerning(&self, left: &str, right: &str) -> i32 {
        if left == "A" && right == "V" { -1 } else { 0 }
    }

    fn line_height(&self) -> i32 {
        2
    }
}
