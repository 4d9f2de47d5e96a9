//! pipetext - pipe-markup rich text layout.
//!
//! Formats inline-styled text (`|b|bold|b|`, `|c:FF0000FF|colored|c|`,
//! pushed fonts, preset styles, glyph shaders, links, inline icons, and
//! user-registered commands) into a positioned, randomly-seekable command
//! stream suitable for rendering and interactive editing.
//!
//! The pipeline is lex -> parse -> layout -> command stream:
//!
//! - [`Lexer`] tokenizes raw text into newline/whitespace/command/word
//!   lexemes referencing zero-copy [`Segment`]s.
//! - [`Parser`] turns lexemes into semantic tokens, matching `|...|`
//!   commands against the built-in grammar and a [`CommandRegistry`];
//!   malformed markup degrades to literal text. Incremental re-parse
//!   splices a minimal window after an edit.
//! - [`LayoutEngine`] measures tokens against [`FontMetrics`], merges
//!   same-style runs, wraps greedily (patching already-emitted records in
//!   place when a break lands inside one), and aligns the block.
//! - [`CommandStream`] stores the result as packed binary records with
//!   O(1) seeking by record index and an interned resource side-table.
//!
//! Rasterization, shaping, and bidi are out of scope; the stream is
//! consumed by a renderer through positions, sizes, and resource handles.

#![allow(clippy::cast_possible_truncation)] // Intentional size/coordinate casts
#![allow(clippy::cast_sign_loss)] // Intentional offset conversions
#![allow(clippy::cast_possible_wrap)] // Intentional offset conversions
#![allow(clippy::cast_lossless)] // as casts are fine for primitive widening
#![allow(clippy::module_name_repetitions)] // Allow CommandStream::CommandRecord etc
#![allow(clippy::missing_errors_doc)] // Error conditions documented on the error type
#![allow(clippy::missing_const_for_fn)] // Many functions could be const, not critical
#![allow(clippy::doc_markdown)] // Allow technical names without backticks
#![allow(clippy::use_self)] // Allow explicit type names in impl blocks
#![allow(clippy::items_after_statements)] // Common pattern in tests
#![allow(clippy::redundant_clone)] // Clones in tests for clarity are fine
#![allow(clippy::collapsible_if)] // Sometimes nested ifs are clearer

pub mod color;
pub mod error;
pub mod event;
pub mod font;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod source;
pub mod stream;
pub mod style;

// Re-export core types at crate root
pub use color::Rgba;
pub use error::{Error, Result};
pub use event::{LogLevel, clear_log_callback, emit_log, set_log_callback};
pub use font::{FaceStyle, FontFamily, FontMetrics, MonospaceMetrics};
pub use layout::{Alignment, LayoutEngine, LayoutSettings};
pub use lexer::{LexKind, LexToken, Lexer};
pub use parser::{ParseKind, ParseToken, Parser};
pub use registry::{
    BUILTIN_KIND_COUNT, CUSTOM_COMMAND_CAPACITY, CommandRegistry, IconSize, ResourceRegistry,
};
pub use source::{Segment, SourceId, SourceText};
pub use stream::{
    CommandRecord, CommandStream, CustomCommand, IconRecord, LineInfo, LineInfoRef, Rect, Tag,
    TextRun,
};
pub use style::{Style, StyleBuilder, TextAttributes};
