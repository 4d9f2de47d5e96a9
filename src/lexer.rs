//! Lexical scan of markup text.
//!
//! One forward pass classifies the input into newline, whitespace,
//! command, word, and escaped-pipe tokens. The lexer never fails: an
//! unterminated command degrades to a word, and everything else falls into
//! the nearest kind. Tokens reference zero-copy [`Segment`]s of the input.

use crate::source::{Segment, SourceId, SourceText};

const NBSP: char = '\u{A0}';

/// Lexical token kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexKind {
    /// `\n`, `\r`, or `\r\n` (one token for the pair).
    NewLine,
    /// Maximal run of non-newline whitespace. Runs of U+00A0 lex
    /// separately from regular whitespace.
    WhiteSpace,
    /// `|...|` including both delimiters.
    Command,
    /// Maximal run of non-whitespace, non-`|` characters.
    Word,
    /// Escaped pipe: `||`, or `|` followed by whitespace or end of input.
    /// The token text is the single literal `|`.
    Pipe,
}

/// A lexical token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LexToken {
    pub kind: LexKind,
    /// The token's text. For `Pipe` tokens from `||` this covers only the
    /// first pipe; rendering wants one literal `|`.
    pub text: Segment,
    /// Bytes of source consumed, `>= text.len` (differs only for `||`).
    pub source_len: u32,
}

impl LexToken {
    /// Byte offset where the next token starts.
    #[must_use]
    pub const fn source_end(&self) -> u32 {
        self.text.offset + self.source_len
    }
}

/// Markup lexer. Stateless; holds no buffers of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lexer;

impl Lexer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Tokenize a whole source into `out`, clearing it first.
    pub fn lex(&self, source: &SourceText, out: &mut Vec<LexToken>) {
        out.clear();
        let text = source.text();
        let id = source.id();
        let mut pos = 0;
        while let Some(token) = lex_one(&text, pos, id) {
            pos = token.source_end() as usize;
            out.push(token);
        }
    }
}

/// Scan a single token at `offset`. Returns `None` at end of input.
///
/// Offsets in the returned token are absolute indices into `text`; callers
/// lexing a window of a larger source translate them afterwards.
pub(crate) fn lex_one(text: &str, offset: usize, source: SourceId) -> Option<LexToken> {
    let rest = &text[offset..];
    let first = rest.chars().next()?;

    let (kind, text_len, source_len) = match first {
        '\n' => (LexKind::NewLine, 1, 1),
        '\r' => {
            let len = if rest.as_bytes().get(1) == Some(&b'\n') {
                2
            } else {
                1
            };
            (LexKind::NewLine, len, len)
        }
        NBSP => {
            let len = run_len(rest, |c| c == NBSP);
            (LexKind::WhiteSpace, len, len)
        }
        '|' => match rest[1..].chars().next() {
            None => (LexKind::Pipe, 1, 1),
            Some('|') => (LexKind::Pipe, 1, 2),
            Some(c) if c.is_whitespace() => (LexKind::Pipe, 1, 1),
            Some(_) => match rest[1..].find('|') {
                Some(close) => (LexKind::Command, 1 + close + 1, 1 + close + 1),
                // No closing pipe before end of input: the whole run
                // degrades to a word.
                None => (LexKind::Word, rest.len(), rest.len()),
            },
        },
        c if c.is_whitespace() => {
            let len = run_len(rest, |c| {
                c.is_whitespace() && c != '\n' && c != '\r' && c != NBSP
            });
            (LexKind::WhiteSpace, len, len)
        }
        _ => {
            let len = run_len(rest, |c| !c.is_whitespace() && c != '|');
            (LexKind::Word, len, len)
        }
    };

    Some(LexToken {
        kind,
        text: Segment::new(source, offset as u32, text_len as u32),
        source_len: source_len as u32,
    })
}

/// Byte length of the maximal prefix of `s` whose chars satisfy `pred`.
fn run_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(s.len(), |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(LexKind, String)> {
        let source = SourceText::plain(input);
        let mut tokens = Vec::new();
        Lexer::new().lex(&source, &mut tokens);
        tokens
            .iter()
            .map(|t| (t.kind, source.segment_text(&t.text).into_owned()))
            .collect()
    }

    #[test]
    fn test_words_and_whitespace() {
        assert_eq!(
            kinds("hello  world"),
            vec![
                (LexKind::Word, "hello".into()),
                (LexKind::WhiteSpace, "  ".into()),
                (LexKind::Word, "world".into()),
            ]
        );
    }

    #[test]
    fn test_newlines() {
        assert_eq!(
            kinds("a\nb\r\nc\rd"),
            vec![
                (LexKind::Word, "a".into()),
                (LexKind::NewLine, "\n".into()),
                (LexKind::Word, "b".into()),
                (LexKind::NewLine, "\r\n".into()),
                (LexKind::Word, "c".into()),
                (LexKind::NewLine, "\r".into()),
                (LexKind::Word, "d".into()),
            ]
        );
    }

    #[test]
    fn test_command() {
        assert_eq!(
            kinds("a|b|c"),
            vec![
                (LexKind::Word, "a".into()),
                (LexKind::Command, "|b|".into()),
                (LexKind::Word, "c".into()),
            ]
        );
        assert_eq!(
            kinds("|c:FF0000FF|x"),
            vec![
                (LexKind::Command, "|c:FF0000FF|".into()),
                (LexKind::Word, "x".into()),
            ]
        );
    }

    #[test]
    fn test_escaped_pipe() {
        // Double pipe consumes two bytes, yields one literal pipe.
        let source = SourceText::plain("a||b");
        let mut tokens = Vec::new();
        Lexer::new().lex(&source, &mut tokens);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].kind, LexKind::Pipe);
        assert_eq!(source.segment_text(&tokens[1].text), "|");
        assert_eq!(tokens[1].source_len, 2);
        assert_eq!(tokens[2].text.offset, 3);
    }

    #[test]
    fn test_pipe_before_whitespace_and_eof() {
        assert_eq!(
            kinds("| x"),
            vec![
                (LexKind::Pipe, "|".into()),
                (LexKind::WhiteSpace, " ".into()),
                (LexKind::Word, "x".into()),
            ]
        );
        assert_eq!(kinds("x|"), vec![
            (LexKind::Word, "x".into()),
            (LexKind::Pipe, "|".into()),
        ]);
    }

    #[test]
    fn test_unterminated_command_degrades() {
        assert_eq!(
            kinds("a |bold to the end"),
            vec![
                (LexKind::Word, "a".into()),
                (LexKind::WhiteSpace, " ".into()),
                (LexKind::Word, "|bold to the end".into()),
            ]
        );
    }

    #[test]
    fn test_nbsp_lexes_separately() {
        assert_eq!(
            kinds("a \u{A0}\u{A0} b"),
            vec![
                (LexKind::Word, "a".into()),
                (LexKind::WhiteSpace, " ".into()),
                (LexKind::WhiteSpace, "\u{A0}\u{A0}".into()),
                (LexKind::WhiteSpace, " ".into()),
                (LexKind::Word, "b".into()),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(kinds("").is_empty());
    }

    #[test]
    fn test_tokens_tile_the_source() {
        let input = "a|b| c\nd || e\u{A0}|unterminated";
        let source = SourceText::plain(input);
        let mut tokens = Vec::new();
        Lexer::new().lex(&source, &mut tokens);
        let mut pos = 0;
        for t in &tokens {
            assert_eq!(t.text.offset as usize, pos);
            pos = t.source_end() as usize;
        }
        assert_eq!(pos, input.len());
    }
}
