//! Error types for pipetext.

use std::fmt;

/// Result type alias for pipetext operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipetext operations.
///
/// Malformed markup is never an error; the lexer and parser degrade it to
/// literal text. Errors only arise from configuration problems (missing
/// registrations), capacity limits, and out-of-range stream access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Layout was invoked without a usable default font.
    MissingDefaultFont,
    /// A `|font:name|` command referenced an unregistered font.
    UnregisteredFont(String),
    /// A `|style:name|` command referenced an unregistered preset style.
    UnregisteredStyle(String),
    /// An `|icon:name|` command referenced an unregistered icon.
    UnregisteredIcon(String),
    /// A registry ran out of id space.
    RegistryFull { capacity: usize },
    /// Command index outside the current stream bounds.
    CommandOutOfBounds { index: usize, len: usize },
    /// Line index outside the current stream bounds.
    LineOutOfBounds { line: usize, count: usize },
    /// A line handle was not minted by this stream's current contents.
    ForeignLineInfo,
    /// An in-place patch tried to change a record's variant.
    TagMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A color payload could not be parsed.
    InvalidColor(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDefaultFont => write!(f, "no default font configured"),
            Self::UnregisteredFont(name) => write!(f, "font not registered: {name:?}"),
            Self::UnregisteredStyle(name) => write!(f, "preset style not registered: {name:?}"),
            Self::UnregisteredIcon(name) => write!(f, "icon not registered: {name:?}"),
            Self::RegistryFull { capacity } => {
                write!(f, "registry full: capacity is {capacity}")
            }
            Self::CommandOutOfBounds { index, len } => {
                write!(f, "command index {index} out of bounds for stream of {len}")
            }
            Self::LineOutOfBounds { line, count } => {
                write!(f, "line index {line} out of bounds for {count} lines")
            }
            Self::ForeignLineInfo => {
                write!(f, "line handle does not belong to this stream")
            }
            Self::TagMismatch { expected, found } => {
                write!(f, "cannot patch {expected} record with {found} record")
            }
            Self::InvalidColor(s) => write!(f, "invalid color payload: {s:?}"),
        }
    }
}

impl std::error::Error for Error {}
