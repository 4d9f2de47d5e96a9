//! Command records and their packed binary layout.
//!
//! Every record is a 1-byte tag followed by a fixed-size little-endian
//! payload. Records are only addressable by object index (via the stream's
//! index table); nothing in the byte layout marks record boundaries.

use crate::error::{Error, Result};

/// Record discriminant. The numeric values are the on-wire tag bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    BlockInfo = 0,
    LineInfo = 1,
    Text = 2,
    Icon = 3,
    ToggleBold = 4,
    ToggleItalic = 5,
    PushStyle = 6,
    PushFont = 7,
    PushColor = 8,
    PushGlyphShader = 9,
    PushLink = 10,
    PopStyle = 11,
    PopFont = 12,
    PopColor = 13,
    PopGlyphShader = 14,
    PopLink = 15,
    ChangeSourceString = 16,
    Hyphen = 17,
    LineBreak = 18,
    Custom = 19,
}

impl Tag {
    /// Decode a tag byte.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::BlockInfo),
            1 => Some(Self::LineInfo),
            2 => Some(Self::Text),
            3 => Some(Self::Icon),
            4 => Some(Self::ToggleBold),
            5 => Some(Self::ToggleItalic),
            6 => Some(Self::PushStyle),
            7 => Some(Self::PushFont),
            8 => Some(Self::PushColor),
            9 => Some(Self::PushGlyphShader),
            10 => Some(Self::PushLink),
            11 => Some(Self::PopStyle),
            12 => Some(Self::PopFont),
            13 => Some(Self::PopColor),
            14 => Some(Self::PopGlyphShader),
            15 => Some(Self::PopLink),
            16 => Some(Self::ChangeSourceString),
            17 => Some(Self::Hyphen),
            18 => Some(Self::LineBreak),
            19 => Some(Self::Custom),
            _ => None,
        }
    }

    /// Payload size in bytes, excluding the tag byte.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::BlockInfo => 8,
            Self::LineInfo => 17,
            Self::Text => 20,
            Self::Icon => 14,
            Self::ToggleBold
            | Self::ToggleItalic
            | Self::PopStyle
            | Self::PopFont
            | Self::PopColor
            | Self::PopGlyphShader
            | Self::PopLink
            | Self::Hyphen => 0,
            Self::PushStyle
            | Self::PushFont
            | Self::PushGlyphShader
            | Self::PushLink
            | Self::ChangeSourceString => 2,
            Self::PushColor | Self::LineBreak => 4,
            Self::Custom => 5,
        }
    }

    /// Human-readable tag name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BlockInfo => "BlockInfo",
            Self::LineInfo => "LineInfo",
            Self::Text => "Text",
            Self::Icon => "Icon",
            Self::ToggleBold => "ToggleBold",
            Self::ToggleItalic => "ToggleItalic",
            Self::PushStyle => "PushStyle",
            Self::PushFont => "PushFont",
            Self::PushColor => "PushColor",
            Self::PushGlyphShader => "PushGlyphShader",
            Self::PushLink => "PushLink",
            Self::PopStyle => "PopStyle",
            Self::PopFont => "PopFont",
            Self::PopColor => "PopColor",
            Self::PopGlyphShader => "PopGlyphShader",
            Self::PopLink => "PopLink",
            Self::ChangeSourceString => "ChangeSourceString",
            Self::Hyphen => "Hyphen",
            Self::LineBreak => "LineBreak",
            Self::Custom => "Custom",
        }
    }

    /// True for records that change the active style state: pushes, pops,
    /// and toggles.
    #[must_use]
    pub const fn is_style_command(self) -> bool {
        matches!(
            self,
            Self::ToggleBold
                | Self::ToggleItalic
                | Self::PushStyle
                | Self::PushFont
                | Self::PushColor
                | Self::PushGlyphShader
                | Self::PushLink
                | Self::PopStyle
                | Self::PopFont
                | Self::PopColor
                | Self::PopGlyphShader
                | Self::PopLink
        )
    }
}

/// Payload of a `LineInfo` record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineInfo {
    /// Horizontal alignment offset applied to every record on the line.
    pub offset: i32,
    /// Measured line width.
    pub line_width: i16,
    /// Measured line height.
    pub line_height: i16,
    /// Number of records strictly between this record and the next
    /// `LineInfo` (or the end of the stream).
    pub length_in_commands: i32,
    /// Glyphs on this line, including its terminating line break.
    pub length_in_glyphs: i32,
    /// True when the line ends in a break (hard or soft) rather than at
    /// the end of input.
    pub terminated_by_line_break: bool,
}

/// Payload of a `Text` record: one run of uniformly styled glyphs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextRun {
    /// Byte offset of the run's text within the current source string.
    pub text_offset: i32,
    /// Run length in glyphs.
    pub text_length: i32,
    /// Pen position, relative to the line origin.
    pub x: i32,
    pub y: i32,
    /// Measured run size.
    pub width: i16,
    pub height: i16,
}

/// Payload of an `Icon` record. Icons always count as one glyph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IconRecord {
    /// Handle into the stream's icon side-table.
    pub icon_index: i16,
    pub x: i32,
    pub y: i32,
    pub width: i16,
    pub height: i16,
}

/// A decoded command record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandRecord {
    BlockInfo { offset: i32, length_in_lines: i32 },
    LineInfo(LineInfo),
    Text(TextRun),
    Icon(IconRecord),
    ToggleBold,
    ToggleItalic,
    PushStyle { index: i16 },
    PushFont { index: i16 },
    PushColor { rgba: u32 },
    PushGlyphShader { index: i16 },
    PushLink { index: i16 },
    PopStyle,
    PopFont,
    PopColor,
    PopGlyphShader,
    PopLink,
    ChangeSourceString { index: i16 },
    Hyphen,
    LineBreak { length: i32 },
    Custom { id: u8, value: i32 },
}

impl CommandRecord {
    /// The record's tag.
    #[must_use]
    pub const fn tag(&self) -> Tag {
        match self {
            Self::BlockInfo { .. } => Tag::BlockInfo,
            Self::LineInfo(_) => Tag::LineInfo,
            Self::Text(_) => Tag::Text,
            Self::Icon(_) => Tag::Icon,
            Self::ToggleBold => Tag::ToggleBold,
            Self::ToggleItalic => Tag::ToggleItalic,
            Self::PushStyle { .. } => Tag::PushStyle,
            Self::PushFont { .. } => Tag::PushFont,
            Self::PushColor { .. } => Tag::PushColor,
            Self::PushGlyphShader { .. } => Tag::PushGlyphShader,
            Self::PushLink { .. } => Tag::PushLink,
            Self::PopStyle => Tag::PopStyle,
            Self::PopFont => Tag::PopFont,
            Self::PopColor => Tag::PopColor,
            Self::PopGlyphShader => Tag::PopGlyphShader,
            Self::PopLink => Tag::PopLink,
            Self::ChangeSourceString { .. } => Tag::ChangeSourceString,
            Self::Hyphen => Tag::Hyphen,
            Self::LineBreak { .. } => Tag::LineBreak,
            Self::Custom { .. } => Tag::Custom,
        }
    }

    /// Encoded size including the tag byte.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        1 + self.tag().payload_len()
    }

    /// Glyphs this record contributes to the stream's running glyph
    /// offset.
    #[must_use]
    pub const fn glyph_count(&self) -> i32 {
        match self {
            Self::Text(run) => run.text_length,
            Self::Icon(_) => 1,
            Self::LineBreak { length } => *length,
            _ => 0,
        }
    }

    /// Append the encoded record to a byte buffer.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.tag() as u8);
        match *self {
            Self::BlockInfo {
                offset,
                length_in_lines,
            } => {
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&length_in_lines.to_le_bytes());
            }
            Self::LineInfo(info) => {
                out.extend_from_slice(&info.offset.to_le_bytes());
                out.extend_from_slice(&info.line_width.to_le_bytes());
                out.extend_from_slice(&info.line_height.to_le_bytes());
                out.extend_from_slice(&info.length_in_commands.to_le_bytes());
                out.extend_from_slice(&info.length_in_glyphs.to_le_bytes());
                out.push(u8::from(info.terminated_by_line_break));
            }
            Self::Text(run) => {
                out.extend_from_slice(&run.text_offset.to_le_bytes());
                out.extend_from_slice(&run.text_length.to_le_bytes());
                out.extend_from_slice(&run.x.to_le_bytes());
                out.extend_from_slice(&run.y.to_le_bytes());
                out.extend_from_slice(&run.width.to_le_bytes());
                out.extend_from_slice(&run.height.to_le_bytes());
            }
            Self::Icon(icon) => {
                out.extend_from_slice(&icon.icon_index.to_le_bytes());
                out.extend_from_slice(&icon.x.to_le_bytes());
                out.extend_from_slice(&icon.y.to_le_bytes());
                out.extend_from_slice(&icon.width.to_le_bytes());
                out.extend_from_slice(&icon.height.to_le_bytes());
            }
            Self::PushStyle { index }
            | Self::PushFont { index }
            | Self::PushGlyphShader { index }
            | Self::PushLink { index }
            | Self::ChangeSourceString { index } => {
                out.extend_from_slice(&index.to_le_bytes());
            }
            Self::PushColor { rgba } => out.extend_from_slice(&rgba.to_le_bytes()),
            Self::LineBreak { length } => out.extend_from_slice(&length.to_le_bytes()),
            Self::Custom { id, value } => {
                out.push(id);
                out.extend_from_slice(&value.to_le_bytes());
            }
            Self::ToggleBold
            | Self::ToggleItalic
            | Self::PopStyle
            | Self::PopFont
            | Self::PopColor
            | Self::PopGlyphShader
            | Self::PopLink
            | Self::Hyphen => {}
        }
    }

    /// Decode one record from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::CommandOutOfBounds`] when the buffer is empty,
    /// carries an unknown tag, or is shorter than the tag's payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let corrupt = || Error::CommandOutOfBounds {
            index: 0,
            len: bytes.len(),
        };
        let (&tag_byte, payload) = bytes.split_first().ok_or_else(corrupt)?;
        let tag = Tag::from_u8(tag_byte).ok_or_else(corrupt)?;
        if payload.len() < tag.payload_len() {
            return Err(corrupt());
        }
        let record = match tag {
            Tag::BlockInfo => Self::BlockInfo {
                offset: read_i32(payload, 0),
                length_in_lines: read_i32(payload, 4),
            },
            Tag::LineInfo => Self::LineInfo(LineInfo {
                offset: read_i32(payload, 0),
                line_width: read_i16(payload, 4),
                line_height: read_i16(payload, 6),
                length_in_commands: read_i32(payload, 8),
                length_in_glyphs: read_i32(payload, 12),
                terminated_by_line_break: payload[16] != 0,
            }),
            Tag::Text => Self::Text(TextRun {
                text_offset: read_i32(payload, 0),
                text_length: read_i32(payload, 4),
                x: read_i32(payload, 8),
                y: read_i32(payload, 12),
                width: read_i16(payload, 16),
                height: read_i16(payload, 18),
            }),
            Tag::Icon => Self::Icon(IconRecord {
                icon_index: read_i16(payload, 0),
                x: read_i32(payload, 2),
                y: read_i32(payload, 6),
                width: read_i16(payload, 10),
                height: read_i16(payload, 12),
            }),
            Tag::ToggleBold => Self::ToggleBold,
            Tag::ToggleItalic => Self::ToggleItalic,
            Tag::PushStyle => Self::PushStyle {
                index: read_i16(payload, 0),
            },
            Tag::PushFont => Self::PushFont {
                index: read_i16(payload, 0),
            },
            Tag::PushColor => Self::PushColor {
                rgba: read_i32(payload, 0) as u32,
            },
            Tag::PushGlyphShader => Self::PushGlyphShader {
                index: read_i16(payload, 0),
            },
            Tag::PushLink => Self::PushLink {
                index: read_i16(payload, 0),
            },
            Tag::PopStyle => Self::PopStyle,
            Tag::PopFont => Self::PopFont,
            Tag::PopColor => Self::PopColor,
            Tag::PopGlyphShader => Self::PopGlyphShader,
            Tag::PopLink => Self::PopLink,
            Tag::ChangeSourceString => Self::ChangeSourceString {
                index: read_i16(payload, 0),
            },
            Tag::Hyphen => Self::Hyphen,
            Tag::LineBreak => Self::LineBreak {
                length: read_i32(payload, 0),
            },
            Tag::Custom => Self::Custom {
                id: payload[0],
                value: read_i32(payload, 1),
            },
        };
        Ok(record)
    }
}

fn read_i16(bytes: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
