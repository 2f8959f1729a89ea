//! Conversions between parser locations and editor coordinates
//!
//! The parser counts lines from 1 and columns from 0, in Unicode scalar
//! values. Editors count both from 0, so only the line moves.

use g4_parser::Location;
use serde::Serialize;

/// Zero-based line and character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EditorPosition {
    pub line: u32,
    pub character: u32,
}

impl EditorPosition {
    #[must_use]
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl std::fmt::Display for EditorPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// Half-open range in editor coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct EditorRange {
    pub start: EditorPosition,
    pub end: EditorPosition,
}

/// Saturates at `u32::MAX`; no grammar gets anywhere near it.
fn to_editor_u32(val: usize) -> u32 {
    val.try_into().unwrap_or(u32::MAX)
}

#[must_use]
pub fn position_to_editor(position: g4_parser::Position) -> EditorPosition {
    EditorPosition {
        line: to_editor_u32(position.line.saturating_sub(1)),
        character: to_editor_u32(position.column),
    }
}

#[must_use]
pub fn location_to_range(location: &Location) -> EditorRange {
    EditorRange {
        start: position_to_editor(location.start),
        end: position_to_editor(location.end),
    }
}

/// Byte offset of an editor position, or `None` past the end of `source`.
/// A character beyond the end of its line clamps to the line end.
#[must_use]
pub fn position_to_offset(source: &str, position: EditorPosition) -> Option<usize> {
    let target_line = position.line as usize;
    let target_char = position.character as usize;

    let mut current_offset = 0;
    for (line_idx, line) in source.split('\n').enumerate() {
        if line_idx == target_line {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let char_offset: usize = line.chars().take(target_char).map(char::len_utf8).sum();
            return Some(current_offset + char_offset);
        }
        current_offset += line.len() + 1;
    }
    None
}
