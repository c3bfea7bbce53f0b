//! Conversion between byte offsets and `(line, character)` positions.
//!
//! Characters are counted in UTF-16 code units, matching what editors
//! report for cursor columns.

use serde::{Deserialize, Serialize};

/// Zero-based line and UTF-16 character column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// Convert a position to a byte offset.
///
/// Lines past the end map to the document length; columns past the end of
/// a line map to the end of that line.
pub fn position_to_offset(source: &str, pos: Position) -> usize {
    match line_bounds(source, pos.line) {
        Some((start, end)) => start + utf16_offset_to_byte_offset(&source[start..end], pos.character),
        None => source.len(),
    }
}

/// Convert a byte offset to a position.
pub fn offset_to_position(source: &str, offset: usize) -> Position {
    let offset = floor_char_boundary(source, offset);
    let line = line_of(source, offset);
    let start = line_start(source, line);
    Position {
        line,
        character: byte_offset_to_utf16_offset(&source[start..], offset - start),
    }
}

/// Zero-based line containing `offset`.
pub fn line_of(source: &str, offset: usize) -> usize {
    let offset = offset.min(source.len());
    source.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}

/// Byte offset where `line` starts, or the document length past the last line.
pub fn line_start(source: &str, line: usize) -> usize {
    line_bounds(source, line).map_or(source.len(), |(start, _)| start)
}

/// Byte offset where `line` ends, excluding its line terminator.
pub fn line_end(source: &str, line: usize) -> usize {
    line_bounds(source, line).map_or(source.len(), |(_, end)| end)
}

/// Number of lines; an empty document has one.
pub fn line_count(source: &str) -> usize {
    line_of(source, source.len()) + 1
}

fn line_bounds(source: &str, line: usize) -> Option<(usize, usize)> {
    let mut start = 0;
    for (idx, segment) in source.split_inclusive('\n').enumerate() {
        if idx == line {
            let content = segment.trim_end_matches('\n').trim_end_matches('\r');
            return Some((start, start + content.len()));
        }
        start += segment.len();
    }

    // A trailing newline opens one more, empty line.
    if line == 0 || (line == line_count(source) - 1 && source.ends_with('\n')) {
        return Some((source.len(), source.len()));
    }
    None
}

/// Largest char boundary not greater than `offset`.
pub(crate) fn floor_char_boundary(source: &str, offset: usize) -> usize {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Convert UTF-16 offset to byte offset within a line
fn utf16_offset_to_byte_offset(line: &str, utf16_offset: usize) -> usize {
    let mut utf16_count = 0;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= utf16_offset {
            return byte_idx;
        }
        utf16_count += ch.len_utf16();
    }
    line.len()
}

/// Convert byte offset to UTF-16 offset within a line
fn byte_offset_to_utf16_offset(line: &str, byte_offset: usize) -> usize {
    line[..byte_offset.min(line.len())]
        .chars()
        .map(|c| c.len_utf16())
        .sum()
}
