//! Markdown math classification.
//!
//! [`MarkdownDocument`] scans its text once and records every math region
//! with the ranges of its delimiters, so `node_at` is a binary search.

use std::ops::Range;

use super::fence::{fenced_blocks, FencedBlock};
use super::position::floor_char_boundary;
use super::{DocumentView, NodeClass, Side};

/// A math region: opening delimiter, content, optional closing delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathRegion {
    pub open: Range<usize>,
    pub content: Range<usize>,
    /// `None` when display math is left open at the end of the document.
    pub close: Option<Range<usize>>,
    pub display: bool,
}

impl MathRegion {
    fn end(&self) -> usize {
        self.close.as_ref().map_or(self.content.end, |close| close.end)
    }
}

/// In-memory Markdown document with `$…$` and `$$…$$` math.
#[derive(Debug, Clone)]
pub struct MarkdownDocument {
    text: String,
    regions: Vec<MathRegion>,
    /// Inline code spans, in order.
    code_spans: Vec<Range<usize>>,
    blocks: Vec<FencedBlock>,
}

impl MarkdownDocument {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let blocks = fenced_blocks(&text);
        let (regions, code_spans) = scan_math(&text, &blocks);
        Self {
            text,
            regions,
            code_spans,
            blocks,
        }
    }

    pub fn regions(&self) -> &[MathRegion] {
        &self.regions
    }

    pub fn code_spans(&self) -> &[Range<usize>] {
        &self.code_spans
    }

    /// Class of the character starting at byte `offset`.
    fn class_at(&self, offset: usize) -> NodeClass {
        let idx = self.regions.partition_point(|region| region.end() <= offset);
        let Some(region) = self.regions.get(idx) else {
            return NodeClass::Plain;
        };

        if region.open.contains(&offset) {
            NodeClass::MathBegin
        } else if region.close.as_ref().is_some_and(|close| close.contains(&offset)) {
            NodeClass::MathEnd
        } else if region.content.contains(&offset) {
            // Line breaks inside display math belong to no math node.
            match self.text.as_bytes()[offset] {
                b'\n' | b'\r' if region.display => NodeClass::Plain,
                _ => NodeClass::Math,
            }
        } else {
            NodeClass::Plain
        }
    }
}

impl DocumentView for MarkdownDocument {
    fn text(&self) -> &str {
        &self.text
    }

    fn node_at(&self, offset: usize, side: Side) -> NodeClass {
        let offset = floor_char_boundary(&self.text, offset);
        match side {
            Side::Before => match self.text[..offset].chars().next_back() {
                Some(ch) => self.class_at(offset - ch.len_utf8()),
                None => NodeClass::Plain,
            },
            Side::After => {
                if offset < self.text.len() {
                    self.class_at(offset)
                } else {
                    NodeClass::Plain
                }
            }
        }
    }

    fn fenced_blocks(&self) -> &[FencedBlock] {
        &self.blocks
    }

    fn is_code(&self, offset: usize) -> bool {
        let idx = self.code_spans.partition_point(|span| span.end <= offset);
        self.code_spans
            .get(idx)
            .is_some_and(|span| span.contains(&offset))
            || self.blocks.iter().any(|block| block.contains(offset))
    }
}

/// Math regions and inline code spans, both in document order.
fn scan_math(text: &str, blocks: &[FencedBlock]) -> (Vec<MathRegion>, Vec<Range<usize>>) {
    let bytes = text.as_bytes();
    let mut regions = Vec::new();
    let mut code_spans = Vec::new();
    let mut blocks = blocks.iter().peekable();
    let mut i = 0;

    while i < bytes.len() {
        while blocks.peek().is_some_and(|block| block.end <= i) {
            blocks.next();
        }
        if let Some(block) = blocks.peek() {
            if block.contains(i) {
                i = block.end;
                continue;
            }
        }

        match bytes[i] {
            b'\\' => i += 1 + next_char_len(text, i + 1),
            b'`' => {
                let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                let end = skip_code_span(bytes, i);
                // An unmatched run only skips itself.
                if end > i + run {
                    code_spans.push(i..end);
                }
                i = end;
            }
            b'$' if bytes.get(i + 1) == Some(&b'$') => {
                let region = display_math(text, i);
                i = region.end();
                regions.push(region);
            }
            b'$' => match inline_math(text, i) {
                Some(region) => {
                    i = region.end();
                    regions.push(region);
                }
                None => i += 1,
            },
            _ => i += next_char_len(text, i).max(1),
        }
    }

    (regions, code_spans)
}

fn next_char_len(text: &str, at: usize) -> usize {
    text.get(at..)
        .and_then(|rest| rest.chars().next())
        .map_or(0, char::len_utf8)
}

/// Skip a code span starting at a backtick run; an unmatched run is literal.
fn skip_code_span(bytes: &[u8], start: usize) -> usize {
    let run = bytes[start..].iter().take_while(|&&b| b == b'`').count();
    let mut i = start + run;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let close = bytes[i..].iter().take_while(|&&b| b == b'`').count();
            if close == run {
                return i + close;
            }
            i += close;
        } else {
            i += 1;
        }
    }
    start + run
}

fn display_math(text: &str, start: usize) -> MathRegion {
    let bytes = text.as_bytes();
    let content_start = start + 2;
    let mut i = content_start;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1 + next_char_len(text, i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'$') => {
                return MathRegion {
                    open: start..content_start,
                    content: content_start..i,
                    close: Some(i..i + 2),
                    display: true,
                };
            }
            _ => i += 1,
        }
    }

    MathRegion {
        open: start..content_start,
        content: content_start..text.len(),
        close: None,
        display: true,
    }
}

/// Inline math stays on one line, and its content neither starts nor ends
/// with whitespace.
fn inline_math(text: &str, start: usize) -> Option<MathRegion> {
    let bytes = text.as_bytes();
    let content_start = start + 1;
    let first = text[content_start..].chars().next()?;
    if first.is_whitespace() {
        return None;
    }

    let mut i = content_start;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' | b'\r' => return None,
            b'\\' => i += 1 + next_char_len(text, i + 1),
            b'$' => {
                let last = text[content_start..i].chars().next_back()?;
                if last.is_whitespace() {
                    i += 1;
                    continue;
                }
                return Some(MathRegion {
                    open: start..content_start,
                    content: content_start..i,
                    close: Some(i..i + 1),
                    display: false,
                });
            }
            _ => i += 1,
        }
    }
    None
}
