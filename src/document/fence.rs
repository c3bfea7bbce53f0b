//! Fenced code blocks (```` ``` ```` and `~~~`).

use serde::Serialize;

/// A fenced block with its byte ranges.
///
/// `start..end` covers the opening fence line through the closing fence
/// characters; `body_start..body_end` is the text between the fences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FencedBlock {
    /// First word of the info string, empty when absent.
    pub language: String,
    pub start: usize,
    pub end: usize,
    pub body_start: usize,
    pub body_end: usize,
}

impl FencedBlock {
    pub fn body<'a>(&self, source: &'a str) -> &'a str {
        &source[self.body_start..self.body_end]
    }

    pub fn contains(&self, offset: usize) -> bool {
        (self.start..self.end).contains(&offset)
    }
}

struct Fence {
    marker: u8,
    len: usize,
}

/// Find every fenced block in `source`, in document order.
///
/// A block left open runs to the end of the document.
pub fn fenced_blocks(source: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(Fence, String, usize, usize)> = None;
    let mut line_start = 0;

    for segment in source.split_inclusive('\n') {
        let line = segment.trim_end_matches('\n').trim_end_matches('\r');
        let next_line = line_start + segment.len();

        match open.take() {
            None => {
                if let Some((fence, info)) = opening_fence(line) {
                    let language = info.split_whitespace().next().unwrap_or("").to_string();
                    open = Some((fence, language, line_start, next_line));
                }
            }
            Some((fence, language, start, body_start)) => {
                if closes(line, &fence) {
                    blocks.push(FencedBlock {
                        language,
                        start,
                        end: line_start + line.len(),
                        body_start,
                        body_end: line_start,
                    });
                } else {
                    open = Some((fence, language, start, body_start));
                }
            }
        }

        line_start = next_line;
    }

    if let Some((_, language, start, body_start)) = open {
        blocks.push(FencedBlock {
            language,
            start,
            end: source.len(),
            body_start: body_start.min(source.len()),
            body_end: source.len(),
        });
    }

    blocks
}

fn strip_indent(line: &str) -> Option<&str> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    (indent <= 3).then(|| &line[indent..])
}

fn marker_run(line: &str) -> Option<Fence> {
    let marker = *line.as_bytes().first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let len = line.bytes().take_while(|&b| b == marker).count();
    (len >= 3).then_some(Fence { marker, len })
}

fn opening_fence(line: &str) -> Option<(Fence, &str)> {
    let line = strip_indent(line)?;
    let fence = marker_run(line)?;
    let info = line[fence.len..].trim();
    if fence.marker == b'`' && info.contains('`') {
        return None;
    }
    Some((fence, info))
}

fn closes(line: &str, open: &Fence) -> bool {
    let Some(line) = strip_indent(line) else {
        return false;
    };
    match marker_run(line) {
        Some(fence) => {
            fence.marker == open.marker
                && fence.len >= open.len
                && line[fence.len..].trim().is_empty()
        }
        None => false,
    }
}
