//! Equation boundary extraction.
//!
//! Given a cursor offset, find the math region around it by walking the
//! document's structural classification outward one character at a time.

use serde::Serialize;

use crate::document::{floor_char_boundary, DocumentView, NodeClass, Side};

/// Span of one equation in a document.
///
/// `from..to` is the math content; `block_from..block_to` additionally
/// covers the delimiters. Always `block_from <= from <= to <= block_to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquationSpan {
    pub from: usize,
    pub to: usize,
    pub block_from: usize,
    pub block_to: usize,
    pub contents: String,
    pub is_multiline: bool,
}

impl EquationSpan {
    /// Span for an explicit selection; the block is the selection itself.
    pub fn from_selection(text: &str, from: usize, to: usize) -> Self {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        let from = floor_char_boundary(text, from);
        let to = floor_char_boundary(text, to);
        let contents = text[from..to].to_string();
        Self {
            from,
            to,
            block_from: from,
            block_to: to,
            is_multiline: contents.contains('\n'),
            contents,
        }
    }
}

/// Extract the equation containing `position`, or `None` outside math.
pub fn extract_equation<D>(position: usize, doc: &D) -> Option<EquationSpan>
where
    D: DocumentView + ?Sized,
{
    let text = doc.text();
    let position = floor_char_boundary(text, position);

    if !is_within_equation(doc, position) {
        return None;
    }

    let mut from = position;
    while from > 0 {
        let prev = prev_boundary(text, from);
        if !is_within_equation(doc, prev) {
            break;
        }
        from = prev;
    }

    let mut to = position;
    while to < text.len() {
        let next = next_boundary(text, to);
        if !is_within_equation(doc, next) {
            break;
        }
        to = next;
    }

    // The first delimiter character is itself inside math; a second `$`
    // there means display math.
    let (from, block_from, block_to) = if text[from..].starts_with('$') {
        let from = from + 1;
        (from, from.saturating_sub(2), to + 2)
    } else {
        (from, from.saturating_sub(1), to + 1)
    };
    let from = from.min(to);
    let block_to = block_to.min(text.len());

    let contents = text[from..to].to_string();
    tracing::debug!(from, to, block_from, block_to, "extracted equation");

    Some(EquationSpan {
        from,
        to,
        block_from,
        block_to,
        is_multiline: contents.contains('\n'),
        contents,
    })
}

/// Whether `position` is inside math.
///
/// A position right after a closing delimiter or right before an opening
/// one is outside. An empty line between two math lines is inside.
pub fn is_within_equation<D>(doc: &D, position: usize) -> bool
where
    D: DocumentView + ?Sized,
{
    let text = doc.text();

    let mut node = doc.node_at(position, Side::Before);
    if node.is_terminator() {
        return false;
    }

    if node == NodeClass::Plain {
        node = doc.node_at(position, Side::After);
        if node == NodeClass::MathBegin {
            return false;
        }
    }

    if node == NodeClass::Plain {
        let left = match position {
            0 => NodeClass::Plain,
            _ => doc.node_at(prev_boundary(text, position), Side::Before),
        };
        let right = doc.node_at(next_boundary(text, position), Side::After);
        return left.is_math() && right.is_math() && !left.is_terminator();
    }

    node.is_math()
}

fn prev_boundary(text: &str, offset: usize) -> usize {
    text[..offset]
        .chars()
        .next_back()
        .map_or(0, |ch| offset - ch.len_utf8())
}

fn next_boundary(text: &str, offset: usize) -> usize {
    text[offset..]
        .chars()
        .next()
        .map_or(text.len(), |ch| offset + ch.len_utf8())
}
