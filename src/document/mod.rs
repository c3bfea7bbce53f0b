//! Document model consumed by the extractor and the resolver.
//!
//! Editors own the real document; the core only needs the text, a
//! structural classification of every position, and the fenced blocks.
//! [`DocumentView`] is that seam, and [`MarkdownDocument`] implements it
//! for plain Markdown text.

mod fence;
mod position;
mod syntax;

pub use fence::{fenced_blocks, FencedBlock};
pub use position::{
    line_count, line_end, line_of, line_start, offset_to_position, position_to_offset, Position,
};
pub use syntax::{MarkdownDocument, MathRegion};

pub(crate) use position::floor_char_boundary;

/// Which neighbour of a position to classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The character ending at the position.
    Before,
    /// The character starting at the position.
    After,
}

/// Structural class of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    Plain,
    /// Opening `$` or `$$`.
    MathBegin,
    Math,
    /// Closing `$` or `$$`.
    MathEnd,
}

impl NodeClass {
    pub fn is_math(self) -> bool {
        !matches!(self, NodeClass::Plain)
    }

    pub fn is_terminator(self) -> bool {
        matches!(self, NodeClass::MathEnd)
    }
}

/// Read-only view of a document.
pub trait DocumentView {
    fn text(&self) -> &str;

    /// Classify the node adjacent to byte `offset` on `side`.
    ///
    /// Offsets past the end clamp to the document length; a side with no
    /// character classifies as [`NodeClass::Plain`].
    fn node_at(&self, offset: usize, side: Side) -> NodeClass;

    /// Fenced blocks in document order.
    fn fenced_blocks(&self) -> &[FencedBlock];

    /// Whether `offset` falls in code, where `$` is literal.
    fn is_code(&self, offset: usize) -> bool {
        self.fenced_blocks()
            .iter()
            .any(|block| block.contains(offset))
    }

    fn len(&self) -> usize {
        self.text().len()
    }

    fn is_empty(&self) -> bool {
        self.text().is_empty()
    }
}
