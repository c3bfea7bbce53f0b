//! Environment at a position: closest block plus the inline definitions after it.

use crate::config::EnvironmentSettings;
use crate::document::{floor_char_boundary, DocumentView, FencedBlock, NodeClass, Side};

use super::block::parse_block;
use super::definitions::{scan_definitions, Definition};
use super::{Environment, EnvironmentError, EnvironmentResult};

/// Builds the environment in effect at a document position.
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    block_language: String,
}

impl Default for EnvironmentResolver {
    fn default() -> Self {
        Self::from_settings(&EnvironmentSettings::default())
    }
}

impl EnvironmentResolver {
    pub fn new(block_language: impl Into<String>) -> Self {
        Self {
            block_language: block_language.into(),
        }
    }

    pub fn from_settings(settings: &EnvironmentSettings) -> Self {
        Self::new(settings.block_language.clone())
    }

    pub fn block_language(&self) -> &str {
        &self.block_language
    }

    /// Closest environment block ending strictly before `position`.
    pub fn closest_block<'d, D>(&self, doc: &'d D, position: usize) -> Option<&'d FencedBlock>
    where
        D: DocumentView + ?Sized,
    {
        doc.fenced_blocks()
            .iter()
            .filter(|block| block.language == self.block_language && block.end < position)
            .max_by_key(|block| block.end)
    }

    /// Resolve the environment at `position`.
    ///
    /// The closest preceding block gives the base; inline definitions
    /// between that block and `position` are applied over it in document
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::InvalidBlock`] if the selected block is
    /// not valid TOML or has the wrong shape.
    pub fn resolve<D>(&self, doc: &D, position: usize) -> EnvironmentResult<Environment>
    where
        D: DocumentView + ?Sized,
    {
        let text = doc.text();
        let position = floor_char_boundary(text, position);

        let (mut env, scan_from) = match self.closest_block(doc, position) {
            Some(block) => {
                let env = parse_block(block.body(text)).map_err(|source| {
                    EnvironmentError::InvalidBlock {
                        offset: block.start,
                        source,
                    }
                })?;
                (env, block.end)
            }
            None => (Environment::default(), 0),
        };

        let definitions: Vec<Definition> = scan_definitions(&text[scan_from..position], scan_from)
            .into_iter()
            .filter(|definition| is_live(doc, definition))
            .collect();
        for definition in &definitions {
            env.apply(definition);
        }

        tracing::debug!(
            position,
            block_offset = scan_from,
            definitions = definitions.len(),
            "resolved environment"
        );
        Ok(env)
    }
}

/// A definition counts when its `$` opens math outside code.
///
/// `$x := $` never closes as inline math (whitespace before the closing
/// `$`), so a blank definition only has to be outside code.
fn is_live<D>(doc: &D, definition: &Definition) -> bool
where
    D: DocumentView + ?Sized,
{
    if doc.is_code(definition.offset) {
        return false;
    }
    definition.value.trim().is_empty()
        || doc.node_at(definition.offset, Side::After) == NodeClass::MathBegin
}
