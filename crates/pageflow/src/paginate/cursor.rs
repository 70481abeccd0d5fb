use serde::{Deserialize, Serialize};

/// Resumable position inside a partially consumed text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCursor {
    /// Index into the block's laid-out lines.
    pub line_index: usize,
    /// Character offset within the block text.
    pub text_offset: usize,
    /// Index of the first unconsumed token.
    pub token_index: usize,
}

/// The single source of truth for where pagination resumes. Mutated only by
/// the engine's single-page advance; absent once the document is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub block_index: usize,
    /// Global character units consumed so far.
    pub char_index: usize,
    /// Global token (word) units consumed so far.
    pub word_index: usize,
    /// Set while `block_index` points at a partially consumed text block.
    pub block: Option<BlockCursor>,
}

impl Cursor {
    pub fn start() -> Self {
        Self {
            block_index: 0,
            char_index: 0,
            word_index: 0,
            block: None,
        }
    }
}
