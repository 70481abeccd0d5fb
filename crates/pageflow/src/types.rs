use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Style identity the layout oracle measures with. Two runs with equal
/// styles must produce identical line metrics for identical text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub family: String,
    pub font_size: f32,
    /// Line height as a multiplier of the font size.
    pub line_height: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: "serif".to_string(),
            font_size: 16.0,
            line_height: 1.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Clone)]
pub struct TextBlock {
    pub text: String,
    pub style: TextStyle,
    pub alignment: Alignment,
    pub spacing_before: f32,
    pub spacing_after: f32,
    pub chapter_index: usize,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, chapter_index: usize) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
            alignment: Alignment::Left,
            spacing_before: 0.0,
            spacing_after: 0.0,
            chapter_index,
        }
    }
}

#[derive(Clone)]
pub struct ImageBlock {
    pub data: Vec<u8>,
    /// Intrinsic pixel width.
    pub width: f32,
    /// Intrinsic pixel height.
    pub height: f32,
    pub spacing_before: f32,
    pub spacing_after: f32,
    pub chapter_index: usize,
}

#[derive(Clone)]
pub enum Block {
    Text(TextBlock),
    Image(ImageBlock),
}

impl Block {
    pub fn chapter_index(&self) -> usize {
        match self {
            Block::Text(b) => b.chapter_index,
            Block::Image(b) => b.chapter_index,
        }
    }

    /// Character units this block contributes to the global counters.
    /// An image counts as exactly one unit.
    pub fn char_units(&self) -> usize {
        match self {
            Block::Text(b) => b.text.chars().count(),
            Block::Image(_) => 1,
        }
    }
}

/// Ordered, read-only block sequence for one pagination session.
pub struct Document {
    pub id: String,
    blocks: Vec<Block>,
}

impl Document {
    pub fn new(id: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            id: id.into(),
            blocks,
        }
    }

    /// Builds a document with a content-derived id, for callers that have
    /// no stable external identifier.
    pub fn with_id_from_blocks(blocks: Vec<Block>) -> Self {
        let mut hasher = Sha256::new();
        for block in &blocks {
            match block {
                Block::Text(b) => {
                    hasher.update([0u8]);
                    hasher.update(b.text.as_bytes());
                }
                Block::Image(b) => {
                    hasher.update([1u8]);
                    hasher.update(b.data.as_slice());
                }
            }
        }
        let id = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        Self { id, blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_is_stable() {
        let a = Document::with_id_from_blocks(vec![Block::Text(TextBlock::new("hello", 0))]);
        let b = Document::with_id_from_blocks(vec![Block::Text(TextBlock::new("hello", 0))]);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn content_id_differs_for_different_text() {
        let a = Document::with_id_from_blocks(vec![Block::Text(TextBlock::new("hello", 0))]);
        let b = Document::with_id_from_blocks(vec![Block::Text(TextBlock::new("world", 0))]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn image_counts_one_char_unit() {
        let image = Block::Image(ImageBlock {
            data: vec![1, 2, 3],
            width: 100.0,
            height: 80.0,
            spacing_before: 0.0,
            spacing_after: 0.0,
            chapter_index: 0,
        });
        assert_eq!(image.char_units(), 1);
    }
}
