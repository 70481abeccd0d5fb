use serde::{Deserialize, Serialize};

/// Half-open character range of one unbreakable token (word) within a text
/// block. Trailing whitespace is attached to the preceding token; leading
/// whitespace at the start of a block attaches to the first token. Tokens
/// are contiguous and cover the block text exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub start: usize,
    pub end: usize,
}

pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start = 0usize;
    let mut in_word = false;
    let mut trailing = false;
    let mut pos = 0usize;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if in_word {
                trailing = true;
            }
        } else if trailing {
            tokens.push(Token { start, end: pos });
            start = pos;
            trailing = false;
        } else {
            in_word = true;
        }
        pos += 1;
    }
    if pos > start {
        tokens.push(Token { start, end: pos });
    }
    tokens
}

/// Byte offset of each char, with a trailing sentinel at `text.len()`.
/// Supports O(1) slicing by char range.
pub fn char_byte_table(text: &str) -> Vec<usize> {
    let mut table: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    table.push(text.len());
    table
}

pub fn slice_chars<'a>(text: &'a str, table: &[usize], start: usize, end: usize) -> &'a str {
    &text[table[start]..table[end]]
}

/// Nearest token boundary at or after `offset`. Boundaries are token starts
/// plus the end of the final token.
pub fn snap_forward(tokens: &[Token], offset: usize) -> usize {
    let Some(last) = tokens.last() else {
        return offset;
    };
    let idx = tokens.partition_point(|t| t.start < offset);
    if idx < tokens.len() {
        tokens[idx].start
    } else {
        last.end.max(offset)
    }
}

/// Largest token boundary strictly before `offset`, if any.
pub fn prev_boundary(tokens: &[Token], offset: usize) -> Option<usize> {
    let idx = tokens.partition_point(|t| t.start < offset);
    if idx == 0 {
        None
    } else {
        Some(tokens[idx - 1].start)
    }
}

/// Number of tokens consumed once a break lands at `offset`. A partially
/// consumed token counts as consumed.
pub fn index_at(tokens: &[Token], offset: usize) -> usize {
    tokens.partition_point(|t| t.start < offset)
}

/// First boundary strictly after `offset`; used to force single-token
/// progress on degenerate content.
pub fn boundary_after(tokens: &[Token], offset: usize, char_len: usize) -> usize {
    let idx = tokens.partition_point(|t| t.start <= offset);
    if idx < tokens.len() {
        tokens[idx].start
    } else {
        char_len
    }
}
