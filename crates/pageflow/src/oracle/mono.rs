use unicode_linebreak::linebreaks;
use unicode_segmentation::UnicodeSegmentation;

use super::{LayoutOracle, Line};
use crate::tokens::{char_byte_table, slice_chars, tokenize};
use crate::types::TextStyle;

/// Deterministic monospace-grid layout oracle for tests and headless use.
///
/// Every grapheme occupies one cell of `font_size * cell_factor` width;
/// every line is `font_size * line_height` tall. Wrapping is greedy and
/// word-aligned, trailing whitespace may hang past the right edge, and
/// tokens wider than a whole line are soft-broken at `unicode-linebreak`
/// opportunities.
#[derive(Debug, Clone, Copy)]
pub struct MonoOracle {
    pub cell_factor: f32,
}

impl Default for MonoOracle {
    fn default() -> Self {
        Self { cell_factor: 0.5 }
    }
}

impl MonoOracle {
    pub fn cell_width(&self, style: &TextStyle) -> f32 {
        style.font_size * self.cell_factor
    }

    fn columns(&self, style: &TextStyle, max_width: f32) -> usize {
        let cell = self.cell_width(style);
        if cell <= 0.0 {
            return 1;
        }
        ((max_width / cell).floor() as usize).max(1)
    }
}

fn cells(text: &str) -> usize {
    text.graphemes(true).count()
}

impl LayoutOracle for MonoOracle {
    fn layout(&self, text: &str, style: &TextStyle, max_width: f32) -> Vec<Line> {
        let mut lines = Vec::new();
        if text.is_empty() {
            return lines;
        }
        let line_h = self.line_height_hint(style);
        let cols = self.columns(style, max_width);
        let table = char_byte_table(text);
        let char_len = table.len() - 1;

        let mut line_start = 0usize;
        let mut used = 0usize;
        for t in tokenize(text) {
            let token = slice_chars(text, &table, t.start, t.end);
            let mut word_chars = 0usize;
            for (i, ch) in token.chars().enumerate() {
                if !ch.is_whitespace() {
                    word_chars = i + 1;
                }
            }
            let word_end = t.start + word_chars;
            let word = slice_chars(text, &table, t.start, word_end);
            let word_cells = cells(word);

            if used > 0 && used + word_cells > cols {
                lines.push(Line {
                    start: line_start,
                    height: line_h,
                });
                line_start = t.start;
                used = 0;
            }
            if word_cells > cols {
                // Soft-break an over-wide token; a piece with no inner
                // break opportunity keeps overflowing its own line.
                let mut piece_start = 0usize;
                for (idx, _opp) in linebreaks(word) {
                    let piece = &word[piece_start..idx];
                    if piece.is_empty() {
                        continue;
                    }
                    let piece_cells = cells(piece);
                    if used > 0 && used + piece_cells > cols {
                        lines.push(Line {
                            start: line_start,
                            height: line_h,
                        });
                        line_start = t.start + word[..piece_start].chars().count();
                        used = 0;
                    }
                    used += piece_cells;
                    piece_start = idx;
                }
                // Tail, in case the final opportunity fell short of the end.
                if piece_start < word.len() {
                    let tail = &word[piece_start..];
                    let tail_cells = cells(tail);
                    if used > 0 && used + tail_cells > cols {
                        lines.push(Line {
                            start: line_start,
                            height: line_h,
                        });
                        line_start = t.start + word[..piece_start].chars().count();
                        used = 0;
                    }
                    used += tail_cells;
                }
            } else {
                used += word_cells;
            }

            let ws = slice_chars(text, &table, word_end, t.end);
            used += cells(ws);
            if ws.contains('\n') {
                lines.push(Line {
                    start: line_start,
                    height: line_h,
                });
                line_start = t.end;
                used = 0;
            }
        }
        if line_start < char_len || lines.is_empty() {
            lines.push(Line {
                start: line_start,
                height: line_h,
            });
        }
        lines
    }

    fn line_height_hint(&self, style: &TextStyle) -> f32 {
        style.font_size * style.line_height
    }

    fn character_offset_near(
        &self,
        text: &str,
        style: &TextStyle,
        max_width: f32,
        x: f32,
        y: f32,
    ) -> usize {
        let lines = self.layout(text, style, max_width);
        if lines.is_empty() {
            return 0;
        }
        let char_len = text.chars().count();
        let mut idx = lines.len() - 1;
        let mut top = 0.0f32;
        for (i, line) in lines.iter().enumerate() {
            if y < top + line.height {
                idx = i;
                break;
            }
            top += line.height;
        }
        let start = lines[idx].start;
        let end = lines.get(idx + 1).map(|l| l.start).unwrap_or(char_len);
        let cell = self.cell_width(style);
        let col = if x <= 0.0 || cell <= 0.0 {
            0
        } else {
            (x / cell).floor() as usize
        };
        (start + col).min(end)
    }
}
