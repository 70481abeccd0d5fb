use std::num::NonZeroUsize;

use lru::LruCache;

use super::cursor::BlockCursor;
use super::{Fragment, LayoutConfig};
use crate::oracle::{LayoutOracle, Line};
use crate::tokens::{
    boundary_after, char_byte_table, index_at, prev_boundary, slice_chars, snap_forward, tokenize,
    Token,
};
use crate::types::{ImageBlock, TextBlock};

/// Lazily built layout state for one text block: full-width line metrics,
/// tokens, and the char-to-byte table for slicing. Dropped once the block
/// is fully consumed.
pub(crate) struct BlockLayout {
    pub lines: Vec<Line>,
    pub tokens: Vec<Token>,
    table: Vec<usize>,
}

impl BlockLayout {
    pub fn build<O: LayoutOracle>(block: &TextBlock, oracle: &O, width: f32) -> Self {
        Self {
            lines: oracle.layout(&block.text, &block.style, width),
            tokens: tokenize(&block.text),
            table: char_byte_table(&block.text),
        }
    }

    pub fn char_len(&self) -> usize {
        self.table.len() - 1
    }

    pub fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        slice_chars(text, &self.table, start, end)
    }
}

/// Result of asking one block for the next page fragment.
pub(crate) enum BlockOutcome {
    /// Block fully consumed; the page still has room.
    Consumed {
        fragment: Option<Fragment>,
        height: f32,
        chars: usize,
        words: usize,
    },
    /// The page ends inside this block; resume from `cursor`.
    Split {
        fragment: Fragment,
        cursor: BlockCursor,
        height: f32,
        chars: usize,
        words: usize,
    },
    /// No room for any of this block on the current page; retry on the
    /// next one. Only returned when the page already holds content.
    Defer,
}

type MeasureKey = (usize, usize, usize, bool, bool);

/// Bounded memo for whole-substring remeasures; replaces per-block mutable
/// height caches with state owned by the engine.
pub(crate) struct MeasureCache {
    inner: LruCache<MeasureKey, f32>,
}

const MEASURE_CACHE_CAP: usize = 512;

impl MeasureCache {
    pub fn new() -> Self {
        let cap = NonZeroUsize::new(MEASURE_CACHE_CAP).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
        }
    }
}

pub(crate) struct BlockContext<'a, O: LayoutOracle> {
    pub oracle: &'a O,
    pub config: &'a LayoutConfig,
    pub measures: &'a mut MeasureCache,
}

impl<'a, O: LayoutOracle> BlockContext<'a, O> {
    /// Fresh whole-substring measurement of `[start, end)` of the block,
    /// including the requested spacings.
    fn measure_text(
        &mut self,
        block_index: usize,
        block: &TextBlock,
        layout: &BlockLayout,
        start: usize,
        end: usize,
        with_before: bool,
        with_after: bool,
    ) -> f32 {
        let key = (block_index, start, end, with_before, with_after);
        if let Some(h) = self.measures.inner.get(&key) {
            return *h;
        }
        let sub = layout.slice(&block.text, start, end);
        let lines = self.oracle.layout(sub, &block.style, self.config.width);
        let mut height: f32 = lines.iter().map(|l| l.height).sum();
        if with_before {
            height += block.spacing_before;
        }
        if with_after {
            height += block.spacing_after;
        }
        self.measures.inner.put(key, height);
        height
    }

    pub fn paginate_text(
        &mut self,
        block_index: usize,
        block: &TextBlock,
        layout: &BlockLayout,
        cursor: Option<BlockCursor>,
        used_height: f32,
        page_has_content: bool,
    ) -> BlockOutcome {
        let char_len = layout.char_len();
        if char_len == 0 || layout.tokens.is_empty() || layout.lines.is_empty() {
            // Degenerate block: complete it with zero fragments, but keep
            // the counters exact.
            return BlockOutcome::Consumed {
                fragment: None,
                height: 0.0,
                chars: char_len,
                words: layout.tokens.len(),
            };
        }

        let cur = cursor.unwrap_or(BlockCursor {
            line_index: 0,
            text_offset: 0,
            token_index: 0,
        });
        let first_fragment = cur.text_offset == 0;
        let line_h = self.oracle.line_height_hint(&block.style);
        let effective = self.effective_height(line_h, block.spacing_after);
        let tol = self.config.fit_tolerance;

        let mut acc = used_height;
        if first_fragment {
            acc += block.spacing_before;
        }
        // Not even one line fits in the remainder of a non-empty page.
        if page_has_content && acc + line_h > effective + tol {
            return BlockOutcome::Defer;
        }

        let lines = &layout.lines;
        let mut idx = cur.line_index;
        let mut taken = 0usize;
        while idx < lines.len() {
            let lh = lines[idx].height;
            if acc + lh > effective + tol && (page_has_content || taken > 0) {
                return self.split_at_line(
                    block_index,
                    block,
                    layout,
                    cur,
                    idx,
                    used_height,
                    effective,
                    line_h,
                    first_fragment,
                );
            }
            // An over-tall line on an otherwise empty page is taken anyway;
            // shrink-to-fit deals with it at the next break.
            acc += lh;
            idx += 1;
            taken += 1;
        }

        // Block exhausted on its last line: finalize with trailing spacing.
        let end = char_len;
        let height =
            self.measure_text(block_index, block, layout, cur.text_offset, end, first_fragment, true);
        let fragment = self.text_fragment(block, layout, cur.text_offset, end, first_fragment);
        BlockOutcome::Consumed {
            fragment: Some(fragment),
            height,
            chars: end - cur.text_offset,
            words: layout.tokens.len() - cur.token_index.min(layout.tokens.len()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn split_at_line(
        &mut self,
        block_index: usize,
        block: &TextBlock,
        layout: &BlockLayout,
        cur: BlockCursor,
        overflow_idx: usize,
        used_height: f32,
        effective: f32,
        line_h: f32,
        first_fragment: bool,
    ) -> BlockOutcome {
        let lines = &layout.lines;
        let tokens = &layout.tokens;
        let char_len = layout.char_len();
        let page_start = cur.text_offset;
        let tol = self.config.fit_tolerance;

        // Bias the break slightly above the overflowing line so the last
        // visible line never sits flush against the page edge.
        let raw_candidate = if overflow_idx == 0 {
            lines[0].start
        } else {
            let overflow_top: f32 = lines[..overflow_idx].iter().map(|l| l.height).sum();
            let break_margin = line_h * self.config.break_margin_factor;
            self.oracle.character_offset_near(
                &block.text,
                &block.style,
                self.config.width,
                0.0,
                overflow_top - break_margin,
            )
        };

        // Never split a token: snap forward to a boundary, falling back to
        // the raw line start, then to forced single-token progress.
        let forced = boundary_after(tokens, page_start, char_len);
        let mut end = snap_forward(tokens, raw_candidate);
        if end <= page_start {
            end = lines[overflow_idx].start;
        }
        if end <= page_start {
            end = forced;
        }

        // Shrink-to-fit: retract token by token while a fresh remeasure of
        // the candidate substring still overflows.
        loop {
            let h = self.measure_text(block_index, block, layout, page_start, end, first_fragment, false);
            if used_height + h <= effective + tol {
                break;
            }
            match prev_boundary(tokens, end) {
                Some(b) if b > page_start => end = b,
                // The line estimate and the remeasure disagree all the way
                // down; push one token through and accept the overflow.
                _ => {
                    end = forced;
                    break;
                }
            }
        }

        if end >= char_len {
            let height =
                self.measure_text(block_index, block, layout, page_start, char_len, first_fragment, true);
            let fragment = self.text_fragment(block, layout, page_start, char_len, first_fragment);
            return BlockOutcome::Consumed {
                fragment: Some(fragment),
                height,
                chars: char_len - page_start,
                words: tokens.len() - cur.token_index.min(tokens.len()),
            };
        }

        let height = self.measure_text(block_index, block, layout, page_start, end, first_fragment, false);
        let fragment = self.text_fragment(block, layout, page_start, end, first_fragment);
        let next = BlockCursor {
            line_index: lines.partition_point(|l| l.start <= end).saturating_sub(1),
            text_offset: end,
            token_index: index_at(tokens, end),
        };
        BlockOutcome::Split {
            fragment,
            cursor: next,
            height,
            chars: end - page_start,
            words: next.token_index.saturating_sub(cur.token_index),
        }
    }

    fn text_fragment(
        &self,
        block: &TextBlock,
        layout: &BlockLayout,
        start: usize,
        end: usize,
        first_fragment: bool,
    ) -> Fragment {
        Fragment::Text {
            text: layout.slice(&block.text, start, end).to_string(),
            style: block.style.clone(),
            alignment: block.alignment,
            spacing_before: if first_fragment {
                block.spacing_before
            } else {
                0.0
            },
            spacing_after: if end == layout.char_len() {
                block.spacing_after
            } else {
                0.0
            },
        }
    }

    /// Reserve room above the viewport bottom so the last visible line is
    /// never clipped by an inset.
    fn effective_height(&self, line_h: f32, spacing_after: f32) -> f32 {
        let cfg = self.config;
        let raw = line_h * cfg.bottom_margin_factor + spacing_after + cfg.viewport_inset;
        let bottom = raw.clamp(
            cfg.min_bottom_margin * cfg.height,
            cfg.max_bottom_margin * cfg.height,
        );
        cfg.height - bottom
    }

    pub fn paginate_image(
        &mut self,
        block_index: usize,
        block: &ImageBlock,
        used_height: f32,
        page_has_content: bool,
    ) -> BlockOutcome {
        let cfg = self.config;
        let tol = cfg.fit_tolerance;
        let max_h = cfg.max_image_height * cfg.height;
        let w = block.width.max(1.0);
        let h = block.height.max(1.0);
        // Fit within the page width and the image height cap, never
        // upscaling past intrinsic size.
        let scale = (cfg.width / w).min(max_h / h).min(1.0);
        let mut fitted_w = w * scale;
        let mut fitted_h = h * scale;

        let needed = block.spacing_before + fitted_h + block.spacing_after;
        let available = cfg.height - used_height;
        if needed > available + tol {
            if page_has_content {
                return BlockOutcome::Defer;
            }
            // Empty page: clamp to what the page can hold.
            let clamped = available - block.spacing_before - block.spacing_after;
            if clamped <= 0.0 {
                // Unplaceable even alone; skip it but keep the counters
                // moving so offsets stay gap-free.
                return BlockOutcome::Consumed {
                    fragment: None,
                    height: 0.0,
                    chars: 1,
                    words: 1,
                };
            }
            fitted_w *= clamped / fitted_h;
            fitted_h = clamped;
        }

        BlockOutcome::Consumed {
            fragment: Some(Fragment::Image {
                block_index,
                width: fitted_w,
                height: fitted_h,
            }),
            height: block.spacing_before + fitted_h + block.spacing_after,
            chars: 1,
            words: 1,
        }
    }
}
