use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheRecord, PageStore};
use crate::oracle::LayoutOracle;
use crate::types::{Alignment, Block, Document, TextStyle};

mod block;
pub mod cursor;

use block::{BlockContext, BlockLayout, BlockOutcome, MeasureCache};
pub use cursor::{BlockCursor, Cursor};

/// Everything that affects measurement. Any change to a field produces a
/// different layout key, so stale cache entries are never read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    /// External on-screen inset (keyboard, system bar) reserved at the
    /// viewport bottom.
    pub viewport_inset: f32,
    /// Reader-level style identity the per-block styles derive from.
    pub base_style: TextStyle,
    /// Bottom safety margin as a fraction of the line height.
    pub bottom_margin_factor: f32,
    /// Break-search bias as a fraction of the line height; smaller than the
    /// bottom margin.
    pub break_margin_factor: f32,
    /// Clamp bounds for the bottom margin, as fractions of the page height.
    pub min_bottom_margin: f32,
    pub max_bottom_margin: f32,
    /// Absorbs float rounding in every "fits" comparison.
    pub fit_tolerance: f32,
    /// Image height cap as a fraction of the page height.
    pub max_image_height: f32,
}

impl LayoutConfig {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            viewport_inset: 0.0,
            base_style: TextStyle::default(),
            bottom_margin_factor: 0.8,
            break_margin_factor: 0.4,
            min_bottom_margin: 0.02,
            max_bottom_margin: 0.12,
            fit_tolerance: 0.5,
            max_image_height: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fragment {
    Text {
        text: String,
        style: TextStyle,
        alignment: Alignment,
        spacing_before: f32,
        spacing_after: f32,
    },
    /// Image geometry after aspect-ratio fitting; the bytes stay in the
    /// document and are looked up by block index.
    Image {
        block_index: usize,
        width: f32,
        height: f32,
    },
}

/// The externally visible unit: an ordered fragment list plus the exact
/// global character and token range it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub chapter_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub start_word: usize,
    pub end_word: usize,
    pub fragments: Vec<Fragment>,
}

/// Incremental line-based pagination over one immutable document.
///
/// Pages are appended monotonically and never mutated; the cursor advances
/// until every block is consumed, then the engine stays in its terminal
/// complete state. With a store attached, every successful advance is
/// persisted write-behind, best-effort.
pub struct PaginationEngine<O: LayoutOracle> {
    document: Arc<Document>,
    oracle: O,
    config: LayoutConfig,
    pages: Vec<Page>,
    cursor: Option<Cursor>,
    total_characters: usize,
    block_states: HashMap<usize, BlockLayout>,
    measures: MeasureCache,
    store: Option<PageStore>,
}

impl<O: LayoutOracle> PaginationEngine<O> {
    pub fn new(document: Arc<Document>, oracle: O, config: LayoutConfig) -> Self {
        let cursor = if document.is_empty() {
            None
        } else {
            Some(Cursor::start())
        };
        Self {
            document,
            oracle,
            config,
            pages: Vec::new(),
            cursor,
            total_characters: 0,
            block_states: HashMap::new(),
            measures: MeasureCache::new(),
            store: None,
        }
    }

    /// Builds an engine seeded from a persisted cache entry when one exists
    /// for this document and layout; otherwise starts fresh. The store is
    /// kept for write-behind persistence either way.
    pub fn resume(document: Arc<Document>, oracle: O, config: LayoutConfig, store: PageStore) -> Self {
        let record = store.load(&document.id, &config);
        let mut engine = Self::new(document, oracle, config);
        engine.store = Some(store);
        if let Some(record) = record {
            // A live record must carry a cursor; a completed one may not.
            if record.is_complete || record.cursor.is_some() {
                engine.pages = record.pages;
                engine.total_characters = record.total_characters;
                engine.cursor = if record.is_complete {
                    None
                } else {
                    record.cursor
                };
            }
        }
        engine
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor.is_none()
    }

    /// Characters accounted for so far; once complete this is the document
    /// total. Never decreases.
    pub fn total_characters(&self) -> usize {
        self.total_characters
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn has_next_page(&self, index: usize) -> bool {
        index + 1 < self.pages.len() || self.cursor.is_some()
    }

    pub fn has_previous_page(&self, index: usize) -> bool {
        index > 0
    }

    /// Advances pagination by exactly one page. Returns `None` once every
    /// block is exhausted, flipping the engine to its terminal state.
    pub fn compute_next_page(&mut self) -> Option<&Page> {
        let mut cursor = self.cursor.clone()?;
        let start_char = cursor.char_index;
        let start_word = cursor.word_index;
        let mut fragments: Vec<Fragment> = Vec::new();
        let mut used = 0.0f32;
        let mut chapter: Option<usize> = None;
        let mut complete = false;

        let doc = Arc::clone(&self.document);
        loop {
            let bi = cursor.block_index;
            let Some(block) = doc.block(bi) else {
                complete = true;
                break;
            };
            if chapter.is_none() {
                chapter = Some(block.chapter_index());
            }
            let outcome = match block {
                Block::Text(tb) => {
                    self.ensure_block_state(bi, tb);
                    let layout = match self.block_states.get(&bi) {
                        Some(layout) => layout,
                        None => break,
                    };
                    let mut ctx = BlockContext {
                        oracle: &self.oracle,
                        config: &self.config,
                        measures: &mut self.measures,
                    };
                    ctx.paginate_text(bi, tb, layout, cursor.block, used, !fragments.is_empty())
                }
                Block::Image(ib) => {
                    let mut ctx = BlockContext {
                        oracle: &self.oracle,
                        config: &self.config,
                        measures: &mut self.measures,
                    };
                    ctx.paginate_image(bi, ib, used, !fragments.is_empty())
                }
            };
            match outcome {
                BlockOutcome::Consumed {
                    fragment,
                    height,
                    chars,
                    words,
                } => {
                    if let Some(fragment) = fragment {
                        fragments.push(fragment);
                    }
                    used += height;
                    cursor.char_index += chars;
                    cursor.word_index += words;
                    cursor.block_index += 1;
                    cursor.block = None;
                    self.block_states.remove(&bi);
                }
                BlockOutcome::Split {
                    fragment,
                    cursor: block_cursor,
                    chars,
                    words,
                    ..
                } => {
                    fragments.push(fragment);
                    cursor.char_index += chars;
                    cursor.word_index += words;
                    cursor.block = Some(block_cursor);
                    break;
                }
                BlockOutcome::Defer => break,
            }
        }

        let consumed = cursor.char_index - start_char;
        if consumed == 0 {
            // Nothing left anywhere: terminal state, no further pages.
            self.cursor = None;
            self.block_states.clear();
            self.persist();
            return None;
        }

        let page = Page {
            chapter_index: chapter.unwrap_or(0),
            start_char,
            end_char: cursor.char_index - 1,
            start_word,
            end_word: start_word.max(cursor.word_index.saturating_sub(1)),
            fragments,
        };
        self.total_characters = cursor.char_index;
        self.pages.push(page);
        self.cursor = if complete { None } else { Some(cursor) };
        if complete {
            self.block_states.clear();
        }
        self.persist();
        self.pages.last()
    }

    /// Computes pages until at least `center + radius + 1` exist or the
    /// document is complete.
    pub fn ensure_window(&mut self, center: usize, radius: usize) {
        let target = center.saturating_add(radius);
        while self.pages.len() <= target {
            if self.compute_next_page().is_none() {
                break;
            }
        }
    }

    /// Extends pagination until the page holding `char_index` exists, then
    /// fills `radius` pages beyond it. Returns the page index, or `None`
    /// when the offset lies past the end of the document.
    pub fn ensure_page_for_char(&mut self, char_index: usize, radius: usize) -> Option<usize> {
        while self.cursor.is_some() && self.total_characters <= char_index {
            if self.compute_next_page().is_none() {
                break;
            }
        }
        let index = self.find_page_by_char(char_index)?;
        self.ensure_window(index, radius);
        Some(index)
    }

    /// O(log n) lookup over the computed pages' character ranges.
    pub fn find_page_by_char(&self, char_index: usize) -> Option<usize> {
        let idx = self.pages.partition_point(|p| p.end_char < char_index);
        match self.pages.get(idx) {
            Some(page) if page.start_char <= char_index => Some(idx),
            _ => None,
        }
    }

    /// First page of a chapter. Forces pagination to completion before
    /// concluding "not found".
    pub fn find_page_for_chapter(&mut self, chapter_index: usize) -> Option<usize> {
        if let Some(idx) = self
            .pages
            .iter()
            .position(|p| p.chapter_index == chapter_index)
        {
            return Some(idx);
        }
        while self.compute_next_page().is_some() {
            if let Some(page) = self.pages.last() {
                if page.chapter_index == chapter_index {
                    return Some(self.pages.len() - 1);
                }
            }
        }
        self.pages
            .iter()
            .position(|p| p.chapter_index == chapter_index)
    }

    fn ensure_block_state(&mut self, index: usize, block: &crate::types::TextBlock) {
        if !self.block_states.contains_key(&index) {
            self.block_states.insert(
                index,
                BlockLayout::build(block, &self.oracle, self.config.width),
            );
        }
    }

    fn snapshot(&self) -> CacheRecord {
        CacheRecord {
            layout_key: self.config.layout_key(),
            pages: self.pages.clone(),
            is_complete: self.cursor.is_none(),
            total_characters: self.total_characters,
            cursor: self.cursor.clone(),
        }
    }

    /// Write-behind persistence; failure only risks recomputation on the
    /// next open, so it is logged and swallowed.
    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(&self.document.id, &self.snapshot()) {
            log::warn!("page cache write failed for {}: {err}", self.document.id);
        }
    }
}
