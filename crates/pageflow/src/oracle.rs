use crate::types::TextStyle;

pub mod mono;

/// One visual line of a text run laid out at a fixed width: its starting
/// character offset within the run and its height. Line starts are strictly
/// increasing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: usize,
    pub height: f32,
}

/// External text-layout capability the pagination engine measures with.
/// Implementations must be deterministic: identical inputs produce
/// identical line metrics.
pub trait LayoutOracle {
    /// Lays out `text` at `max_width` and reports its visual lines.
    fn layout(&self, text: &str, style: &TextStyle, max_width: f32) -> Vec<Line>;

    /// Height of a single line of `style`, usable before full layout.
    fn line_height_hint(&self, style: &TextStyle) -> f32;

    /// Character offset nearest the visual point `(x, y)` of `text` laid
    /// out at `max_width`. Out-of-bounds points clamp to the nearest line.
    fn character_offset_near(
        &self,
        text: &str,
        style: &TextStyle,
        max_width: f32,
        x: f32,
        y: f32,
    ) -> usize;
}

impl<T: LayoutOracle + ?Sized> LayoutOracle for &T {
    fn layout(&self, text: &str, style: &TextStyle, max_width: f32) -> Vec<Line> {
        (**self).layout(text, style, max_width)
    }

    fn line_height_hint(&self, style: &TextStyle) -> f32 {
        (**self).line_height_hint(style)
    }

    fn character_offset_near(
        &self,
        text: &str,
        style: &TextStyle,
        max_width: f32,
        x: f32,
        y: f32,
    ) -> usize {
        (**self).character_offset_near(text, style, max_width, x, y)
    }
}
