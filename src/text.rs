//! Text layout on top of `embedded-graphics` text renderers.
//!
//! Glyph shaping is left to the [`TextRenderer`] (usually a
//! [`MonoTextStyle`](embedded_graphics::mono_font::MonoTextStyle)); this
//! module only measures strings and places them on the panel.

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{OriginDimensions, Point, Size};
use embedded_graphics::text::renderer::TextRenderer;
use embedded_graphics::text::Baseline;
use heapless::String;

use crate::port::PortMap;
use crate::Panel;

/// Most lines [`layout_multiline_centered`] places. Further lines are
/// dropped.
pub const MAX_TEXT_LINES: usize = 8;

/// Smallest font height used for line spacing, in pixels.
pub const MIN_FONT_HEIGHT: u32 = 8;

/// Width of `text` in pixels when rendered with `style`.
pub fn text_width<S: TextRenderer>(text: &str, style: &S) -> u32 {
    style
        .measure_string(text, Point::zero(), Baseline::Top)
        .bounding_box
        .size
        .width
}

/// Height of a line of `style`, measured on `"Ay"` (cap height plus
/// descender) and never below [`MIN_FONT_HEIGHT`].
pub fn font_height<S: TextRenderer>(style: &S) -> u32 {
    style
        .measure_string("Ay", Point::zero(), Baseline::Top)
        .bounding_box
        .size
        .height
        .max(MIN_FONT_HEIGHT)
}

/// Placement of one line of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLayout<'a> {
    /// The line, without its newline.
    pub text: &'a str,
    /// Top-left corner to draw at with [`Baseline::Top`].
    pub origin: Point,
    /// Measured width in pixels.
    pub width: u32,
}

/// Splits `text` on `'\n'` and centers the lines in `area`.
///
/// Empty lines are skipped. Lines are spaced `font_height - 2` pixels apart,
/// the block is centered vertically and each line horizontally on its own
/// width. Origins never go negative, so text wider or taller than the panel
/// is anchored at the top-left edge and clipped on the far side.
pub fn layout_multiline_centered<'a, S: TextRenderer>(
    text: &'a str,
    style: &S,
    area: Size,
) -> heapless::Vec<LineLayout<'a>, MAX_TEXT_LINES> {
    let mut layout = heapless::Vec::new();
    let lines = || text.split('\n').filter(|line| !line.is_empty()).take(MAX_TEXT_LINES);

    let count = lines().count() as i32;
    if count == 0 {
        return layout;
    }
    let font_height = font_height(style) as i32;
    let spacing = font_height - 2;
    let total = (count - 1) * spacing + font_height;
    let top = ((area.height as i32 - total) / 2).max(0);

    for (i, line) in lines().enumerate() {
        let width = text_width(line, style);
        let x = ((area.width as i32 - width as i32) / 2).max(0);
        let y = top + i as i32 * spacing;
        // at most MAX_TEXT_LINES by construction
        let _ = layout.push(LineLayout {
            text: line,
            origin: Point::new(x, y),
            width,
        });
    }
    layout
}

/// Origin that centers a single line of `width` pixels in `area`.
pub(crate) fn centered_origin<S: TextRenderer>(width: u32, style: &S, area: Size) -> Point {
    let x = (area.width as i32 - width as i32) / 2;
    let y = (area.height as i32 - font_height(style) as i32) / 2;
    Point::new(x.max(0), y.max(0))
}

/// A horizontal marquee.
///
/// The text enters from the right edge and moves `speed` pixels left per
/// [`ScrollingText::step`]. Once it has fully left the panel it starts over
/// from the right edge. `N` is the text capacity in bytes.
///
/// ```rust
/// use embedded_graphics::mono_font::{ascii::FONT_6X10, MonoTextStyle};
/// use embedded_graphics::pixelcolor::BinaryColor;
/// use hub_panel::sim::VirtualPanel;
/// use hub_panel::text::ScrollingText;
/// use hub_panel::{Engine, Panel, PanelConfig};
///
/// static ENGINE: Engine<VirtualPanel> = Engine::new();
///
/// let mut panel = Panel::configure(&ENGINE, PanelConfig::HUB08_64X32, VirtualPanel::new()).unwrap();
/// let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
/// let mut marquee = ScrollingText::<32>::new();
/// marquee.start("HELLO", 2);
/// marquee.step(&mut panel, &style);
/// assert_eq!(marquee.offset(), Some(62));
/// ```
#[derive(Debug, Clone)]
pub struct ScrollingText<const N: usize> {
    text: String<N>,
    speed: u16,
    offset: Option<i32>,
    scrolling: bool,
}

impl<const N: usize> ScrollingText<N> {
    /// A stopped marquee with no text.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            text: String::new(),
            speed: 1,
            offset: None,
            scrolling: false,
        }
    }

    /// Starts scrolling `text` at `speed` pixels per step. Text longer than
    /// `N` bytes is cut at the last whole character that fits.
    pub fn start(&mut self, text: &str, speed: u16) {
        self.text.clear();
        for c in text.chars() {
            if self.text.push(c).is_err() {
                break;
            }
        }
        self.speed = speed.max(1);
        self.offset = None;
        self.scrolling = true;
    }

    /// Stops scrolling. The last drawn frame stays on the panel.
    pub fn stop(&mut self) {
        self.scrolling = false;
    }

    /// Whether [`ScrollingText::step`] draws anything.
    #[must_use]
    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    /// The text being scrolled.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// X position of the next frame, `None` before the first step.
    #[must_use]
    pub fn offset(&self) -> Option<i32> {
        self.offset
    }

    /// Draws one frame at the current offset, publishes it and moves the
    /// text left. Does nothing while stopped.
    pub fn step<P, S>(&mut self, panel: &mut Panel<P>, style: &S)
    where
        P: PortMap + 'static,
        S: TextRenderer<Color = BinaryColor>,
    {
        if !self.scrolling {
            return;
        }
        let area = panel.size();
        let x = *self.offset.get_or_insert(area.width as i32);
        let y = ((area.height as i32 - font_height(style) as i32) / 2).max(0);

        panel.clear();
        let Ok(_) = style.draw_string(&self.text, Point::new(x, y), Baseline::Top, panel);
        panel.swap_buffers(false);

        let width = text_width(&self.text, style) as i32;
        let next = x - i32::from(self.speed);
        self.offset = Some(if next < -width { area.width as i32 } else { next });
    }
}

impl<const N: usize> Default for ScrollingText<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::mono_font::ascii::{FONT_5X7, FONT_6X10};
    use embedded_graphics::mono_font::MonoTextStyle;

    use crate::sim::VirtualPanel;
    use crate::{Engine, PanelConfig};

    fn style() -> MonoTextStyle<'static, BinaryColor> {
        MonoTextStyle::new(&FONT_6X10, BinaryColor::On)
    }

    #[test]
    fn test_measurements() {
        assert_eq!(text_width("AB", &style()), 12);
        assert_eq!(text_width("", &style()), 0);
        assert_eq!(font_height(&style()), 10);
        // 5x7 is below the minimum
        assert_eq!(font_height(&MonoTextStyle::new(&FONT_5X7, BinaryColor::On)), 8);
    }

    #[test]
    fn test_two_lines_centered() {
        let lines = layout_multiline_centered("AB\nCD", &style(), Size::new(64, 32));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "AB");
        assert_eq!(lines[0].origin, Point::new(26, 7));
        assert_eq!(lines[1].origin, Point::new(26, 15));

        // block spans 7..25, same margin above and below
        let bottom = lines[1].origin.y + 10;
        assert_eq!(lines[0].origin.y, 32 - bottom);
        for line in &lines {
            assert_eq!(line.origin.x * 2 + line.width as i32, 64);
        }
    }

    #[test]
    fn test_each_line_centered_on_own_width() {
        let lines = layout_multiline_centered("A\nABCD", &style(), Size::new(64, 32));
        assert_eq!(lines[0].origin.x, 29);
        assert_eq!(lines[1].origin.x, 20);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let lines = layout_multiline_centered("\nAB\n\nCD\n", &style(), Size::new(64, 32));
        let texts: heapless::Vec<&str, 8> = lines.iter().map(|l| l.text).collect();
        assert_eq!(texts, ["AB", "CD"]);
        assert!(layout_multiline_centered("", &style(), Size::new(64, 32)).is_empty());
        assert!(layout_multiline_centered("\n\n", &style(), Size::new(64, 32)).is_empty());
    }

    #[test]
    fn test_overflow_lines_dropped() {
        let lines = layout_multiline_centered("1\n2\n3\n4\n5\n6\n7\n8\n9\n10", &style(), Size::new(64, 32));
        assert_eq!(lines.len(), MAX_TEXT_LINES);
        assert_eq!(lines[7].text, "8");
    }

    #[test]
    fn test_origins_clamped() {
        let lines = layout_multiline_centered(
            "A VERY LONG LINE OF TEXT\nB\nC\nD\nE",
            &style(),
            Size::new(64, 16),
        );
        assert_eq!(lines[0].origin, Point::new(0, 0));
        assert!(lines.iter().all(|l| l.origin.x >= 0 && l.origin.y >= 0));
    }

    #[test]
    fn test_centered_origin() {
        assert_eq!(centered_origin(12, &style(), Size::new(64, 32)), Point::new(26, 11));
        assert_eq!(centered_origin(100, &style(), Size::new(64, 8)), Point::new(0, 0));
    }

    #[test]
    fn test_scrolling_lifecycle() {
        static ENGINE: Engine<VirtualPanel> = Engine::new();
        let mut panel = Panel::configure(&ENGINE, PanelConfig::HUB08_64X32, VirtualPanel::new()).unwrap();
        let mut marquee = ScrollingText::<16>::new();
        assert!(!marquee.is_scrolling());
        marquee.step(&mut panel, &style());
        assert_eq!(marquee.offset(), None);

        marquee.start("AB", 4);
        assert!(marquee.is_scrolling());
        marquee.step(&mut panel, &style());
        assert_eq!(marquee.offset(), Some(60));
        // first frame drew at x = 64, fully off-panel
        assert!(panel.front().as_bytes().iter().all(|&b| b == 0));

        marquee.step(&mut panel, &style());
        assert_eq!(marquee.offset(), Some(56));
        assert!(panel.front().as_bytes().iter().any(|&b| b != 0));

        // run until the text leaves on the left and wraps
        let mut wrapped = false;
        for _ in 0..40 {
            marquee.step(&mut panel, &style());
            if marquee.offset() == Some(64) {
                wrapped = true;
                break;
            }
            assert!(marquee.offset().unwrap() >= -12);
        }
        assert!(wrapped);

        marquee.stop();
        let before = marquee.offset();
        marquee.step(&mut panel, &style());
        assert_eq!(marquee.offset(), before);
    }

    #[test]
    fn test_scrolling_text_truncated_to_capacity() {
        let mut marquee = ScrollingText::<4>::new();
        marquee.start("ABCDEF", 0);
        assert_eq!(marquee.text(), "ABCD");
        marquee.start("\u{e9}\u{e9}\u{e9}", 1);
        assert_eq!(marquee.text(), "\u{e9}\u{e9}");
    }
}
