// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The drawing collaborators windows render through
//!
//! A [`Gfx`] performs the actual drawing and is only borrowed for the duration of a draw.  A
//! [`TextDrawer`] holds the text of one run of a window and knows how to measure and draw it.

use std::fmt;
use std::rc::Rc;

use crate::attributes::{
    FlashControl, PenAttributes, PenEdge, PenSize, PrintDirection, WindowBorder, WindowJustify,
};
use crate::window::{FontGroup, FontSize};

/// The maximum number of characters in a single text run
pub const MAX_RUN_CHARACTERS: usize = 32;

/// Extra size taken by glyph edges
pub const SHADOW_EDGE: i32 = 2;

/// A position in pixels
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Point {
    /// Horizontal position
    pub x: i32,
    /// Vertical position
    pub y: i32,
}

impl Point {
    /// Construct a new [`Point`]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A size in pixels
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Dimensions {
    /// Width
    pub w: i32,
    /// Height
    pub h: i32,
}

impl Dimensions {
    /// Construct a new [`Dimensions`]
    pub fn new(w: i32, h: i32) -> Self {
        Self { w, h }
    }
}

/// A renderer for caption windows
pub trait Gfx {
    /// Fill a rectangle with an ARGB color
    fn draw_background(&mut self, point: Point, dimensions: Dimensions, argb: u32);
    /// Fill a window rectangle and draw its border
    fn draw_border(
        &mut self,
        point: Point,
        dimensions: Dimensions,
        fill: u32,
        border: u32,
        border_type: WindowBorder,
    );
    /// Draw text inside a rectangle with the provided pen
    fn draw_text(&mut self, point: Point, dimensions: Dimensions, text: &str, pen: &PenAttributes);
    /// Draw an underline rectangle
    fn draw_underline(&mut self, point: Point, dimensions: Dimensions, argb: u32);
    /// Push everything drawn so far to the screen
    fn update(&mut self);
    /// Erase everything
    fn clear(&mut self);
    /// Make the caption surface visible
    fn show(&mut self);
    /// Make the caption surface invisible
    fn hide(&mut self);
}

impl<G: Gfx + ?Sized> Gfx for &mut G {
    fn draw_background(&mut self, point: Point, dimensions: Dimensions, argb: u32) {
        (**self).draw_background(point, dimensions, argb)
    }
    fn draw_border(
        &mut self,
        point: Point,
        dimensions: Dimensions,
        fill: u32,
        border: u32,
        border_type: WindowBorder,
    ) {
        (**self).draw_border(point, dimensions, fill, border, border_type)
    }
    fn draw_text(&mut self, point: Point, dimensions: Dimensions, text: &str, pen: &PenAttributes) {
        (**self).draw_text(point, dimensions, text, pen)
    }
    fn draw_underline(&mut self, point: Point, dimensions: Dimensions, argb: u32) {
        (**self).draw_underline(point, dimensions, argb)
    }
    fn update(&mut self) {
        (**self).update()
    }
    fn clear(&mut self) {
        (**self).clear()
    }
    fn show(&mut self) {
        (**self).show()
    }
    fn hide(&mut self) {
        (**self).hide()
    }
}

/// The text of a single run within a window
pub trait TextDrawer: fmt::Debug {
    /// Append text.  Nothing is appended once the run holds `min(32, col_count)` characters.
    fn report(&mut self, text: &str, col_count: u8);
    /// Remove all text
    fn clear(&mut self);
    /// Whether there is anything to draw
    fn drawable(&self) -> bool;
    /// Pad with spaces until the run is `column` characters long
    fn set_column(&mut self, column: i32);
    /// Append a space whose background is not drawn
    fn transparent_space(&mut self);
    /// The size of the text when printed in `direction`
    fn dimensions(&self, direction: PrintDirection) -> Dimensions;
    /// Draw the text at `point`.  `padding` extends the background of the last glyph.
    fn draw(
        &self,
        gfx: &mut dyn Gfx,
        point: Point,
        direction: PrintDirection,
        justify: WindowJustify,
        padding: i32,
    );
    /// Set the pen of this run
    fn set_pen_attributes(&mut self, attrs: &PenAttributes);
    /// The pen of this run
    fn pen_attributes(&self) -> PenAttributes;
    /// Mark the pen as explicitly overridden
    fn set_pen_override(&mut self, mid_row: bool);
    /// Whether the pen was explicitly overridden
    fn pen_override(&self) -> bool;
    /// Remove the last character.  Returns whether a character was removed.
    fn backspace(&mut self) -> bool;
    /// The height of a line of text
    fn font_height(&self) -> i32;
    /// The widest advance of a single character
    fn max_advance(&self) -> i32;
    /// The width full justification spreads the text over
    fn set_max_width(&mut self, width: i32);
    /// The text of the run
    fn text(&self) -> &str;
    /// Show or hide flashing text
    fn set_flash_state(&mut self, state: FlashControl);
}

/// Creates the [`TextDrawer`] used for each new text run
pub type TextDrawerFactory = Rc<dyn Fn(&FontGroup) -> Box<dyn TextDrawer>>;

/// A [`TextDrawerFactory`] producing [`CellTextDrawer`]s
pub fn cell_text_drawer_factory() -> TextDrawerFactory {
    Rc::new(|fonts: &FontGroup| Box::new(CellTextDrawer::new(*fonts)) as Box<dyn TextDrawer>)
}

/// A [`TextDrawer`] measuring text on a fixed character cell
#[derive(Debug, Clone)]
pub struct CellTextDrawer {
    fonts: FontGroup,
    font: FontSize,
    text: String,
    transparent: Vec<bool>,
    attrs: PenAttributes,
    overridden: bool,
    flash_state: FlashControl,
    max_width: i32,
}

impl CellTextDrawer {
    /// Construct a new [`CellTextDrawer`] using the provided font metrics
    pub fn new(fonts: FontGroup) -> Self {
        Self {
            fonts,
            font: fonts.standard,
            text: String::new(),
            transparent: vec![],
            attrs: PenAttributes::default(),
            overridden: false,
            flash_state: FlashControl::Show,
            max_width: 0,
        }
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn edge_offsets(&self) -> (Point, Dimensions) {
        match self.attrs.edge_type {
            PenEdge::Raised => (
                Point::new(-SHADOW_EDGE, -SHADOW_EDGE),
                Dimensions::new(SHADOW_EDGE, SHADOW_EDGE),
            ),
            PenEdge::Depressed => (
                Point::new(SHADOW_EDGE, SHADOW_EDGE),
                Dimensions::new(SHADOW_EDGE, SHADOW_EDGE),
            ),
            PenEdge::LeftDropShadow => (Point::new(-SHADOW_EDGE, 0), Dimensions::new(SHADOW_EDGE, 0)),
            PenEdge::RightDropShadow => (Point::new(SHADOW_EDGE, 0), Dimensions::new(SHADOW_EDGE, 0)),
            PenEdge::Uniform => (
                Point::new(-SHADOW_EDGE / 2, -SHADOW_EDGE / 2),
                Dimensions::new(SHADOW_EDGE, SHADOW_EDGE),
            ),
            PenEdge::None => (Point::default(), Dimensions::default()),
        }
    }

    /// Split into runs of whitespace and non-whitespace, with the index of their last character
    fn tokens(&self) -> Vec<(&str, usize)> {
        let mut tokens = vec![];
        let mut start = 0;
        let mut chars = 0;
        let mut white = None;
        for (idx, c) in self.text.char_indices() {
            let is_white = c.is_whitespace();
            if white.is_some_and(|w| w != is_white) {
                tokens.push((&self.text[start..idx], chars - 1));
                start = idx;
            }
            white = Some(is_white);
            chars += 1;
        }
        if start < self.text.len() {
            tokens.push((&self.text[start..], chars - 1));
        }
        tokens
    }
}

impl TextDrawer for CellTextDrawer {
    fn report(&mut self, text: &str, col_count: u8) {
        let max = MAX_RUN_CHARACTERS.min(col_count as usize);
        if self.char_count() < max {
            self.text.push_str(text);
        }
        trace!("run text now {:?}", self.text);
    }

    fn clear(&mut self) {
        self.text.clear();
        self.transparent.clear();
    }

    fn drawable(&self) -> bool {
        !self.text.is_empty()
    }

    fn set_column(&mut self, column: i32) {
        let len = self.char_count() as i32;
        for _ in len..column {
            self.text.push(' ');
        }
    }

    fn transparent_space(&mut self) {
        self.text.push(' ');
        let len = self.char_count();
        self.transparent.resize(len, false);
        if let Some(last) = self.transparent.last_mut() {
            *last = true;
        }
    }

    fn dimensions(&self, direction: PrintDirection) -> Dimensions {
        let chars = self.char_count() as i32;
        let mut dims = if direction.is_horizontal() {
            Dimensions::new(chars * self.font.max_advance, self.font.font_height)
        } else {
            Dimensions::new(self.font.max_advance, chars * self.font.font_height)
        };
        let (_, extra) = self.edge_offsets();
        dims.w += extra.w;
        dims.h += extra.h;
        dims
    }

    fn draw(
        &self,
        gfx: &mut dyn Gfx,
        point: Point,
        direction: PrintDirection,
        justify: WindowJustify,
        padding: i32,
    ) {
        let (offset, extra) = self.edge_offsets();
        let point = Point::new(point.x + offset.x, point.y + offset.y);
        let colors = self.attrs.pen_color;
        let height = self.font.font_height;
        let advance = self.font.max_advance;
        debug!(
            "drawing {:?} at {},{} fg {:#010x} bg {:#010x}",
            self.text, point.x, point.y, colors.fg_color, colors.bg_color
        );

        let tokens = self.tokens();
        let (white_count, text_width) =
            tokens
                .iter()
                .fold((0, 0), |(white, width), (token, _)| {
                    if token.starts_with(char::is_whitespace) {
                        (white + 1, width)
                    } else {
                        (white, width + token.chars().count() as i32 * advance)
                    }
                });
        let white_width = (self.max_width - text_width) / white_count.max(1);
        let text_visible = !self.attrs.flashing || self.flash_state == FlashControl::Show;

        let (mut x, mut y) = (point.x, point.y);
        let last = tokens.len().saturating_sub(1);
        for (idx, (token, last_char)) in tokens.iter().enumerate() {
            let glyphs = token.chars().count() as i32;
            let is_white = token.starts_with(char::is_whitespace);
            let mut width = glyphs * advance;
            if is_white && justify == WindowJustify::Full {
                width = white_width;
            }
            if idx == last {
                width += padding;
            }

            let dims = if direction.is_horizontal() {
                Dimensions::new(width + extra.w, height + extra.h)
            } else {
                Dimensions::new(advance, glyphs * height)
            };
            if !self.transparent.get(*last_char).copied().unwrap_or(false) {
                gfx.draw_background(Point::new(x - offset.x, y - offset.y), dims, colors.bg_color);
            }
            if text_visible {
                gfx.draw_text(Point::new(x, y), dims, token, &self.attrs);
                if self.attrs.underline {
                    let thickness = (height / 16).max(1);
                    gfx.draw_underline(
                        Point::new(x, y + height - 2 * thickness),
                        Dimensions::new(dims.w, thickness),
                        colors.fg_color,
                    );
                }
            }

            if direction.is_horizontal() {
                x += width;
            } else {
                y += glyphs * height;
            }
        }
    }

    fn set_pen_attributes(&mut self, attrs: &PenAttributes) {
        self.font = match attrs.pen_size {
            PenSize::Small => self.fonts.small,
            PenSize::Standard => self.fonts.standard,
            PenSize::Large => self.fonts.large,
            PenSize::ExtraLarge => self.fonts.extra_large,
        };
        self.attrs = *attrs;
    }

    fn pen_attributes(&self) -> PenAttributes {
        self.attrs
    }

    fn set_pen_override(&mut self, _mid_row: bool) {
        self.overridden = true;
    }

    fn pen_override(&self) -> bool {
        self.overridden
    }

    fn backspace(&mut self) -> bool {
        if self.text.pop().is_some() {
            let len = self.char_count();
            self.transparent.truncate(len);
            true
        } else {
            false
        }
    }

    fn font_height(&self) -> i32 {
        self.font.font_height
    }

    fn max_advance(&self) -> i32 {
        self.font.max_advance
    }

    fn set_max_width(&mut self, width: i32) {
        self.max_width = width;
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn set_flash_state(&mut self, state: FlashControl) {
        if self.attrs.flashing {
            self.flash_state = state;
        }
    }
}
