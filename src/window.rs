// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;

use crate::attributes::{
    AnchorPoint, FlashControl, PenAttributes, PenColor, PenSize, PenTextTag, PrintDirection,
    ScrollDirection, WindowAttributes, WindowDefinition, WindowJustify,
};
use crate::gfx::{Dimensions, Gfx, Point, TextDrawer, TextDrawerFactory};

/// The maximum number of text runs kept by a window
const MAX_RUNS: usize = 12;

/// Space kept between text and the edge of its window
pub const HORIZONTAL_MARGIN: i32 = 5;

/// The cell of a single font size
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FontSize {
    /// The widest advance of a character
    pub max_advance: i32,
    /// The height of a line
    pub font_height: i32,
}

impl FontSize {
    const fn new(max_advance: i32, font_height: i32) -> Self {
        Self {
            max_advance,
            font_height,
        }
    }
}

/// The fonts used for each [`PenSize`]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FontGroup {
    /// [`PenSize::Small`]
    pub small: FontSize,
    /// [`PenSize::Standard`]
    pub standard: FontSize,
    /// [`PenSize::Large`]
    pub large: FontSize,
    /// [`PenSize::ExtraLarge`]
    pub extra_large: FontSize,
}

impl FontGroup {
    /// The font for `size`
    pub fn font(&self, size: PenSize) -> FontSize {
        match size {
            PenSize::Small => self.small,
            PenSize::Standard => self.standard,
            PenSize::Large => self.large,
            PenSize::ExtraLarge => self.extra_large,
        }
    }
}

const DEFAULT_FONTS: FontGroup = FontGroup {
    small: FontSize::new(15, 24),
    standard: FontSize::new(30, 48),
    large: FontSize::new(25, 40),
    extra_large: FontSize::new(8, 12),
};

/// The surface windows are positioned on
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScreenInfo {
    /// Width of the surface
    pub width: i32,
    /// Height of the surface
    pub height: i32,
    /// Width of the area captions are placed in
    pub safe_width: i32,
    /// Height of the area captions are placed in
    pub safe_height: i32,
    /// The number of horizontal anchor positions
    pub width_segments: i32,
    /// The number of vertical anchor positions
    pub height_segments: i32,
    /// The fonts
    pub fonts: FontGroup,
}

impl ScreenInfo {
    /// The default surface for CEA-708 captions
    pub fn cea708() -> Self {
        Self {
            width: 1280,
            height: 720,
            safe_width: 1050,
            safe_height: 600,
            width_segments: 210,
            height_segments: 75,
            fonts: DEFAULT_FONTS,
        }
    }

    /// The default surface for CEA-608 captions
    pub fn cea608() -> Self {
        Self {
            width_segments: 32,
            height_segments: 15,
            ..Self::cea708()
        }
    }
}

struct TextRun {
    row: i32,
    column: i32,
    padding: i32,
    drawer: Box<dyn TextDrawer>,
}

impl fmt::Debug for TextRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextRun")
            .field("row", &self.row)
            .field("column", &self.column)
            .field("text", &self.drawer.text())
            .finish()
    }
}

#[derive(Debug, Copy, Clone)]
struct Rect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

/// A caption window and the text runs written into it
pub struct Window {
    def: WindowDefinition,
    runs: Vec<TextRun>,
    fonts: FontGroup,
    factory: TextDrawerFactory,
    cea608: bool,
    changed: bool,
    visibility_changed: bool,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("def", &self.def)
            .field("runs", &self.runs)
            .field("cea608", &self.cea608)
            .field("changed", &self.changed)
            .finish()
    }
}

impl Window {
    pub(crate) fn new(
        def: WindowDefinition,
        fonts: FontGroup,
        factory: TextDrawerFactory,
        cea608: bool,
    ) -> Self {
        Self {
            def,
            runs: vec![],
            fonts,
            factory,
            cea608,
            changed: false,
            visibility_changed: false,
        }
    }

    /// The window identifier
    pub fn id(&self) -> u8 {
        self.def.id
    }

    /// The current definition, including the current pen and window style
    pub fn definition(&self) -> &WindowDefinition {
        &self.def
    }

    /// Whether the window is visible
    pub fn is_visible(&self) -> bool {
        self.def.visible
    }

    pub(crate) fn is_cea608(&self) -> bool {
        self.cea608
    }

    /// Whether the window changed since it was last drawn
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Whether the visibility changed since the window was last drawn
    pub fn visibility_changed(&self) -> bool {
        self.visibility_changed
    }

    /// The text of all runs.  Runs on different rows are separated by a newline.
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::*;
    /// # use std::rc::Rc;
    /// let mut windows = WindowController::new(Rc::new(ManualClock::default()));
    /// windows.define_window(&WindowDefinition {
    ///     row_count: 2,
    ///     col_count: 32,
    ///     ..Default::default()
    /// });
    /// windows.report("first");
    /// windows.carriage_return();
    /// windows.report("second");
    /// assert_eq!(windows.window(0).unwrap().text(), "first\nsecond");
    /// ```
    pub fn text(&self) -> String {
        let mut text = String::new();
        let mut last_row = None;
        for run in self.runs.iter().filter(|run| run.drawer.drawable()) {
            if last_row.is_some_and(|row| row != run.row) {
                text.push('\n');
            }
            text.push_str(run.drawer.text());
            last_row = Some(run.row);
        }
        text
    }

    /// The position and text of each run, oldest first
    pub fn runs(&self) -> impl Iterator<Item = (i32, i32, &str)> + '_ {
        self.runs
            .iter()
            .map(|run| (run.row, run.column, run.drawer.text()))
    }

    /// The text written on `row`
    pub fn row_text(&self, row: i32) -> String {
        self.runs
            .iter()
            .filter(|run| run.row == row)
            .map(|run| run.drawer.text())
            .collect()
    }

    pub(crate) fn update(&mut self, def: &WindowDefinition) {
        if self.def.id != def.id {
            error!("Incorrect window id {}, expected {}", def.id, self.def.id);
            return;
        }

        if self.def != *def {
            self.def = *def;
            self.changed = true;
            debug!("window {} updated", self.def.id);
        }

        if self.runs.len() > MAX_RUNS {
            let excess = self.runs.len() - MAX_RUNS;
            self.runs.drain(..excess);
        }
    }

    fn push_run(&mut self, row: i32, column: i32) -> &mut TextRun {
        let mut drawer = (self.factory)(&self.fonts);
        drawer.set_pen_attributes(&self.def.pen_style);
        self.runs.push(TextRun {
            row,
            column,
            padding: 0,
            drawer,
        });
        let last = self.runs.len() - 1;
        &mut self.runs[last]
    }

    fn ensure_run(&mut self) -> &mut TextRun {
        if self.runs.is_empty() {
            let row = if self.def.win_style.scroll_direction == ScrollDirection::BottomTop {
                self.def.row_count as i32 - 1
            } else {
                0
            };
            return self.push_run(row, 0);
        }
        let last = self.runs.len() - 1;
        &mut self.runs[last]
    }

    fn cursor(&mut self) -> Point {
        let run = self.ensure_run();
        Point::new(
            run.column + run.drawer.text().chars().count() as i32,
            run.row,
        )
    }

    fn ignore_column(&self) -> bool {
        self.def.win_style.justify != WindowJustify::Left
            && self.def.win_style.print_direction.is_horizontal()
    }

    pub(crate) fn report(&mut self, text: &str) {
        if self.def.pen_style.text_tag == PenTextTag::NotToBeDisplayed {
            trace!("window {} ignoring text not to be displayed", self.def.id);
            return;
        }
        self.changed = true;
        let col_count = self.def.col_count;
        self.ensure_run().drawer.report(text, col_count);
    }

    pub(crate) fn transparent_space(&mut self) {
        self.ensure_run().drawer.transparent_space();
    }

    pub(crate) fn carriage_return(&mut self) {
        self.changed = true;
        let run = self.ensure_run();
        let (row, column) = (run.row, run.column);
        match self.def.win_style.scroll_direction {
            ScrollDirection::BottomTop => self.scroll(row + 1, 0),
            ScrollDirection::TopBottom => self.scroll(row - 1, 0),
            ScrollDirection::LeftRight => self.scroll(0, column - 1),
            ScrollDirection::RightLeft => self.scroll(0, column + 1),
        }
    }

    fn scroll(&mut self, row: i32, column: i32) {
        let direction = self.def.win_style.scroll_direction;
        let row_count = self.def.row_count as i32;
        let col_count = self.def.col_count as i32;
        // how far the new run lies outside the window, rows left behind by a smaller
        // redefinition included
        let overflow = match direction {
            ScrollDirection::BottomTop => row - row_count + 1,
            ScrollDirection::TopBottom => -row,
            ScrollDirection::RightLeft => column - col_count + 1,
            ScrollDirection::LeftRight => -column,
        }
        .max(0);
        trace!("scroll to row {row} column {column} {direction:?}, overflow {overflow}");

        self.push_run(row, column);

        if overflow > 0 {
            for run in self.runs.iter_mut() {
                match direction {
                    ScrollDirection::BottomTop => run.row -= overflow,
                    ScrollDirection::TopBottom => run.row += overflow,
                    ScrollDirection::RightLeft => run.column -= overflow,
                    ScrollDirection::LeftRight => run.column += overflow,
                }
            }
        }

        self.runs.retain(|run| {
            (0..row_count).contains(&run.row) && (0..col_count).contains(&run.column)
        });
    }

    pub(crate) fn horizontal_carriage_return(&mut self) {
        self.changed = true;
        let run = self.ensure_run();
        run.drawer.clear();
        let (row, column) = (run.row, run.column);
        self.set_pen_location(row, column);
    }

    pub(crate) fn backspace(&mut self) {
        for run in self.runs.iter_mut().rev() {
            if run.drawer.backspace() {
                self.changed = true;
                return;
            }
        }
    }

    pub(crate) fn set_pen_location(&mut self, row: i32, column: i32) {
        debug!(
            "window {} pen location {row},{column} ({}x{})",
            self.def.id, self.def.row_count, self.def.col_count
        );
        if row < 0
            || column < 0
            || row >= self.def.row_count as i32
            || column >= self.def.col_count as i32
        {
            return;
        }

        let ignore_column = self.ignore_column();
        let run = self.ensure_run();
        if !run.drawer.drawable() {
            run.row = row;
        }

        if row == run.row {
            if ignore_column {
                return;
            }
            // moving backwards starts a new run drawn over the existing text
            if column < self.cursor().x {
                self.push_run(row, column);
            }
            let run = self.ensure_run();
            if run.drawer.drawable() {
                let offset = column - run.column;
                run.drawer.set_column(offset);
            } else {
                run.column = column;
            }
        } else {
            let column = if ignore_column { 0 } else { column };
            self.push_run(row, column);
        }
    }

    pub(crate) fn set_tab_offset(&mut self, offset: u8) {
        let cursor = self.cursor();
        self.set_pen_location(cursor.y, cursor.x + offset as i32);
    }

    pub(crate) fn set_window_attributes(&mut self, attrs: &WindowAttributes) {
        self.changed = self.def.visible;
        if attrs.print_direction != self.def.win_style.print_direction
            || attrs.scroll_direction != self.def.win_style.scroll_direction
        {
            self.clear();
        }
        self.def.win_style = *attrs;
    }

    /// Start a new run at the cursor if the current one already holds text
    fn split_run(&mut self) {
        if self.ensure_run().drawer.drawable() {
            let cursor = self.cursor();
            self.push_run(cursor.y, cursor.x);
        }
    }

    pub(crate) fn set_pen_attributes(&mut self, attrs: &PenAttributes) {
        self.changed = self.def.visible;
        self.def.pen_style = *attrs;
        self.split_run();
        let pen = self.def.pen_style;
        self.ensure_run().drawer.set_pen_attributes(&pen);
    }

    pub(crate) fn set_pen_color(&mut self, color: &PenColor) {
        self.changed = self.def.visible;
        self.def.pen_style.pen_color = *color;
        self.split_run();
        let pen = self.def.pen_style;
        self.ensure_run().drawer.set_pen_attributes(&pen);
    }

    pub(crate) fn active_pen_attributes(&self) -> PenAttributes {
        match self.runs.last() {
            Some(run) if run.drawer.pen_override() => run.drawer.pen_attributes(),
            Some(run) => PenAttributes {
                pen_color: self.def.pen_style.pen_color,
                ..run.drawer.pen_attributes()
            },
            None => self.def.pen_style,
        }
    }

    pub(crate) fn override_pen_attributes(&mut self, attrs: &PenAttributes, mid_row: bool) {
        self.split_run();
        let mut pen = self.def.pen_style;
        pen.underline = attrs.underline;
        pen.italics = attrs.italics;
        pen.flashing = attrs.flashing;
        pen.pen_color.fg_color = attrs.pen_color.fg_color;
        pen.pen_color.bg_color = attrs.pen_color.bg_color;
        let run = self.ensure_run();
        run.drawer.set_pen_attributes(&pen);
        run.drawer.set_pen_override(mid_row);
    }

    pub(crate) fn show(&mut self) {
        debug!("show window {}", self.def.id);
        self.changed = true;
        self.visibility_changed = true;
        self.def.visible = true;
    }

    pub(crate) fn hide(&mut self) {
        debug!("hide window {}", self.def.id);
        self.changed = true;
        self.visibility_changed = true;
        self.def.visible = false;
    }

    pub(crate) fn toggle(&mut self) {
        debug!("toggle window {} visible {}", self.def.id, self.def.visible);
        self.changed = true;
        self.visibility_changed = true;
        self.def.visible = !self.def.visible;
    }

    pub(crate) fn clear(&mut self) {
        debug!("clear window {}", self.def.id);
        self.changed = self.def.visible;
        self.runs.clear();
    }

    pub(crate) fn has_flashing_text(&self) -> bool {
        self.runs
            .iter()
            .any(|run| run.drawer.pen_attributes().flashing)
    }

    pub(crate) fn has_text(&self, row: i32) -> bool {
        self.runs
            .iter()
            .any(|run| run.row == row && run.drawer.drawable())
    }

    pub(crate) fn set_flash_state(&mut self, state: FlashControl) {
        for run in self.runs.iter_mut() {
            run.drawer.set_flash_state(state);
        }
    }

    pub(crate) fn update_row_count(&mut self, row_count: u8, adjust: bool) {
        if adjust && self.def.win_style.scroll_direction == ScrollDirection::BottomTop {
            // keep the bottom row in place, growing or shrinking from the top
            let offset = row_count as i32 - self.def.row_count as i32;
            for run in self.runs.iter_mut() {
                run.row += offset;
            }
            self.runs.retain(|run| run.row >= 0);
        }
        self.def.row_count = row_count;
    }

    fn anchor(&self, screen: &ScreenInfo) -> Point {
        let safe_height = match self.runs.last() {
            Some(run) if self.cea608 => {
                let mut font_height = run.drawer.font_height();
                if font_height == self.fonts.small.font_height
                    || font_height == self.fonts.standard.font_height
                    || font_height == self.fonts.extra_large.font_height
                {
                    font_height = self.fonts.large.font_height;
                }
                screen.height.min(font_height * screen.height_segments)
            }
            _ => screen.safe_height,
        };

        let mut point = Point::new(
            (screen.width - screen.safe_width) / 2,
            (screen.height - safe_height) / 2,
        );
        let horizontal = self.def.anchor_horizontal as i32;
        let vertical = self.def.anchor_vertical as i32;
        if self.def.relative_pos {
            point.x += screen.safe_width * horizontal / 100;
            point.y += safe_height * vertical / 100;
        } else {
            point.x += screen.safe_width / screen.width_segments.max(1) * horizontal;
            point.y += safe_height / screen.height_segments.max(1) * vertical;
        }
        point
    }

    fn top_left(&self, screen: &ScreenInfo, dims: Dimensions) -> Point {
        let mut point = self.anchor(screen);
        let (dx, dy) = match self.def.anchor_point {
            AnchorPoint::TopLeft => (0, 0),
            AnchorPoint::TopCenter => (dims.w / 2, 0),
            AnchorPoint::TopRight => (dims.w, 0),
            AnchorPoint::MiddleLeft => (0, dims.h / 2),
            AnchorPoint::MiddleCenter => (dims.w / 2, dims.h / 2),
            AnchorPoint::MiddleRight => (dims.w, dims.h / 2),
            AnchorPoint::BottomLeft => (0, dims.h),
            AnchorPoint::BottomCenter => (dims.w / 2, dims.h),
            AnchorPoint::BottomRight => (dims.w, dims.h),
        };
        point.x -= dx;
        point.y -= dy;
        point
    }

    fn justify(&self, anchor: Point, rect: &Rect, window: Dimensions) -> Point {
        let right_left = self.def.win_style.print_direction == PrintDirection::RightLeft;
        let from_left = anchor.x + rect.x + HORIZONTAL_MARGIN;
        let from_right = anchor.x + window.w - rect.w - HORIZONTAL_MARGIN;
        let x = match self.def.win_style.justify {
            WindowJustify::Left if right_left => from_right,
            WindowJustify::Left => from_left,
            WindowJustify::Right if right_left => from_left,
            WindowJustify::Right => from_right,
            WindowJustify::Center => anchor.x + (window.w - rect.w) / 2,
            WindowJustify::Full => from_left,
        };
        Point::new(x, anchor.y + rect.y)
    }

    fn layout(&mut self) -> (Vec<Rect>, Dimensions) {
        let direction = self.def.win_style.print_direction;
        let font = self.fonts.font(self.def.pen_style.pen_size);
        let mut max_height = font.font_height;
        let mut max_advance = font.max_advance;
        let mut biggest = Dimensions::default();
        let mut rects: Vec<Rect> = Vec::with_capacity(self.runs.len());

        for idx in 0..self.runs.len() {
            let run = &self.runs[idx];
            let dims = run.drawer.dimensions(direction);
            let x = run.column * run.drawer.max_advance();
            let y = run.row * run.drawer.font_height();
            max_height = max_height.max(run.drawer.font_height());
            max_advance = max_advance.max(run.drawer.max_advance());

            self.runs[idx].padding = 0;
            if idx > 0 && self.runs[idx - 1].row == self.runs[idx].row {
                if let Some(previous) = rects.last_mut() {
                    // only the last run of a row keeps the margin
                    previous.w -= HORIZONTAL_MARGIN;
                    if previous.x + previous.w < x {
                        self.runs[idx - 1].padding = x - (previous.x + previous.w);
                    }
                }
            }

            let rect = Rect {
                x,
                y,
                w: dims.w + HORIZONTAL_MARGIN,
                h: dims.h,
            };
            biggest.w = biggest.w.max(rect.w + x);
            biggest.h = biggest.h.max(rect.h + y);
            rects.push(rect);
        }

        biggest.h = biggest.h.max(max_height * self.def.row_count as i32);
        biggest.w = biggest.w.max(max_advance * self.def.col_count as i32);
        (rects, biggest)
    }

    /// Draw the window onto `gfx` positioned on `screen`.  Hidden windows are not drawn.
    pub(crate) fn draw(&mut self, gfx: &mut dyn Gfx, screen: &ScreenInfo) {
        self.changed = false;
        self.visibility_changed = false;
        if !self.def.visible {
            return;
        }

        let (rects, text_dims) = self.layout();
        let window_dims = Dimensions::new(text_dims.w + 2 * HORIZONTAL_MARGIN, text_dims.h);
        let anchor = self.top_left(screen, window_dims);
        debug!(
            "window {} dimensions {}x{} at {},{}",
            self.def.id, window_dims.w, window_dims.h, anchor.x, anchor.y
        );

        let style = self.def.win_style;
        gfx.draw_border(
            anchor,
            window_dims,
            style.fill_color,
            style.border_color,
            style.border_type,
        );

        let points = rects
            .iter()
            .map(|rect| self.justify(anchor, rect, window_dims))
            .collect::<Vec<_>>();
        for (run, point) in self.runs.iter_mut().zip(points) {
            run.drawer.set_max_width(window_dims.w);
            run.drawer.draw(
                gfx,
                point,
                style.print_direction,
                style.justify,
                run.padding,
            );
        }
    }
}
