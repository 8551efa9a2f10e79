// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::attributes::{PenAttributes, PenColor, WindowAttributes, WindowDefinition, WindowMask};

/// The operations the [`CommandParser`](crate::CommandParser) drives while decoding caption
/// data.
///
/// [`WindowController`](crate::WindowController) is the implementation used for presentation.
pub trait CommandProcessor {
    /// Clear the current window and move the pen to the top left
    fn form_feed(&mut self);
    /// Move the pen to the start of the next row, scrolling if needed
    fn carriage_return(&mut self);
    /// Erase the current row and move the pen to its start
    fn horizontal_carriage_return(&mut self);
    /// Clear the current window
    fn clear_window(&mut self);
    /// Remove the character before the pen
    fn backspace(&mut self);
    /// Insert a transparent space.  `non_breaking` is informational only.
    fn transparent_space(&mut self, non_breaking: bool);
    /// Write text at the pen position of the current window
    fn report(&mut self, text: &str);
    /// Select the window subsequent commands apply to
    fn set_current_window(&mut self, id: u8);
    /// Clear the text of every window in `mask`
    fn clear_windows(&mut self, mask: WindowMask);
    /// Show every window in `mask`
    fn display_windows(&mut self, mask: WindowMask);
    /// Hide every window in `mask`
    fn hide_windows(&mut self, mask: WindowMask);
    /// Toggle the visibility of every window in `mask`
    fn toggle_windows(&mut self, mask: WindowMask);
    /// Delete every window in `mask`
    fn delete_windows(&mut self, mask: WindowMask);
    /// Delete all windows and state
    fn reset(&mut self);
    /// Set the pen attributes of the current window
    fn set_pen_attributes(&mut self, attrs: &PenAttributes);
    /// Set the pen color of the current window
    fn set_pen_color(&mut self, color: &PenColor);
    /// Move the pen of the current window
    fn set_pen_location(&mut self, row: u8, column: u8);
    /// Set the attributes of the current window
    fn set_window_attributes(&mut self, attrs: &WindowAttributes);
    /// Create or update a window
    fn define_window(&mut self, def: &WindowDefinition);
    /// The pen attributes currently in effect for the current window
    fn active_pen_attributes(&self) -> Option<PenAttributes>;
    /// Override the pen attributes of the current text run.  `mid_row` signals a CEA-608
    /// mid-row code.
    fn override_pen_attributes(&mut self, attrs: &PenAttributes, mid_row: bool);
    /// The definition of window `id`
    fn window_definition(&self, id: u8) -> Option<WindowDefinition>;
    /// The definition of the current window
    fn current_window_definition(&self) -> Option<WindowDefinition>;
    /// Move the pen `offset` columns to the right
    fn set_tab_offset(&mut self, offset: u8);
    /// Restart the display timeout.  0 disables the timeout.
    fn reset_window_timeout(&mut self, seconds: u32);
    /// Whether `row` of the current window holds any text
    fn has_text(&self, row: u8) -> bool;
    /// Change the number of rows of window `id`, shifting existing rows when `adjust` is set
    fn update_window_row_count(&mut self, id: u8, row_count: u8, adjust: bool);
    /// Switch between CEA-608 and CEA-708 window handling
    fn enable_608(&mut self, enable: bool);
    /// Whether the display timeout elapsed since it was last reset
    fn is_window_timed_out(&self) -> bool;
}

impl<P: CommandProcessor + ?Sized> CommandProcessor for &mut P {
    fn form_feed(&mut self) {
        (**self).form_feed()
    }
    fn carriage_return(&mut self) {
        (**self).carriage_return()
    }
    fn horizontal_carriage_return(&mut self) {
        (**self).horizontal_carriage_return()
    }
    fn clear_window(&mut self) {
        (**self).clear_window()
    }
    fn backspace(&mut self) {
        (**self).backspace()
    }
    fn transparent_space(&mut self, non_breaking: bool) {
        (**self).transparent_space(non_breaking)
    }
    fn report(&mut self, text: &str) {
        (**self).report(text)
    }
    fn set_current_window(&mut self, id: u8) {
        (**self).set_current_window(id)
    }
    fn clear_windows(&mut self, mask: WindowMask) {
        (**self).clear_windows(mask)
    }
    fn display_windows(&mut self, mask: WindowMask) {
        (**self).display_windows(mask)
    }
    fn hide_windows(&mut self, mask: WindowMask) {
        (**self).hide_windows(mask)
    }
    fn toggle_windows(&mut self, mask: WindowMask) {
        (**self).toggle_windows(mask)
    }
    fn delete_windows(&mut self, mask: WindowMask) {
        (**self).delete_windows(mask)
    }
    fn reset(&mut self) {
        (**self).reset()
    }
    fn set_pen_attributes(&mut self, attrs: &PenAttributes) {
        (**self).set_pen_attributes(attrs)
    }
    fn set_pen_color(&mut self, color: &PenColor) {
        (**self).set_pen_color(color)
    }
    fn set_pen_location(&mut self, row: u8, column: u8) {
        (**self).set_pen_location(row, column)
    }
    fn set_window_attributes(&mut self, attrs: &WindowAttributes) {
        (**self).set_window_attributes(attrs)
    }
    fn define_window(&mut self, def: &WindowDefinition) {
        (**self).define_window(def)
    }
    fn active_pen_attributes(&self) -> Option<PenAttributes> {
        (**self).active_pen_attributes()
    }
    fn override_pen_attributes(&mut self, attrs: &PenAttributes, mid_row: bool) {
        (**self).override_pen_attributes(attrs, mid_row)
    }
    fn window_definition(&self, id: u8) -> Option<WindowDefinition> {
        (**self).window_definition(id)
    }
    fn current_window_definition(&self) -> Option<WindowDefinition> {
        (**self).current_window_definition()
    }
    fn set_tab_offset(&mut self, offset: u8) {
        (**self).set_tab_offset(offset)
    }
    fn reset_window_timeout(&mut self, seconds: u32) {
        (**self).reset_window_timeout(seconds)
    }
    fn has_text(&self, row: u8) -> bool {
        (**self).has_text(row)
    }
    fn update_window_row_count(&mut self, id: u8, row_count: u8, adjust: bool) {
        (**self).update_window_row_count(id, row_count, adjust)
    }
    fn enable_608(&mut self, enable: bool) {
        (**self).enable_608(enable)
    }
    fn is_window_timed_out(&self) -> bool {
        (**self).is_window_timed_out()
    }
}
