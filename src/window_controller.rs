// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::rc::Rc;
use std::time::Duration;

use crate::attributes::{
    FlashControl, PenAttributes, PenColor, WindowAttributes, WindowDefinition, WindowMask,
    MAX_WINDOWS,
};
use crate::clock::Clock;
use crate::gfx::{cell_text_drawer_factory, Gfx, TextDrawerFactory};
use crate::processor::CommandProcessor;
use crate::settings::{CcAttributes, UserSettings};
use crate::window::{ScreenInfo, Window};
use crate::AttributeError;

const FLASH_SHOW: Duration = Duration::from_millis(250);
const FLASH_HIDE: Duration = Duration::from_millis(750);

/// The set of up to 8 caption windows the command parsers write into
///
/// Drawing happens in [`draw_windows`](WindowController::draw_windows) only, which is expected
/// to be called after every batch of processed caption data.
pub struct WindowController {
    clock: Rc<dyn Clock>,
    windows: [Option<Window>; MAX_WINDOWS],
    current: Option<u8>,
    flash: FlashControl,
    flash_transition: Duration,
    window_timeout: u32,
    window_transition: Duration,
    cea608: bool,
    timed_out: bool,
    clear_pending: bool,
    settings: UserSettings,
    screen_708: ScreenInfo,
    screen_608: ScreenInfo,
    factory: TextDrawerFactory,
}

impl std::fmt::Debug for WindowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowController")
            .field("windows", &self.windows)
            .field("current", &self.current)
            .field("cea608", &self.cea608)
            .field("window_timeout", &self.window_timeout)
            .field("timed_out", &self.timed_out)
            .finish()
    }
}

impl WindowController {
    /// Construct a new [`WindowController`] using the default screens and
    /// [`CellTextDrawer`](crate::gfx::CellTextDrawer)s
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            windows: Default::default(),
            current: None,
            flash: FlashControl::Show,
            flash_transition: now,
            window_timeout: 0,
            window_transition: now,
            cea608: false,
            timed_out: false,
            clear_pending: false,
            settings: UserSettings::default(),
            screen_708: ScreenInfo::cea708(),
            screen_608: ScreenInfo::cea608(),
            factory: cell_text_drawer_factory(),
        }
    }

    /// Position windows on different screens.  Applies to windows defined afterwards.
    pub fn with_screen_info(mut self, cea708: ScreenInfo, cea608: ScreenInfo) -> Self {
        self.screen_708 = cea708;
        self.screen_608 = cea608;
        self
    }

    /// Use a different [`TextDrawer`](crate::gfx::TextDrawer) for windows defined afterwards
    pub fn with_text_drawer_factory(mut self, factory: TextDrawerFactory) -> Self {
        self.factory = factory;
        self
    }

    /// The window `id`, if defined
    pub fn window(&self, id: u8) -> Option<&Window> {
        self.windows.get(id as usize)?.as_ref()
    }

    /// All defined windows in identifier order
    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter().flatten()
    }

    /// The identifier of the window text and pen commands apply to
    pub fn current_window(&self) -> Option<u8> {
        self.current
    }

    /// Whether windows are handled as CEA-608 windows
    pub fn is_608_enabled(&self) -> bool {
        self.cea608
    }

    /// The current user overrides
    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    fn current_mut(&mut self) -> Option<&mut Window> {
        let id = self.current?;
        self.windows.get_mut(id as usize)?.as_mut()
    }

    fn current_ref(&self) -> Option<&Window> {
        self.window(self.current?)
    }

    fn for_each_window(&mut self, mask: WindowMask, mut func: impl FnMut(&mut Window)) {
        for id in mask.iter() {
            if let Some(window) = self.windows[id as usize].as_mut() {
                func(window);
            }
        }
    }

    fn check_timeout(&mut self) -> bool {
        if self.window_timeout == 0 {
            return false;
        }
        let elapsed = self.clock.now().saturating_sub(self.window_transition);
        if elapsed.as_secs() <= self.window_timeout as u64 {
            return false;
        }

        info!("caption windows timed out after {}s", elapsed.as_secs());
        self.for_each_window(WindowMask::ALL, Window::clear);
        self.window_timeout = 0;
        self.timed_out = true;
        true
    }

    fn redraw_flashing(&mut self) -> bool {
        let now = self.clock.now();
        if !self.windows().any(Window::has_flashing_text) {
            self.flash = FlashControl::Show;
            self.flash_transition = now;
            return false;
        }

        let period = match self.flash {
            FlashControl::Show => FLASH_SHOW,
            FlashControl::Hide => FLASH_HIDE,
        };
        if now.saturating_sub(self.flash_transition) < period {
            return false;
        }

        self.flash_transition = now;
        self.flash = self.flash.toggled();
        trace!("flash state now {:?}", self.flash);
        let flash = self.flash;
        self.for_each_window(WindowMask::ALL, |window| window.set_flash_state(flash));
        true
    }

    fn screen(&self, cea608: bool) -> ScreenInfo {
        if cea608 {
            self.screen_608
        } else {
            self.screen_708
        }
    }

    /// Draw every window that needs it onto `gfx`
    ///
    /// Once the display timeout elapses, all windows are deleted instead.
    pub fn draw_windows(&mut self, gfx: &mut dyn Gfx) {
        if self.check_timeout() {
            self.reset();
            if std::mem::take(&mut self.clear_pending) {
                gfx.clear();
                gfx.update();
            }
            return;
        }

        let mut redraw = self.redraw_flashing();
        let mut clear_and_update = std::mem::take(&mut self.clear_pending);

        if !redraw {
            for id in 0..MAX_WINDOWS {
                let screen_708 = self.screen_708;
                let screen_608 = self.screen_608;
                let Some(window) = self.windows[id].as_mut() else {
                    continue;
                };
                if !window.changed() {
                    continue;
                }
                if window.is_visible() {
                    redraw = true;
                    break;
                } else if window.visibility_changed() {
                    clear_and_update = true;
                    let screen = if window.is_cea608() { screen_608 } else { screen_708 };
                    window.draw(gfx, &screen);
                }
            }
        }

        if !redraw {
            if clear_and_update {
                gfx.clear();
                gfx.update();
            }
            return;
        }

        debug!("redrawing all windows");
        gfx.clear();
        for priority in (0..MAX_WINDOWS as u8).rev() {
            for id in 0..MAX_WINDOWS {
                let Some(cea608) = self.windows[id]
                    .as_ref()
                    .filter(|window| window.definition().priority == priority)
                    .map(Window::is_cea608)
                else {
                    continue;
                };
                let screen = self.screen(cea608);
                if let Some(window) = self.windows[id].as_mut() {
                    window.draw(gfx, &screen);
                }
            }
        }
        gfx.update();
        self.window_transition = self.clock.now();
    }

    /// Apply user overrides and re-style every window with the result
    ///
    /// Invalid attributes are skipped.  The first error encountered is returned after the
    /// remaining attributes are applied.
    pub fn set_cc_attributes(&mut self, attrs: &CcAttributes) -> Result<(), AttributeError> {
        let mut result = Ok(());
        for &(ty, value) in attrs.iter() {
            if let Err(err) = self.settings.apply(ty, value) {
                warn!("Failed to apply caption attribute: {err}");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        let color = self.settings.pen_color();
        let pen = self.settings.pen_attributes();
        let style = self.settings.window_attributes();
        self.for_each_window(WindowMask::ALL, |window| {
            window.set_pen_color(&color);
            window.set_pen_attributes(&pen);
            window.set_window_attributes(&style);
        });
        result
    }
}

impl CommandProcessor for WindowController {
    fn form_feed(&mut self) {
        if let Some(window) = self.current_mut() {
            window.clear();
            window.set_pen_location(0, 0);
        }
    }

    fn carriage_return(&mut self) {
        if let Some(window) = self.current_mut() {
            window.carriage_return();
        }
    }

    fn horizontal_carriage_return(&mut self) {
        if let Some(window) = self.current_mut() {
            window.horizontal_carriage_return();
        }
    }

    fn clear_window(&mut self) {
        if let Some(window) = self.current_mut() {
            window.clear();
        }
    }

    fn backspace(&mut self) {
        if let Some(window) = self.current_mut() {
            window.backspace();
        }
    }

    fn transparent_space(&mut self, _non_breaking: bool) {
        if let Some(window) = self.current_mut() {
            window.transparent_space();
        }
    }

    fn report(&mut self, text: &str) {
        if let Some(window) = self.current_mut() {
            window.report(text);
        }
    }

    fn set_current_window(&mut self, id: u8) {
        self.current = self.window(id).map(|_| id);
        trace!("current window {:?}", self.current);
    }

    fn clear_windows(&mut self, mask: WindowMask) {
        trace!("clear windows {:#04x}", mask.bits());
        self.for_each_window(mask, Window::clear);
    }

    fn display_windows(&mut self, mask: WindowMask) {
        trace!("display windows {:#04x}", mask.bits());
        self.for_each_window(mask, Window::show);
    }

    fn hide_windows(&mut self, mask: WindowMask) {
        trace!("hide windows {:#04x}", mask.bits());
        self.for_each_window(mask, Window::hide);
    }

    fn toggle_windows(&mut self, mask: WindowMask) {
        trace!("toggle windows {:#04x}", mask.bits());
        self.for_each_window(mask, Window::toggle);
    }

    fn delete_windows(&mut self, mask: WindowMask) {
        trace!("delete windows {:#04x}", mask.bits());
        for id in mask.iter() {
            if self.windows[id as usize].take().is_some() && self.current == Some(id) {
                self.current = None;
                self.clear_pending = true;
            }
        }
    }

    fn reset(&mut self) {
        self.delete_windows(WindowMask::ALL);
    }

    fn set_pen_attributes(&mut self, attrs: &PenAttributes) {
        self.settings.on_embedded_pen_attributes(attrs);
        let pen = self.settings.pen_attributes();
        if let Some(window) = self.current_mut() {
            window.set_pen_attributes(&pen);
        }
    }

    fn set_pen_color(&mut self, color: &PenColor) {
        self.settings.on_embedded_pen_color(color);
        let color = self.settings.pen_color();
        if let Some(window) = self.current_mut() {
            window.set_pen_color(&color);
        }
    }

    fn set_pen_location(&mut self, row: u8, column: u8) {
        if let Some(window) = self.current_mut() {
            window.set_pen_location(row as i32, column as i32);
        }
    }

    fn set_window_attributes(&mut self, attrs: &WindowAttributes) {
        self.settings.on_embedded_window_attributes(attrs);
        let style = self.settings.window_attributes();
        if let Some(window) = self.current_mut() {
            window.set_window_attributes(&style);
        }
    }

    fn define_window(&mut self, def: &WindowDefinition) {
        if def.id as usize >= MAX_WINDOWS || def.priority as usize >= MAX_WINDOWS {
            warn!("Ignoring definition of window {} priority {}", def.id, def.priority);
            return;
        }

        self.settings.on_embedded_pen_color(&def.pen_style.pen_color);
        self.settings.on_embedded_pen_attributes(&def.pen_style);
        self.settings.on_embedded_window_attributes(&def.win_style);
        let def = WindowDefinition {
            win_style: self.settings.window_attributes(),
            pen_style: self.settings.pen_attributes(),
            ..*def
        };

        match self.windows[def.id as usize].as_mut() {
            Some(window) => window.update(&def),
            None => {
                debug!("creating window {}", def.id);
                let screen = self.screen(self.cea608);
                self.windows[def.id as usize] = Some(Window::new(
                    def,
                    screen.fonts,
                    self.factory.clone(),
                    self.cea608,
                ));
            }
        }
        self.current = Some(def.id);
        self.timed_out = false;
    }

    fn active_pen_attributes(&self) -> Option<PenAttributes> {
        self.current_ref().map(Window::active_pen_attributes)
    }

    fn override_pen_attributes(&mut self, attrs: &PenAttributes, mid_row: bool) {
        self.settings.on_embedded_pen_attributes(attrs);
        self.settings.on_embedded_pen_color(&attrs.pen_color);
        let pen = self.settings.pen_attributes();
        if let Some(window) = self.current_mut() {
            window.override_pen_attributes(&pen, mid_row);
        }
    }

    fn window_definition(&self, id: u8) -> Option<WindowDefinition> {
        self.window(id).map(|window| *window.definition())
    }

    fn current_window_definition(&self) -> Option<WindowDefinition> {
        self.current_ref().map(|window| *window.definition())
    }

    fn set_tab_offset(&mut self, offset: u8) {
        if let Some(window) = self.current_mut() {
            window.set_tab_offset(offset);
        }
    }

    fn reset_window_timeout(&mut self, seconds: u32) {
        self.window_transition = self.clock.now();
        self.window_timeout = seconds;
    }

    fn has_text(&self, row: u8) -> bool {
        self.current_ref()
            .is_some_and(|window| window.has_text(row as i32))
    }

    fn update_window_row_count(&mut self, id: u8, row_count: u8, adjust: bool) {
        if let Some(window) = self.windows.get_mut(id as usize).and_then(Option::as_mut) {
            window.update_row_count(row_count, adjust);
        }
    }

    fn enable_608(&mut self, enable: bool) {
        self.cea608 = enable;
    }

    fn is_window_timed_out(&self) -> bool {
        self.timed_out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::attributes::{Opacity, PenSize, WindowBorder};
    use crate::clock::ManualClock;
    use crate::settings::CcAttribType;
    use crate::tests::*;

    fn controller() -> (WindowController, ManualClock) {
        let clock = ManualClock::default();
        (WindowController::new(Rc::new(clock.clone())), clock)
    }

    fn definition(id: u8, priority: u8) -> WindowDefinition {
        WindowDefinition {
            id,
            priority,
            visible: true,
            row_count: 1,
            col_count: 10,
            anchor_horizontal: id,
            ..Default::default()
        }
    }

    #[test]
    fn define_and_select() {
        test_init_log();
        let (mut windows, _) = controller();
        windows.define_window(&definition(3, 0));
        assert_eq!(windows.current_window(), Some(3));
        assert_eq!(windows.window_definition(3).map(|def| def.id), Some(3));
        assert_eq!(windows.current_window_definition().map(|def| def.id), Some(3));
        windows.set_current_window(4);
        assert_eq!(windows.current_window(), None);
        assert_eq!(windows.active_pen_attributes(), None);
        windows.set_current_window(3);
        assert_eq!(windows.current_window(), Some(3));
        assert_eq!(windows.active_pen_attributes(), Some(PenAttributes::default()));

        windows.define_window(&definition(8, 0));
        windows.define_window(&definition(2, 8));
        assert_eq!(windows.windows().count(), 1);
    }

    #[test]
    fn text_goes_to_current_window() {
        test_init_log();
        let (mut windows, _) = controller();
        windows.report("lost");
        windows.define_window(&definition(0, 0));
        windows.define_window(&definition(1, 0));
        windows.report("one");
        windows.set_current_window(0);
        windows.report("zero");
        assert_eq!(windows.window(0).unwrap().text(), "zero");
        assert_eq!(windows.window(1).unwrap().text(), "one");
        assert!(windows.has_text(0));
        assert!(!windows.has_text(1));

        windows.form_feed();
        assert_eq!(windows.window(0).unwrap().text(), "");
        windows.set_current_window(1);
        windows.clear_window();
        assert_eq!(windows.window(1).unwrap().text(), "");
    }

    #[test]
    fn redefinition_updates_in_place() {
        test_init_log();
        let (mut windows, _) = controller();
        windows.define_window(&definition(0, 0));
        windows.report("kept");
        windows.define_window(&WindowDefinition {
            col_count: 20,
            ..definition(0, 1)
        });
        let window = windows.window(0).unwrap();
        assert_eq!(window.text(), "kept");
        assert_eq!(window.definition().col_count, 20);
        assert_eq!(window.definition().priority, 1);
    }

    #[test]
    fn delete_current_window_clears_screen() {
        test_init_log();
        let (mut windows, _) = controller();
        windows.define_window(&definition(0, 0));
        windows.define_window(&definition(1, 0));
        let mut gfx = RecordingGfx::default();
        windows.draw_windows(&mut gfx);
        gfx.calls.clear();

        windows.delete_windows(WindowMask::single(0));
        assert_eq!(windows.current_window(), Some(1));
        windows.draw_windows(&mut gfx);
        assert!(gfx.calls.is_empty());

        windows.delete_windows(WindowMask::single(1));
        assert_eq!(windows.current_window(), None);
        windows.draw_windows(&mut gfx);
        assert_eq!(gfx.calls, vec!["clear", "update"]);

        windows.reset();
        windows.reset();
        assert_eq!(windows.windows().count(), 0);
    }

    #[test]
    fn draws_lowest_priority_first() {
        test_init_log();
        let (mut windows, _) = controller();
        windows.define_window(&definition(0, 0));
        windows.define_window(&definition(1, 7));
        windows.define_window(&WindowDefinition {
            visible: false,
            ..definition(2, 3)
        });
        windows.display_windows(WindowMask::from_bits(0b011));
        let mut gfx = RecordingGfx::default();
        windows.draw_windows(&mut gfx);
        // anchors are 5 pixels apart for each window id
        assert_eq!(
            gfx.calls,
            vec![
                "clear",
                "border(120, 60, 310x48, None)",
                "border(115, 60, 310x48, None)",
                "update",
            ]
        );

        // nothing changed
        gfx.calls.clear();
        windows.draw_windows(&mut gfx);
        assert!(gfx.calls.is_empty());
    }

    #[test]
    fn hidden_window_not_redrawn() {
        test_init_log();
        let (mut windows, _) = controller();
        windows.define_window(&definition(0, 0));
        let mut gfx = RecordingGfx::default();
        windows.draw_windows(&mut gfx);

        gfx.calls.clear();
        windows.hide_windows(WindowMask::ALL);
        windows.draw_windows(&mut gfx);
        assert_eq!(gfx.calls, vec!["clear", "update"]);

        gfx.calls.clear();
        windows.toggle_windows(WindowMask::single(0));
        windows.report("a");
        windows.draw_windows(&mut gfx);
        assert_eq!(gfx.texts(), vec!["a"]);
        assert!(windows.window(0).unwrap().is_visible());

        gfx.calls.clear();
        windows.hide_windows(WindowMask::single(0));
        windows.display_windows(WindowMask::single(0));
        windows.draw_windows(&mut gfx);
        assert_eq!(gfx.texts(), vec!["a"]);
    }

    #[test]
    fn display_timeout() {
        test_init_log();
        let (mut windows, clock) = controller();
        windows.define_window(&definition(0, 0));
        windows.report("a");
        windows.reset_window_timeout(10);
        let mut gfx = RecordingGfx::default();
        windows.draw_windows(&mut gfx);

        clock.advance(Duration::from_millis(10_900));
        windows.draw_windows(&mut gfx);
        assert!(!windows.is_window_timed_out());
        assert_eq!(windows.windows().count(), 1);

        clock.advance(Duration::from_millis(200));
        gfx.calls.clear();
        windows.draw_windows(&mut gfx);
        assert!(windows.is_window_timed_out());
        assert_eq!(windows.windows().count(), 0);
        assert_eq!(gfx.calls, vec!["clear", "update"]);

        // no timeout once disabled
        windows.define_window(&definition(0, 0));
        assert!(!windows.is_window_timed_out());
        clock.advance(Duration::from_secs(100));
        windows.draw_windows(&mut gfx);
        assert_eq!(windows.windows().count(), 1);

        windows.reset_window_timeout(0);
        clock.advance(Duration::from_secs(100));
        windows.draw_windows(&mut gfx);
        assert_eq!(windows.windows().count(), 1);
    }

    #[test]
    fn flashing_text() {
        test_init_log();
        let (mut windows, clock) = controller();
        windows.define_window(&definition(0, 0));
        windows.set_pen_attributes(&PenAttributes {
            flashing: true,
            ..Default::default()
        });
        windows.report("a");
        let mut gfx = RecordingGfx::default();
        windows.draw_windows(&mut gfx);
        assert_eq!(gfx.texts(), vec!["a"]);

        gfx.calls.clear();
        clock.advance(Duration::from_millis(200));
        windows.draw_windows(&mut gfx);
        assert!(gfx.calls.is_empty());

        clock.advance(Duration::from_millis(50));
        windows.draw_windows(&mut gfx);
        assert!(gfx.calls.contains(&"clear".to_string()));
        assert!(gfx.texts().is_empty());

        gfx.calls.clear();
        clock.advance(Duration::from_millis(700));
        windows.draw_windows(&mut gfx);
        assert!(gfx.calls.is_empty());
        clock.advance(Duration::from_millis(50));
        windows.draw_windows(&mut gfx);
        assert_eq!(gfx.texts(), vec!["a"]);
    }

    #[test]
    fn user_settings_apply_to_windows() {
        test_init_log();
        let (mut windows, _) = controller();
        windows.define_window(&definition(0, 0));
        windows.report("a");
        windows.define_window(&definition(1, 0));

        let attrs = CcAttributes::new(vec![
            (CcAttribType::FONT_SIZE, PenSize::Large as u32),
            (CcAttribType::BORDER_TYPE, WindowBorder::Raised as u32),
            (CcAttribType::WIN_OPACITY, Opacity::Transparent as u32),
            (CcAttribType::FONT_OPACITY, 9),
        ]);
        assert_eq!(
            windows.set_cc_attributes(&attrs),
            Err(AttributeError::InvalidValue {
                attribute: CcAttribType::FONT_OPACITY,
                value: 9
            })
        );
        for window in windows.windows() {
            let def = window.definition();
            assert_eq!(def.pen_style.pen_size, PenSize::Large);
            assert_eq!(def.win_style.border_type, WindowBorder::Raised);
            assert_eq!(def.win_style.fill_color >> 24, 0);
        }
        assert_eq!(windows.window(0).unwrap().text(), "a");

        // new definitions keep the overrides
        windows.define_window(&definition(2, 0));
        let def = windows.window_definition(2).unwrap();
        assert_eq!(def.pen_style.pen_size, PenSize::Large);
        windows.set_pen_attributes(&PenAttributes::default());
        assert_eq!(
            windows.active_pen_attributes().map(|pen| pen.pen_size),
            Some(PenSize::Large)
        );
    }

    #[test]
    fn row_count_update() {
        test_init_log();
        let (mut windows, _) = controller();
        windows.define_window(&WindowDefinition {
            row_count: 2,
            ..definition(0, 0)
        });
        windows.report("a");
        windows.update_window_row_count(0, 3, true);
        windows.update_window_row_count(5, 3, true);
        assert_eq!(windows.window_definition(0).unwrap().row_count, 3);
        assert_eq!(windows.window(0).unwrap().row_text(2), "a");
        assert!(windows.has_text(2));
    }

    #[test]
    fn cea608_windows_use_608_screen() {
        test_init_log();
        let (mut windows, _) = controller();
        windows.enable_608(true);
        assert!(windows.is_608_enabled());
        windows.define_window(&WindowDefinition {
            anchor_vertical: 1,
            anchor_horizontal: 1,
            ..definition(0, 0)
        });
        windows.report("a");
        let mut gfx = RecordingGfx::default();
        windows.draw_windows(&mut gfx);
        // 15 rows of the large font fill the full 600 pixel safe area, 1050 / 32 per column
        assert_eq!(gfx.calls[1], "border(147, 100, 310x48, None)");
    }
}
