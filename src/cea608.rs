// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::attributes::{AnchorPoint, PenAttributes, WindowAttributes, WindowDefinition, WindowMask};
use crate::processor::CommandProcessor;
use crate::tables::{
    self, CaptionControl, Channel, Color, PreambleType, TextStyle, COLOR_BLACK,
    OPACITY_SOLID, OPACITY_TRANSLUCENT, OPACITY_TRANSPARENT,
};
use crate::user_data::CcType;

const MAX_COLUMNS: u8 = 32;
const MAX_ROWS: u8 = 15;
const MAX_WINDOWS: u8 = 8;
const DISPLAY_TIMEOUT_SECONDS: u32 = 10;

/// The CEA-608 captioning mode
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CaptionState {
    /// No captioning mode selected yet
    #[default]
    Idle,
    /// Roll-Up with 2 rows
    RollUp2,
    /// Roll-Up with 3 rows
    RollUp3,
    /// Roll-Up with 4 rows
    RollUp4,
    /// Pop-On loading into windows 4-7
    PopOn1,
    /// Pop-On loading into windows 0-3
    PopOn2,
    /// Paint-On into windows 0-3
    PaintOn1,
    /// Paint-On into windows 4-7
    PaintOn2,
    /// Text mode
    Text,
}

struct WindowConfig {
    visible: [bool; MAX_WINDOWS as usize],
    rows: [u8; MAX_WINDOWS as usize],
}

macro_rules! window_config {
    ([$($visible:expr),+], [$($rows:expr),+]) => {
        WindowConfig {
            visible: [$($visible != 0),+],
            rows: [$($rows),+],
        }
    };
}

// indexed by CaptionState
static WINDOW_CONFIGS: [WindowConfig; 9] = [
    window_config!([0, 0, 0, 0, 0, 0, 0, 0], [1, 1, 1, 1, 1, 1, 1, 1]),
    window_config!([1, 0, 0, 0, 0, 0, 0, 0], [2, 1, 1, 1, 1, 1, 1, 1]),
    window_config!([1, 0, 0, 0, 0, 0, 0, 0], [3, 1, 1, 1, 1, 1, 1, 1]),
    window_config!([1, 0, 0, 0, 0, 0, 0, 0], [4, 1, 1, 1, 1, 1, 1, 1]),
    window_config!([1, 1, 1, 1, 0, 0, 0, 0], [1, 1, 1, 1, 1, 1, 1, 1]),
    window_config!([0, 0, 0, 0, 1, 1, 1, 1], [1, 1, 1, 1, 1, 1, 1, 1]),
    window_config!([1, 1, 1, 1, 0, 0, 0, 0], [1, 1, 1, 1, 1, 1, 1, 1]),
    window_config!([0, 0, 0, 0, 1, 1, 1, 1], [1, 1, 1, 1, 1, 1, 1, 1]),
    window_config!([1, 0, 0, 0, 0, 0, 0, 0], [8, 1, 1, 1, 1, 1, 1, 1]),
];

impl CaptionState {
    fn config(&self) -> &'static WindowConfig {
        &WINDOW_CONFIGS[*self as usize]
    }

    fn window_visible(&self, id: u8) -> bool {
        self.config().visible[id as usize]
    }

    fn window_rows(&self, id: u8) -> u8 {
        self.config().rows[id as usize]
    }

    /// Whether this is one of the Roll-Up modes
    pub fn is_roll_up(&self) -> bool {
        matches!(self, Self::RollUp2 | Self::RollUp3 | Self::RollUp4)
    }

    /// Whether this is one of the Paint-On modes
    pub fn is_paint_on(&self) -> bool {
        matches!(self, Self::PaintOn1 | Self::PaintOn2)
    }
}

/// A CEA-608 caption or text channel
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Cea608Channel {
    /// No channel
    #[default]
    None,
    /// Caption channel 1, field 1
    Cc1,
    /// Caption channel 2, field 1
    Cc2,
    /// Caption channel 3, field 2
    Cc3,
    /// Caption channel 4, field 2
    Cc4,
    /// Text channel 1, field 1
    Text1,
    /// Text channel 2, field 1
    Text2,
    /// Text channel 3, field 2
    Text3,
    /// Text channel 4, field 2
    Text4,
}

impl Cea608Channel {
    /// The channel for a service number.  CC1-CC4 are 1000-1003 and Text1-Text4 are
    /// 1004-1007.  Anything else is [`Cea608Channel::None`].
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::Cea608Channel;
    /// assert_eq!(Cea608Channel::from_service(1000), Cea608Channel::Cc1);
    /// assert_eq!(Cea608Channel::from_service(1007), Cea608Channel::Text4);
    /// assert_eq!(Cea608Channel::from_service(1), Cea608Channel::None);
    /// ```
    pub fn from_service(service: u32) -> Self {
        match service {
            1000 => Self::Cc1,
            1001 => Self::Cc2,
            1002 => Self::Cc3,
            1003 => Self::Cc4,
            1004 => Self::Text1,
            1005 => Self::Text2,
            1006 => Self::Text3,
            1007 => Self::Text4,
            _ => Self::None,
        }
    }

    /// The service number of this channel.  0 for [`Cea608Channel::None`].
    pub fn service(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Cc1 => 1000,
            Self::Cc2 => 1001,
            Self::Cc3 => 1002,
            Self::Cc4 => 1003,
            Self::Text1 => 1004,
            Self::Text2 => 1005,
            Self::Text3 => 1006,
            Self::Text4 => 1007,
        }
    }

    /// The field carrying this channel
    pub fn field(&self) -> tables::Field {
        match self {
            Self::Cc1 | Self::Cc2 | Self::Text1 | Self::Text2 => tables::Field::ONE,
            _ => tables::Field::TWO,
        }
    }

    /// Whether this is a text channel
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text1 | Self::Text2 | Self::Text3 | Self::Text4)
    }

    fn new(text: bool, field: tables::Field, channel: Channel) -> Self {
        match (text, field == tables::Field::ONE, channel == Channel::ONE) {
            (false, true, true) => Self::Cc1,
            (false, true, false) => Self::Cc2,
            (false, false, true) => Self::Cc3,
            (false, false, false) => Self::Cc4,
            (true, true, true) => Self::Text1,
            (true, true, false) => Self::Text2,
            (true, false, true) => Self::Text3,
            (true, false, false) => Self::Text4,
        }
    }
}

fn field_of(cc_type: CcType) -> Option<tables::Field> {
    match cc_type {
        CcType::Field1 => Some(tables::Field::ONE),
        CcType::Field2 => Some(tables::Field::TWO),
        _ => None,
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
struct WindowInfo {
    base_row: Option<u8>,
    indent: u8,
    assigned_row: Option<u8>,
}

/// The CEA-608 caption state machine.  Windows are synthesized on the [`CommandProcessor`]
/// for each captioning mode.
#[derive(Debug)]
pub(crate) struct Cea608Decoder {
    state: CaptionState,
    requested_channel: Cea608Channel,
    data_type: CcType,
    current_channel: Cea608Channel,
    last_pair: [u8; 2],
    is_last_pair_control: bool,
    window_info: [WindowInfo; MAX_WINDOWS as usize],
    // least recently used first
    window_list: Vec<u8>,
    last_base_row: u8,
}

impl Default for Cea608Decoder {
    fn default() -> Self {
        Self {
            state: CaptionState::Idle,
            requested_channel: Cea608Channel::None,
            data_type: CcType::Field1,
            current_channel: Cea608Channel::None,
            last_pair: [0; 2],
            is_last_pair_control: false,
            window_info: Default::default(),
            window_list: Vec::new(),
            last_base_row: MAX_ROWS,
        }
    }
}

impl Cea608Decoder {
    pub(crate) fn state(&self) -> CaptionState {
        self.state
    }

    pub(crate) fn requested_channel(&self) -> Cea608Channel {
        self.requested_channel
    }

    /// Reset all caption state and remove every window
    pub(crate) fn reset<P: CommandProcessor + ?Sized>(&mut self, proc: &mut P) {
        self.state = CaptionState::Idle;
        self.requested_channel = Cea608Channel::None;
        self.data_type = CcType::Field1;
        self.current_channel = Cea608Channel::None;
        self.last_pair = [0; 2];
        self.is_last_pair_control = false;
        self.window_info = Default::default();
        self.window_list.clear();
        self.last_base_row = MAX_ROWS;

        proc.reset_window_timeout(0);
        proc.clear_windows(WindowMask::ALL);
        proc.delete_windows(WindowMask::ALL);
    }

    /// Decode one CEA-608 byte pair (with parity) for `channel`
    pub(crate) fn process<P: CommandProcessor + ?Sized>(
        &mut self,
        channel: Cea608Channel,
        cc_type: CcType,
        data1: u8,
        data2: u8,
        proc: &mut P,
    ) {
        trace!("{channel:?} {cc_type:?} {data1:#04x} {data2:#04x}");
        if channel != self.requested_channel {
            info!("reset captions on service change to {channel:?}");
            self.reset(proc);
        }
        self.requested_channel = channel;

        if channel == Cea608Channel::None {
            debug!("no 608 channel selected");
            return;
        }

        self.data_type = cc_type;
        let Some(field) = field_of(cc_type) else {
            debug!("not 608 data");
            return;
        };
        if field != channel.field() {
            trace!("data is not for the selected field");
            return;
        }

        if !tables::check_odd_parity(data1) || !tables::check_odd_parity(data2) {
            debug!("data {data1:#04x} {data2:#04x} failed parity check");
            return;
        }

        let data1 = tables::strip_parity(data1);
        let data2 = tables::strip_parity(data2);
        if data1 == 0 && data2 == 0 {
            trace!("null pair");
            return;
        }

        self.current_channel = self.current_channel(field, data1, data2);
        if self.current_channel != channel {
            debug!(
                "data is for {:?}, not the requested channel",
                self.current_channel
            );
            return;
        }

        if is_control_code(data1) {
            if self.is_last_pair_control && self.last_pair == [data1, data2] {
                debug!("skip repeated control code {data1:#04x} {data2:#04x}");
                self.is_last_pair_control = false;
            } else {
                self.is_last_pair_control = true;
                self.control(data1, data2, proc);
            }
        } else {
            self.is_last_pair_control = false;
            if data1 > 0x0F {
                self.process_char(data1, proc);
            }
            self.process_char(data2, proc);
        }

        self.last_pair = [data1, data2];
    }

    fn current_channel(&self, field: tables::Field, data1: u8, data2: u8) -> Cea608Channel {
        if field == tables::Field::TWO && data1 <= 0x0F {
            // XDS
            return Cea608Channel::None;
        }
        if !is_control_code(data1) {
            return self.current_channel;
        }

        let channel = Channel::from_control_byte(data1);
        let text = match CaptionControl::from_pair(data1, data2) {
            Some(CaptionControl::TextRestart | CaptionControl::ResumeTextDisplay) => true,
            Some(
                CaptionControl::EndOfCaption
                | CaptionControl::ResumeCaptionLoading
                | CaptionControl::ResumeDirectionCaptioning
                | CaptionControl::RollUp2
                | CaptionControl::RollUp3
                | CaptionControl::RollUp4,
            ) => self.state == CaptionState::Text,
            _ => return self.current_channel,
        };
        Cea608Channel::new(text, field, channel)
    }

    fn active_window<P: CommandProcessor + ?Sized>(&self, proc: &P) -> Option<u8> {
        let def = proc.current_window_definition()?;
        self.window_info
            .get(def.id as usize)
            .and_then(|info| info.assigned_row)
            .map(|_| def.id)
    }

    fn process_char<P: CommandProcessor + ?Sized>(&mut self, data: u8, proc: &mut P) {
        if self.active_window(proc).is_none() {
            debug!("no active window for character {data:#04x}");
            return;
        }
        self.insert_char(data, proc);
    }

    fn insert_char<P: CommandProcessor + ?Sized>(&self, data: u8, proc: &mut P) {
        if let Some(c) = tables::basic_char(data) {
            report_char(c, proc);
        }
    }

    fn control<P: CommandProcessor + ?Sized>(&mut self, c1: u8, c2: u8, proc: &mut P) {
        let is_preamble = c2 & 0x40 != 0;
        let is_mid_row = c2 & 0x20 != 0;
        debug!("control {c1:#04x} {c2:#04x}");

        if is_preamble {
            self.preamble(c1, c2, proc);
            return;
        }

        match c1 & !0x08 {
            0x10 if is_mid_row => {
                let alpha = if c2 & 0x01 != 0 {
                    OPACITY_TRANSLUCENT
                } else {
                    OPACITY_SOLID
                };
                self.set_background((c2 & 0x0E) >> 1, alpha, false, proc);
            }
            0x11 if c2 & 0xF0 == 0x30 => report_char(tables::special_char(c2), proc),
            0x11 if is_mid_row => {
                let style = TextStyle::from_attribute((c2 & 0x0E) >> 1);
                self.set_style(style, c2 & 0x01 != 0, true, proc);
            }
            0x12 | 0x13 if c2 & 0xE0 == 0x20 => {
                // implied backspace replaces the preceding basic character
                self.backspace(proc);
                report_char(tables::extended_char(c1, c2), proc);
            }
            0x14 | 0x15 => self.caption_control(c2, proc),
            0x17 if (0x21..=0x23).contains(&c2) => proc.set_tab_offset(c2 - 0x20),
            0x17 if is_mid_row => {
                if c2 & 0x02 != 0 {
                    self.set_style(TextStyle::Black, c2 & 0x01 != 0, false, proc);
                } else {
                    self.set_background(7, OPACITY_TRANSPARENT, false, proc);
                }
            }
            _ => debug!("Unknown control code {c1:#04x} {c2:#04x}"),
        }
    }

    fn preamble<P: CommandProcessor + ?Sized>(&mut self, c1: u8, c2: u8, proc: &mut P) {
        let Some(pac) = tables::parse_preamble(c1, c2) else {
            return;
        };
        let row = pac.row();
        let Some(window) = self.window_from_row(row) else {
            error!("no window for preamble row {row} in state {:?}", self.state);
            return;
        };

        debug!("PAC row {row} (set current window {window})");
        proc.set_current_window(window);

        let indent = pac
            .code()
            .indent()
            .unwrap_or(self.window_info[window as usize].indent);

        if self.state == CaptionState::Text {
            proc.set_pen_location(0, indent);
        } else {
            self.set_window_position(self.state, row, indent, proc);
            self.last_base_row = row;
            if self.state.is_paint_on() {
                proc.display_windows(WindowMask::single(window));
            }
        }

        match pac.code() {
            PreambleType::Indent(_) => self.set_underline(pac.underline(), proc),
            PreambleType::Style(style) => {
                // ignore the style if there is already text on this row
                if !proc.has_text(row) {
                    self.set_style(style, pac.underline(), false, proc);
                }
            }
        }
    }

    fn set_background<P: CommandProcessor + ?Sized>(
        &self,
        color: u8,
        alpha: u8,
        mid_row: bool,
        proc: &mut P,
    ) {
        trace!("background color {color}, alpha {alpha:#04x}, mid row {mid_row}");
        let Some(mut attrs) = proc.active_pen_attributes() else {
            return;
        };
        let bg = Color::from_attribute(color)
            .map(|color| color.argb())
            .unwrap_or(COLOR_BLACK);
        if mid_row {
            self.insert_char(0x20, proc);
        }
        attrs.pen_color.bg_color = tables::with_alpha(bg, alpha);
        attrs.flashing = false;
        proc.override_pen_attributes(&attrs, mid_row);
    }

    fn set_style<P: CommandProcessor + ?Sized>(
        &self,
        style: TextStyle,
        underline: bool,
        mid_row: bool,
        proc: &mut P,
    ) {
        trace!("style {style:?}, underline {underline}, mid row {mid_row}");
        let Some(mut attrs) = proc.active_pen_attributes() else {
            return;
        };
        attrs.italics = false;
        match style {
            TextStyle::Black => attrs.pen_color.fg_color = COLOR_BLACK,
            TextStyle::Italics => attrs.italics = true,
            TextStyle::Color(color) => attrs.pen_color.fg_color = color.argb(),
        }

        if mid_row && underline {
            self.insert_char(0x20, proc);
        }

        attrs.underline = underline;
        attrs.flashing = false;
        proc.override_pen_attributes(&attrs, mid_row);

        if mid_row && !underline {
            self.insert_char(0x20, proc);
        }
    }

    fn set_underline<P: CommandProcessor + ?Sized>(&self, underline: bool, proc: &mut P) {
        let Some(mut attrs) = proc.active_pen_attributes() else {
            return;
        };
        attrs.underline = underline;
        attrs.flashing = false;
        proc.override_pen_attributes(&attrs, false);
    }

    fn backspace<P: CommandProcessor + ?Sized>(&self, proc: &mut P) {
        if self.state != CaptionState::Idle {
            proc.backspace();
        }
    }

    fn remove_from_window_list(&mut self, window: u8) {
        self.window_list.retain(|&id| id != window);
    }

    fn window_from_row(&mut self, row: u8) -> Option<u8> {
        match self.state {
            CaptionState::Idle => return None,
            CaptionState::RollUp2
            | CaptionState::RollUp3
            | CaptionState::RollUp4
            | CaptionState::Text => {
                self.window_info[0].assigned_row = Some(row);
                return Some(0);
            }
            _ => (),
        }

        // the windows not currently displayed receive pop-on text, paint-on writes to the
        // displayed windows
        let offset = match self.state {
            CaptionState::PopOn2 | CaptionState::PaintOn1 => 0,
            _ => 4,
        };
        let range = offset..offset + 4;

        trace!(
            "row assignments {:?}",
            self.window_info
                .iter()
                .map(|info| info.assigned_row)
                .collect::<Vec<_>>()
        );

        if let Some(window) = range
            .clone()
            .find(|&window| self.window_info[window as usize].assigned_row == Some(row))
        {
            self.remove_from_window_list(window);
            self.window_list.push(window);
            return Some(window);
        }

        if let Some(window) = range
            .clone()
            .find(|&window| self.window_info[window as usize].assigned_row.is_none())
        {
            self.window_info[window as usize].assigned_row = Some(row);
            self.window_list.push(window);
            return Some(window);
        }

        // replace the least recently used window
        let window = self
            .window_list
            .iter()
            .copied()
            .find(|window| range.contains(window))
            .unwrap_or(offset);
        self.remove_from_window_list(window);
        self.window_list.push(window);
        self.window_info[window as usize].assigned_row = Some(row);
        Some(window)
    }

    fn update_position(&mut self, def: &mut WindowDefinition, base_row: u8, indent: u8) {
        let indent = indent.min(MAX_COLUMNS - 1);
        let base_row = base_row.min(MAX_ROWS);
        def.row_count = self.state.window_rows(def.id);
        def.anchor_vertical = base_row.saturating_sub(def.row_count);
        def.anchor_horizontal = indent;
        if let Some(info) = self.window_info.get_mut(def.id as usize) {
            info.base_row = Some(base_row);
            info.indent = indent;
        }
    }

    fn set_window_position<P: CommandProcessor + ?Sized>(
        &mut self,
        state: CaptionState,
        base_row: u8,
        column: u8,
        proc: &mut P,
    ) {
        let Some(mut def) = proc.current_window_definition() else {
            warn!("set position on undefined window");
            return;
        };

        let (base_row, cursor_row) = match state {
            CaptionState::RollUp2 => (base_row.max(2), 1),
            CaptionState::RollUp3 => (base_row.max(3), 2),
            CaptionState::RollUp4 => (base_row.max(4), 3),
            CaptionState::Text => (base_row.max(8), 0),
            CaptionState::PaintOn1 | CaptionState::PaintOn2 if proc.has_text(0) => {
                proc.set_pen_location(def.row_count.saturating_sub(1), column);
                return;
            }
            _ => (base_row, 0),
        };

        self.update_position(&mut def, base_row, 0);
        proc.define_window(&def);
        proc.set_pen_location(cursor_row, column);

        if state == CaptionState::Text {
            if let Some(def) = proc.current_window_definition() {
                let attrs = WindowAttributes {
                    fill_color: tables::with_alpha(COLOR_BLACK, OPACITY_SOLID),
                    ..def.win_style
                };
                proc.set_window_attributes(&attrs);
            }
            proc.clear_window();
        }
    }

    fn clear_window<P: CommandProcessor + ?Sized>(&mut self, window: u8, proc: &mut P) {
        proc.clear_windows(WindowMask::single(window));
        proc.update_window_row_count(window, self.state.window_rows(window), false);
        self.window_info[window as usize] = WindowInfo::default();
    }

    fn erase_memory<P: CommandProcessor + ?Sized>(&mut self, displayed: bool, proc: &mut P) {
        for window in 0..MAX_WINDOWS {
            if self.state.window_visible(window) == displayed {
                self.clear_window(window, proc);
                self.remove_from_window_list(window);
            }
        }
    }

    fn clear_windows<P: CommandProcessor + ?Sized>(&mut self, proc: &mut P) {
        for window in 0..MAX_WINDOWS {
            let clear = match self.state {
                CaptionState::Idle | CaptionState::Text => true,
                CaptionState::RollUp2
                | CaptionState::RollUp3
                | CaptionState::RollUp4
                | CaptionState::PaintOn1
                | CaptionState::PaintOn2 => false,
                CaptionState::PopOn1 | CaptionState::PopOn2 => self.state.window_visible(window),
            };
            if clear {
                self.clear_window(window, proc);
                self.remove_from_window_list(window);
            }
        }
    }

    fn define_windows<P: CommandProcessor + ?Sized>(&mut self, proc: &mut P) {
        trace!("define windows for {:?}", self.state);
        // hidden windows first so that the current window ends up being a visible one
        for window in 0..MAX_WINDOWS {
            if !self.state.window_visible(window) {
                self.define_window(window, proc);
            }
        }
        for window in 0..MAX_WINDOWS {
            if self.state.window_visible(window) {
                self.define_window(window, proc);
            }
        }
    }

    fn define_window<P: CommandProcessor + ?Sized>(&mut self, window: u8, proc: &mut P) {
        let row_count = self.state.window_rows(window);

        if let Some(def) = proc.window_definition(window) {
            if def.row_count > 1 && row_count > 1 {
                // roll-up to roll-up keeps the existing rows
                proc.update_window_row_count(window, row_count, true);
            } else if self.state.is_paint_on() {
                // paint-on keeps existing text until told to clear it
            } else if row_count != def.row_count {
                self.clear_window(window, proc);
            }
            proc.set_current_window(window);
        } else {
            let transparent_black = tables::with_alpha(COLOR_BLACK, OPACITY_TRANSPARENT);
            let mut def = WindowDefinition {
                id: window,
                priority: 0,
                visible: false,
                col_count: MAX_COLUMNS,
                row_count,
                relative_pos: false,
                anchor_point: AnchorPoint::TopLeft,
                pen_style: PenAttributes::default(),
                win_style: WindowAttributes {
                    fill_color: transparent_black,
                    border_color: transparent_black,
                    ..Default::default()
                },
                ..Default::default()
            };
            self.update_position(&mut def, MAX_ROWS, 0);
            proc.define_window(&def);
        }

        if self.state.window_visible(window) {
            if self.window_info[window as usize].assigned_row.is_some() {
                trace!("window {window} is visible");
                proc.display_windows(WindowMask::single(window));
            } else {
                trace!("window {window} is visible but has no row assigned");
            }
        } else {
            proc.hide_windows(WindowMask::single(window));
        }
    }

    fn caption_control<P: CommandProcessor + ?Sized>(&mut self, c2: u8, proc: &mut P) {
        let Some(control) = CaptionControl::from_byte(c2) else {
            warn!("Unrecognised control code {c2:#04x}");
            return;
        };
        let last_state = self.state;
        let timed_out = proc.is_window_timed_out();
        let mut define_on_timeout = false;

        debug!("caption control {} in {:?}", control.name(), self.state);

        match control {
            CaptionControl::ResumeCaptionLoading => match self.state {
                CaptionState::PopOn1 | CaptionState::PopOn2 => (),
                CaptionState::PaintOn2 => self.state = CaptionState::PopOn2,
                _ => self.state = CaptionState::PopOn1,
            },
            CaptionControl::Backspace => self.backspace(proc),
            CaptionControl::AlarmOff
            | CaptionControl::AlarmOn
            | CaptionControl::DeleteToEndOfRow => (),
            CaptionControl::RollUp2 | CaptionControl::RollUp3 | CaptionControl::RollUp4 => {
                if !self.state.is_roll_up() {
                    self.erase_memory(true, proc);
                    self.erase_memory(false, proc);
                }
                self.state = match control {
                    CaptionControl::RollUp2 => CaptionState::RollUp2,
                    CaptionControl::RollUp3 => CaptionState::RollUp3,
                    _ => CaptionState::RollUp4,
                };
                define_on_timeout = true;
            }
            CaptionControl::FlashOn => {
                if let Some(mut attrs) = proc.active_pen_attributes() {
                    attrs.flashing = true;
                    proc.override_pen_attributes(&attrs, false);
                }
            }
            CaptionControl::ResumeDirectionCaptioning => match self.state {
                CaptionState::PopOn2 | CaptionState::PaintOn2 => {
                    self.state = CaptionState::PaintOn2
                }
                _ => self.state = CaptionState::PaintOn1,
            },
            CaptionControl::TextRestart => {
                if self.state == CaptionState::Text {
                    proc.set_pen_location(0, 0);
                }
                self.erase_memory(true, proc);
                self.state = CaptionState::Text;
            }
            CaptionControl::ResumeTextDisplay => self.state = CaptionState::Text,
            CaptionControl::EraseDisplayedMemory => self.erase_memory(true, proc),
            CaptionControl::CarriageReturn => {
                if self.state.is_roll_up() || self.state == CaptionState::Text {
                    proc.carriage_return();
                }
            }
            CaptionControl::EraseNonDisplayedMemory => self.erase_memory(false, proc),
            CaptionControl::EndOfCaption => match self.state {
                CaptionState::RollUp2
                | CaptionState::RollUp3
                | CaptionState::RollUp4
                | CaptionState::PopOn1
                | CaptionState::PaintOn1 => self.state = CaptionState::PopOn2,
                _ => self.state = CaptionState::PopOn1,
            },
        }

        if last_state != self.state || (timed_out && define_on_timeout) {
            debug!("caption state {last_state:?} -> {:?}", self.state);
            self.window_list.clear();

            if !matches!(
                control,
                CaptionControl::EndOfCaption
                    | CaptionControl::ResumeCaptionLoading
                    | CaptionControl::ResumeDirectionCaptioning
            ) {
                self.clear_windows(proc);
            }

            self.define_windows(proc);

            if self.state.is_roll_up() || self.state == CaptionState::Text {
                proc.set_current_window(0);
                let row_count = proc
                    .current_window_definition()
                    .map(|def| def.row_count)
                    .unwrap_or_else(|| {
                        warn!("cannot obtain row count, defaulting base row to {MAX_ROWS}");
                        MAX_ROWS
                    });
                let base_row = if timed_out && define_on_timeout {
                    self.last_base_row
                } else {
                    row_count
                };
                self.set_window_position(self.state, base_row, 0, proc);
                proc.display_windows(WindowMask::single(0));
            }
        }

        proc.reset_window_timeout(if self.state == CaptionState::Text {
            0
        } else {
            DISPLAY_TIMEOUT_SECONDS
        });
    }
}

fn is_control_code(data1: u8) -> bool {
    (0x10..=0x1F).contains(&data1)
}

fn report_char<P: CommandProcessor + ?Sized>(c: char, proc: &mut P) {
    let mut buf = [0; 4];
    proc.report(c.encode_utf8(&mut buf));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tables::add_parity;
    use crate::tests::*;

    fn send(
        decoder: &mut Cea608Decoder,
        proc: &mut RecordingProcessor,
        channel: Cea608Channel,
        data: [u8; 2],
    ) {
        let cc_type = if channel.field() == tables::Field::ONE {
            CcType::Field1
        } else {
            CcType::Field2
        };
        decoder.process(
            channel,
            cc_type,
            add_parity(data[0]),
            add_parity(data[1]),
            proc,
        );
    }

    fn cc1(decoder: &mut Cea608Decoder, proc: &mut RecordingProcessor, data: [u8; 2]) {
        send(decoder, proc, Cea608Channel::Cc1, data)
    }

    fn count(proc: &RecordingProcessor, name: &str) -> usize {
        proc.calls.iter().filter(|call| call.starts_with(name)).count()
    }

    #[test]
    fn roll_up_from_idle_clears_all_windows() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        // select the channel first so the service change reset is out of the way
        cc1(&mut decoder, &mut proc, [0x00, 0x00]);
        proc.calls.clear();

        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        assert_eq!(decoder.state(), CaptionState::RollUp2);
        assert_eq!(count(&proc, "clear_windows"), 8);
        let def = proc.window_definition(0).unwrap();
        assert_eq!(def.row_count, 2);
        assert_eq!(proc.current, Some(0));
        assert!(proc.calls.contains(&"display_windows(0x1)".to_string()));
        assert!(proc.calls.contains(&"reset_window_timeout(10)".to_string()));
    }

    #[test]
    fn roll_up_again_does_not_clear() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        proc.calls.clear();

        cc1(&mut decoder, &mut proc, [0x14, 0x26]);
        assert_eq!(decoder.state(), CaptionState::RollUp3);
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        assert_eq!(decoder.state(), CaptionState::RollUp2);
        cc1(&mut decoder, &mut proc, [0x14, 0x27]);
        assert_eq!(decoder.state(), CaptionState::RollUp4);
        cc1(&mut decoder, &mut proc, [0x14, 0x27]);
        cc1(&mut decoder, &mut proc, [0x14, 0x27]);
        assert_eq!(count(&proc, "clear_windows"), 0);
        assert_eq!(proc.window_definition(0).unwrap().row_count, 4);
        assert!(count(&proc, "update_window_row_count(0, 3, true)") > 0);
    }

    #[test]
    fn repeated_control_processed_once() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        proc.calls.clear();

        cc1(&mut decoder, &mut proc, [0x14, 0x2D]);
        cc1(&mut decoder, &mut proc, [0x14, 0x2D]);
        assert_eq!(count(&proc, "carriage_return"), 1);
        // the third copy is a new command
        cc1(&mut decoder, &mut proc, [0x14, 0x2D]);
        assert_eq!(count(&proc, "carriage_return"), 2);
    }

    #[test]
    fn characters_need_an_assigned_window() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        cc1(&mut decoder, &mut proc, [0x48, 0x49]);
        assert_eq!(count(&proc, "report"), 0);

        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        cc1(&mut decoder, &mut proc, [0x48, 0x49]);
        assert_eq!(proc.text(), "HI");
    }

    #[test]
    fn filtered_pairs() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        proc.calls.clear();

        // bad parity
        decoder.process(Cea608Channel::Cc1, CcType::Field1, 0x48, 0xC9, &mut proc);
        // wrong field
        decoder.process(Cea608Channel::Cc1, CcType::Field2, 0xC8, 0x49, &mut proc);
        // CEA-708 data
        decoder.process(Cea608Channel::Cc1, CcType::CcpData, 0xC8, 0x49, &mut proc);
        assert_eq!(count(&proc, "report"), 0);

        // a roll-up for CC2 switches the current channel away from CC1
        cc1(&mut decoder, &mut proc, [0x1C, 0x25]);
        cc1(&mut decoder, &mut proc, [0x48, 0x49]);
        assert_eq!(count(&proc, "report"), 0);
        assert_eq!(decoder.state(), CaptionState::RollUp2);

        // and back again
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        cc1(&mut decoder, &mut proc, [0x48, 0x49]);
        assert_eq!(proc.text(), "HI");
    }

    #[test]
    fn channel_change_resets() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        proc.calls.clear();
        send(&mut decoder, &mut proc, Cea608Channel::Cc3, [0x15, 0x25]);
        assert_eq!(decoder.requested_channel(), Cea608Channel::Cc3);
        assert!(proc.calls.contains(&"delete_windows(0xff)".to_string()));
        assert_eq!(decoder.state(), CaptionState::RollUp2);
    }

    #[test]
    fn xds_on_field2_selects_no_channel() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        send(&mut decoder, &mut proc, Cea608Channel::Cc3, [0x15, 0x25]);
        send(&mut decoder, &mut proc, Cea608Channel::Cc3, [0x11, 0x40]);
        send(&mut decoder, &mut proc, Cea608Channel::Cc3, [0x01, 0x03]);
        send(&mut decoder, &mut proc, Cea608Channel::Cc3, [0x48, 0x49]);
        assert_eq!(count(&proc, "report"), 0);
    }

    #[test]
    fn pop_on_loads_hidden_windows() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x20]);
        assert_eq!(decoder.state(), CaptionState::PopOn1);
        for id in 0..8 {
            assert_eq!(proc.window_definition(id).unwrap().col_count, 32);
        }

        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        assert_eq!(proc.current, Some(4));
        cc1(&mut decoder, &mut proc, [0x11, 0x60]);
        assert_eq!(proc.current, Some(5));
        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        assert_eq!(proc.current, Some(4));

        proc.calls.clear();
        cc1(&mut decoder, &mut proc, [0x14, 0x2F]);
        assert_eq!(decoder.state(), CaptionState::PopOn2);
        // no clearing when flipping the buffers
        assert_eq!(count(&proc, "clear_windows"), 0);
        assert!(proc.calls.contains(&"display_windows(0x10)".to_string()));
        assert!(proc.calls.contains(&"display_windows(0x20)".to_string()));
        assert!(proc.calls.contains(&"hide_windows(0x1)".to_string()));
    }

    #[test]
    fn pop_on_replaces_least_recently_used() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x20]);
        for (byte0, byte1) in [(0x11, 0x40), (0x11, 0x60), (0x12, 0x40), (0x12, 0x60)] {
            cc1(&mut decoder, &mut proc, [byte0, byte1]);
        }
        // touch row 1 again so window 5 becomes the oldest
        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        assert_eq!(proc.current, Some(4));
        cc1(&mut decoder, &mut proc, [0x15, 0x40]);
        assert_eq!(proc.current, Some(5));
    }

    #[test]
    fn extended_character_replaces_previous() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        cc1(&mut decoder, &mut proc, [0x45, 0x00]);
        cc1(&mut decoder, &mut proc, [0x12, 0x21]);
        assert_eq!(proc.text(), "É");
        cc1(&mut decoder, &mut proc, [0x11, 0x37]);
        assert_eq!(proc.text(), "É♪");
    }

    #[test]
    fn mid_row_inserts_space() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        proc.calls.clear();
        cc1(&mut decoder, &mut proc, [0x11, 0x28]);
        assert_eq!(
            proc.calls,
            vec![
                "override_pen_attributes(true)".to_string(),
                "report( )".to_string(),
            ]
        );
        let attrs = proc.overridden.unwrap();
        assert_eq!(attrs.pen_color.fg_color, Color::Red.argb());
        assert!(!attrs.underline);
    }

    #[test]
    fn paint_on_displays_immediately() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x29]);
        assert_eq!(decoder.state(), CaptionState::PaintOn1);
        assert_eq!(count(&proc, "display_windows"), 0);

        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        assert_eq!(proc.current, Some(0));
        cc1(&mut decoder, &mut proc, [0x48, 0x49]);
        assert_eq!(proc.text(), "HI");
        let display = proc
            .calls
            .iter()
            .position(|call| call == "display_windows(0x1)")
            .unwrap();
        let report = proc
            .calls
            .iter()
            .position(|call| call.starts_with("report"))
            .unwrap();
        assert!(display < report);
    }

    #[test]
    fn paint_on_preamble_keeps_text() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x29]);
        cc1(&mut decoder, &mut proc, [0x11, 0x40]);
        cc1(&mut decoder, &mut proc, [0x48, 0x49]);
        assert!(proc.has_text(0));
        proc.calls.clear();

        // same row, indent 4
        cc1(&mut decoder, &mut proc, [0x11, 0x52]);
        assert!(proc.calls.contains(&"set_pen_location(0, 4)".to_string()));
        assert_eq!(count(&proc, "define_window"), 0);
        assert_eq!(count(&proc, "clear_window"), 0);
        assert!(proc.has_text(0));
        assert_eq!(proc.text(), "HI");
    }

    #[test]
    fn paint_on_transitions() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x29]);
        cc1(&mut decoder, &mut proc, [0x14, 0x20]);
        assert_eq!(decoder.state(), CaptionState::PopOn1);

        cc1(&mut decoder, &mut proc, [0x14, 0x2F]);
        assert_eq!(decoder.state(), CaptionState::PopOn2);
        cc1(&mut decoder, &mut proc, [0x14, 0x29]);
        assert_eq!(decoder.state(), CaptionState::PaintOn2);

        // loading into the hidden windows again, without clearing the displayed ones
        proc.calls.clear();
        cc1(&mut decoder, &mut proc, [0x14, 0x20]);
        assert_eq!(decoder.state(), CaptionState::PopOn2);
        assert_eq!(count(&proc, "clear_windows"), 0);
    }

    #[test]
    fn preamble_style_ignored_on_row_with_text() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x27]);
        // row 3, white
        cc1(&mut decoder, &mut proc, [0x12, 0x40]);
        assert_eq!(count(&proc, "override_pen_attributes"), 1);
        cc1(&mut decoder, &mut proc, [0x41, 0x42]);
        assert!(proc.has_text(3));

        cc1(&mut decoder, &mut proc, [0x12, 0x40]);
        assert_eq!(count(&proc, "override_pen_attributes"), 1);
        assert_eq!(proc.text(), "AB");
    }

    #[test]
    fn text_mode() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        send(&mut decoder, &mut proc, Cea608Channel::Text1, [0x14, 0x2A]);
        assert_eq!(decoder.state(), CaptionState::Text);
        let def = proc.window_definition(0).unwrap();
        assert_eq!(def.row_count, 8);
        assert_eq!(def.win_style.fill_color, 0xFF00_0000);
        assert!(proc.calls.contains(&"reset_window_timeout(0)".to_string()));
        send(&mut decoder, &mut proc, Cea608Channel::Text1, [0x11, 0x40]);
        send(&mut decoder, &mut proc, Cea608Channel::Text1, [0x4F, 0x4B]);
        assert_eq!(proc.text(), "OK");
    }

    #[test]
    fn timed_out_roll_up_redefines() {
        test_init_log();
        let mut decoder = Cea608Decoder::default();
        let mut proc = RecordingProcessor::default();
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        cc1(&mut decoder, &mut proc, [0x14, 0x40]);
        proc.timed_out = true;
        proc.calls.clear();
        cc1(&mut decoder, &mut proc, [0x14, 0x25]);
        // repositioned at the last preamble row
        let def = proc.window_definition(0).unwrap();
        assert_eq!(def.anchor_vertical, 14 - 2);
        assert!(proc.calls.contains(&"display_windows(0x1)".to_string()));
    }

    #[test]
    fn channels() {
        test_init_log();
        for service in 1000..=1007 {
            assert_eq!(Cea608Channel::from_service(service).service(), service);
        }
        assert_eq!(Cea608Channel::Cc2.field(), tables::Field::ONE);
        assert_eq!(Cea608Channel::Text3.field(), tables::Field::TWO);
        assert!(Cea608Channel::Text2.is_text());
        assert!(!Cea608Channel::Cc4.is_text());
    }
}
