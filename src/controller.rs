// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::attributes::{PenAttributes, PenColor, WindowDefinition, WindowMask};
use crate::clock::Clock;
use crate::gfx::Gfx;
use crate::packet::{CaptionChannelPacket, ServiceBlock};
use crate::parser::CommandParser;
use crate::processor::CommandProcessor;
use crate::settings::CcAttributes;
use crate::user_data::{CcData, UserData};
use crate::window_controller::WindowController;
use crate::{AttributeError, ControllerError};

const PREVIEW_WINDOW: u8 = 5;
const PREVIEW_COLUMNS: u8 = 32;

/// The kind of captions a [`Controller`] decodes
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CeaType {
    /// CEA-608 byte pairs, with services 1000-1007 selecting CC1-CC4 and Text1-Text4
    #[default]
    Cea608,
    /// CEA-708 caption channel packets, with services 1-63
    Cea708,
}

/// Decodes raw `cc_data` payloads for one caption service and draws the result.
///
/// A [`Controller`] starts stopped and muted.  Data can only be added once started and is
/// only decoded while unmuted.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::*;
/// # use std::rc::Rc;
/// #[derive(Default)]
/// struct Screen(Vec<String>);
///
/// impl Gfx for Screen {
///     fn draw_background(&mut self, _: Point, _: Dimensions, _: u32) {}
///     fn draw_border(
///         &mut self,
///         _: Point,
///         _: Dimensions,
///         _: u32,
///         _: u32,
///         _: attributes::WindowBorder,
///     ) {
///     }
///     fn draw_text(&mut self, _: Point, _: Dimensions, text: &str, _: &PenAttributes) {
///         self.0.push(text.to_string());
///     }
///     fn draw_underline(&mut self, _: Point, _: Dimensions, _: u32) {}
///     fn update(&mut self) {}
///     fn clear(&mut self) {}
///     fn show(&mut self) {}
///     fn hide(&mut self) {}
/// }
///
/// let mut controller = Controller::new(Rc::new(SystemClock::new()), Screen::default());
/// controller.start();
/// controller.set_text_for_preview("Preview");
/// assert_eq!(controller.gfx().0, ["Preview"]);
/// ```
pub struct Controller<G: Gfx> {
    gfx: G,
    parser: CommandParser,
    windows: WindowController,
    started: bool,
    muted: bool,
    active_type: CeaType,
    active_service: u32,
    ccp: Option<CaptionChannelPacket>,
    user_data: VecDeque<UserData>,
    packets: VecDeque<CaptionChannelPacket>,
    blocks: VecDeque<ServiceBlock>,
}

impl<G: Gfx + std::fmt::Debug> std::fmt::Debug for Controller<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("gfx", &self.gfx)
            .field("parser", &self.parser)
            .field("windows", &self.windows)
            .field("started", &self.started)
            .field("muted", &self.muted)
            .field("active_type", &self.active_type)
            .field("active_service", &self.active_service)
            .field("ccp", &self.ccp)
            .field("user_data", &self.user_data.len())
            .field("packets", &self.packets.len())
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl<G: Gfx> Controller<G> {
    /// Construct a new stopped and muted [`Controller`] drawing onto `gfx`
    pub fn new(clock: Rc<dyn Clock>, gfx: G) -> Self {
        Self {
            gfx,
            parser: CommandParser::new(clock.clone()),
            windows: WindowController::new(clock),
            started: false,
            muted: true,
            active_type: CeaType::default(),
            active_service: 0,
            ccp: None,
            user_data: VecDeque::new(),
            packets: VecDeque::new(),
            blocks: VecDeque::new(),
        }
    }

    /// Replace the [`WindowController`], for example to change the screen layout
    pub fn with_window_controller(mut self, windows: WindowController) -> Self {
        self.windows = windows;
        self
    }

    /// The renderer
    pub fn gfx(&self) -> &G {
        &self.gfx
    }

    /// The renderer, mutably
    pub fn gfx_mut(&mut self) -> &mut G {
        &mut self.gfx
    }

    /// The [`CommandParser`] decoding the active service
    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    /// The [`WindowController`] holding the decoded windows
    pub fn window_controller(&self) -> &WindowController {
        &self.windows
    }

    /// Whether [`start`](Self::start) has been called without a following
    /// [`stop`](Self::stop)
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether decoding and drawing is currently suppressed
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// The caption type currently decoded
    pub fn active_type(&self) -> CeaType {
        self.active_type
    }

    /// The caption service currently decoded
    pub fn active_service(&self) -> u32 {
        self.active_service
    }

    /// The number of user data payloads, packets and service blocks waiting for
    /// [`process`](Self::process)
    pub fn queued(&self) -> usize {
        self.user_data.len() + self.packets.len() + self.blocks.len()
    }

    /// Start decoding.  Does nothing if already started.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        info!(
            "starting {:?} service {}",
            self.active_type, self.active_service
        );
        if self.active_type == CeaType::Cea608 {
            self.parser.set_608(&mut self.windows);
        }
        self.started = true;
        self.gfx.clear();
        self.gfx.update();
        if !self.muted {
            self.gfx.show();
        }
    }

    /// Stop decoding, dropping all decoded and queued captions.  Does nothing if already
    /// stopped.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        info!("stopping");
        self.started = false;
        self.parser.reset_608(&mut self.windows);
        self.windows.reset();
        self.parser.reset();
        self.gfx.clear();
        self.gfx.update();
        self.gfx.hide();
        self.purge();
    }

    /// Select the caption type and service to decode.  Any change stops the controller.
    pub fn set_active_service(&mut self, active_type: CeaType, service: u32) {
        if self.active_type == active_type && self.active_service == service {
            return;
        }
        info!("active service changed to {active_type:?} service {service}");
        self.active_type = active_type;
        self.active_service = service;
        self.stop();
    }

    /// Stop decoding and hide the renderer
    pub fn mute(&mut self) {
        if self.muted {
            return;
        }
        info!("muted");
        self.muted = true;
        if self.started {
            self.gfx.hide();
        }
    }

    /// Resume decoding and show the renderer
    pub fn unmute(&mut self) {
        if !self.muted {
            return;
        }
        info!("unmuted");
        self.muted = false;
        if self.started {
            self.gfx.show();
        }
    }

    /// Queue a raw `cc_data` payload for [`process`](Self::process)
    pub fn add_data(&mut self, data: &[u8]) -> Result<(), ControllerError> {
        if !self.started {
            return Err(ControllerError::NotStarted);
        }
        if data.is_empty() {
            return Err(ControllerError::EmptyData);
        }
        self.user_data.push_back(UserData::new(data));
        Ok(())
    }

    /// Decode all queued data and draw the result
    pub fn process(&mut self) {
        if !self.started || self.muted {
            if self.queued() > 0 {
                debug!("discarding {} queued items", self.queued());
            }
            self.purge();
            return;
        }

        while let Some(user_data) = self.user_data.pop_front() {
            for cc_data in user_data {
                match self.active_type {
                    CeaType::Cea608 => self.process_608(&cc_data),
                    CeaType::Cea708 => self.process_ccp(&cc_data),
                }
            }
        }

        while let Some(ccp) = self.packets.pop_front() {
            let service = self.active_service;
            self.blocks.extend(
                ccp.service_blocks()
                    .filter(|block| block.service_number() as u32 == service),
            );
        }

        while let Some(block) = self.blocks.pop_front() {
            self.parser.process(&block, &mut self.windows);
        }

        self.windows.draw_windows(&mut self.gfx);
    }

    fn process_608(&mut self, cc_data: &CcData) {
        if !cc_data.valid || !cc_data.is_cea608() {
            return;
        }
        self.parser.process_608_data(
            self.active_service,
            cc_data.cc_type,
            cc_data.data1,
            cc_data.data2,
            &mut self.windows,
        );
    }

    fn process_ccp(&mut self, cc_data: &CcData) {
        if cc_data.is_ccp_start() {
            if let Some(ccp) = self.ccp.take() {
                debug!(
                    "flushing incomplete packet of {}/{} bytes",
                    ccp.data().len() + 1,
                    ccp.size()
                );
                self.packets.push_back(ccp);
            }
            match CaptionChannelPacket::from_cc_data(cc_data) {
                Ok(ccp) => self.ccp = Some(ccp),
                Err(err) => warn!("Failed to start caption channel packet: {err}"),
            }
        } else if cc_data.is_ccp_data() {
            let Some(ccp) = self.ccp.as_mut() else {
                debug!("caption channel packet data without a start");
                return;
            };
            if let Err(err) = ccp.add(cc_data) {
                warn!("Failed to add to caption channel packet: {err}");
                return;
            }
            if ccp.is_full() {
                if let Some(ccp) = self.ccp.take() {
                    trace!("packet {} complete", ccp.sequence_no());
                    self.packets.push_back(ccp);
                }
            }
        }
    }

    fn purge(&mut self) {
        self.ccp = None;
        self.user_data.clear();
        self.packets.clear();
        self.blocks.clear();
    }

    /// Replace every window with a single window showing `text`
    pub fn set_text_for_preview(&mut self, text: &str) {
        debug!("preview text {text:?}");
        self.windows.delete_windows(WindowMask::ALL);
        let def = WindowDefinition {
            id: PREVIEW_WINDOW,
            priority: 1,
            visible: true,
            row_count: 1,
            col_count: PREVIEW_COLUMNS,
            ..Default::default()
        };
        self.windows.define_window(&def);
        self.windows.set_pen_attributes(&PenAttributes::default());
        self.windows.set_pen_color(&PenColor::default());
        self.windows.set_pen_location(0, 0);
        self.windows.report(text);
        self.windows.display_windows(WindowMask::ALL);
        self.windows.draw_windows(&mut self.gfx);
    }

    /// Apply user overrides to the caption presentation
    pub fn set_cc_attributes(&mut self, attrs: &CcAttributes) -> Result<(), AttributeError> {
        self.windows.set_cc_attributes(attrs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gfx::cell_text_drawer_factory;
    use crate::window::ScreenInfo;
    use crate::tables::add_parity;
    use crate::tests::*;

    fn controller(active_type: CeaType, service: u32) -> Controller<RecordingGfx> {
        let clock = ManualClock::default();
        let mut controller = Controller::new(Rc::new(clock), RecordingGfx::default());
        controller.set_active_service(active_type, service);
        controller.unmute();
        controller.start();
        controller
    }

    fn cc1(pairs: &[[u8; 2]]) -> Vec<u8> {
        pairs
            .iter()
            .flat_map(|pair| [0xFC, add_parity(pair[0]), add_parity(pair[1])])
            .collect()
    }

    #[test]
    fn cea608_pop_on() {
        test_init_log();
        let mut controller = controller(CeaType::Cea608, 1000);
        assert!(controller.window_controller().is_608_enabled());
        // RCL, PAC row 1, "HI", EOC
        let data = cc1(&[[0x14, 0x20], [0x11, 0x40], [0x48, 0x49], [0x14, 0x2F]]);
        controller.add_data(&data).unwrap();
        controller.process();

        let visible = controller
            .window_controller()
            .windows()
            .filter(|window| window.is_visible())
            .collect::<Vec<_>>();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].text(), "HI");
        assert_eq!(visible[0].definition().anchor_vertical, 0);
        assert!(controller.gfx().texts().contains(&"HI".to_string()));
        assert_eq!(controller.queued(), 0);
    }

    #[test]
    fn cea608_other_channel_ignored() {
        test_init_log();
        let mut controller = controller(CeaType::Cea608, 1001);
        let data = cc1(&[[0x14, 0x20], [0x11, 0x40], [0x48, 0x49], [0x14, 0x2F]]);
        controller.add_data(&data).unwrap();
        controller.process();
        assert!(controller
            .window_controller()
            .windows()
            .all(|window| !window.is_visible()));
        assert!(controller.gfx().texts().is_empty());
    }

    // CCP of 12 bytes: service 1 with SetCurrentWindow 0, DefineWindow 0 (visible, 2 rows,
    // 32 columns) then "Hi"
    const CCP: [u8; 18] = [
        0xFF, 0x06, 0x2A, 0xFE, 0x80, 0x98, 0xFE, 0x20, 0x00, 0xFE, 0x00, 0x01, 0xFE, 0x1F,
        0x00, 0xFE, 0x48, 0x69,
    ];

    #[test]
    fn cea708_service() {
        test_init_log();
        let mut controller = controller(CeaType::Cea708, 1);
        assert!(!controller.window_controller().is_608_enabled());
        controller.add_data(&CCP).unwrap();
        controller.process();

        let window = controller.window_controller().window(0).unwrap();
        assert!(window.is_visible());
        assert_eq!(window.definition().row_count, 2);
        assert_eq!(window.definition().col_count, 32);
        assert_eq!(window.text(), "Hi");
        assert!(controller.gfx().texts().contains(&"Hi".to_string()));
    }

    #[test]
    fn cea708_other_service_ignored() {
        test_init_log();
        let mut controller = controller(CeaType::Cea708, 2);
        controller.add_data(&CCP).unwrap();
        controller.process();
        assert_eq!(controller.window_controller().windows().count(), 0);
    }

    #[test]
    fn cea708_packet_split_across_payloads() {
        test_init_log();
        let mut controller = controller(CeaType::Cea708, 1);
        controller.add_data(&CCP[..9]).unwrap();
        controller.process();
        assert!(controller.window_controller().window(0).is_none());
        controller.add_data(&CCP[9..]).unwrap();
        controller.process();
        assert_eq!(controller.window_controller().window(0).unwrap().text(), "Hi");
    }

    #[test]
    fn cea708_new_start_flushes_incomplete_packet() {
        test_init_log();
        let mut controller = controller(CeaType::Cea708, 1);
        // declares 12 bytes but only a DefineWindow block arrives before the next start
        let data = [
            0xFF, 0x06, 0x27, 0xFE, 0x98, 0x20, 0xFE, 0x00, 0x00, 0xFE, 0x01, 0x1F, 0xFE, 0x00,
            0x00, 0xFF, 0x41, 0x00,
        ];
        controller.add_data(&data).unwrap();
        controller.process();
        let window = controller.window_controller().window(0).unwrap();
        assert_eq!(window.definition().row_count, 2);
        assert_eq!(controller.queued(), 0);
    }

    #[test]
    fn cea708_data_without_start() {
        test_init_log();
        let mut controller = controller(CeaType::Cea708, 1);
        controller.add_data(&CCP[3..]).unwrap();
        controller.process();
        assert_eq!(controller.window_controller().windows().count(), 0);
    }

    fn text_position(gfx: &RecordingGfx) -> Option<(i32, i32)> {
        let call = gfx.calls.iter().find_map(|call| call.strip_prefix("text("))?;
        let mut parts = call.splitn(3, ", ");
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        Some((x, y))
    }

    #[test]
    fn custom_screen() {
        test_init_log();
        let mut default = controller(CeaType::Cea708, 1);
        default.add_data(&CCP).unwrap();
        default.process();
        let (x, y) = text_position(default.gfx()).unwrap();

        let clock = ManualClock::default();
        let screen = ScreenInfo {
            width: 1920,
            height: 1080,
            ..ScreenInfo::cea708()
        };
        let windows = WindowController::new(Rc::new(clock.clone()))
            .with_screen_info(screen, ScreenInfo::cea608())
            .with_text_drawer_factory(cell_text_drawer_factory());
        let mut controller = Controller::new(Rc::new(clock), RecordingGfx::default())
            .with_window_controller(windows);
        assert!(controller.is_muted());
        controller.set_active_service(CeaType::Cea708, 1);
        controller.unmute();
        assert!(!controller.is_muted());
        controller.start();
        controller.add_data(&CCP).unwrap();
        controller.process();
        // the safe area stays centered
        assert_eq!(text_position(controller.gfx()), Some((x + 320, y + 180)));
    }

    #[test]
    fn add_data_errors() {
        test_init_log();
        let clock = ManualClock::default();
        let mut controller = Controller::new(Rc::new(clock), RecordingGfx::default());
        assert_eq!(controller.add_data(&CCP), Err(ControllerError::NotStarted));
        controller.start();
        assert_eq!(controller.add_data(&[]), Err(ControllerError::EmptyData));
        assert_eq!(controller.add_data(&CCP), Ok(()));
    }

    #[test]
    fn muted_discards_data() {
        test_init_log();
        let mut controller = controller(CeaType::Cea708, 1);
        controller.mute();
        assert_eq!(controller.gfx().calls.last().map(String::as_str), Some("hide"));
        controller.add_data(&CCP).unwrap();
        controller.process();
        assert_eq!(controller.queued(), 0);
        assert_eq!(controller.window_controller().windows().count(), 0);

        controller.unmute();
        assert_eq!(controller.gfx().calls.last().map(String::as_str), Some("show"));
        controller.add_data(&CCP).unwrap();
        controller.process();
        assert_eq!(controller.window_controller().windows().count(), 1);
    }

    #[test]
    fn stop_twice() {
        test_init_log();
        let mut controller = controller(CeaType::Cea708, 1);
        controller.add_data(&CCP).unwrap();
        controller.process();
        assert_eq!(controller.window_controller().windows().count(), 1);

        controller.stop();
        assert!(!controller.is_started());
        assert_eq!(controller.window_controller().windows().count(), 0);
        assert_eq!(controller.parser().queued_blocks(), 0);
        let calls = controller.gfx().calls.len();
        controller.stop();
        assert_eq!(controller.gfx().calls.len(), calls);
        assert_eq!(controller.window_controller().windows().count(), 0);
        assert_eq!(controller.queued(), 0);
    }

    #[test]
    fn service_change_stops() {
        test_init_log();
        let mut controller = controller(CeaType::Cea608, 1000);
        assert!(controller.is_started());
        controller.set_active_service(CeaType::Cea608, 1000);
        assert!(controller.is_started());
        controller.set_active_service(CeaType::Cea708, 1);
        assert!(!controller.is_started());
        assert_eq!(controller.active_type(), CeaType::Cea708);
        assert_eq!(controller.active_service(), 1);
        assert!(!controller.window_controller().is_608_enabled());

        controller.start();
        assert!(!controller.window_controller().is_608_enabled());
    }

    #[test]
    fn start_shows_when_unmuted() {
        test_init_log();
        let clock = ManualClock::default();
        let mut controller = Controller::new(Rc::new(clock), RecordingGfx::default());
        controller.start();
        assert_eq!(controller.gfx().calls, ["clear", "update"]);
        controller.stop();
        controller.unmute();
        controller.gfx_mut().calls.clear();
        controller.start();
        assert_eq!(controller.gfx().calls, ["clear", "update", "show"]);
    }

    #[test]
    fn preview_text() {
        test_init_log();
        let mut controller = controller(CeaType::Cea708, 1);
        controller.add_data(&CCP).unwrap();
        controller.process();

        controller.set_text_for_preview("Sample");
        let windows = controller.window_controller();
        assert!(windows.window(0).is_none());
        let window = windows.window(5).unwrap();
        assert!(window.is_visible());
        assert_eq!(window.definition().priority, 1);
        assert_eq!(window.text(), "Sample");
        assert_eq!(controller.gfx().texts().last().map(String::as_str), Some("Sample"));
    }

    #[test]
    fn cc_attributes_forwarded() {
        test_init_log();
        let mut controller = controller(CeaType::Cea708, 1);
        let attrs = CcAttributes::parse(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00])
            .unwrap();
        assert_eq!(controller.set_cc_attributes(&attrs), Ok(()));
        assert_eq!(
            controller.window_controller().settings().pen_color().fg_color & 0x00FF_FFFF,
            0xFF_0000
        );
    }
}
