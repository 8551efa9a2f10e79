#![no_main]
use libfuzzer_sys::fuzz_target;

use cea_caption_decoder::attributes::WindowBorder;
use cea_caption_decoder::*;

use std::rc::Rc;

use log::info;

use std::sync::OnceLock;

static TRACING: OnceLock<()> = OnceLock::new();

pub fn debug_init() {
    TRACING.get_or_init(|| {
        env_logger::init();
    });
}

struct NullGfx;

impl Gfx for NullGfx {
    fn draw_background(&mut self, _: Point, _: Dimensions, _: u32) {}
    fn draw_border(&mut self, _: Point, _: Dimensions, _: u32, _: u32, _: WindowBorder) {}
    fn draw_text(&mut self, _: Point, _: Dimensions, _: &str, _: &PenAttributes) {}
    fn draw_underline(&mut self, _: Point, _: Dimensions, _: u32) {}
    fn update(&mut self) {}
    fn clear(&mut self) {}
    fn show(&mut self) {}
    fn hide(&mut self) {}
}

fuzz_target!(|data: &[u8]| {
    debug_init();
    let Some((&service, data)) = data.split_first() else {
        return;
    };
    // 0-63 for CEA-708 services, the rest map onto CC1-CC4 and Text1-Text4
    let (cea_type, service) = if service < 64 {
        (CeaType::Cea708, service as u32)
    } else {
        (CeaType::Cea608, 1000 + (service as u32 % 8))
    };
    info!("{cea_type:?} service {service}");

    let clock = ManualClock::default();
    let mut controller = Controller::new(Rc::new(clock.clone()), NullGfx);
    controller.set_active_service(cea_type, service);
    controller.unmute();
    controller.start();
    for chunk in data.chunks(60) {
        let _ = controller.add_data(chunk);
        controller.process();
        clock.advance(std::time::Duration::from_millis(33));
    }
    controller.stop();
    assert_eq!(controller.window_controller().windows().count(), 0);
});
