#![no_main]
use libfuzzer_sys::fuzz_target;

use cea_caption_decoder::*;

use std::rc::Rc;
use std::time::Duration;

use log::info;

use std::sync::OnceLock;

static TRACING: OnceLock<()> = OnceLock::new();

pub fn debug_init() {
    TRACING.get_or_init(|| {
        env_logger::init();
    });
}

fuzz_target!(|data: &[u8]| {
    debug_init();
    let clock = ManualClock::default();
    let mut parser = CommandParser::new(Rc::new(clock.clone()));
    let mut windows = WindowController::new(Rc::new(clock.clone()));

    // every block is prefixed with a service block header
    let mut offset = 0;
    while offset < data.len() {
        let block = ServiceBlock::parse(data, &mut offset);
        if block.is_null() {
            continue;
        }
        info!("service {} block {:02x?}", block.service_number(), block.data());
        parser.process(&block, &mut windows);
        clock.advance(Duration::from_millis(100));
    }

    for window in windows.windows() {
        info!("window {} text {:?}", window.id(), window.text());
        assert!(window.id() < 8);
    }
});
